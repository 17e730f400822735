use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Buyer,
    Seller,
    Both,
}

/// Stored user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub national_id: String,
    pub email: String,
    /// Digits only.
    pub phone: String,
    pub password_hash: String,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// What other users and the caller get to see of a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub name_ar: String,
    pub email: String,
    pub phone: String,
    pub role: UserRole,
    pub verified: bool,
    pub rating: f64,
    pub review_count: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id.clone(),
            name: user.full_name.clone(),
            name_ar: user.full_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role.unwrap_or(UserRole::Buyer),
            verified: user.verified,
            rating: user.rating,
            review_count: user.review_count,
            created_at: user.created_at,
            avatar_url: user.avatar_url.clone(),
        }
    }
}

/// Generate a record id such as `msg_1718000000000_k3j9x0a1b`.
pub fn generate_id(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), &suffix[..9])
}
