//! User directory.
//!
//! User records live under `user:{id}`. Email, phone and national ID lookups go
//! through secondary index keys that are written together with the record, so
//! no lookup has to scan the user set. An index entry is only trusted after the
//! record it points at has been read back and still carries the indexed value.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::keys;
use crate::locks::KeyLocks;
use crate::store::{get_json, set_json, SharedStore};
use crate::types::{generate_id, User, UserRole};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterUser {
    pub full_name: Option<String>,
    pub national_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub avatar_url: Option<String>,
}

#[derive(Clone)]
pub struct UserDirectory {
    store: SharedStore,
    locks: KeyLocks,
}

impl UserDirectory {
    pub fn new(store: SharedStore, locks: KeyLocks) -> Self {
        Self { store, locks }
    }

    pub async fn get(&self, user_id: &str) -> AppResult<Option<User>> {
        if user_id.is_empty() {
            return Ok(None);
        }
        Ok(get_json(self.store.as_ref(), &keys::user(user_id)).await?)
    }

    pub async fn require(&self, user_id: &str) -> AppResult<User> {
        self.get(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found", "المستخدم غير موجود"))
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let wanted = email.trim().to_lowercase();
        self.resolve_index(&keys::email_index(email), |user| user.email.to_lowercase() == wanted)
            .await
    }

    pub async fn find_by_phone(&self, phone: &str) -> AppResult<Option<User>> {
        let normalized = normalize_phone(phone);
        self.resolve_index(&keys::phone_index(&normalized), |user| user.phone == normalized)
            .await
    }

    pub async fn find_by_national_id(&self, national_id: &str) -> AppResult<Option<User>> {
        let wanted = national_id.trim();
        self.resolve_index(&keys::national_id_index(national_id), |user| user.national_id == wanted)
            .await
    }

    async fn resolve_index(&self, index_key: &str, still_matches: impl Fn(&User) -> bool) -> AppResult<Option<User>> {
        let Some(user_id) = get_json::<String>(self.store.as_ref(), index_key).await? else {
            return Ok(None);
        };

        match self.get(&user_id).await? {
            Some(user) if still_matches(&user) => Ok(Some(user)),
            _ => {
                tracing::warn!("Stale index entry {} -> {}", index_key, user_id);
                Ok(None)
            }
        }
    }

    pub async fn register(&self, input: RegisterUser) -> AppResult<User> {
        let (Some(full_name), Some(national_id), Some(email), Some(phone), Some(password)) = (
            non_empty(input.full_name),
            non_empty(input.national_id),
            non_empty(input.email),
            non_empty(input.phone),
            input.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::validation("All fields are required", "جميع الحقول مطلوبة"));
        };

        let phone = normalize_phone(&phone);
        if phone.is_empty() {
            return Err(AppError::validation("Invalid phone number", "رقم الهاتف غير صالح"));
        }
        if !email.contains('@') {
            return Err(AppError::validation("Invalid email address", "البريد الإلكتروني غير صالح"));
        }

        let _guard = self.locks.lock(keys::REGISTRATION_LOCK).await;

        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::validation("Email already registered", "البريد الإلكتروني مسجل مسبقاً"));
        }
        if self.find_by_phone(&phone).await?.is_some() {
            return Err(AppError::validation("Phone number already registered", "رقم الهاتف مسجل مسبقاً"));
        }
        if self.find_by_national_id(&national_id).await?.is_some() {
            return Err(AppError::validation("National ID already registered", "رقم الهوية الوطنية مسجل مسبقاً"));
        }

        let user = User {
            id: generate_id("user"),
            full_name,
            national_id,
            email,
            phone,
            password_hash: hash_password(&password)?,
            verified: false,
            role: None,
            rating: 0.0,
            review_count: 0,
            created_at: Utc::now(),
            avatar_url: None,
        };

        self.save(&user).await?;
        self.write_indexes(&user).await?;

        tracing::info!("User registered: {} ({})", user.email, user.id);

        Ok(user)
    }

    /// Mark the account owning `email` as verified when `otp` matches.
    pub async fn verify_email(&self, email: &str, otp: &str, expected_otp: &str) -> AppResult<User> {
        if email.trim().is_empty() || otp.trim().is_empty() {
            return Err(AppError::validation(
                "Email and OTP required",
                "البريد الإلكتروني ورمز التحقق مطلوبان",
            ));
        }
        if otp.trim() != expected_otp {
            return Err(AppError::validation("Invalid verification code", "رمز التحقق غير صحيح"));
        }

        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::not_found("User not found", "المستخدم غير موجود"))?;

        let _guard = self.locks.lock(&keys::user(&user.id)).await;
        let mut user = self.require(&user.id).await?;
        user.verified = true;
        self.save(&user).await?;

        tracing::info!("OTP verified for {}", user.email);

        Ok(user)
    }

    /// Password login. Only verified accounts may sign in.
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::validation(
                "Email and password required",
                "البريد الإلكتروني وكلمة المرور مطلوبان",
            ));
        }

        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::not_found("User not found", "المستخدم غير موجود"))?;

        if !user.verified {
            return Err(AppError::validation("Account not verified", "الحساب غير موثق"));
        }

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::auth("Invalid credentials", "بيانات الدخول غير صحيحة"));
        }

        Ok(user)
    }

    pub async fn set_role(&self, user_id: &str, role: UserRole) -> AppResult<User> {
        let _guard = self.locks.lock(&keys::user(user_id)).await;
        let mut user = self.require(user_id).await?;
        user.role = Some(role);
        self.save(&user).await?;

        tracing::info!("User role set: {} -> {:?}", user.id, role);

        Ok(user)
    }

    pub async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> AppResult<User> {
        let _registration = self.locks.lock(keys::REGISTRATION_LOCK).await;
        let _guard = self.locks.lock(&keys::user(user_id)).await;
        let mut user = self.require(user_id).await?;
        let previous = user.clone();

        if let Some(full_name) = non_empty(update.full_name) {
            user.full_name = full_name;
        }
        if let Some(email) = non_empty(update.email) {
            if !email.contains('@') {
                return Err(AppError::validation("Invalid email address", "البريد الإلكتروني غير صالح"));
            }
            if let Some(owner) = self.find_by_email(&email).await? {
                if owner.id != user.id {
                    return Err(AppError::validation("Email already registered", "البريد الإلكتروني مسجل مسبقاً"));
                }
            }
            user.email = email;
        }
        if let Some(phone) = non_empty(update.phone) {
            let phone = normalize_phone(&phone);
            if phone.is_empty() {
                return Err(AppError::validation("Invalid phone number", "رقم الهاتف غير صالح"));
            }
            if let Some(owner) = self.find_by_phone(&phone).await? {
                if owner.id != user.id {
                    return Err(AppError::validation("Phone number already registered", "رقم الهاتف مسجل مسبقاً"));
                }
            }
            user.phone = phone;
        }
        if let Some(role) = update.role {
            user.role = Some(role);
        }
        if let Some(avatar_url) = update.avatar_url {
            user.avatar_url = Some(avatar_url).filter(|url| !url.is_empty());
        }

        self.save(&user).await?;

        if !previous.email.eq_ignore_ascii_case(&user.email) {
            self.store.del(&keys::email_index(&previous.email)).await?;
        }
        if previous.phone != user.phone {
            self.store.del(&keys::phone_index(&previous.phone)).await?;
        }
        self.write_indexes(&user).await?;

        tracing::info!("User profile updated: {}", user.id);

        Ok(user)
    }

    /// Rewrite every secondary index from the stored user records.
    pub async fn rebuild_indexes(&self) -> AppResult<usize> {
        let _guard = self.locks.lock(keys::REGISTRATION_LOCK).await;
        let values = self.store.get_by_prefix(keys::USER_PREFIX).await?;

        let mut rebuilt = 0;
        for value in values {
            // The prefix also covers per-user lists and preference maps
            let Ok(user) = serde_json::from_value::<User>(value) else {
                continue;
            };
            self.write_indexes(&user).await?;
            rebuilt += 1;
        }

        tracing::info!("Rebuilt secondary indexes for {} users", rebuilt);

        Ok(rebuilt)
    }

    async fn save(&self, user: &User) -> AppResult<()> {
        set_json(self.store.as_ref(), &keys::user(&user.id), user).await?;
        Ok(())
    }

    async fn write_indexes(&self, user: &User) -> AppResult<()> {
        let store = self.store.as_ref();
        set_json(store, &keys::email_index(&user.email), &user.id).await?;
        set_json(store, &keys::phone_index(&user.phone), &user.id).await?;
        set_json(store, &keys::national_id_index(&user.national_id), &user.id).await?;
        Ok(())
    }
}

pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| AppError::internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
