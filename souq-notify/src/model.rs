use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Feed length kept per user. Older entries are dropped on every write.
pub const MAX_FEED: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OrderCreated,
    OrderConfirmed,
    OrderShipped,
    OrderDelivered,
    OrderCancelled,
    MessageReceived,
    ReviewReceived,
    ProductFavorited,
    PriceDrop,
    ProductSold,
    ProductBackInStock,
    PaymentReceived,
    Announcement,
}

impl NotificationType {
    pub const ALL: [NotificationType; 13] = [
        NotificationType::OrderCreated,
        NotificationType::OrderConfirmed,
        NotificationType::OrderShipped,
        NotificationType::OrderDelivered,
        NotificationType::OrderCancelled,
        NotificationType::MessageReceived,
        NotificationType::ReviewReceived,
        NotificationType::ProductFavorited,
        NotificationType::PriceDrop,
        NotificationType::ProductSold,
        NotificationType::ProductBackInStock,
        NotificationType::PaymentReceived,
        NotificationType::Announcement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::OrderCreated => "order_created",
            NotificationType::OrderConfirmed => "order_confirmed",
            NotificationType::OrderShipped => "order_shipped",
            NotificationType::OrderDelivered => "order_delivered",
            NotificationType::OrderCancelled => "order_cancelled",
            NotificationType::MessageReceived => "message_received",
            NotificationType::ReviewReceived => "review_received",
            NotificationType::ProductFavorited => "product_favorited",
            NotificationType::PriceDrop => "price_drop",
            NotificationType::ProductSold => "product_sold",
            NotificationType::ProductBackInStock => "product_back_in_stock",
            NotificationType::PaymentReceived => "payment_received",
            NotificationType::Announcement => "announcement",
        }
    }

    /// Category used when the sender does not pick one.
    pub fn category(&self) -> NotificationCategory {
        match self {
            NotificationType::OrderCreated
            | NotificationType::OrderConfirmed
            | NotificationType::OrderShipped
            | NotificationType::OrderDelivered
            | NotificationType::OrderCancelled
            | NotificationType::PaymentReceived
            | NotificationType::ProductSold => NotificationCategory::Order,
            NotificationType::MessageReceived => NotificationCategory::Message,
            NotificationType::ReviewReceived | NotificationType::ProductFavorited | NotificationType::PriceDrop => {
                NotificationCategory::Social
            }
            NotificationType::ProductBackInStock | NotificationType::Announcement => NotificationCategory::System,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Order,
    Message,
    Social,
    System,
}

impl FromStr for NotificationCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "order" => Ok(NotificationCategory::Order),
            "message" => Ok(NotificationCategory::Message),
            "social" => Ok(NotificationCategory::Social),
            "system" => Ok(NotificationCategory::System),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub title_ar: String,
    pub message: String,
    pub message_ar: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub category: NotificationCategory,

    // Deep-link metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Per-type opt-out map. A type missing from a stored map counts as enabled.
pub type NotificationPreferences = BTreeMap<NotificationType, bool>;

pub fn default_preferences() -> NotificationPreferences {
    NotificationType::ALL.into_iter().map(|t| (t, true)).collect()
}

/// Body of a send request. Text fields stay optional so missing ones can be
/// reported together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationInput {
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub title_ar: Option<String>,
    pub message: Option<String>,
    pub message_ar: Option<String>,
    pub category: Option<String>,
    pub action_url: Option<String>,
    pub product_id: Option<String>,
    pub order_id: Option<String>,
    pub conversation_id: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    Delivered(Notification),
    /// The target disabled this type.
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    Marked(Notification),
    AlreadyRead,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotifications {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub category: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub total: usize,
    pub unread_count: usize,
    pub page: u32,
    pub limit: u32,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub order: usize,
    pub message: usize,
    pub social: usize,
    pub system: usize,
}

impl CategoryCounts {
    pub fn add(&mut self, category: NotificationCategory) {
        match category {
            NotificationCategory::Order => self.order += 1,
            NotificationCategory::Message => self.message += 1,
            NotificationCategory::Social => self.social += 1,
            NotificationCategory::System => self.system += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadBreakdown {
    pub unread_count: usize,
    pub by_category: CategoryCounts,
}
