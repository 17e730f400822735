pub mod model;
pub mod service;

#[cfg(test)]
mod tests;

pub use model::{
    default_preferences, CategoryCounts, ListNotifications, MarkOutcome, Notification, NotificationCategory,
    NotificationPage, NotificationPreferences, NotificationType, SendNotificationInput, SendOutcome,
    UnreadBreakdown, MAX_FEED,
};
pub use service::NotificationService;
