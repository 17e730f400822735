use chrono::Utc;
use serde_json::Value;

use souq_core::error::{AppError, AppResult};
use souq_core::store::{get_json, set_json};
use souq_core::types::generate_id;
use souq_core::{keys, SouqContext};

use crate::model::{
    default_preferences, ListNotifications, MarkOutcome, Notification, NotificationCategory, NotificationPage,
    NotificationPreferences, NotificationType, SendNotificationInput, SendOutcome, UnreadBreakdown, MAX_FEED,
};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

pub struct NotificationService {
    ctx: SouqContext,
}

impl NotificationService {
    pub fn new(ctx: SouqContext) -> Self {
        Self { ctx }
    }

    pub async fn send_notification(&self, input: SendNotificationInput) -> AppResult<SendOutcome> {
        let (Some(user_id), Some(kind), Some(title), Some(title_ar), Some(message), Some(message_ar)) = (
            non_empty(input.user_id),
            non_empty(input.kind),
            non_empty(input.title),
            non_empty(input.title_ar),
            non_empty(input.message),
            non_empty(input.message_ar),
        ) else {
            return Err(AppError::validation(
                "Missing required fields: userId, type, title, titleAr, message, messageAr",
                "حقول مطلوبة مفقودة: userId, type, title, titleAr, message, messageAr",
            ));
        };

        let kind: NotificationType = kind
            .parse()
            .map_err(|_| AppError::validation("Unknown notification type", "نوع الإشعار غير معروف"))?;

        let category = match non_empty(input.category) {
            Some(category) => parse_category(&category)?,
            None => kind.category(),
        };

        if self.ctx.users().get(&user_id).await?.is_none() {
            return Err(AppError::validation("Recipient user not found", "المستخدم المستلم غير موجود"));
        }

        if !self.should_notify(&user_id, kind).await? {
            tracing::info!("Notification {} skipped for user {}: disabled in preferences", kind, user_id);
            return Ok(SendOutcome::Skipped);
        }

        let notification = Notification {
            id: generate_id("notif"),
            user_id: user_id.clone(),
            kind,
            title,
            title_ar,
            message,
            message_ar,
            read: false,
            created_at: Utc::now(),
            category,
            action_url: non_empty(input.action_url),
            product_id: non_empty(input.product_id),
            order_id: non_empty(input.order_id),
            conversation_id: non_empty(input.conversation_id),
            image_url: non_empty(input.image_url),
        };

        let feed_key = keys::user_notifications(&user_id);
        let _feed_guard = self.ctx.locks.lock(&feed_key).await;

        let mut feed = self.load_feed(&user_id).await?;
        feed.insert(0, notification.clone());
        feed.truncate(MAX_FEED);
        set_json(self.ctx.store.as_ref(), &feed_key, &feed).await?;

        tracing::info!("Notification sent to user {}: {}", user_id, kind);

        Ok(SendOutcome::Delivered(notification))
    }

    pub async fn get_notifications(&self, user_id: &str, query: ListNotifications) -> AppResult<NotificationPage> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let category = match non_empty(query.category) {
            Some(category) if category == "all" => None,
            Some(category) => Some(parse_category(&category)?),
            None => None,
        };

        let filtered: Vec<Notification> = self
            .load_feed(user_id)
            .await?
            .into_iter()
            .filter(|n| category.map_or(true, |c| n.category == c))
            .filter(|n| !query.unread_only || !n.read)
            .collect();

        let total = filtered.len();
        let unread_count = filtered.iter().filter(|n| !n.read).count();
        let total_pages = total.div_ceil(limit as usize);

        let start = (page as usize - 1).saturating_mul(limit as usize);
        let notifications: Vec<Notification> = filtered.into_iter().skip(start).take(limit as usize).collect();

        tracing::debug!("Fetched {} notifications for user {}", notifications.len(), user_id);

        Ok(NotificationPage {
            notifications,
            total,
            unread_count,
            page,
            limit,
            total_pages,
        })
    }

    pub async fn mark_as_read(&self, user_id: &str, notification_id: Option<String>) -> AppResult<MarkOutcome> {
        let notification_id = non_empty(notification_id)
            .ok_or_else(|| AppError::validation("Notification ID is required", "معرف الإشعار مطلوب"))?;

        let feed_key = keys::user_notifications(user_id);
        let _feed_guard = self.ctx.locks.lock(&feed_key).await;

        let mut feed = self.load_feed(user_id).await?;
        let notification = feed
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(not_found)?;

        if notification.read {
            return Ok(MarkOutcome::AlreadyRead);
        }
        notification.read = true;
        let marked = notification.clone();

        set_json(self.ctx.store.as_ref(), &feed_key, &feed).await?;

        tracing::info!("Notification {} marked as read for user {}", notification_id, user_id);

        Ok(MarkOutcome::Marked(marked))
    }

    /// Returns how many notifications changed.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<usize> {
        let feed_key = keys::user_notifications(user_id);
        let _feed_guard = self.ctx.locks.lock(&feed_key).await;

        let mut feed = self.load_feed(user_id).await?;
        let mut marked = 0;
        for notification in feed.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            marked += 1;
        }

        if marked > 0 {
            set_json(self.ctx.store.as_ref(), &feed_key, &feed).await?;
        }

        tracing::info!("Marked {} notifications as read for user {}", marked, user_id);

        Ok(marked)
    }

    pub async fn delete_notification(&self, user_id: &str, notification_id: Option<String>) -> AppResult<()> {
        let notification_id = non_empty(notification_id)
            .ok_or_else(|| AppError::validation("Notification ID is required", "معرف الإشعار مطلوب"))?;

        let feed_key = keys::user_notifications(user_id);
        let _feed_guard = self.ctx.locks.lock(&feed_key).await;

        let mut feed = self.load_feed(user_id).await?;
        let before = feed.len();
        feed.retain(|n| n.id != notification_id);

        if feed.len() == before {
            return Err(not_found());
        }

        set_json(self.ctx.store.as_ref(), &feed_key, &feed).await?;

        tracing::info!("Notification {} deleted for user {}", notification_id, user_id);

        Ok(())
    }

    pub async fn clear_all(&self, user_id: &str) -> AppResult<()> {
        let feed_key = keys::user_notifications(user_id);
        let _feed_guard = self.ctx.locks.lock(&feed_key).await;

        set_json(self.ctx.store.as_ref(), &feed_key, &Vec::<Notification>::new()).await?;

        tracing::info!("Cleared all notifications for user {}", user_id);

        Ok(())
    }

    pub async fn get_unread_count(&self, user_id: &str) -> AppResult<UnreadBreakdown> {
        let mut breakdown = UnreadBreakdown::default();

        for notification in self.load_feed(user_id).await?.iter().filter(|n| !n.read) {
            breakdown.unread_count += 1;
            breakdown.by_category.add(notification.category);
        }

        Ok(breakdown)
    }

    /// Stored map, or every type enabled when the user never saved one.
    pub async fn get_preferences(&self, user_id: &str) -> AppResult<NotificationPreferences> {
        Ok(self
            .stored_preferences(user_id)
            .await?
            .unwrap_or_else(default_preferences))
    }

    /// Replaces the stored map. Types left out are no longer recorded.
    pub async fn update_preferences(
        &self,
        user_id: &str,
        preferences: Option<Value>,
    ) -> AppResult<NotificationPreferences> {
        let preferences = parse_preferences(preferences)?;

        set_json(
            self.ctx.store.as_ref(),
            &keys::user_notification_preferences(user_id),
            &preferences,
        )
        .await?;

        tracing::info!("Updated notification preferences for user {}", user_id);

        Ok(preferences)
    }

    /// Only an explicit `false` for the type suppresses delivery.
    async fn should_notify(&self, user_id: &str, kind: NotificationType) -> AppResult<bool> {
        let enabled = self
            .stored_preferences(user_id)
            .await?
            .and_then(|prefs| prefs.get(&kind).copied())
            .unwrap_or(true);

        Ok(enabled)
    }

    async fn stored_preferences(&self, user_id: &str) -> AppResult<Option<NotificationPreferences>> {
        Ok(get_json::<NotificationPreferences>(self.ctx.store.as_ref(), &keys::user_notification_preferences(user_id)).await?)
    }

    async fn load_feed(&self, user_id: &str) -> AppResult<Vec<Notification>> {
        Ok(get_json::<Vec<Notification>>(self.ctx.store.as_ref(), &keys::user_notifications(user_id))
            .await?
            .unwrap_or_default())
    }
}

fn parse_preferences(value: Option<Value>) -> AppResult<NotificationPreferences> {
    let invalid = || AppError::validation("Preferences object is required", "كائن التفضيلات مطلوب");

    match value {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).map_err(|e| {
            tracing::debug!("Rejected preferences: {}", e);
            AppError::validation(
                "Preferences must map known notification types to true or false",
                "يجب أن تربط التفضيلات أنواع الإشعارات المعروفة بقيمة صحيحة أو خاطئة",
            )
        }),
        _ => Err(invalid()),
    }
}

fn parse_category(value: &str) -> AppResult<NotificationCategory> {
    value
        .parse()
        .map_err(|_| AppError::validation("Unknown notification category", "فئة الإشعار غير معروفة"))
}

fn not_found() -> AppError {
    AppError::not_found("Notification not found", "الإشعار غير موجود")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
