use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Query,
    },
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use souq_core::SouqContext;
use souq_notify::{ListNotifications, MarkOutcome, NotificationService, SendNotificationInput, SendOutcome};

use crate::auth::AuthenticatedUser;
use crate::error::ApiResult;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationIdRequest {
    pub notification_id: Option<String>,
}

#[derive(Deserialize)]
pub struct PreferencesRequest {
    pub preferences: Option<Value>,
}

/// Any authenticated caller may notify any existing user.
pub async fn send(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<SendNotificationInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    tracing::debug!("Notification send requested by {}", auth.user.id);

    match NotificationService::new(ctx).send_notification(input).await? {
        SendOutcome::Delivered(notification) => Ok(Json(json!({
            "success": true,
            "notification": notification,
        }))),
        SendOutcome::Skipped => Ok(Json(json!({
            "success": true,
            "skipped": true,
            "message": "Notification skipped - user preferences disabled this type",
            "messageAr": "تم تخطي الإشعار - عطّل المستخدم هذا النوع",
        }))),
    }
}

pub async fn list(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    query: Result<Query<ListNotifications>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(query) = query?;
    let page = NotificationService::new(ctx)
        .get_notifications(&auth.user.id, query)
        .await?;

    Ok(Json(json!({
        "success": true,
        "notifications": page.notifications,
        "total": page.total,
        "unreadCount": page.unread_count,
        "page": page.page,
        "limit": page.limit,
        "totalPages": page.total_pages,
    })))
}

pub async fn mark_read(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<NotificationIdRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;

    match NotificationService::new(ctx)
        .mark_as_read(&auth.user.id, body.notification_id)
        .await?
    {
        MarkOutcome::Marked(notification) => Ok(Json(json!({
            "success": true,
            "notification": notification,
            "message": "Notification marked as read",
            "messageAr": "تم تعليم الإشعار كمقروء",
        }))),
        MarkOutcome::AlreadyRead => Ok(Json(json!({
            "success": true,
            "message": "Notification already marked as read",
            "messageAr": "تم تعليم الإشعار كمقروء مسبقاً",
        }))),
    }
}

pub async fn mark_all_read(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Value>> {
    let marked = NotificationService::new(ctx).mark_all_as_read(&auth.user.id).await?;

    if marked == 0 {
        return Ok(Json(json!({
            "success": true,
            "markedCount": 0,
            "message": "No notifications to mark as read",
            "messageAr": "لا توجد إشعارات لتعليمها كمقروءة",
        })));
    }

    Ok(Json(json!({
        "success": true,
        "markedCount": marked,
        "message": format!("Marked {} notifications as read", marked),
        "messageAr": format!("تم تعليم {} إشعار كمقروء", marked),
    })))
}

pub async fn delete(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<NotificationIdRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    NotificationService::new(ctx)
        .delete_notification(&auth.user.id, body.notification_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Notification deleted",
        "messageAr": "تم حذف الإشعار",
    })))
}

pub async fn clear_all(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Value>> {
    NotificationService::new(ctx).clear_all(&auth.user.id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "All notifications cleared",
        "messageAr": "تم مسح جميع الإشعارات",
    })))
}

pub async fn unread_count(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Value>> {
    let breakdown = NotificationService::new(ctx).get_unread_count(&auth.user.id).await?;

    Ok(Json(json!({
        "success": true,
        "unreadCount": breakdown.unread_count,
        "count": breakdown.unread_count,
        "byCategory": breakdown.by_category,
    })))
}

pub async fn get_preferences(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Value>> {
    let preferences = NotificationService::new(ctx).get_preferences(&auth.user.id).await?;

    Ok(Json(json!({
        "success": true,
        "preferences": preferences,
    })))
}

pub async fn update_preferences(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<PreferencesRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let preferences = NotificationService::new(ctx)
        .update_preferences(&auth.user.id, body.preferences)
        .await?;

    Ok(Json(json!({
        "success": true,
        "preferences": preferences,
        "message": "Notification preferences updated",
        "messageAr": "تم تحديث تفضيلات الإشعارات",
    })))
}
