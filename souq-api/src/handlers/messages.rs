use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use souq_core::SouqContext;
use souq_messaging::{MessagingService, SendMessageInput};

use crate::auth::AuthenticatedUser;
use crate::error::ApiResult;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    pub other_user_id: Option<String>,
    pub product_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationIdRequest {
    pub conversation_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: Option<String>,
}

pub async fn send_message(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<SendMessageInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let sent = MessagingService::new(ctx).send_message(&auth.user, input).await?;

    Ok(Json(json!({
        "success": true,
        "message": sent.message,
        "conversationId": sent.conversation_id,
    })))
}

pub async fn get_conversation(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<ConversationRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let view = MessagingService::new(ctx)
        .get_conversation(&auth.user.id, body.other_user_id, body.product_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "conversation": view.conversation,
        "exists": view.exists,
    })))
}

pub async fn get_conversations(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Value>> {
    let conversations = MessagingService::new(ctx).get_conversations(&auth.user.id).await?;

    Ok(Json(json!({
        "success": true,
        "total": conversations.len(),
        "conversations": conversations,
    })))
}

pub async fn mark_read(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<ConversationIdRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let marked = MessagingService::new(ctx)
        .mark_conversation_as_read(&auth.user.id, body.conversation_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "markedCount": marked,
        "message": format!("Marked {} messages as read", marked),
        "messageAr": format!("تم تعليم {} رسالة كمقروءة", marked),
    })))
}

pub async fn unread_count(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Value>> {
    let summary = MessagingService::new(ctx).get_unread_count(&auth.user.id).await?;

    Ok(Json(json!({
        "success": true,
        "unreadCount": summary.unread_count,
        "count": summary.unread_count,
        "byConversation": summary.by_conversation,
    })))
}

pub async fn delete_conversation(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<ConversationIdRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    MessagingService::new(ctx)
        .delete_conversation(&auth.user.id, body.conversation_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Conversation deleted",
        "messageAr": "تم حذف المحادثة",
    })))
}

pub async fn search(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let conversations = MessagingService::new(ctx)
        .search_conversations(&auth.user.id, body.query)
        .await?;

    Ok(Json(json!({
        "success": true,
        "total": conversations.len(),
        "conversations": conversations,
    })))
}
