use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use souq_core::{keys, set_json, Config, SouqContext, User};
use tower::ServiceExt;

use crate::auth::generate_token;
use crate::server::router;

fn test_app() -> (SouqContext, Router) {
    let ctx = SouqContext::in_memory(Config::default());
    (ctx.clone(), router(ctx))
}

/// Store a verified user and return a token for it.
async fn seed_user(ctx: &SouqContext, id: &str, name: &str) -> String {
    let user = User {
        id: id.to_string(),
        full_name: name.to_string(),
        national_id: format!("nid-{}", id),
        email: format!("{}@example.com", id),
        phone: "966500000000".to_string(),
        password_hash: String::new(),
        verified: true,
        role: None,
        rating: 0.0,
        review_count: 0,
        created_at: Utc::now(),
        avatar_url: None,
    };
    set_json(ctx.store.as_ref(), &keys::user(id), &user).await.unwrap();
    generate_token(id, &ctx.config.auth.jwt_secret, 30).unwrap()
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn post(app: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    call(app, Method::POST, uri, token, Some(body)).await
}

async fn get(app: &Router, uri: &str, token: &str) -> (StatusCode, Value) {
    call(app, Method::GET, uri, Some(token), None).await
}

#[tokio::test]
async fn test_health_is_public() {
    let (_ctx, app) = test_app();
    let (status, body) = call(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_protected_routes_require_valid_token() {
    let (ctx, app) = test_app();
    seed_user(&ctx, "u1", "Alice").await;

    let (status, body) = call(&app, Method::GET, "/api/v1/messages/conversations", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "AUTH_ERROR");
    assert!(body["errorAr"].is_string());

    let forged = generate_token("u1", "not-the-server-secret", 30).unwrap();
    let (status, _) = get(&app, "/api/v1/messages/conversations", &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let orphan = generate_token("ghost", &ctx.config.auth.jwt_secret, 30).unwrap();
    let (status, body) = get(&app, "/api/v1/messages/conversations", &orphan).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn test_malformed_body_is_a_validation_error() {
    let (ctx, app) = test_app();
    let token = seed_user(&ctx, "u1", "Alice").await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/messages/send")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_registration_and_login_flow() {
    let (_ctx, app) = test_app();

    let registration = json!({
        "fullName": "Sara Ali",
        "nationalId": "1010101010",
        "email": "sara@example.com",
        "phone": "+966 50 123 4567",
        "password": "s3cret-pass",
    });
    let (status, body) = post(&app, "/api/v1/auth/register", None, registration.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let user_id = body["userId"].as_str().unwrap().to_string();

    let (status, body) = post(&app, "/api/v1/auth/register", None, registration).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already registered");
    assert_eq!(body["errorAr"], "البريد الإلكتروني مسجل مسبقاً");

    let login = json!({"email": "sara@example.com", "password": "s3cret-pass"});
    let (status, body) = post(&app, "/api/v1/auth/login", None, login.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Account not verified");

    let (status, _) = post(&app, "/api/v1/auth/send-otp", None, json!({"email": "sara@example.com"})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(&app, "/api/v1/auth/verify-otp", None, json!({"email": "sara@example.com", "otp": "000000"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, "/api/v1/auth/verify-otp", None, json!({"email": "sara@example.com", "otp": "123456"})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&app, "/api/v1/auth/login", None, login).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["accessToken"].as_str().unwrap().to_string();
    assert_eq!(body["user"]["id"], user_id.as_str());
    assert_eq!(body["user"]["accessToken"], token.as_str());
    assert!(body["user"].get("passwordHash").is_none());

    let (status, body) = post(&app, "/api/v1/auth/set-role", Some(&token), json!({"role": "seller"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "seller");

    let (status, body) = post(&app, "/api/v1/auth/check-user", None, json!({"email": "SARA@example.com"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exists"], true);

    let (_, body) = post(&app, "/api/v1/auth/profile", None, json!({"userId": user_id})).await;
    assert_eq!(body["user"]["name"], "Sara Ali");
    assert_eq!(body["user"]["phone"], "966501234567");

    let (status, body) = post(
        &app,
        "/api/v1/auth/update-profile",
        Some(&token),
        json!({"updates": {"fullName": "Sara A. Ali"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Sara A. Ali");
}

#[tokio::test]
async fn test_messaging_endpoints() {
    let (ctx, app) = test_app();
    let alice = seed_user(&ctx, "u1", "Alice").await;
    let bob = seed_user(&ctx, "u2", "Bob").await;

    let (_, body) = post(&app, "/api/v1/messages/conversation", Some(&bob), json!({"otherUserId": "u1"})).await;
    assert_eq!(body["exists"], false);

    let (status, body) = post(
        &app,
        "/api/v1/messages/send",
        Some(&alice),
        json!({"recipientId": "u2", "text": "Hello", "productId": "prod_1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["conversationId"], "u1_u2");
    assert_eq!(body["message"]["productId"], "prod_1");

    let (status, body) = post(&app, "/api/v1/messages/send", Some(&alice), json!({"recipientId": "u9", "text": "Hi"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, body) = get(&app, "/api/v1/messages/unread-count", &bob).await;
    assert_eq!(body["unreadCount"], 1);
    assert_eq!(body["count"], 1);
    assert_eq!(body["byConversation"]["u1_u2"], 1);

    let (_, body) = get(&app, "/api/v1/messages/conversations", &bob).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["conversations"][0]["unreadCount"], 1);
    assert_eq!(body["conversations"][0]["otherParticipant"]["name"], "Alice");

    let (_, body) = post(&app, "/api/v1/messages/search", Some(&bob), json!({"query": "hell"})).await;
    assert_eq!(body["total"], 1);

    let (_, body) = post(&app, "/api/v1/messages/mark-read", Some(&bob), json!({"conversationId": "u1_u2"})).await;
    assert_eq!(body["markedCount"], 1);
    assert_eq!(body["messageAr"], "تم تعليم 1 رسالة كمقروءة");

    let (_, body) = get(&app, "/api/v1/messages/unread-count", &bob).await;
    assert_eq!(body["unreadCount"], 0);
    assert_eq!(body["byConversation"], json!({}));

    let (status, _) = post(&app, "/api/v1/messages/delete-conversation", Some(&alice), json!({"conversationId": "u1_u2"})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, "/api/v1/messages/conversations", &alice).await;
    assert_eq!(body["total"], 0);
    let (_, body) = get(&app, "/api/v1/messages/conversations", &bob).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_notification_endpoints() {
    let (ctx, app) = test_app();
    let admin = seed_user(&ctx, "admin", "Souq").await;
    let buyer = seed_user(&ctx, "u1", "Alice").await;

    let notice = |kind: &str, title: &str| {
        json!({
            "userId": "u1",
            "type": kind,
            "title": title,
            "titleAr": "عنوان",
            "message": "body",
            "messageAr": "نص",
            "orderId": "order_1",
        })
    };

    let (status, body) = post(&app, "/api/v1/notifications/send", Some(&admin), notice("order_shipped", "Shipped")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notification"]["category"], "order");
    assert_eq!(body["notification"]["type"], "order_shipped");
    assert_eq!(body["notification"]["orderId"], "order_1");
    assert!(body["notification"].get("imageUrl").is_none());
    let first_id = body["notification"]["id"].as_str().unwrap().to_string();

    post(&app, "/api/v1/notifications/send", Some(&admin), notice("price_drop", "Cheaper")).await;

    let (_, body) = get(&app, "/api/v1/notifications/list?category=order&page=1&limit=10", &buyer).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["totalPages"], 1);
    assert_eq!(body["notifications"][0]["title"], "Shipped");

    let (status, body) = get(&app, "/api/v1/notifications/list?page=abc", &buyer).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, body) = get(&app, "/api/v1/notifications/unread-count", &buyer).await;
    assert_eq!(body["unreadCount"], 2);
    assert_eq!(body["byCategory"], json!({"order": 1, "message": 0, "social": 1, "system": 0}));

    let (_, body) = post(&app, "/api/v1/notifications/mark-read", Some(&buyer), json!({"notificationId": first_id})).await;
    assert_eq!(body["notification"]["read"], true);
    let (_, body) = post(&app, "/api/v1/notifications/mark-read", Some(&buyer), json!({"notificationId": first_id})).await;
    assert_eq!(body["message"], "Notification already marked as read");

    let (_, body) = post(
        &app,
        "/api/v1/notifications/update-preferences",
        Some(&buyer),
        json!({"preferences": {"price_drop": false}}),
    )
    .await;
    assert_eq!(body["preferences"], json!({"price_drop": false}));

    let (_, body) = get(&app, "/api/v1/notifications/preferences", &buyer).await;
    assert_eq!(body["preferences"]["price_drop"], false);

    let (_, body) = post(&app, "/api/v1/notifications/send", Some(&admin), notice("price_drop", "Even cheaper")).await;
    assert_eq!(body["skipped"], true);

    let (_, body) = post(&app, "/api/v1/notifications/mark-all-read", Some(&buyer), json!({})).await;
    assert_eq!(body["markedCount"], 1);

    let (status, body) = post(&app, "/api/v1/notifications/delete", Some(&buyer), json!({"notificationId": "missing"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = post(&app, "/api/v1/notifications/clear-all", Some(&buyer), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, "/api/v1/notifications/list", &buyer).await;
    assert_eq!(body["total"], 0);
    assert_eq!(body["page"], 1);
    assert_eq!(body["limit"], 20);
}
