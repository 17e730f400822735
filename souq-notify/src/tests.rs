use chrono::Utc;
use serde_json::json;

use souq_core::store::{get_json, set_json};
use souq_core::types::User;
use souq_core::{keys, Config, SouqContext};

use crate::model::{
    ListNotifications, MarkOutcome, Notification, NotificationCategory, NotificationType, SendNotificationInput,
    SendOutcome, MAX_FEED,
};
use crate::service::NotificationService;

async fn setup() -> (SouqContext, NotificationService) {
    let ctx = SouqContext::in_memory(Config::default());
    let user = User {
        id: "u1".to_string(),
        full_name: "Sara Ali".to_string(),
        national_id: "1010".to_string(),
        email: "sara@example.com".to_string(),
        phone: "966500000000".to_string(),
        password_hash: String::new(),
        verified: true,
        role: None,
        rating: 0.0,
        review_count: 0,
        created_at: Utc::now(),
        avatar_url: None,
    };
    set_json(ctx.store.as_ref(), &keys::user("u1"), &user).await.unwrap();
    (ctx.clone(), NotificationService::new(ctx))
}

fn input(kind: &str, title: &str) -> SendNotificationInput {
    SendNotificationInput {
        user_id: Some("u1".to_string()),
        kind: Some(kind.to_string()),
        title: Some(title.to_string()),
        title_ar: Some("عنوان".to_string()),
        message: Some("body".to_string()),
        message_ar: Some("نص".to_string()),
        ..Default::default()
    }
}

async fn deliver(notify: &NotificationService, kind: &str, title: &str) -> Notification {
    match notify.send_notification(input(kind, title)).await.unwrap() {
        SendOutcome::Delivered(notification) => notification,
        SendOutcome::Skipped => panic!("notification unexpectedly skipped"),
    }
}

async fn feed_len(ctx: &SouqContext) -> usize {
    get_json::<Vec<Notification>>(ctx.store.as_ref(), &keys::user_notifications("u1"))
        .await
        .unwrap()
        .map(|feed| feed.len())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_send_derives_category_and_prepends() {
    let (_ctx, notify) = setup().await;

    let first = deliver(&notify, "order_shipped", "Shipped").await;
    assert_eq!(first.category, NotificationCategory::Order);
    assert!(!first.read);

    let second = deliver(&notify, "review_received", "Review").await;
    assert_eq!(second.category, NotificationCategory::Social);

    let mut explicit = input("announcement", "Sale");
    explicit.category = Some("social".to_string());
    let SendOutcome::Delivered(third) = notify.send_notification(explicit).await.unwrap() else {
        panic!("expected delivery");
    };
    assert_eq!(third.category, NotificationCategory::Social);

    let page = notify.get_notifications("u1", ListNotifications::default()).await.unwrap();
    let titles: Vec<&str> = page.notifications.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["Sale", "Review", "Shipped"]);
}

#[tokio::test]
async fn test_send_validates_input() {
    let (_ctx, notify) = setup().await;

    let mut missing = input("announcement", "Hi");
    missing.message_ar = None;
    assert_eq!(notify.send_notification(missing).await.unwrap_err().status_code(), 400);

    let unknown_type = notify.send_notification(input("order_lost", "Hi")).await.unwrap_err();
    assert_eq!(unknown_type.public_message(), "Unknown notification type");

    let mut unknown_user = input("announcement", "Hi");
    unknown_user.user_id = Some("ghost".to_string());
    assert_eq!(notify.send_notification(unknown_user).await.unwrap_err().status_code(), 400);
}

#[tokio::test]
async fn test_disabled_type_is_skipped() {
    let (ctx, notify) = setup().await;
    deliver(&notify, "price_drop", "Before").await;

    notify
        .update_preferences("u1", Some(json!({"price_drop": false})))
        .await
        .unwrap();

    let outcome = notify.send_notification(input("price_drop", "After")).await.unwrap();
    assert_eq!(outcome, SendOutcome::Skipped);
    assert_eq!(feed_len(&ctx).await, 1);

    // Types missing from the stored map stay enabled
    deliver(&notify, "announcement", "Still delivered").await;
    assert_eq!(feed_len(&ctx).await, 2);
}

#[tokio::test]
async fn test_feed_is_capped() {
    let (_ctx, notify) = setup().await;

    for i in 1..=101 {
        deliver(&notify, "announcement", &format!("n{}", i)).await;
    }

    let page = notify
        .get_notifications("u1", ListNotifications { limit: Some(100), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(page.total, MAX_FEED);
    assert_eq!(page.notifications.len(), 100);
    assert_eq!(page.notifications[0].title, "n101");
    assert!(page.notifications.iter().all(|n| n.title != "n1"));
    assert_eq!(page.notifications[99].title, "n2");
}

#[tokio::test]
async fn test_listing_filters_and_paginates() {
    let (_ctx, notify) = setup().await;

    for i in 0..5 {
        deliver(&notify, "order_created", &format!("order {}", i)).await;
    }
    let chat = deliver(&notify, "message_received", "chat").await;
    notify.mark_as_read("u1", Some(chat.id.clone())).await.unwrap();

    let orders = notify
        .get_notifications(
            "u1",
            ListNotifications {
                page: Some(2),
                limit: Some(2),
                category: Some("order".to_string()),
                unread_only: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(orders.total, 5);
    assert_eq!(orders.total_pages, 3);
    assert_eq!(orders.unread_count, 5);
    assert_eq!(orders.page, 2);
    let titles: Vec<&str> = orders.notifications.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["order 2", "order 1"]);

    let unread_only = notify
        .get_notifications("u1", ListNotifications { unread_only: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(unread_only.total, 5);

    let all = notify
        .get_notifications(
            "u1",
            ListNotifications { category: Some("all".to_string()), page: Some(0), limit: Some(500), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(all.total, 6);
    assert_eq!(all.unread_count, 5);
    assert_eq!(all.page, 1);
    assert_eq!(all.limit, 100);

    let bad = notify
        .get_notifications("u1", ListNotifications { category: Some("spam".to_string()), ..Default::default() })
        .await
        .unwrap_err();
    assert_eq!(bad.status_code(), 400);

    let past_end = notify
        .get_notifications("u1", ListNotifications { page: Some(9), ..Default::default() })
        .await
        .unwrap();
    assert!(past_end.notifications.is_empty());
    assert_eq!(past_end.total_pages, 1);
}

#[tokio::test]
async fn test_mark_read_delete_and_clear() {
    let (ctx, notify) = setup().await;
    let a = deliver(&notify, "order_created", "a").await;
    let b = deliver(&notify, "review_received", "b").await;
    deliver(&notify, "announcement", "c").await;

    match notify.mark_as_read("u1", Some(a.id.clone())).await.unwrap() {
        MarkOutcome::Marked(n) => assert!(n.read),
        MarkOutcome::AlreadyRead => panic!("first mark should flip the flag"),
    }
    assert_eq!(notify.mark_as_read("u1", Some(a.id.clone())).await.unwrap(), MarkOutcome::AlreadyRead);
    assert_eq!(notify.mark_as_read("u1", Some("nope".into())).await.unwrap_err().status_code(), 404);

    let unread = notify.get_unread_count("u1").await.unwrap();
    assert_eq!(unread.unread_count, 2);
    assert_eq!(unread.by_category.order, 0);
    assert_eq!(unread.by_category.social, 1);
    assert_eq!(unread.by_category.system, 1);
    assert_eq!(unread.by_category.message, 0);

    assert_eq!(notify.mark_all_as_read("u1").await.unwrap(), 2);
    assert_eq!(notify.mark_all_as_read("u1").await.unwrap(), 0);

    notify.delete_notification("u1", Some(b.id.clone())).await.unwrap();
    assert_eq!(notify.delete_notification("u1", Some(b.id)).await.unwrap_err().status_code(), 404);
    assert_eq!(feed_len(&ctx).await, 2);

    notify.clear_all("u1").await.unwrap();
    assert_eq!(feed_len(&ctx).await, 0);

    let json = serde_json::to_value(notify.get_unread_count("u1").await.unwrap()).unwrap();
    assert_eq!(json, json!({"unreadCount": 0, "byCategory": {"order": 0, "message": 0, "social": 0, "system": 0}}));
}

#[tokio::test]
async fn test_preferences_replace_wholesale() {
    let (_ctx, notify) = setup().await;

    let defaults = notify.get_preferences("u1").await.unwrap();
    assert_eq!(defaults.len(), 13);
    assert!(defaults.values().all(|enabled| *enabled));

    notify
        .update_preferences("u1", Some(json!({"price_drop": false, "announcement": false})))
        .await
        .unwrap();
    let stored = notify
        .update_preferences("u1", Some(json!({"order_created": false})))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);

    let prefs = notify.get_preferences("u1").await.unwrap();
    assert_eq!(prefs.get(&NotificationType::OrderCreated), Some(&false));
    assert_eq!(prefs.get(&NotificationType::PriceDrop), None);

    assert_eq!(notify.update_preferences("u1", None).await.unwrap_err().status_code(), 400);
    assert_eq!(
        notify.update_preferences("u1", Some(json!(["price_drop"]))).await.unwrap_err().status_code(),
        400
    );
    assert_eq!(
        notify.update_preferences("u1", Some(json!({"not_a_type": true}))).await.unwrap_err().status_code(),
        400
    );
}
