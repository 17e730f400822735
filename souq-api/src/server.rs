use anyhow::{Context as _, Result};
use axum::{
    extract::Extension,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use souq_core::SouqContext;
use std::env;
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::handlers::{self, auth as auth_handlers, messages, notifications};

/// CORS from `CORS_ORIGINS` (comma separated), permissive when unset.
fn cors_layer() -> CorsLayer {
    match env::var("CORS_ORIGINS") {
        Ok(origins) => {
            let origin_list: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| origin.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origin_list))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
                .allow_credentials(true)
        }
        Err(_) => {
            tracing::warn!("CORS_ORIGINS not set, using permissive CORS. Set CORS_ORIGINS for production!");
            CorsLayer::permissive()
        }
    }
}

pub fn router(ctx: SouqContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Auth
        .route("/api/v1/auth/register", post(auth_handlers::register))
        .route("/api/v1/auth/send-otp", post(auth_handlers::send_otp))
        .route("/api/v1/auth/verify-otp", post(auth_handlers::verify_otp))
        .route("/api/v1/auth/check-user", post(auth_handlers::check_user))
        .route("/api/v1/auth/login", post(auth_handlers::login))
        .route("/api/v1/auth/set-role", post(auth_handlers::set_role))
        .route("/api/v1/auth/profile", post(auth_handlers::get_profile))
        .route("/api/v1/auth/update-profile", post(auth_handlers::update_profile))
        // Messaging
        .route("/api/v1/messages/send", post(messages::send_message))
        .route("/api/v1/messages/conversation", post(messages::get_conversation))
        .route("/api/v1/messages/conversations", get(messages::get_conversations))
        .route("/api/v1/messages/mark-read", post(messages::mark_read))
        .route("/api/v1/messages/unread-count", get(messages::unread_count))
        .route("/api/v1/messages/delete-conversation", post(messages::delete_conversation))
        .route("/api/v1/messages/search", post(messages::search))
        // Notifications
        .route("/api/v1/notifications/send", post(notifications::send))
        .route("/api/v1/notifications/list", get(notifications::list))
        .route("/api/v1/notifications/mark-read", post(notifications::mark_read))
        .route("/api/v1/notifications/mark-all-read", post(notifications::mark_all_read))
        .route("/api/v1/notifications/delete", post(notifications::delete))
        .route("/api/v1/notifications/clear-all", post(notifications::clear_all))
        .route("/api/v1/notifications/unread-count", get(notifications::unread_count))
        .route("/api/v1/notifications/preferences", get(notifications::get_preferences))
        .route("/api/v1/notifications/update-preferences", post(notifications::update_preferences))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer())
                .layer(Extension(ctx))
                .layer(middleware::from_fn(auth::auth_middleware)),
        )
}

pub async fn run(ctx: SouqContext) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", ctx.config.server.host, ctx.config.server.api_port)
        .parse()
        .context("Invalid SERVER_HOST / API_PORT")?;

    let app = router(ctx);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
