pub mod auth;
pub mod messages;
pub mod notifications;

use axum::response::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "souq-api"
    }))
}
