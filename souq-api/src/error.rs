use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use souq_core::AppError;

pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP face of [`AppError`].
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        ApiError(AppError::validation("Invalid request body", "نص الطلب غير صالح"))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!("Rejected query string: {}", rejection.body_text());
        ApiError(AppError::validation("Invalid query parameters", "معاملات الاستعلام غير صالحة"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = err.error_code();

        if err.is_server_error() {
            tracing::error!(error = %err, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %err, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "success": false,
            "error": err.public_message(),
            "errorAr": err.public_message_ar(),
            "code": code,
        }));

        (status, body).into_response()
    }
}
