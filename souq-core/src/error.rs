use thiserror::Error;

use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "Internal server error";
const INTERNAL_MESSAGE_AR: &str = "حدث خطأ داخلي في الخادم";

/// Failure taxonomy shared by every handler. Client-facing variants carry an
/// English and an Arabic message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { message: String, message_ar: String },

    #[error("{message}")]
    Auth { message: String, message_ar: String },

    #[error("{message}")]
    Forbidden { message: String, message_ar: String },

    #[error("{message}")]
    NotFound { message: String, message_ar: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, message_ar: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            message_ar: message_ar.into(),
        }
    }

    pub fn auth(message: impl Into<String>, message_ar: impl Into<String>) -> Self {
        AppError::Auth {
            message: message.into(),
            message_ar: message_ar.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>, message_ar: impl Into<String>) -> Self {
        AppError::Forbidden {
            message: message.into(),
            message_ar: message_ar.into(),
        }
    }

    pub fn not_found(message: impl Into<String>, message_ar: impl Into<String>) -> Self {
        AppError::NotFound {
            message: message.into(),
            message_ar: message_ar.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal(message.into())
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::Auth { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Store(_) | AppError::Internal(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::Auth { .. } => "AUTH_ERROR",
            AppError::Forbidden { .. } => "FORBIDDEN",
            AppError::NotFound { .. } => "NOT_FOUND",
            AppError::Store(_) => "STORE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// English message safe to show to the caller. Server errors are not echoed.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::NotFound { message, .. } => message.clone(),
            AppError::Store(_) | AppError::Internal(_) => INTERNAL_MESSAGE.to_string(),
        }
    }

    pub fn public_message_ar(&self) -> String {
        match self {
            AppError::Validation { message_ar, .. }
            | AppError::Auth { message_ar, .. }
            | AppError::Forbidden { message_ar, .. }
            | AppError::NotFound { message_ar, .. } => message_ar.clone(),
            AppError::Store(_) | AppError::Internal(_) => INTERNAL_MESSAGE_AR.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Store(StoreError::Serialization(err))
    }
}
