use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use souq_core::{AppError, AppResult, SouqContext, User};

use crate::error::ApiError;

/// Routes reachable without a bearer token.
const PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/api/v1/auth/register",
    "/api/v1/auth/send-otp",
    "/api/v1/auth/verify-otp",
    "/api/v1/auth/check-user",
    "/api/v1/auth/login",
    "/api/v1/auth/profile",
];

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// The caller, resolved from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
}

fn invalid_token() -> AppError {
    AppError::auth("Invalid or expired token", "رمز الدخول غير صالح أو منتهي الصلاحية")
}

/// Extract JWT token from Authorization header
fn extract_token(auth_header: Option<&str>) -> Option<&str> {
    auth_header?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Signed HS256 token for `user_id`.
pub fn generate_token(user_id: &str, secret: &str, expires_in_days: u64) -> AppResult<String> {
    let now = Utc::now();
    let exp = i64::try_from(expires_in_days)
        .ok()
        .and_then(Duration::try_days)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| AppError::internal(format!("Token lifetime of {} days is out of range", expires_in_days)))?;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };

    let encoding_key = EncodingKey::from_secret(secret.as_ref());

    encode(&Header::default(), &claims, &encoding_key)
        .map_err(|e| AppError::internal(format!("Failed to generate JWT token: {}", e)))
}

/// Check signature and expiry, returning the user id.
pub fn verify_token(token: &str, secret: &str) -> AppResult<String> {
    let decoding_key = DecodingKey::from_secret(secret.as_ref());
    let validation = Validation::default();

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(token_data) => Ok(token_data.claims.sub),
        Err(e) => {
            tracing::debug!("JWT verification failed: {}", e);
            Err(invalid_token())
        }
    }
}

/// Axum middleware for JWT authentication
pub async fn auth_middleware(mut req: Request, next: Next) -> Result<Response, ApiError> {
    if PUBLIC_PATHS.contains(&req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let Some(token) = extract_token(auth_header) else {
        tracing::debug!("Missing Authorization header");
        return Err(AppError::auth("Unauthorized", "غير مصرح").into());
    };

    let ctx = req
        .extensions()
        .get::<SouqContext>()
        .cloned()
        .ok_or_else(|| AppError::internal("context missing from request extensions"))?;

    let user_id = verify_token(token, &ctx.config.auth.jwt_secret)?;

    let user = ctx
        .users()
        .get(&user_id)
        .await?
        .ok_or_else(|| AppError::auth("User not found", "المستخدم غير موجود"))?;

    tracing::debug!("Authenticated user: {}", user.id);

    req.extensions_mut().insert(AuthenticatedUser { user });

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let token = generate_token("user_1", "secret", 30).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(verify_token(&token, "secret").unwrap(), "user_1");
    }

    #[test]
    fn test_token_with_other_secret_is_rejected() {
        let token = generate_token("user_1", "secret", 30).unwrap();
        let err = verify_token(&token, "another-secret").unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let claims = Claims {
            sub: "user_1".to_string(),
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap();
        assert!(verify_token(&token, "secret").is_err());
    }

    #[test]
    fn test_oversized_lifetime_is_an_error() {
        let err = generate_token("user_1", "secret", u64::MAX).unwrap_err();
        assert_eq!(err.status_code(), 500);

        let err = generate_token("user_1", "secret", 1 << 50).unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract_token(Some("Basic abc")), None);
        assert_eq!(extract_token(Some("Bearer ")), None);
        assert_eq!(extract_token(None), None);
    }
}
