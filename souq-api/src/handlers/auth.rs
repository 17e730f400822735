use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use souq_core::{AppError, ProfileUpdate, RegisterUser, SouqContext, User, UserProfile, UserRole};

use crate::auth::{generate_token, AuthenticatedUser};
use crate::error::ApiResult;

#[derive(Deserialize)]
pub struct EmailRequest {
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub email: Option<String>,
    pub otp: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct SetRoleRequest {
    pub role: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub updates: Option<ProfileUpdate>,
}

fn require_email(email: Option<String>) -> Result<String, AppError> {
    email
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::validation("Email address required", "البريد الإلكتروني مطلوب"))
}

/// Profile plus a fresh access token, as returned by login and role selection.
fn session(ctx: &SouqContext, user: &User) -> ApiResult<Json<Value>> {
    let access_token = generate_token(&user.id, &ctx.config.auth.jwt_secret, ctx.config.auth.token_ttl_days)?;

    let mut profile = serde_json::to_value(UserProfile::from(user)).map_err(AppError::from)?;
    profile["accessToken"] = json!(access_token);

    Ok(Json(json!({
        "success": true,
        "user": profile,
        "accessToken": access_token,
    })))
}

pub async fn register(
    Extension(ctx): Extension<SouqContext>,
    payload: Result<Json<RegisterUser>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = payload?;
    let user = ctx.users().register(input).await?;

    Ok(Json(json!({
        "success": true,
        "userId": user.id,
    })))
}

/// There is no delivery channel: the configured development code is always the valid one.
pub async fn send_otp(payload: Result<Json<EmailRequest>, JsonRejection>) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let email = require_email(body.email)?;

    tracing::info!("OTP issued for {}", email);

    Ok(Json(json!({ "success": true })))
}

pub async fn verify_otp(
    Extension(ctx): Extension<SouqContext>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let email = body.email.unwrap_or_default();
    let otp = body.otp.unwrap_or_default();

    ctx.users()
        .verify_email(&email, &otp, &ctx.config.auth.otp_code)
        .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn check_user(
    Extension(ctx): Extension<SouqContext>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let email = require_email(body.email)?;

    match ctx.users().find_by_email(&email).await? {
        Some(user) => Ok(Json(json!({
            "success": true,
            "exists": true,
            "userId": user.id,
        }))),
        None => Ok(Json(json!({
            "success": true,
            "exists": false,
            "error": "No account found with this email address",
            "errorAr": "لا يوجد حساب مرتبط بهذا البريد الإلكتروني",
        }))),
    }
}

pub async fn login(
    Extension(ctx): Extension<SouqContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let user = ctx
        .users()
        .authenticate(&body.email.unwrap_or_default(), &body.password.unwrap_or_default())
        .await?;

    tracing::info!("User logged in: {}", user.email);

    session(&ctx, &user)
}

pub async fn set_role(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<SetRoleRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let role = match body.role.as_deref().map(str::trim) {
        Some("buyer") => UserRole::Buyer,
        Some("seller") => UserRole::Seller,
        Some("both") => UserRole::Both,
        Some(_) => return Err(AppError::validation("Invalid role", "الدور غير صالح").into()),
        None => return Err(AppError::validation("Role required", "الدور مطلوب").into()),
    };

    let user = ctx.users().set_role(&auth.user.id, role).await?;

    session(&ctx, &user)
}

pub async fn get_profile(
    Extension(ctx): Extension<SouqContext>,
    payload: Result<Json<ProfileRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let user_id = body
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::validation("User ID required", "معرف المستخدم مطلوب"))?;

    let user = ctx.users().require(user_id.trim()).await?;

    Ok(Json(json!({
        "success": true,
        "user": UserProfile::from(&user),
    })))
}

pub async fn update_profile(
    Extension(ctx): Extension<SouqContext>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let updates = body
        .updates
        .ok_or_else(|| AppError::validation("Updates required", "التحديثات مطلوبة"))?;

    let user = ctx.users().update_profile(&auth.user.id, updates).await?;

    Ok(Json(json!({
        "success": true,
        "user": UserProfile::from(&user),
    })))
}
