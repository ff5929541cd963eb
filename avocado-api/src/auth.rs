use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    middleware,
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{HeaderMapExt, UserAgent};
use avocado_core::identity::backup_codes::{generate_backup_codes, hash_backup_code};
use avocado_core::identity::token::{generate_opaque_token, hash_token};
use avocado_core::identity::{totp, PasswordHasher};
use avocado_core::notify::{password_reset_email, reset_link, two_factor_enabled_email};
use avocado_core::user::{NewSession, NewUser, User};
use avocado_core::validators::validate_password_strength;
use avocado_shared::pii::{mask_email, Masked};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

use crate::error::{AppError, Violations};
use crate::extract::AppJson;
use crate::middleware::auth::{clear_session_cookie, issue_token, session_cookie};
use crate::middleware::{rate_limit_middleware, require_auth, AuthUser};
use crate::state::AppState;

const GENERIC_RESET_MESSAGE: &str = "If an account exists, a password reset email will be sent";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(email(message = "Please include a valid email"))]
    pub email: String,
    pub password: Masked<String>,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    pub password: Masked<String>,
    pub totp_code: Option<Masked<String>>,
    pub backup_code: Option<Masked<String>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct VerifyTwoFactorRequest {
    #[validate(length(equal = 6, message = "Token must be 6 digits"))]
    pub token: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Please include a valid email"))]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub token: Masked<String>,
    pub password: Masked<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorSetupResponse {
    pub secret: String,
    pub otpauth_url: String,
    pub qr_code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorEnabledResponse {
    pub message: String,
    pub backup_codes: Vec<String>,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login));

    let limited = Router::new()
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit_middleware));

    let protected = Router::new()
        .route("/auth/logout", post(logout))
        .route("/auth/2fa/enable", post(enable_two_factor))
        .route("/auth/2fa/verify", post(verify_two_factor))
        .route("/auth/2fa/disable", post(disable_two_factor))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    public.merge(limited).merge(protected)
}

// ============================================================================
// Handlers
// ============================================================================

async fn start_session(
    state: &AppState,
    user: &User,
    addr: SocketAddr,
    headers: &HeaderMap,
) -> Result<String, AppError> {
    let token = issue_token(&state.auth, user)?;
    state
        .sessions
        .create_session(NewSession {
            user_id: user.id,
            token_hash: hash_token(&token),
            ip_address: Some(addr.ip().to_string()),
            user_agent: headers.typed_get::<UserAgent>().map(|ua| ua.as_str().to_string()),
            expires_at: Utc::now() + Duration::seconds(state.auth.expiration as i64),
        })
        .await?;
    Ok(token)
}

async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), AppError> {
    let mut violations = Violations::from_validation(req.validate());
    violations.check(!req.password.expose().is_empty(), "password", "Password is required");
    violations.into_result()?;

    if state.users.find_by_username(&req.username).await?.is_some() {
        return Err(AppError::ConflictError("Username already exists".into()));
    }
    if state.users.find_by_email(&req.email).await?.is_some() {
        return Err(AppError::ConflictError("Email already exists".into()));
    }

    let password_hash = PasswordHasher::hash(req.password.expose())?;
    let user = state
        .users
        .create_user(NewUser {
            username: req.username,
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;

    let token = start_session(&state, &user, addr, &headers).await?;
    tracing::info!(user_id = %user.id, email = %mask_email(&user.email), "User registered");

    let jar = jar.add(session_cookie(&state.auth, token.clone()));
    Ok((StatusCode::CREATED, jar, Json(AuthResponse { token, user })))
}

async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    jar: CookieJar,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let mut violations = Violations::from_validation(req.validate());
    violations.check(!req.password.expose().is_empty(), "password", "Password is required");
    violations.into_result()?;

    let invalid = || AppError::AuthenticationError("Invalid credentials".into());

    let user = state.users.find_by_username(&req.username).await?.ok_or_else(invalid)?;
    if !PasswordHasher::verify(req.password.expose(), &user.password_hash)? {
        tracing::info!(username = %user.username, "Login rejected: wrong password");
        return Err(invalid());
    }

    if let Some(two_factor) = state.two_factor.get(user.id).await?.filter(|t| t.is_enabled) {
        let passed = match (&req.totp_code, &req.backup_code) {
            (Some(code), _) => totp::verify_totp(&two_factor.secret, code.expose())?,
            (None, Some(code)) => {
                state
                    .two_factor
                    .consume_backup_code(user.id, &hash_backup_code(code.expose()))
                    .await?
            }
            (None, None) => return Err(AppError::TwoFactorRequired),
        };
        if !passed {
            tracing::info!(username = %user.username, "Login rejected: bad second factor");
            return Err(AppError::AuthenticationError("Invalid two-factor code".into()));
        }
    }

    let token = start_session(&state, &user, addr, &headers).await?;
    tracing::info!(user_id = %user.id, ip = %addr.ip(), "User logged in");

    let jar = jar.add(session_cookie(&state.auth, token.clone()));
    Ok((jar, Json(AuthResponse { token, user })))
}

async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), AppError> {
    state.sessions.invalidate(&user.token_hash).await?;
    tracing::info!(user_id = %user.user_id, "User logged out");
    Ok((clear_session_cookie(jar), Json(json!({ "message": "Logged out successfully" }))))
}

async fn enable_two_factor(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TwoFactorSetupResponse>, AppError> {
    if state.two_factor.get(user.user_id).await?.is_some_and(|t| t.is_enabled) {
        return Err(AppError::ConflictError("2FA is already enabled".into()));
    }

    let account = state
        .users
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("User not found".into()))?;

    let secret = totp::generate_secret();
    state.two_factor.upsert_pending(user.user_id, &secret).await?;

    let otpauth_url = totp::totp_uri(&secret, &account.email, &state.auth.totp_issuer);
    let qr_code = totp::qr_code_data_url(&otpauth_url)?;

    Ok(Json(TwoFactorSetupResponse {
        secret,
        otpauth_url,
        qr_code,
        message: "Scan the QR code with your authenticator app and verify with a token".into(),
    }))
}

async fn verify_two_factor(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(req): AppJson<VerifyTwoFactorRequest>,
) -> Result<Json<TwoFactorEnabledResponse>, AppError> {
    req.validate()?;

    let pending = state
        .two_factor
        .get(user.user_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("2FA setup has not been started".into()))?;
    if pending.is_enabled {
        return Err(AppError::ConflictError("2FA is already enabled".into()));
    }

    if !totp::verify_totp(&pending.secret, &req.token)? {
        return Err(AppError::BadRequest("Invalid token".into()));
    }

    let backup_codes = generate_backup_codes();
    let hashes: Vec<String> = backup_codes.iter().map(|c| hash_backup_code(c)).collect();
    state.two_factor.enable(user.user_id, &hashes).await?;
    tracing::info!(user_id = %user.user_id, "2FA enabled");

    if let Some(account) = state.users.find_by_id(user.user_id).await? {
        if let Err(e) = state.mailer.send(two_factor_enabled_email(&account.email)).await {
            tracing::error!(user_id = %user.user_id, "Failed to send 2FA notification: {}", e);
        }
    }

    Ok(Json(TwoFactorEnabledResponse {
        message: "2FA enabled successfully".into(),
        backup_codes,
    }))
}

async fn disable_two_factor(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    state.two_factor.delete(user.user_id).await?;
    tracing::info!(user_id = %user.user_id, "2FA disabled");
    Ok(Json(json!({ "message": "2FA disabled successfully" })))
}

async fn forgot_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    req.validate()?;

    let Some(user) = state.users.find_by_email(&req.email).await? else {
        tracing::info!(email = %mask_email(&req.email), "Password reset requested for unknown email");
        return Ok(Json(json!({ "message": GENERIC_RESET_MESSAGE })));
    };

    let token = generate_opaque_token();
    let expires_at = Utc::now() + Duration::seconds(state.auth.reset_token_seconds as i64);
    state
        .password_resets
        .create_reset_token(user.id, &hash_token(&token), expires_at)
        .await?;

    let link = reset_link(&state.frontend_url, &token);
    if let Err(e) = state.mailer.send(password_reset_email(&user.email, &link)).await {
        tracing::error!(user_id = %user.id, "Failed to send password reset email: {}", e);
    }

    Ok(Json(json!({ "message": GENERIC_RESET_MESSAGE })))
}

async fn reset_password(
    State(state): State<AppState>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let mut violations = Violations::default();
    violations.check(!req.token.expose().is_empty(), "token", "Token is required");
    if let Err(rule) = validate_password_strength(req.password.expose()) {
        violations.check(false, "password", rule);
    }
    violations.into_result()?;

    let password_hash = PasswordHasher::hash(req.password.expose())?;
    let user_id = state
        .password_resets
        .consume_reset_token(&hash_token(req.token.expose()), &password_hash)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired token".into()))?;

    tracing::info!(%user_id, "Password reset; all sessions revoked");
    Ok(Json(json!({ "message": "Password reset successful" })))
}
