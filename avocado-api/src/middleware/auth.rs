use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use avocado_core::identity::token::hash_token;
use avocado_core::user::User;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

pub const SESSION_COOKIE: &str = "avocado_session";

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    /// Unique per issue so two logins in the same second get distinct
    /// session hashes.
    pub jti: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// The caller, as established by `require_auth`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub token_hash: String,
}

pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, AppError> {
    let now = Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        jti: Uuid::new_v4(),
        iat: now,
        exp: now + auth.expiration as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

pub fn decode_token(auth: &AuthConfig, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("Token verification failed: {}", e);
        AppError::AuthenticationError("Token is not valid".into())
    })
}

pub fn session_cookie(auth: &AuthConfig, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .secure(auth.cookie_secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(auth.expiration as i64))
        .build()
}

pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

/// Bearer header first, then the session cookie.
fn bearer_or_cookie(req: &Request) -> Option<String> {
    if let Some(auth) = req.headers().typed_get::<Authorization<Bearer>>() {
        return Some(auth.token().to_string());
    }
    CookieJar::from_headers(req.headers())
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Authentication Middleware
// ============================================================================

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_or_cookie(&req)
        .ok_or_else(|| AppError::AuthenticationError("No token, authorization denied".into()))?;

    let claims = decode_token(&state.auth, &token)?;

    let token_hash = hash_token(&token);
    let session = state
        .sessions
        .find_active(&token_hash)
        .await?
        .filter(|s| s.user_id == claims.sub)
        .ok_or_else(|| AppError::AuthenticationError("Session expired or invalid".into()))?;

    if let Err(e) = state.sessions.touch(session.id).await {
        tracing::warn!(session_id = %session.id, "Failed to update session last_used_at: {}", e);
    }

    req.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        username: claims.username,
        token_hash,
    });

    Ok(next.run(req).await)
}
