use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::state::AppState;

/// Per-IP fixed window shared by every route behind this layer. Counters
/// live in the database so every replica sees the same budget.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("ratelimit:{}", addr.ip());

    match state
        .rate_limits
        .consume(&key, state.rate_limit.points, state.rate_limit.window_seconds)
        .await
    {
        Ok(true) => Ok(next.run(req).await),
        Ok(false) => {
            tracing::warn!(ip = %addr.ip(), path = %req.uri().path(), "Rate limit exceeded");
            Err(AppError::RateLimited)
        }
        Err(e) => {
            // Fail open
            tracing::error!("Rate limiter unavailable: {}", e);
            Ok(next.run(req).await)
        }
    }
}
