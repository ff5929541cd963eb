use async_trait::async_trait;
use avocado_core::repository::RateLimitRepository;
use avocado_core::CoreResult;
use sqlx::PgPool;

use crate::error::db_err;

/// Fixed-window counters kept in `rate_limits`, shared by every replica.
pub struct StoreRateLimitRepository {
    pool: PgPool,
}

impl StoreRateLimitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RateLimitRepository for StoreRateLimitRepository {
    async fn consume(&self, key: &str, points: i32, window_seconds: u64) -> CoreResult<bool> {
        let used: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO rate_limits (key, points, expires_at)
            VALUES ($1, 1, NOW() + make_interval(secs => $2))
            ON CONFLICT (key) DO UPDATE SET
                points = CASE WHEN rate_limits.expires_at <= NOW() THEN 1
                              ELSE rate_limits.points + 1 END,
                expires_at = CASE WHEN rate_limits.expires_at <= NOW() THEN EXCLUDED.expires_at
                                  ELSE rate_limits.expires_at END
            RETURNING points
            "#,
        )
        .bind(key)
        .bind(window_seconds as f64)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(used <= points)
    }
}
