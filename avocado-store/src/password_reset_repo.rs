use async_trait::async_trait;
use avocado_core::repository::PasswordResetRepository;
use avocado_core::CoreResult;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{db_err, StoreResult};

pub struct StorePasswordResetRepository {
    pool: PgPool,
}

impl StorePasswordResetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn consume(&self, token_hash: &str, new_password_hash: &str) -> StoreResult<Option<Uuid>> {
        let mut tx = self.pool.begin().await?;

        // Claiming the token is the lock: a concurrent reset with the same
        // token finds is_used already set.
        let user_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE password_reset_tokens
            SET is_used = TRUE
            WHERE token_hash = $1 AND NOT is_used AND expires_at > NOW()
            RETURNING user_id
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = user_id else {
            return Ok(None);
        };

        sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
            .bind(new_password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE user_sessions SET is_valid = FALSE WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(user_id))
    }
}

#[async_trait]
impl PasswordResetRepository for StorePasswordResetRepository {
    async fn create_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
    ) -> CoreResult<Option<Uuid>> {
        Ok(self.consume(token_hash, new_password_hash).await?)
    }
}
