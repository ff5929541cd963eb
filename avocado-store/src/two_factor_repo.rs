use async_trait::async_trait;
use avocado_core::repository::TwoFactorRepository;
use avocado_core::user::TwoFactorAuth;
use avocado_core::CoreResult;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::db_err;

pub struct StoreTwoFactorRepository {
    pool: PgPool,
}

impl StoreTwoFactorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TwoFactorRow {
    user_id: Uuid,
    secret: String,
    backup_codes: Vec<String>,
    is_enabled: bool,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl TwoFactorRepository for StoreTwoFactorRepository {
    async fn get(&self, user_id: Uuid) -> CoreResult<Option<TwoFactorAuth>> {
        let row: Option<TwoFactorRow> = sqlx::query_as(
            "SELECT user_id, secret, backup_codes, is_enabled, created_at FROM two_factor_auth WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|r| TwoFactorAuth {
            user_id: r.user_id,
            secret: r.secret,
            backup_codes: r.backup_codes,
            is_enabled: r.is_enabled,
            created_at: r.created_at,
        }))
    }

    async fn upsert_pending(&self, user_id: Uuid, secret: &str) -> CoreResult<()> {
        // Never overwrites an enabled enrolment.
        sqlx::query(
            r#"
            INSERT INTO two_factor_auth (user_id, secret, backup_codes, is_enabled)
            VALUES ($1, $2, '{}', FALSE)
            ON CONFLICT (user_id) DO UPDATE
            SET secret = EXCLUDED.secret, backup_codes = '{}', created_at = NOW()
            WHERE NOT two_factor_auth.is_enabled
            "#,
        )
        .bind(user_id)
        .bind(secret)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn enable(&self, user_id: Uuid, backup_code_hashes: &[String]) -> CoreResult<()> {
        sqlx::query(
            "UPDATE two_factor_auth SET is_enabled = TRUE, backup_codes = $2 WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(backup_code_hashes)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> CoreResult<()> {
        sqlx::query("DELETE FROM two_factor_auth WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn consume_backup_code(&self, user_id: Uuid, code_hash: &str) -> CoreResult<bool> {
        // Single statement, so two requests racing on one code cannot both
        // see it present.
        let result = sqlx::query(
            r#"
            UPDATE two_factor_auth
            SET backup_codes = array_remove(backup_codes, $2)
            WHERE user_id = $1 AND is_enabled AND $2 = ANY(backup_codes)
            "#,
        )
        .bind(user_id)
        .bind(code_hash)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }
}
