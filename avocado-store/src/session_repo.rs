use async_trait::async_trait;
use avocado_core::repository::SessionRepository;
use avocado_core::user::{NewSession, Session};
use avocado_core::CoreResult;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::db_err;

pub struct StoreSessionRepository {
    pool: PgPool,
}

impl StoreSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    ip_address: Option<String>,
    user_agent: Option<String>,
    expires_at: DateTime<Utc>,
    is_valid: bool,
    created_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            expires_at: row.expires_at,
            is_valid: row.is_valid,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        }
    }
}

#[async_trait]
impl SessionRepository for StoreSessionRepository {
    async fn create_session(&self, session: NewSession) -> CoreResult<Session> {
        let row: SessionRow = sqlx::query_as(
            r#"
            INSERT INTO user_sessions (user_id, token_hash, ip_address, user_agent, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, ip_address, user_agent, expires_at, is_valid, created_at, last_used_at
            "#,
        )
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.into())
    }

    async fn find_active(&self, token_hash: &str) -> CoreResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, ip_address, user_agent, expires_at, is_valid, created_at, last_used_at
            FROM user_sessions
            WHERE token_hash = $1 AND is_valid AND expires_at > NOW()
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Session::from))
    }

    async fn touch(&self, session_id: Uuid) -> CoreResult<()> {
        sqlx::query("UPDATE user_sessions SET last_used_at = NOW() WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn invalidate(&self, token_hash: &str) -> CoreResult<()> {
        sqlx::query("UPDATE user_sessions SET is_valid = FALSE WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
