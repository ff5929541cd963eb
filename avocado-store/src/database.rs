use async_trait::async_trait;
use avocado_core::repository::DatabaseHealth;
use avocado_core::CoreResult;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::DatabaseConfig;
use crate::error::db_err;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    /// Keeps trying while the database container is still starting.
    pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let attempts = config.connect_retries.max(1);
        let mut attempt = 1;
        loop {
            match Self::new(config).await {
                Ok(client) => {
                    info!("Connected to database (attempt {}/{})", attempt, attempts);
                    return Ok(client);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "Database connection attempt {}/{} failed: {}. Retrying in {}s",
                        attempt, attempts, e, config.connect_retry_delay_seconds
                    );
                    tokio::time::sleep(Duration::from_secs(config.connect_retry_delay_seconds)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

#[async_trait]
impl DatabaseHealth for DbClient {
    async fn ping(&self) -> CoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
