use async_trait::async_trait;
use avocado_core::flight::Airport;
use avocado_core::repository::AirportRepository;
use avocado_core::CoreResult;
use sqlx::PgPool;

use crate::error::db_err;

pub struct StoreAirportRepository {
    pool: PgPool,
}

impl StoreAirportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AirportRow {
    code: String,
    name: Option<String>,
    city: Option<String>,
    country: Option<String>,
}

#[async_trait]
impl AirportRepository for StoreAirportRepository {
    async fn list_airports(&self, language: &str) -> CoreResult<Vec<Airport>> {
        let rows: Vec<AirportRow> = sqlx::query_as(
            r#"
            SELECT a.code,
                   COALESCE(t.name, en.name) AS name,
                   COALESCE(t.city, en.city) AS city,
                   COALESCE(t.country, en.country) AS country
            FROM airports a
            LEFT JOIN airport_translations t
                   ON t.airport_id = a.id AND t.language_code = $1
            LEFT JOIN airport_translations en
                   ON en.airport_id = a.id AND en.language_code = 'en'
            ORDER BY name ASC
            "#,
        )
        .bind(language)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|r| Airport {
                code: r.code,
                name: r.name,
                city: r.city,
                country: r.country,
            })
            .collect())
    }
}
