use async_trait::async_trait;
use avocado_core::booking::{Itinerary, ItineraryLeg};
use avocado_core::flight::Flight;
use avocado_core::inventory::{plan_booking, plan_release};
use avocado_core::repository::ItineraryRepository;
use avocado_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::flight_repo::{lock_flights, set_available_seats, FlightRow};

pub struct StoreItineraryRepository {
    pool: PgPool,
}

impl StoreItineraryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ITINERARY_COLUMNS: &str = "id, user_id, total_price_cents, passenger_count, status, \
     payment_status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ItineraryRow {
    id: Uuid,
    user_id: Uuid,
    total_price_cents: i64,
    passenger_count: i32,
    status: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct LegRow {
    sequence_number: i32,
    #[sqlx(flatten)]
    flight: FlightRow,
}

fn assemble(row: ItineraryRow, legs: Vec<LegRow>) -> CoreResult<Itinerary> {
    Ok(Itinerary {
        id: row.id,
        user_id: row.user_id,
        total_price_cents: row.total_price_cents,
        passenger_count: row.passenger_count,
        status: row.status.parse()?,
        payment_status: row.payment_status.parse()?,
        created_at: row.created_at,
        updated_at: row.updated_at,
        legs: legs
            .into_iter()
            .map(|leg| ItineraryLeg {
                sequence_number: leg.sequence_number,
                flight: Flight::from(leg.flight),
            })
            .collect(),
    })
}

async fn load_legs(
    tx: &mut Transaction<'_, Postgres>,
    itinerary_id: Uuid,
) -> StoreResult<Vec<LegRow>> {
    let rows = sqlx::query_as(
        r#"
        SELECT itf.sequence_number, f.id, f.flight_number, f.origin, f.destination,
               f.departure_time, f.arrival_time, f.price_cents, f.available_seats, f.total_seats
        FROM itinerary_flights itf
        JOIN flights f ON f.id = itf.flight_id
        WHERE itf.itinerary_id = $1
        ORDER BY itf.sequence_number ASC
        "#,
    )
    .bind(itinerary_id)
    .fetch_all(&mut **tx)
    .await?;
    Ok(rows)
}

impl StoreItineraryRepository {
    async fn book(&self, user_id: Uuid, flight_ids: &[Uuid], passengers: i32) -> StoreResult<Itinerary> {
        let mut tx = self.pool.begin().await?;

        let seats = lock_flights(&mut tx, flight_ids).await?;
        let plan = plan_booking(&seats, passengers)?;

        let sql = format!(
            "INSERT INTO itineraries (user_id, total_price_cents, passenger_count) \
             VALUES ($1, $2, $3) RETURNING {}",
            ITINERARY_COLUMNS
        );
        let row: ItineraryRow = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(plan.total_price_cents)
            .bind(plan.passengers)
            .fetch_one(&mut *tx)
            .await?;

        for leg in &plan.legs {
            sqlx::query(
                "INSERT INTO itinerary_flights (itinerary_id, flight_id, sequence_number) VALUES ($1, $2, $3)",
            )
            .bind(row.id)
            .bind(leg.flight_id)
            .bind(leg.sequence_number)
            .execute(&mut *tx)
            .await?;
            set_available_seats(&mut tx, leg.flight_id, leg.seats_after).await?;
        }

        let legs = load_legs(&mut tx, row.id).await?;
        tx.commit().await?;

        let itinerary = assemble(row, legs)?;
        info!(
            itinerary_id = %itinerary.id,
            legs = itinerary.legs.len(),
            passengers,
            total_price_cents = itinerary.total_price_cents,
            "Itinerary created"
        );
        Ok(itinerary)
    }

    async fn fetch(&self, user_id: Uuid, id: Uuid) -> StoreResult<Option<Itinerary>> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "SELECT {} FROM itineraries WHERE id = $1 AND user_id = $2",
            ITINERARY_COLUMNS
        );
        let row: Option<ItineraryRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let legs = load_legs(&mut tx, id).await?;
        tx.commit().await?;
        Ok(Some(assemble(row, legs)?))
    }

    async fn cancel(&self, user_id: Uuid, id: Uuid) -> StoreResult<Itinerary> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {} FROM itineraries WHERE id = $1 AND user_id = $2 FOR UPDATE",
            ITINERARY_COLUMNS
        );
        let row: Option<ItineraryRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let row = row.ok_or_else(|| CoreError::NotFound("Itinerary not found".to_string()))?;
        let passengers = row.passenger_count;
        let current = assemble(row, Vec::new())?;
        current.ensure_active()?;

        let flight_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT flight_id FROM itinerary_flights WHERE itinerary_id = $1 ORDER BY sequence_number",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for flight in lock_flights(&mut tx, &flight_ids).await? {
            let release = plan_release(&flight, passengers)?;
            set_available_seats(&mut tx, release.flight_id, release.seats_after).await?;
        }

        let sql = format!(
            "UPDATE itineraries SET status = 'cancelled', payment_status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            ITINERARY_COLUMNS
        );
        let row: ItineraryRow = sqlx::query_as(&sql)
            .bind(id)
            .bind(current.payment_status.after_cancellation().as_str())
            .fetch_one(&mut *tx)
            .await?;

        let legs = load_legs(&mut tx, id).await?;
        tx.commit().await?;

        info!(itinerary_id = %id, legs = legs.len(), passengers, "Itinerary cancelled");
        Ok(assemble(row, legs)?)
    }
}

#[async_trait]
impl ItineraryRepository for StoreItineraryRepository {
    async fn book_itinerary(
        &self,
        user_id: Uuid,
        flight_ids: &[Uuid],
        passengers: i32,
    ) -> CoreResult<Itinerary> {
        Ok(self.book(user_id, flight_ids, passengers).await?)
    }

    async fn get_itinerary(&self, user_id: Uuid, id: Uuid) -> CoreResult<Option<Itinerary>> {
        self.fetch(user_id, id).await.map_err(CoreError::from)
    }

    async fn cancel_itinerary(&self, user_id: Uuid, id: Uuid) -> CoreResult<Itinerary> {
        Ok(self.cancel(user_id, id).await?)
    }
}
