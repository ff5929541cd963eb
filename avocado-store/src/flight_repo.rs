use async_trait::async_trait;
use avocado_core::flight::{Airport, DealCandidate, Flight};
use avocado_core::inventory::SeatState;
use avocado_core::repository::FlightRepository;
use avocado_core::search::FlightQuery;
use avocado_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{db_err, StoreResult};

pub struct StoreFlightRepository {
    pool: PgPool,
}

impl StoreFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const FLIGHT_COLUMNS: &str = "id, flight_number, origin, destination, departure_time, \
     arrival_time, price_cents, available_seats, total_seats";

#[derive(sqlx::FromRow)]
pub(crate) struct FlightRow {
    id: Uuid,
    flight_number: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    price_cents: i64,
    available_seats: i32,
    total_seats: i32,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Flight {
            id: row.id,
            flight_number: row.flight_number,
            origin: row.origin,
            destination: row.destination,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            price_cents: row.price_cents,
            available_seats: row.available_seats,
            total_seats: row.total_seats,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DealRow {
    #[sqlx(flatten)]
    flight: FlightRow,
    avg_price_cents: f64,
    origin_name: Option<String>,
    origin_city: Option<String>,
    origin_country: Option<String>,
    destination_name: Option<String>,
    destination_city: Option<String>,
    destination_country: Option<String>,
}

impl From<DealRow> for DealCandidate {
    fn from(row: DealRow) -> Self {
        let flight = Flight::from(row.flight);
        DealCandidate {
            origin: Airport {
                code: flight.origin.clone(),
                name: row.origin_name,
                city: row.origin_city,
                country: row.origin_country,
            },
            destination: Airport {
                code: flight.destination.clone(),
                name: row.destination_name,
                city: row.destination_city,
                country: row.destination_country,
            },
            route_average_cents: row.avg_price_cents,
            flight,
        }
    }
}

/// Locks the flight rows and returns their seat state in the order given.
/// Rows are locked in id order so concurrent multi-leg bookings cannot
/// deadlock; `NotFound` names the first requested flight that is missing.
pub(crate) async fn lock_flights(
    tx: &mut Transaction<'_, Postgres>,
    flight_ids: &[Uuid],
) -> StoreResult<Vec<SeatState>> {
    let rows: Vec<(Uuid, i64, i32, i32)> = sqlx::query_as(
        r#"
        SELECT id, price_cents, available_seats, total_seats
        FROM flights
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(flight_ids)
    .fetch_all(&mut **tx)
    .await?;

    let mut states = Vec::with_capacity(flight_ids.len());
    for flight_id in flight_ids {
        let (_, price_cents, available_seats, total_seats) = rows
            .iter()
            .find(|(id, ..)| id == flight_id)
            .copied()
            .ok_or_else(|| CoreError::NotFound(format!("Flight {} not found", flight_id)))?;
        states.push(SeatState {
            flight_id: *flight_id,
            price_cents,
            available_seats,
            total_seats,
        });
    }
    Ok(states)
}

pub(crate) async fn set_available_seats(
    tx: &mut Transaction<'_, Postgres>,
    flight_id: Uuid,
    seats: i32,
) -> StoreResult<()> {
    sqlx::query("UPDATE flights SET available_seats = $1 WHERE id = $2")
        .bind(seats)
        .bind(flight_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl FlightRepository for StoreFlightRepository {
    async fn search_flights(&self, query: &FlightQuery) -> CoreResult<Vec<Flight>> {
        let (from, to) = query.departure_window();
        let sql = format!(
            r#"
            SELECT {}
            FROM flights
            WHERE origin = $1
              AND destination = $2
              AND departure_time >= $3
              AND departure_time < $4
              AND available_seats >= $5
            ORDER BY departure_time ASC
            "#,
            FLIGHT_COLUMNS
        );
        let rows: Vec<FlightRow> = sqlx::query_as(&sql)
            .bind(&query.origin)
            .bind(&query.destination)
            .bind(from)
            .bind(to)
            .bind(query.passengers)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(Flight::from).collect())
    }

    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        let sql = format!("SELECT {} FROM flights WHERE id = $1", FLIGHT_COLUMNS);
        let row: Option<FlightRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(Flight::from))
    }

    async fn deal_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<DealCandidate>> {
        let rows: Vec<DealRow> = sqlx::query_as(
            r#"
            WITH route_avg AS (
                SELECT origin, destination, AVG(price_cents)::FLOAT8 AS avg_price_cents
                FROM flights
                GROUP BY origin, destination
            )
            SELECT f.id, f.flight_number, f.origin, f.destination, f.departure_time,
                   f.arrival_time, f.price_cents, f.available_seats, f.total_seats,
                   ra.avg_price_cents,
                   ot.name AS origin_name, ot.city AS origin_city, ot.country AS origin_country,
                   dt.name AS destination_name, dt.city AS destination_city,
                   dt.country AS destination_country
            FROM flights f
            JOIN route_avg ra ON ra.origin = f.origin AND ra.destination = f.destination
            LEFT JOIN airports oa ON oa.code = f.origin
            LEFT JOIN airport_translations ot ON ot.airport_id = oa.id AND ot.language_code = 'en'
            LEFT JOIN airports da ON da.code = f.destination
            LEFT JOIN airport_translations dt ON dt.airport_id = da.id AND dt.language_code = 'en'
            WHERE f.departure_time >= $1
              AND f.departure_time < $2
              AND f.available_seats > 0
              AND f.price_cents < ra.avg_price_cents
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(DealCandidate::from).collect())
    }
}
