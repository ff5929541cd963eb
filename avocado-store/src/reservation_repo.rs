use async_trait::async_trait;
use avocado_core::booking::{PaymentStatus, Reservation, ReservationView};
use avocado_core::flight::FlightSummary;
use avocado_core::inventory::{plan_booking, plan_release};
use avocado_core::payment::Payment;
use avocado_core::repository::ReservationRepository;
use avocado_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::error::{db_err, StoreResult};
use crate::flight_repo::{lock_flights, set_available_seats};

pub struct StoreReservationRepository {
    pool: PgPool,
}

impl StoreReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const RESERVATION_COLUMNS: &str = "id, user_id, flight_id, passengers, total_price_cents, \
     status, payment_status, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct ReservationRow {
    id: Uuid,
    user_id: Uuid,
    flight_id: Uuid,
    passengers: i32,
    total_price_cents: i64,
    status: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = CoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Reservation {
            id: row.id,
            user_id: row.user_id,
            flight_id: row.flight_id,
            passengers: row.passengers,
            total_price_cents: row.total_price_cents,
            status: row.status.parse()?,
            payment_status: row.payment_status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReservationViewRow {
    #[sqlx(flatten)]
    reservation: ReservationRow,
    flight_number: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    payment_id: Option<Uuid>,
    payment_amount_cents: Option<i64>,
    payment_method: Option<String>,
    card_last_four: Option<String>,
    transaction_id: Option<String>,
    transaction_status: Option<String>,
    payment_created_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReservationViewRow> for ReservationView {
    type Error = CoreError;

    fn try_from(row: ReservationViewRow) -> Result<Self, Self::Error> {
        let reservation = Reservation::try_from(row.reservation)?;
        let payment = match (
            row.payment_id,
            row.payment_amount_cents,
            row.payment_method,
            row.card_last_four,
            row.transaction_id,
            row.transaction_status,
            row.payment_created_at,
        ) {
            (Some(id), Some(amount_cents), Some(method), Some(last_four), Some(txn), Some(status), Some(at)) => {
                Some(Payment {
                    id,
                    reservation_id: reservation.id,
                    amount_cents,
                    payment_method: method,
                    card_last_four: last_four,
                    transaction_id: txn,
                    status: status.parse()?,
                    created_at: at,
                })
            }
            _ => None,
        };
        let flight = FlightSummary {
            flight_number: row.flight_number,
            origin: row.origin,
            destination: row.destination,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
        };
        Ok(ReservationView::new(reservation, flight, payment))
    }
}

const VIEW_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.flight_id, r.passengers, r.total_price_cents,
           r.status, r.payment_status, r.created_at, r.updated_at,
           f.flight_number, f.origin, f.destination, f.departure_time, f.arrival_time,
           p.id AS payment_id, p.amount_cents AS payment_amount_cents, p.payment_method,
           p.card_last_four, p.transaction_id, p.status AS transaction_status,
           p.created_at AS payment_created_at
    FROM reservations r
    JOIN flights f ON f.id = r.flight_id
    LEFT JOIN LATERAL (
        SELECT id, amount_cents, payment_method, card_last_four, transaction_id, status, created_at
        FROM payments
        WHERE reservation_id = r.id
        ORDER BY created_at DESC
        LIMIT 1
    ) p ON TRUE
"#;

/// Reads the reservation under a row lock, scoped to its owner.
pub(crate) async fn lock_reservation(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    id: Uuid,
) -> StoreResult<Reservation> {
    let sql = format!(
        "SELECT {} FROM reservations WHERE id = $1 AND user_id = $2 FOR UPDATE",
        RESERVATION_COLUMNS
    );
    let row: Option<ReservationRow> = sqlx::query_as(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?;
    let row = row.ok_or_else(|| CoreError::NotFound("Reservation not found".to_string()))?;
    Ok(Reservation::try_from(row)?)
}

impl StoreReservationRepository {
    async fn book(&self, user_id: Uuid, flight_id: Uuid, passengers: i32) -> StoreResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let seats = lock_flights(&mut tx, &[flight_id]).await?;
        let plan = plan_booking(&seats, passengers)?;
        for leg in &plan.legs {
            set_available_seats(&mut tx, leg.flight_id, leg.seats_after).await?;
        }

        let sql = format!(
            "INSERT INTO reservations (user_id, flight_id, passengers, total_price_cents) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            RESERVATION_COLUMNS
        );
        let row: ReservationRow = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(flight_id)
            .bind(plan.passengers)
            .bind(plan.total_price_cents)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        let reservation = Reservation::try_from(row)?;
        info!(
            reservation_id = %reservation.id,
            %flight_id,
            passengers,
            total_price_cents = reservation.total_price_cents,
            "Reservation created"
        );
        Ok(reservation)
    }

    async fn cancel(&self, user_id: Uuid, id: Uuid) -> StoreResult<Reservation> {
        let mut tx = self.pool.begin().await?;

        let reservation = lock_reservation(&mut tx, user_id, id).await?;
        reservation.ensure_active()?;

        let seats = lock_flights(&mut tx, &[reservation.flight_id]).await?;
        for flight in &seats {
            let release = plan_release(flight, reservation.passengers)?;
            set_available_seats(&mut tx, release.flight_id, release.seats_after).await?;
        }

        let payment_status = reservation.payment_status.after_cancellation();
        let sql = format!(
            "UPDATE reservations SET status = 'cancelled', payment_status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            RESERVATION_COLUMNS
        );
        let row: ReservationRow = sqlx::query_as(&sql)
            .bind(id)
            .bind(payment_status.as_str())
            .fetch_one(&mut *tx)
            .await?;

        if payment_status == PaymentStatus::Refunded {
            sqlx::query(
                "UPDATE payments SET status = 'refunded' WHERE reservation_id = $1 AND status = 'completed'",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(reservation_id = %id, passengers = reservation.passengers, "Reservation cancelled");
        Ok(Reservation::try_from(row)?)
    }
}

#[async_trait]
impl ReservationRepository for StoreReservationRepository {
    async fn book_reservation(
        &self,
        user_id: Uuid,
        flight_id: Uuid,
        passengers: i32,
    ) -> CoreResult<Reservation> {
        Ok(self.book(user_id, flight_id, passengers).await?)
    }

    async fn list_reservations(&self, user_id: Uuid) -> CoreResult<Vec<ReservationView>> {
        let sql = format!("{} WHERE r.user_id = $1 ORDER BY r.created_at DESC", VIEW_SELECT);
        let rows: Vec<ReservationViewRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(ReservationView::try_from).collect()
    }

    async fn get_reservation(&self, user_id: Uuid, id: Uuid) -> CoreResult<Option<ReservationView>> {
        let sql = format!("{} WHERE r.id = $1 AND r.user_id = $2", VIEW_SELECT);
        let row: Option<ReservationViewRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(ReservationView::try_from).transpose()
    }

    async fn cancel_reservation(&self, user_id: Uuid, id: Uuid) -> CoreResult<Reservation> {
        Ok(self.cancel(user_id, id).await?)
    }
}
