use async_trait::async_trait;
use avocado_core::payment::{CapturedPayment, Payment, CARD_PAYMENT_METHOD};
use avocado_core::repository::PaymentRepository;
use avocado_core::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::reservation_repo::lock_reservation;

pub struct StorePaymentRepository {
    pool: PgPool,
}

impl StorePaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    reservation_id: Uuid,
    amount_cents: i64,
    payment_method: String,
    card_last_four: String,
    transaction_id: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = CoreError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: row.id,
            reservation_id: row.reservation_id,
            amount_cents: row.amount_cents,
            payment_method: row.payment_method,
            card_last_four: row.card_last_four,
            transaction_id: row.transaction_id,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

impl StorePaymentRepository {
    async fn record(
        &self,
        user_id: Uuid,
        reservation_id: Uuid,
        captured: &CapturedPayment,
    ) -> StoreResult<Payment> {
        let mut tx = self.pool.begin().await?;

        let reservation = lock_reservation(&mut tx, user_id, reservation_id).await?;
        reservation.ensure_payable()?;

        let row: PaymentRow = sqlx::query_as(
            r#"
            INSERT INTO payments (reservation_id, amount_cents, payment_method, card_last_four, transaction_id, status)
            VALUES ($1, $2, $3, $4, $5, 'completed')
            RETURNING id, reservation_id, amount_cents, payment_method, card_last_four, transaction_id, status, created_at
            "#,
        )
        .bind(reservation_id)
        .bind(reservation.total_price_cents)
        .bind(CARD_PAYMENT_METHOD)
        .bind(&captured.card_last_four)
        .bind(&captured.transaction_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE reservations SET status = 'confirmed', payment_status = 'paid', updated_at = NOW() WHERE id = $1",
        )
        .bind(reservation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            %reservation_id,
            transaction_id = %captured.transaction_id,
            amount_cents = reservation.total_price_cents,
            "Payment recorded"
        );
        Ok(Payment::try_from(row)?)
    }
}

#[async_trait]
impl PaymentRepository for StorePaymentRepository {
    async fn record_payment(
        &self,
        user_id: Uuid,
        reservation_id: Uuid,
        captured: &CapturedPayment,
    ) -> CoreResult<Payment> {
        Ok(self.record(user_id, reservation_id, captured).await?)
    }
}
