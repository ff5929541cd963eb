use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

pub const CARD_PAYMENT_METHOD: &str = "credit_card";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Completed,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(TransactionStatus::Completed),
            "refunded" => Ok(TransactionStatus::Refunded),
            other => Err(CoreError::InternalError(format!("unknown transaction status {}", other))),
        }
    }
}

/// Captured card payment for a reservation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub amount_cents: i64,
    pub payment_method: String,
    pub card_last_four: String,
    pub transaction_id: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

/// What the gateway is asked to capture. Only the card suffix ever leaves
/// the request handler.
#[derive(Debug, Clone)]
pub struct CardCharge {
    pub reservation_id: Uuid,
    pub amount_cents: i64,
    pub card_last_four: String,
    pub cardholder_name: String,
}

/// Recorded capture, handed to the store.
#[derive(Debug, Clone)]
pub struct CapturedPayment {
    pub card_last_four: String,
    pub transaction_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures the charge and returns the provider's transaction id.
    async fn capture(&self, charge: &CardCharge) -> CoreResult<String>;
}

/// Accepts every charge. Transaction ids look like `TR<unix-millis><0-999>`.
pub struct MockPaymentGateway;

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn capture(&self, charge: &CardCharge) -> CoreResult<String> {
        let transaction_id = mock_transaction_id(Utc::now());
        tracing::info!(
            reservation_id = %charge.reservation_id,
            amount_cents = charge.amount_cents,
            card = %avocado_shared::pii::mask_card_number(&charge.card_last_four),
            %transaction_id,
            "Mock payment captured"
        );
        Ok(transaction_id)
    }
}

pub fn mock_transaction_id(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("TR{}{}", now.timestamp_millis(), suffix)
}
