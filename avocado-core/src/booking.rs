use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::flight::{Flight, FlightSummary};
use crate::payment::Payment;
use crate::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(CoreError::InternalError(format!("unknown booking status {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Status a booking's payment moves to when the booking is cancelled.
    pub fn after_cancellation(self) -> PaymentStatus {
        match self {
            PaymentStatus::Paid => PaymentStatus::Refunded,
            other => other,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(CoreError::InternalError(format!("unknown payment status {}", other))),
        }
    }
}

/// Single-flight booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub passengers: i32,
    pub total_price_cents: i64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Six-character code printed on the confirmation page.
    pub fn confirmation_number(&self) -> String {
        confirmation_number(self.id)
    }

    /// Rejects operations on a reservation that was already cancelled.
    pub fn ensure_active(&self) -> Result<(), CoreError> {
        if self.status == BookingStatus::Cancelled {
            return Err(CoreError::Conflict("Reservation already cancelled".to_string()));
        }
        Ok(())
    }

    /// Rejects a second capture and captures on cancelled reservations.
    pub fn ensure_payable(&self) -> Result<(), CoreError> {
        if self.payment_status == PaymentStatus::Paid {
            return Err(CoreError::Conflict("Payment already processed".to_string()));
        }
        if self.status == BookingStatus::Cancelled {
            return Err(CoreError::Conflict(
                "Cannot pay for a cancelled reservation".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn confirmation_number(id: Uuid) -> String {
    id.simple().to_string()[..6].to_uppercase()
}

/// Reservation with the flight it is for and its latest payment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReservationView {
    #[serde(flatten)]
    pub reservation: Reservation,
    pub confirmation_number: String,
    pub flight: FlightSummary,
    pub payment: Option<Payment>,
}

impl ReservationView {
    pub fn new(reservation: Reservation, flight: FlightSummary, payment: Option<Payment>) -> Self {
        Self {
            confirmation_number: reservation.confirmation_number(),
            reservation,
            flight,
            payment,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryLeg {
    pub sequence_number: i32,
    pub flight: Flight,
}

/// Ordered multi-leg booking.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_price_cents: i64,
    pub passenger_count: i32,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub legs: Vec<ItineraryLeg>,
}

impl Itinerary {
    pub fn ensure_active(&self) -> Result<(), CoreError> {
        if self.status == BookingStatus::Cancelled {
            return Err(CoreError::Conflict("Itinerary already cancelled".to_string()));
        }
        Ok(())
    }

    pub fn flight_ids(&self) -> Vec<Uuid> {
        self.legs.iter().map(|leg| leg.flight.id).collect()
    }
}
