//! Seat accounting shared by every store implementation.
//!
//! Callers read the flight rows under a lock, hand their current state to
//! [`plan_booking`] or [`plan_release`], and write back exactly what the plan
//! says. Nothing is written when planning fails, which keeps a multi-leg
//! booking all-or-nothing.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{validators, CoreError, CoreResult, MAX_PASSENGERS, MIN_PASSENGERS};

/// Seat inventory and fare of one flight row as read inside a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatState {
    pub flight_id: Uuid,
    pub price_cents: i64,
    pub available_seats: i32,
    pub total_seats: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLeg {
    pub flight_id: Uuid,
    /// 1-based position in the booking.
    pub sequence_number: i32,
    pub seats_after: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingPlan {
    pub passengers: i32,
    pub total_price_cents: i64,
    pub legs: Vec<PlannedLeg>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasePlan {
    pub flight_id: Uuid,
    pub seats_after: i32,
}

/// Checks availability on every leg and prices the booking.
///
/// `flights` must be in booking order. Fails on the first leg that cannot
/// take `passengers` more travellers.
pub fn plan_booking(flights: &[SeatState], passengers: i32) -> CoreResult<BookingPlan> {
    if !validators::is_valid_passenger_count(passengers) {
        return Err(CoreError::ValidationError(format!(
            "Passengers must be between {} and {}",
            MIN_PASSENGERS, MAX_PASSENGERS
        )));
    }
    if flights.is_empty() {
        return Err(CoreError::ValidationError(
            "At least one flight is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let mut total_price_cents: i64 = 0;
    let mut legs = Vec::with_capacity(flights.len());

    for (index, flight) in flights.iter().enumerate() {
        if !seen.insert(flight.flight_id) {
            return Err(CoreError::ValidationError(format!(
                "Flight {} appears more than once",
                flight.flight_id
            )));
        }
        if flight.available_seats < passengers {
            return Err(CoreError::InsufficientSeats {
                flight_id: flight.flight_id,
                requested: passengers,
                available: flight.available_seats,
            });
        }

        let leg_price = flight
            .price_cents
            .checked_mul(i64::from(passengers))
            .ok_or_else(|| CoreError::InternalError("fare overflow".to_string()))?;
        total_price_cents = total_price_cents
            .checked_add(leg_price)
            .ok_or_else(|| CoreError::InternalError("fare overflow".to_string()))?;

        legs.push(PlannedLeg {
            flight_id: flight.flight_id,
            sequence_number: index as i32 + 1,
            seats_after: flight.available_seats - passengers,
        });
    }

    Ok(BookingPlan {
        passengers,
        total_price_cents,
        legs,
    })
}

/// Returns `passengers` seats to one flight.
///
/// Refuses to push a flight above its capacity; that would mean the seats
/// were already returned once.
pub fn plan_release(flight: &SeatState, passengers: i32) -> CoreResult<ReleasePlan> {
    let seats_after = flight.available_seats + passengers;
    if passengers < 0 || seats_after > flight.total_seats {
        return Err(CoreError::InternalError(format!(
            "releasing {} seats would leave flight {} with {} of {} seats",
            passengers, flight.flight_id, seats_after, flight.total_seats
        )));
    }
    Ok(ReleasePlan {
        flight_id: flight.flight_id,
        seats_after,
    })
}
