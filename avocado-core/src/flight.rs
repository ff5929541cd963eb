use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::SeatState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price_cents: i64,
    pub available_seats: i32,
    pub total_seats: i32,
}

impl Flight {
    pub fn seat_state(&self) -> SeatState {
        SeatState {
            flight_id: self.id,
            price_cents: self.price_cents,
            available_seats: self.available_seats,
            total_seats: self.total_seats,
        }
    }
}

/// Flight fields shown alongside a reservation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlightSummary {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
}

/// Airport with names resolved for one language.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Airport {
    pub code: String,
    pub name: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

/// A flight priced under its route average, as read from the store.
#[derive(Debug, Clone)]
pub struct DealCandidate {
    pub flight: Flight,
    pub route_average_cents: f64,
    pub origin: Airport,
    pub destination: Airport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlightDeal {
    pub id: Uuid,
    pub flight_number: String,
    pub origin: Airport,
    pub destination: Airport,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price_cents: i64,
    pub original_price_cents: i64,
    pub discount_percentage: i32,
    pub available_seats: i32,
}

impl FlightDeal {
    /// Discount is measured against the route average and rounded to a whole
    /// percent.
    pub fn from_candidate(candidate: DealCandidate) -> Self {
        let DealCandidate {
            flight,
            route_average_cents,
            origin,
            destination,
        } = candidate;

        let discount = if route_average_cents > 0.0 {
            ((route_average_cents - flight.price_cents as f64) / route_average_cents * 100.0).round()
        } else {
            0.0
        };

        FlightDeal {
            id: flight.id,
            flight_number: flight.flight_number,
            origin,
            destination,
            departure_time: flight.departure_time,
            arrival_time: flight.arrival_time,
            price_cents: flight.price_cents,
            original_price_cents: route_average_cents.round() as i64,
            discount_percentage: discount as i32,
            available_seats: flight.available_seats,
        }
    }
}

/// Ranks candidates by discount, best first, and keeps `limit`.
pub fn rank_deals(candidates: Vec<DealCandidate>, limit: usize) -> Vec<FlightDeal> {
    let mut deals: Vec<FlightDeal> = candidates
        .into_iter()
        .filter(|c| c.flight.available_seats > 0 && (c.flight.price_cents as f64) < c.route_average_cents)
        .map(FlightDeal::from_candidate)
        .collect();
    deals.sort_by(|a, b| {
        b.discount_percentage
            .cmp(&a.discount_percentage)
            .then(a.departure_time.cmp(&b.departure_time))
    });
    deals.truncate(limit);
    deals
}
