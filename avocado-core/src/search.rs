use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::flight::Flight;

/// Days ahead covered by the deals listing.
pub const DEAL_WINDOW_DAYS: i64 = 14;
pub const DEAL_LIMIT: usize = 4;

/// One origin/destination/day lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
    pub passengers: i32,
}

impl FlightQuery {
    /// Half-open UTC window `[date 00:00, date+1 00:00)` for departures.
    pub fn departure_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        day_window(self.date)
    }

    /// The same query flown the other way on another day.
    pub fn reversed(&self, date: NaiveDate) -> FlightQuery {
        FlightQuery {
            origin: self.destination.clone(),
            destination: self.origin.clone(),
            date,
            passengers: self.passengers,
        }
    }

    pub fn matches(&self, flight: &Flight) -> bool {
        let (start, end) = self.departure_window();
        flight.origin == self.origin
            && flight.destination == self.destination
            && flight.departure_time >= start
            && flight.departure_time < end
            && flight.available_seats >= self.passengers
    }
}

pub fn day_window(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// From the start of today through the end of the fourteenth day ahead.
pub fn deal_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (start, _) = day_window(now.date_naive());
    (start, start + Duration::days(DEAL_WINDOW_DAYS + 1))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundTripResults {
    pub outbound_flights: Vec<Flight>,
    pub return_flights: Vec<Flight>,
}
