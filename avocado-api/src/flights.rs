use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use avocado_core::flight::{rank_deals, Flight, FlightDeal};
use avocado_core::search::{deal_window, FlightQuery, RoundTripResults, DEAL_LIMIT};
use avocado_core::validators::{is_valid_airport_code, is_valid_date_range, is_valid_passenger_count, parse_us_date};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, Violations};
use crate::extract::{AppPath, AppQuery};
use crate::state::AppState;

/// Raw query string. Everything arrives as text so bad values become field
/// errors instead of a blanket rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<String>,
    pub return_date: Option<String>,
    pub passengers: Option<String>,
}

/// A validated round-trip search.
#[derive(Debug, PartialEq, Eq)]
pub struct RoundTripSearch {
    pub outbound: FlightQuery,
    pub return_date: Option<chrono::NaiveDate>,
}

impl SearchParams {
    pub fn parse(&self) -> Result<RoundTripSearch, AppError> {
        let origin = self.origin.as_deref().unwrap_or_default();
        let destination = self.destination.as_deref().unwrap_or_default();
        let departure = self.departure_date.as_deref().unwrap_or_default();
        let passengers = self
            .passengers
            .as_deref()
            .and_then(|p| p.trim().parse::<i32>().ok())
            .filter(|p| is_valid_passenger_count(*p));

        let mut v = Violations::default();
        v.check(is_valid_airport_code(origin), "origin", "Invalid origin airport code");
        v.check(is_valid_airport_code(destination), "destination", "Invalid destination airport code");
        let departure_date = parse_us_date(departure);
        v.check(departure_date.is_some(), "departureDate", "Invalid departure date format (MM/DD/YYYY)");

        let mut return_date = None;
        if let Some(ret) = self.return_date.as_deref().filter(|r| !r.is_empty()) {
            return_date = parse_us_date(ret);
            v.check(return_date.is_some(), "returnDate", "Invalid return date format (MM/DD/YYYY)");
            v.check(
                return_date.is_none() || is_valid_date_range(departure, ret),
                "returnDate",
                "Return date must be after departure date",
            );
        }
        v.check(passengers.is_some(), "passengers", "Passengers must be between 1 and 9");
        v.into_result()?;

        match (departure_date, passengers) {
            (Some(date), Some(passengers)) => Ok(RoundTripSearch {
                outbound: FlightQuery {
                    origin: origin.to_string(),
                    destination: destination.to_string(),
                    date,
                    passengers,
                },
                return_date,
            }),
            _ => Err(AppError::BadRequest("Invalid search".into())),
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/flights/search", get(search_flights))
        .route("/flights/deals", get(flight_deals))
        .route("/flights/{id}", get(get_flight))
}

async fn search_flights(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<RoundTripResults>, AppError> {
    let search = params.parse()?;
    tracing::debug!(?search, "Flight search");

    let outbound_flights = state.flights.search_flights(&search.outbound).await?;
    let return_flights = match search.return_date {
        Some(date) => state.flights.search_flights(&search.outbound.reversed(date)).await?,
        None => Vec::new(),
    };

    Ok(Json(RoundTripResults {
        outbound_flights,
        return_flights,
    }))
}

async fn flight_deals(State(state): State<AppState>) -> Result<Json<Vec<FlightDeal>>, AppError> {
    let (from, to) = deal_window(Utc::now());
    let candidates = state.flights.deal_candidates(from, to).await?;
    Ok(Json(rank_deals(candidates, DEAL_LIMIT)))
}

async fn get_flight(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Flight>, AppError> {
    state
        .flights
        .get_flight(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError("Flight not found".into()))
}
