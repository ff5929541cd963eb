use std::collections::HashSet;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use avocado_core::booking::Itinerary;
use avocado_core::flight::Flight;
use avocado_core::search::FlightQuery;
use avocado_core::validators::{is_valid_airport_code, is_valid_passenger_count, parse_iso_date};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Violations};
use crate::extract::{AppJson, AppPath};
use crate::middleware::{require_auth, AuthUser};
use crate::state::AppState;

const PASSENGERS_MESSAGE: &str = "Passengers must be between 1 and 9";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    pub origin: String,
    pub destination: String,
    pub date: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MultiCitySearchRequest {
    pub segments: Vec<SegmentParams>,
    pub passengers: i32,
}

impl MultiCitySearchRequest {
    pub fn queries(&self) -> Result<Vec<FlightQuery>, AppError> {
        let mut v = Violations::default();
        v.check(
            self.segments.len() >= 2,
            "segments",
            "At least 2 segments required for multi-city booking",
        );

        let mut queries = Vec::with_capacity(self.segments.len());
        for (i, segment) in self.segments.iter().enumerate() {
            v.check(
                is_valid_airport_code(&segment.origin),
                &format!("segments[{}].origin", i),
                "Valid airport code required",
            );
            v.check(
                is_valid_airport_code(&segment.destination),
                &format!("segments[{}].destination", i),
                "Valid airport code required",
            );
            let date = parse_iso_date(&segment.date);
            v.check(date.is_some(), &format!("segments[{}].date", i), "Valid date required");
            if let Some(date) = date {
                queries.push(FlightQuery {
                    origin: segment.origin.clone(),
                    destination: segment.destination.clone(),
                    date,
                    passengers: self.passengers,
                });
            }
        }
        v.check(is_valid_passenger_count(self.passengers), "passengers", PASSENGERS_MESSAGE);
        v.into_result()?;
        Ok(queries)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateItineraryRequest {
    #[validate(length(min = 2, message = "At least 2 flights required"))]
    pub flights: Vec<Uuid>,
    #[validate(range(min = 1, max = 9, message = "Passengers must be between 1 and 9"))]
    pub passengers: i32,
}

#[derive(Debug, Serialize)]
pub struct ItineraryResponse {
    pub message: String,
    pub itinerary: Itinerary,
}

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/itineraries", post(create_itinerary))
        .route("/itineraries/{id}", get(get_itinerary))
        .route("/itineraries/{id}/cancel", post(cancel_itinerary))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/itineraries/search", post(search_multi_city))
        .merge(protected)
}

// ============================================================================
// Handlers
// ============================================================================

async fn search_multi_city(
    State(state): State<AppState>,
    AppJson(req): AppJson<MultiCitySearchRequest>,
) -> Result<Json<Vec<Vec<Flight>>>, AppError> {
    let queries = req.queries()?;

    let mut results = Vec::with_capacity(queries.len());
    for query in &queries {
        let flights = state.flights.search_flights(query).await?;
        if flights.is_empty() {
            return Err(AppError::NotFoundError(format!(
                "No flights available from {} to {} on {}",
                query.origin, query.destination, query.date
            )));
        }
        results.push(flights);
    }

    Ok(Json(results))
}

async fn create_itinerary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(req): AppJson<CreateItineraryRequest>,
) -> Result<(StatusCode, Json<ItineraryResponse>), AppError> {
    let mut v = Violations::from_validation(req.validate());
    let distinct: HashSet<&Uuid> = req.flights.iter().collect();
    v.check(distinct.len() == req.flights.len(), "flights", "Each flight may appear only once");
    v.into_result()?;

    let itinerary = state
        .itineraries
        .book_itinerary(user.user_id, &req.flights, req.passengers)
        .await?;

    tracing::info!(
        itinerary_id = %itinerary.id,
        user_id = %user.user_id,
        legs = itinerary.legs.len(),
        passengers = req.passengers,
        "Itinerary created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ItineraryResponse {
            message: "Itinerary created successfully".into(),
            itinerary,
        }),
    ))
}

async fn get_itinerary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Itinerary>, AppError> {
    state
        .itineraries
        .get_itinerary(user.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError("Itinerary not found".into()))
}

async fn cancel_itinerary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ItineraryResponse>, AppError> {
    let itinerary = state.itineraries.cancel_itinerary(user.user_id, id).await?;
    tracing::info!(itinerary_id = %id, user_id = %user.user_id, "Itinerary cancelled");
    Ok(Json(ItineraryResponse {
        message: "Itinerary cancelled successfully".into(),
        itinerary,
    }))
}
