use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use avocado_core::flight::Airport;
use serde::Deserialize;

use crate::error::AppError;
use crate::extract::AppQuery;
use crate::state::AppState;

const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AirportParams {
    pub language: Option<String>,
}

impl AirportParams {
    /// Two-letter code, lowercased. Anything else falls back to English.
    pub fn language(&self) -> String {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|l| l.len() == 2 && l.chars().all(|c| c.is_ascii_alphabetic()))
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
    }
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/airports", get(list_airports))
}

async fn list_airports(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<AirportParams>,
) -> Result<Json<Vec<Airport>>, AppError> {
    Ok(Json(state.airports.list_airports(&params.language()).await?))
}
