use std::path::Path;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub mod airports;
pub mod auth;
pub mod error;
pub mod extract;
pub mod flights;
pub mod health;
pub mod itineraries;
pub mod middleware;
pub mod reservations;
pub mod state;

pub use state::AppState;

use crate::error::AppError;

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::routes(state.clone()))
        .merge(flights::routes())
        .merge(itineraries::routes(state.clone()))
        .merge(reservations::routes(state.clone()))
        .merge(airports::routes())
        .merge(health::routes())
        .fallback(|| async { AppError::NotFoundError("Route not found".into()) });

    let mut router = Router::new().nest("/api", api);

    if let Some(dir) = state.static_dir.as_deref() {
        let index = Path::new(dir).join("index.html");
        tracing::info!("Serving frontend from {}", dir);
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(cors_layer(&state.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Listed origins may send the session cookie. With none configured any
/// origin is allowed, without credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::USER_AGENT]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        cors.allow_origin(AllowOrigin::any())
    } else {
        cors.allow_origin(AllowOrigin::list(allowed)).allow_credentials(true)
    }
}
