pub mod booking;
pub mod flight;
pub mod identity;
pub mod inventory;
pub mod notify;
pub mod payment;
pub mod repository;
pub mod search;
pub mod user;
pub mod validators;

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Not enough seats available on flight {flight_id} (requested {requested}, available {available})")]
    InsufficientSeats {
        flight_id: Uuid,
        requested: i32,
        available: i32,
    },
    #[error("Identity verification failed: {0}")]
    IdentityError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Passenger count accepted by every booking and search operation.
pub const MIN_PASSENGERS: i32 = 1;
pub const MAX_PASSENGERS: i32 = 9;
