//! Storage seams. The API holds each of these as `Arc<dyn Trait>`; the
//! Postgres implementations live in `avocado-store`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Itinerary, Reservation, ReservationView};
use crate::flight::{Airport, DealCandidate, Flight};
use crate::payment::{CapturedPayment, Payment};
use crate::search::FlightQuery;
use crate::user::{NewSession, NewUser, Session, TwoFactorAuth, User};
use crate::CoreResult;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `Conflict` when the username or email is taken.
    async fn create_user(&self, user: NewUser) -> CoreResult<User>;
    async fn find_by_username(&self, username: &str) -> CoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<User>>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: NewSession) -> CoreResult<Session>;
    /// Valid and unexpired session for this token hash.
    async fn find_active(&self, token_hash: &str) -> CoreResult<Option<Session>>;
    async fn touch(&self, session_id: Uuid) -> CoreResult<()>;
    async fn invalidate(&self, token_hash: &str) -> CoreResult<()>;
}

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    /// Marks the token used, stores the new hash and invalidates every
    /// session of the owner, atomically. `None` when the token is unknown,
    /// used or expired.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
    ) -> CoreResult<Option<Uuid>>;
}

#[async_trait]
pub trait TwoFactorRepository: Send + Sync {
    async fn get(&self, user_id: Uuid) -> CoreResult<Option<TwoFactorAuth>>;
    /// Stores a not-yet-enabled secret, replacing any earlier pending one.
    async fn upsert_pending(&self, user_id: Uuid, secret: &str) -> CoreResult<()>;
    async fn enable(&self, user_id: Uuid, backup_code_hashes: &[String]) -> CoreResult<()>;
    async fn delete(&self, user_id: Uuid) -> CoreResult<()>;
    /// Removes the hash if present. `true` only for the caller that removed it.
    async fn consume_backup_code(&self, user_id: Uuid, code_hash: &str) -> CoreResult<bool>;
}

#[async_trait]
pub trait FlightRepository: Send + Sync {
    /// Ordered by departure time.
    async fn search_flights(&self, query: &FlightQuery) -> CoreResult<Vec<Flight>>;
    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>>;
    async fn deal_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<DealCandidate>>;
}

#[async_trait]
pub trait AirportRepository: Send + Sync {
    /// Names in `language`, falling back to English, sorted by name.
    async fn list_airports(&self, language: &str) -> CoreResult<Vec<Airport>>;
}

#[async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn book_reservation(
        &self,
        user_id: Uuid,
        flight_id: Uuid,
        passengers: i32,
    ) -> CoreResult<Reservation>;
    /// Newest first.
    async fn list_reservations(&self, user_id: Uuid) -> CoreResult<Vec<ReservationView>>;
    async fn get_reservation(&self, user_id: Uuid, id: Uuid) -> CoreResult<Option<ReservationView>>;
    async fn cancel_reservation(&self, user_id: Uuid, id: Uuid) -> CoreResult<Reservation>;
}

#[async_trait]
pub trait ItineraryRepository: Send + Sync {
    async fn book_itinerary(
        &self,
        user_id: Uuid,
        flight_ids: &[Uuid],
        passengers: i32,
    ) -> CoreResult<Itinerary>;
    async fn get_itinerary(&self, user_id: Uuid, id: Uuid) -> CoreResult<Option<Itinerary>>;
    async fn cancel_itinerary(&self, user_id: Uuid, id: Uuid) -> CoreResult<Itinerary>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Records a captured payment and confirms the reservation, re-checking
    /// ownership and payability under the row lock.
    async fn record_payment(
        &self,
        user_id: Uuid,
        reservation_id: Uuid,
        captured: &CapturedPayment,
    ) -> CoreResult<Payment>;
}

#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Spends one point for `key`. `false` once `points` are used up inside
    /// the current window.
    async fn consume(&self, key: &str, points: i32, window_seconds: u64) -> CoreResult<bool>;
}

#[async_trait]
pub trait DatabaseHealth: Send + Sync {
    async fn ping(&self) -> CoreResult<()>;
}
