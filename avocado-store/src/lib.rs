pub mod airport_repo;
pub mod app_config;
pub mod database;
pub mod error;
pub mod flight_repo;
pub mod itinerary_repo;
pub mod mailer;
pub mod password_reset_repo;
pub mod payment_repo;
pub mod rate_limit_repo;
pub mod reservation_repo;
pub mod session_repo;
pub mod two_factor_repo;
pub mod user_repo;

pub use airport_repo::StoreAirportRepository;
pub use database::DbClient;
pub use flight_repo::StoreFlightRepository;
pub use itinerary_repo::StoreItineraryRepository;
pub use mailer::{mailer_from_config, LogMailer, SmtpMailer};
pub use password_reset_repo::StorePasswordResetRepository;
pub use payment_repo::StorePaymentRepository;
pub use rate_limit_repo::StoreRateLimitRepository;
pub use reservation_repo::StoreReservationRepository;
pub use session_repo::StoreSessionRepository;
pub use two_factor_repo::StoreTwoFactorRepository;
pub use user_repo::StoreUserRepository;
