use std::sync::Arc;
use std::time::Instant;

use avocado_core::notify::Mailer;
use avocado_core::payment::{MockPaymentGateway, PaymentGateway};
use avocado_core::repository::{
    AirportRepository, DatabaseHealth, FlightRepository, ItineraryRepository, PasswordResetRepository,
    PaymentRepository, RateLimitRepository, ReservationRepository, SessionRepository, TwoFactorRepository,
    UserRepository,
};
use avocado_store::app_config::{Config, RateLimitConfig};
use avocado_store::{
    DbClient, StoreAirportRepository, StoreFlightRepository, StoreItineraryRepository,
    StorePasswordResetRepository, StorePaymentRepository, StoreRateLimitRepository, StoreReservationRepository,
    StoreSessionRepository, StoreTwoFactorRepository, StoreUserRepository,
};

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    pub reset_token_seconds: u64,
    pub totp_issuer: String,
    pub cookie_secure: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub password_resets: Arc<dyn PasswordResetRepository>,
    pub two_factor: Arc<dyn TwoFactorRepository>,
    pub flights: Arc<dyn FlightRepository>,
    pub airports: Arc<dyn AirportRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
    pub itineraries: Arc<dyn ItineraryRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub rate_limits: Arc<dyn RateLimitRepository>,
    pub health: Arc<dyn DatabaseHealth>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub frontend_url: String,
    pub cors_origins: Vec<String>,
    pub static_dir: Option<String>,
    pub started_at: Instant,
}

impl AppState {
    /// Wires every repository to the Postgres pool.
    pub fn from_store(db: Arc<DbClient>, config: &Config, mailer: Arc<dyn Mailer>) -> Self {
        let pool = db.pool.clone();
        AppState {
            users: Arc::new(StoreUserRepository::new(pool.clone())),
            sessions: Arc::new(StoreSessionRepository::new(pool.clone())),
            password_resets: Arc::new(StorePasswordResetRepository::new(pool.clone())),
            two_factor: Arc::new(StoreTwoFactorRepository::new(pool.clone())),
            flights: Arc::new(StoreFlightRepository::new(pool.clone())),
            airports: Arc::new(StoreAirportRepository::new(pool.clone())),
            reservations: Arc::new(StoreReservationRepository::new(pool.clone())),
            itineraries: Arc::new(StoreItineraryRepository::new(pool.clone())),
            payments: Arc::new(StorePaymentRepository::new(pool.clone())),
            rate_limits: Arc::new(StoreRateLimitRepository::new(pool)),
            health: db,
            payment_gateway: Arc::new(MockPaymentGateway),
            mailer,
            auth: AuthConfig::from(config),
            rate_limit: config.rate_limit.clone(),
            frontend_url: config.email.frontend_url.clone(),
            cors_origins: config.server.cors_origins.clone(),
            static_dir: config.server.static_dir.clone(),
            started_at: Instant::now(),
        }
    }
}

impl From<&Config> for AuthConfig {
    fn from(config: &Config) -> Self {
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            reset_token_seconds: config.auth.reset_token_seconds,
            totp_issuer: config.auth.totp_issuer.clone(),
            cookie_secure: config.auth.cookie_secure,
        }
    }
}
