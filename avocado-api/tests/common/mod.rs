//! In-memory repositories and request helpers for driving the router
//! without Postgres. Seat arithmetic goes through the same
//! `avocado_core::inventory` planning as the real store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use avocado_api::state::{AppState, AuthConfig};
use avocado_api::app;
use avocado_core::booking::{
    BookingStatus, Itinerary, ItineraryLeg, PaymentStatus, Reservation, ReservationView,
};
use avocado_core::flight::{Airport, DealCandidate, Flight, FlightSummary};
use avocado_core::inventory::{plan_booking, plan_release};
use avocado_core::notify::{EmailMessage, Mailer};
use avocado_core::payment::{
    CapturedPayment, MockPaymentGateway, Payment, TransactionStatus, CARD_PAYMENT_METHOD,
};
use avocado_core::repository::*;
use avocado_core::search::FlightQuery;
use avocado_core::user::{NewSession, NewUser, Session, TwoFactorAuth, User};
use avocado_core::{CoreError, CoreResult};
use avocado_store::app_config::RateLimitConfig;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "Sup3rSecret!";

struct ResetRecord {
    user_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    used: bool,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    sessions: Vec<(String, Session)>,
    resets: Vec<ResetRecord>,
    two_factor: HashMap<Uuid, TwoFactorAuth>,
    flights: HashMap<Uuid, Flight>,
    /// code -> language -> (name, city, country)
    airports: HashMap<String, HashMap<String, (String, String, String)>>,
    reservations: Vec<Reservation>,
    itineraries: Vec<Itinerary>,
    payments: Vec<Payment>,
    rate_limits: HashMap<String, (i32, DateTime<Utc>)>,
    database_down: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn add_flight(
        &self,
        origin: &str,
        destination: &str,
        departure: DateTime<Utc>,
        price_cents: i64,
        seats: i32,
    ) -> Flight {
        let mut inner = self.inner.lock().unwrap();
        let flight = Flight {
            id: Uuid::new_v4(),
            flight_number: format!("AV{}", 100 + inner.flights.len()),
            origin: origin.into(),
            destination: destination.into(),
            departure_time: departure,
            arrival_time: departure + Duration::hours(5),
            price_cents,
            available_seats: seats,
            total_seats: seats,
        };
        inner.flights.insert(flight.id, flight.clone());
        flight
    }

    pub fn add_airport(&self, code: &str, language: &str, name: &str, city: &str, country: &str) {
        self.inner
            .lock()
            .unwrap()
            .airports
            .entry(code.into())
            .or_default()
            .insert(language.into(), (name.into(), city.into(), country.into()));
    }

    pub fn seats_left(&self, flight_id: Uuid) -> i32 {
        self.inner.lock().unwrap().flights[&flight_id].available_seats
    }

    pub fn active_sessions(&self, user_id: Uuid) -> usize {
        let now = Utc::now();
        self.inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|(_, s)| s.user_id == user_id && s.is_active(now))
            .count()
    }

    pub fn set_database_down(&self, down: bool) {
        self.inner.lock().unwrap().database_down = down;
    }

    fn airport(inner: &Inner, code: &str, language: &str) -> Airport {
        let names = inner.airports.get(code);
        let entry = names.and_then(|n| n.get(language).or_else(|| n.get("en")));
        Airport {
            code: code.into(),
            name: entry.map(|e| e.0.clone()),
            city: entry.map(|e| e.1.clone()),
            country: entry.map(|e| e.2.clone()),
        }
    }

    fn view(inner: &Inner, reservation: &Reservation) -> ReservationView {
        let f = &inner.flights[&reservation.flight_id];
        let flight = FlightSummary {
            flight_number: f.flight_number.clone(),
            origin: f.origin.clone(),
            destination: f.destination.clone(),
            departure_time: f.departure_time,
            arrival_time: f.arrival_time,
        };
        let payment = inner
            .payments
            .iter()
            .filter(|p| p.reservation_id == reservation.id)
            .max_by_key(|p| p.created_at)
            .cloned();
        ReservationView::new(reservation.clone(), flight, payment)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: NewUser) -> CoreResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if inner.users.iter().any(|u| u.username == user.username) {
            return Err(CoreError::Conflict("Username already exists".into()));
        }
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(CoreError::Conflict("Email already exists".into()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            created_at: now,
            updated_at: now,
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> CoreResult<Option<User>> {
        Ok(self.inner.lock().unwrap().users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        Ok(self.inner.lock().unwrap().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.inner.lock().unwrap().users.iter().find(|u| u.id == id).cloned())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create_session(&self, session: NewSession) -> CoreResult<Session> {
        let now = Utc::now();
        let record = Session {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            expires_at: session.expires_at,
            is_valid: true,
            created_at: now,
            last_used_at: now,
        };
        self.inner
            .lock()
            .unwrap()
            .sessions
            .push((session.token_hash, record.clone()));
        Ok(record)
    }

    async fn find_active(&self, token_hash: &str) -> CoreResult<Option<Session>> {
        let now = Utc::now();
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|(hash, s)| hash == token_hash && s.is_active(now))
            .map(|(_, s)| s.clone()))
    }

    async fn touch(&self, session_id: Uuid) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some((_, s)) = inner.sessions.iter_mut().find(|(_, s)| s.id == session_id) {
            s.last_used_at = Utc::now();
        }
        Ok(())
    }

    async fn invalidate(&self, token_hash: &str) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for (hash, s) in inner.sessions.iter_mut() {
            if hash == token_hash {
                s.is_valid = false;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PasswordResetRepository for MemoryStore {
    async fn create_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.inner.lock().unwrap().resets.push(ResetRecord {
            user_id,
            token_hash: token_hash.into(),
            expires_at,
            used: false,
        });
        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password_hash: &str,
    ) -> CoreResult<Option<Uuid>> {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();
        let Some(record) = inner
            .resets
            .iter_mut()
            .find(|r| r.token_hash == token_hash && !r.used && r.expires_at > now)
        else {
            return Ok(None);
        };
        record.used = true;
        let user_id = record.user_id;

        if let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) {
            user.password_hash = new_password_hash.into();
            user.updated_at = now;
        }
        for (_, s) in inner.sessions.iter_mut() {
            if s.user_id == user_id {
                s.is_valid = false;
            }
        }
        Ok(Some(user_id))
    }
}

#[async_trait]
impl TwoFactorRepository for MemoryStore {
    async fn get(&self, user_id: Uuid) -> CoreResult<Option<TwoFactorAuth>> {
        Ok(self.inner.lock().unwrap().two_factor.get(&user_id).cloned())
    }

    async fn upsert_pending(&self, user_id: Uuid, secret: &str) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.two_factor.get(&user_id).is_some_and(|t| t.is_enabled) {
            return Ok(());
        }
        inner.two_factor.insert(
            user_id,
            TwoFactorAuth {
                user_id,
                secret: secret.into(),
                backup_codes: Vec::new(),
                is_enabled: false,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn enable(&self, user_id: Uuid, backup_code_hashes: &[String]) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .two_factor
            .get_mut(&user_id)
            .ok_or_else(|| CoreError::NotFound("2FA setup not found".into()))?;
        record.is_enabled = true;
        record.backup_codes = backup_code_hashes.to_vec();
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> CoreResult<()> {
        self.inner.lock().unwrap().two_factor.remove(&user_id);
        Ok(())
    }

    async fn consume_backup_code(&self, user_id: Uuid, code_hash: &str) -> CoreResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        let Some(record) = inner.two_factor.get_mut(&user_id) else {
            return Ok(false);
        };
        match record.backup_codes.iter().position(|c| c == code_hash) {
            Some(index) => {
                record.backup_codes.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl FlightRepository for MemoryStore {
    async fn search_flights(&self, query: &FlightQuery) -> CoreResult<Vec<Flight>> {
        let mut flights: Vec<Flight> = self
            .inner
            .lock()
            .unwrap()
            .flights
            .values()
            .filter(|f| query.matches(f))
            .cloned()
            .collect();
        flights.sort_by_key(|f| f.departure_time);
        Ok(flights)
    }

    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        Ok(self.inner.lock().unwrap().flights.get(&id).cloned())
    }

    async fn deal_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<DealCandidate>> {
        let inner = self.inner.lock().unwrap();
        let mut candidates = Vec::new();
        for flight in inner.flights.values() {
            if flight.departure_time < from || flight.departure_time >= to {
                continue;
            }
            let route: Vec<i64> = inner
                .flights
                .values()
                .filter(|f| f.origin == flight.origin && f.destination == flight.destination)
                .map(|f| f.price_cents)
                .collect();
            let average = route.iter().sum::<i64>() as f64 / route.len() as f64;
            candidates.push(DealCandidate {
                flight: flight.clone(),
                route_average_cents: average,
                origin: Self::airport(&inner, &flight.origin, "en"),
                destination: Self::airport(&inner, &flight.destination, "en"),
            });
        }
        Ok(candidates)
    }
}

#[async_trait]
impl AirportRepository for MemoryStore {
    async fn list_airports(&self, language: &str) -> CoreResult<Vec<Airport>> {
        let inner = self.inner.lock().unwrap();
        let mut airports: Vec<Airport> = inner
            .airports
            .keys()
            .map(|code| Self::airport(&inner, code, language))
            .collect();
        airports.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(airports)
    }
}

#[async_trait]
impl ReservationRepository for MemoryStore {
    async fn book_reservation(
        &self,
        user_id: Uuid,
        flight_id: Uuid,
        passengers: i32,
    ) -> CoreResult<Reservation> {
        let mut inner = self.inner.lock().unwrap();
        let flight = inner
            .flights
            .get_mut(&flight_id)
            .ok_or_else(|| CoreError::NotFound(format!("Flight {} not found", flight_id)))?;
        let plan = plan_booking(&[flight.seat_state()], passengers)?;
        flight.available_seats = plan.legs[0].seats_after;

        let now = Utc::now();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            user_id,
            flight_id,
            passengers,
            total_price_cents: plan.total_price_cents,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            created_at: now,
            updated_at: now,
        };
        inner.reservations.push(reservation.clone());
        Ok(reservation)
    }

    async fn list_reservations(&self, user_id: Uuid) -> CoreResult<Vec<ReservationView>> {
        let inner = self.inner.lock().unwrap();
        let mut views: Vec<ReservationView> = inner
            .reservations
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .map(|r| Self::view(&inner, r))
            .collect();
        views.sort_by(|a, b| b.reservation.created_at.cmp(&a.reservation.created_at));
        Ok(views)
    }

    async fn get_reservation(&self, user_id: Uuid, id: Uuid) -> CoreResult<Option<ReservationView>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reservations
            .iter()
            .find(|r| r.id == id && r.user_id == user_id)
            .map(|r| Self::view(&inner, r)))
    }

    async fn cancel_reservation(&self, user_id: Uuid, id: Uuid) -> CoreResult<Reservation> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner
            .reservations
            .iter()
            .position(|r| r.id == id && r.user_id == user_id)
            .ok_or_else(|| CoreError::NotFound("Reservation not found".into()))?;
        let reservation = inner.reservations[index].clone();
        reservation.ensure_active()?;

        let flight = inner
            .flights
            .get_mut(&reservation.flight_id)
            .ok_or_else(|| CoreError::NotFound("Flight not found".into()))?;
        let release = plan_release(&flight.seat_state(), reservation.passengers)?;
        flight.available_seats = release.seats_after;

        let payment_status = reservation.payment_status.after_cancellation();
        if payment_status == PaymentStatus::Refunded {
            for payment in inner.payments.iter_mut().filter(|p| p.reservation_id == id) {
                payment.status = TransactionStatus::Refunded;
            }
        }
        let updated = &mut inner.reservations[index];
        updated.status = BookingStatus::Cancelled;
        updated.payment_status = payment_status;
        updated.updated_at = Utc::now();
        Ok(updated.clone())
    }
}

#[async_trait]
impl ItineraryRepository for MemoryStore {
    async fn book_itinerary(
        &self,
        user_id: Uuid,
        flight_ids: &[Uuid],
        passengers: i32,
    ) -> CoreResult<Itinerary> {
        let mut inner = self.inner.lock().unwrap();
        let states = flight_ids
            .iter()
            .map(|id| {
                inner
                    .flights
                    .get(id)
                    .map(Flight::seat_state)
                    .ok_or_else(|| CoreError::NotFound(format!("Flight {} not found", id)))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        let plan = plan_booking(&states, passengers)?;

        let mut legs = Vec::with_capacity(plan.legs.len());
        for leg in &plan.legs {
            let flight = inner
                .flights
                .get_mut(&leg.flight_id)
                .ok_or_else(|| CoreError::NotFound("Flight not found".into()))?;
            flight.available_seats = leg.seats_after;
            legs.push(ItineraryLeg {
                sequence_number: leg.sequence_number,
                flight: flight.clone(),
            });
        }

        let now = Utc::now();
        let itinerary = Itinerary {
            id: Uuid::new_v4(),
            user_id,
            total_price_cents: plan.total_price_cents,
            passenger_count: passengers,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            created_at: now,
            updated_at: now,
            legs,
        };
        inner.itineraries.push(itinerary.clone());
        Ok(itinerary)
    }

    async fn get_itinerary(&self, user_id: Uuid, id: Uuid) -> CoreResult<Option<Itinerary>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .itineraries
            .iter()
            .find(|i| i.id == id && i.user_id == user_id)
            .cloned())
    }

    async fn cancel_itinerary(&self, user_id: Uuid, id: Uuid) -> CoreResult<Itinerary> {
        let mut inner = self.inner.lock().unwrap();
        let index = inner
            .itineraries
            .iter()
            .position(|i| i.id == id && i.user_id == user_id)
            .ok_or_else(|| CoreError::NotFound("Itinerary not found".into()))?;
        let itinerary = inner.itineraries[index].clone();
        itinerary.ensure_active()?;

        for flight_id in itinerary.flight_ids() {
            let flight = inner
                .flights
                .get_mut(&flight_id)
                .ok_or_else(|| CoreError::NotFound("Flight not found".into()))?;
            let release = plan_release(&flight.seat_state(), itinerary.passenger_count)?;
            flight.available_seats = release.seats_after;
        }

        let updated = &mut inner.itineraries[index];
        updated.status = BookingStatus::Cancelled;
        updated.payment_status = updated.payment_status.after_cancellation();
        updated.updated_at = Utc::now();
        Ok(updated.clone())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn record_payment(
        &self,
        user_id: Uuid,
        reservation_id: Uuid,
        captured: &CapturedPayment,
    ) -> CoreResult<Payment> {
        let mut inner = self.inner.lock().unwrap();
        let reservation = inner
            .reservations
            .iter_mut()
            .find(|r| r.id == reservation_id && r.user_id == user_id)
            .ok_or_else(|| CoreError::NotFound("Reservation not found".into()))?;
        reservation.ensure_payable()?;

        let now = Utc::now();
        reservation.status = BookingStatus::Confirmed;
        reservation.payment_status = PaymentStatus::Paid;
        reservation.updated_at = now;

        let payment = Payment {
            id: Uuid::new_v4(),
            reservation_id,
            amount_cents: reservation.total_price_cents,
            payment_method: CARD_PAYMENT_METHOD.into(),
            card_last_four: captured.card_last_four.clone(),
            transaction_id: captured.transaction_id.clone(),
            status: TransactionStatus::Completed,
            created_at: now,
        };
        inner.payments.push(payment.clone());
        Ok(payment)
    }
}

#[async_trait]
impl RateLimitRepository for MemoryStore {
    async fn consume(&self, key: &str, points: i32, window_seconds: u64) -> CoreResult<bool> {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .rate_limits
            .entry(key.to_string())
            .or_insert((0, now + Duration::seconds(window_seconds as i64)));
        if entry.1 <= now {
            *entry = (0, now + Duration::seconds(window_seconds as i64));
        }
        entry.0 += 1;
        Ok(entry.0 <= points)
    }
}

#[async_trait]
impl DatabaseHealth for MemoryStore {
    async fn ping(&self) -> CoreResult<()> {
        if self.inner.lock().unwrap().database_down {
            return Err(CoreError::InternalError("connection refused".into()));
        }
        Ok(())
    }
}

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> CoreResult<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
}

pub fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::default());
    let mailer = Arc::new(RecordingMailer::default());

    let state = AppState {
        users: store.clone(),
        sessions: store.clone(),
        password_resets: store.clone(),
        two_factor: store.clone(),
        flights: store.clone(),
        airports: store.clone(),
        reservations: store.clone(),
        itineraries: store.clone(),
        payments: store.clone(),
        rate_limits: store.clone(),
        health: store.clone(),
        payment_gateway: Arc::new(MockPaymentGateway),
        mailer: mailer.clone(),
        auth: AuthConfig {
            secret: "test-secret".into(),
            expiration: 3600,
            reset_token_seconds: 3600,
            totp_issuer: "Avocado Air".into(),
            cookie_secure: false,
        },
        rate_limit: RateLimitConfig {
            points: 5,
            window_seconds: 900,
        },
        frontend_url: "http://localhost:8080".into(),
        cors_origins: Vec::new(),
        static_dir: None,
        started_at: Instant::now(),
    };

    let router = app(state).layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));
    TestApp { router, store, mailer }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Registers `username` and returns its bearer token.
    pub async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                serde_json::json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": PASSWORD,
                    "firstName": "Test",
                    "lastName": "Traveller",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }
}
