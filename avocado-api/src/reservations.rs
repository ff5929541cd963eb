use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use avocado_core::booking::{Reservation, ReservationView};
use avocado_core::payment::{CapturedPayment, CardCharge, Payment};
use avocado_core::validators::{is_valid_cvv, is_valid_expiration_date, is_valid_passenger_count, luhn_check};
use avocado_shared::pii::{card_last_four, Masked};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Violations};
use crate::extract::{AppJson, AppPath};
use crate::middleware::{require_auth, AuthUser};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateReservationRequest {
    /// Kept as text so a malformed id is reported against the field.
    pub flight_id: Option<String>,
    pub passengers: i32,
}

impl CreateReservationRequest {
    fn flight_id(&self) -> Option<Uuid> {
        self.flight_id.as_deref().and_then(|id| Uuid::parse_str(id.trim()).ok())
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentRequest {
    pub card_number: Masked<String>,
    pub expiration_date: String,
    pub cvv: Masked<String>,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "City/State/Zip is required"))]
    pub city_state_zip: String,
}

impl PaymentRequest {
    fn check(&self) -> Result<(), AppError> {
        let mut v = Violations::from_validation(self.validate());
        v.check(luhn_check(self.card_number.expose()), "cardNumber", "Invalid credit card number");
        v.check(
            is_valid_expiration_date(&self.expiration_date, Utc::now().date_naive()),
            "expirationDate",
            "Invalid or expired card",
        );
        v.check(is_valid_cvv(self.cvv.expose()), "cvv", "CVV must be 3-4 digits");
        v.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct ReservationResponse<T> {
    pub message: String,
    pub reservation: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub message: String,
    pub reservation_id: Uuid,
    pub transaction_id: String,
    pub status: String,
    pub payment: Payment,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/reservations", post(create_reservation).get(list_reservations))
        .route("/reservations/{id}", get(get_reservation).delete(cancel_reservation))
        .route("/reservations/{id}/payment", post(pay_reservation))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

// ============================================================================
// Handlers
// ============================================================================

async fn create_reservation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppJson(req): AppJson<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ReservationResponse<ReservationView>>), AppError> {
    let flight_id = req.flight_id();
    let mut v = Violations::default();
    v.check(flight_id.is_some(), "flightId", "Valid flight ID is required");
    v.check(is_valid_passenger_count(req.passengers), "passengers", "Passengers must be between 1 and 9");
    v.into_result()?;
    let flight_id = flight_id.ok_or_else(|| AppError::field("flightId", "Valid flight ID is required"))?;

    let reservation = state
        .reservations
        .book_reservation(user.user_id, flight_id, req.passengers)
        .await?;
    tracing::info!(
        reservation_id = %reservation.id,
        user_id = %user.user_id,
        %flight_id,
        passengers = req.passengers,
        "Reservation created"
    );

    let view = state
        .reservations
        .get_reservation(user.user_id, reservation.id)
        .await?
        .ok_or_else(|| AppError::InternalServerError(format!("Reservation {} vanished after booking", reservation.id)))?;

    Ok((
        StatusCode::CREATED,
        Json(ReservationResponse {
            message: "Reservation created successfully".into(),
            reservation: view,
        }),
    ))
}

async fn list_reservations(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<ReservationView>>, AppError> {
    Ok(Json(state.reservations.list_reservations(user.user_id).await?))
}

async fn get_reservation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ReservationView>, AppError> {
    state
        .reservations
        .get_reservation(user.user_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError("Reservation not found".into()))
}

async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ReservationResponse<Reservation>>, AppError> {
    let reservation = state.reservations.cancel_reservation(user.user_id, id).await?;
    tracing::info!(
        reservation_id = %id,
        user_id = %user.user_id,
        payment_status = %reservation.payment_status,
        "Reservation cancelled"
    );
    Ok(Json(ReservationResponse {
        message: "Reservation cancelled successfully".into(),
        reservation,
    }))
}

async fn pay_reservation(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<PaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    req.check()?;

    let view = state
        .reservations
        .get_reservation(user.user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("Reservation not found".into()))?;
    view.reservation.ensure_payable()?;

    let charge = CardCharge {
        reservation_id: id,
        amount_cents: view.reservation.total_price_cents,
        card_last_four: card_last_four(req.card_number.expose()),
        cardholder_name: format!("{} {}", req.first_name, req.last_name),
    };
    let transaction_id = state.payment_gateway.capture(&charge).await?;

    let payment = state
        .payments
        .record_payment(
            user.user_id,
            id,
            &CapturedPayment {
                card_last_four: charge.card_last_four,
                transaction_id: transaction_id.clone(),
            },
        )
        .await?;
    tracing::info!(reservation_id = %id, %transaction_id, "Payment processed");

    Ok(Json(PaymentResponse {
        message: "Payment processed successfully".into(),
        reservation_id: id,
        transaction_id,
        status: "confirmed".into(),
        payment,
    }))
}
