use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use ryde_domain::{Booking, BookingCharges, BookingStatus, NewBooking};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AuthedUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_my_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/status", post(transition_status))
        .route("/v1/bookings/{id}/pay", post(pay_booking))
        .route("/v1/cars/{car_id}/bookings", get(list_car_bookings))
}

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    car_id: Uuid,
    owner_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    total_amount: i64,
    service_fee: i64,
    insurance: i64,
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state
        .bookings
        .create_booking(NewBooking {
            car_id: req.car_id,
            renter_id: user.id,
            owner_id: req.owner_id,
            start_date: req.start_date,
            end_date: req.end_date,
            start_time: req.start_time,
            end_time: req.end_time,
            charges: BookingCharges {
                total_amount: req.total_amount,
                service_fee: req.service_fee,
                insurance: req.insurance,
            },
        })
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

async fn get_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.get_booking(id).await?;

    if user.id != booking.renter_id && user.id != booking.owner_id {
        return Err(AppError::AuthorizationError(
            "not a participant of this booking".into(),
        ));
    }

    Ok(Json(booking))
}

async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state.bookings.list_bookings_for_user(user.id).await?;
    Ok(Json(bookings))
}

#[derive(Debug, Deserialize)]
struct CarBookingsQuery {
    #[serde(default)]
    active_only: bool,
}

async fn list_car_bookings(
    State(state): State<AppState>,
    Path(car_id): Path<Uuid>,
    Query(query): Query<CarBookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state
        .bookings
        .list_bookings_for_car(car_id, query.active_only)
        .await?;
    Ok(Json(bookings))
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    status: String,
    reason: Option<String>,
}

async fn transition_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Booking>, AppError> {
    let target = BookingStatus::parse(&req.status)
        .ok_or_else(|| AppError::ValidationError(format!("unknown status: {}", req.status)))?;

    let booking = state
        .bookings
        .transition_status(id, target, user.id, req.reason)
        .await?;

    Ok(Json(booking))
}

/// Charge the renter through the payment gateway, then record the outcome.
/// The booking auto-advances to Confirmed when the charge settles while it
/// is still Pending.
async fn pay_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.bookings.get_booking(id).await?;

    if user.id != booking.renter_id {
        return Err(AppError::AuthorizationError(
            "only the renter pays for a booking".into(),
        ));
    }

    let charge = state
        .payments
        .charge(booking.id, booking.charges.total_amount)
        .await
        .map_err(|e| AppError::InternalServerError(format!("payment gateway error: {e}")))?;

    info!(booking_id = %booking.id, reference = %charge.reference, "charge attempted");

    let updated = state.bookings.record_payment(id, charge.outcome).await?;
    Ok(Json(updated))
}
