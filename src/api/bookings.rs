//! Availability search, booking creation, and admin booking review.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{parse_date, validate_email, validate_guest_name, validate_phone};
use crate::booking::{
    self, AvailabilityQuery, BookingOutcome, BookingRequest,
};
use crate::db::{PaymentLog, PaymentStatus, Reservation, ReservationStatus, RoomResponse};
use crate::notifications;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub check_in: String,
    pub check_out: String,
    pub room_type: Option<String>,
    pub guests: Option<i64>,
}

/// Search rooms free for a date range
///
/// GET /api/availability
pub async fn search_availability(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AvailabilityParams>,
) -> Result<Json<Vec<RoomResponse>>, ApiError> {
    let check_in = parse_date(&params.check_in, "check_in")
        .map_err(|e| ApiError::validation_field("check_in", e))?;
    let check_out = parse_date(&params.check_out, "check_out")
        .map_err(|e| ApiError::validation_field("check_out", e))?;

    let query = AvailabilityQuery {
        check_in,
        check_out,
        room_type: params.room_type,
        min_capacity: params.guests,
    };

    let rooms = booking::find_available_rooms(&state.db, &query).await?;
    Ok(Json(rooms.into_iter().map(RoomResponse::from).collect()))
}

fn validate_booking_request(req: &BookingRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_guest_name(&req.guest.name) {
        errors.add("guest.name", &e);
    }
    if let Err(e) = validate_email(&req.guest.email) {
        errors.add("guest.email", &e);
    }
    if let Err(e) = validate_phone(&req.guest.phone) {
        errors.add("guest.phone", &e);
    }
    if req.items.is_empty() {
        errors.add("items", "At least one room item is required");
    }
    for (index, item) in req.items.iter().enumerate() {
        if item.room_id.is_none() && item.room_type.is_none() {
            errors.add(
                format!("items[{index}]"),
                "Each item must name a room_id or a room_type",
            );
        }
        if item.quantity == 0 {
            errors.add(format!("items[{index}].quantity"), "Quantity must be at least 1");
        }
    }

    errors.finish()
}

/// Create a booking. Partial success is a normal outcome: the response can
/// carry both created reservations and per-item errors.
///
/// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingOutcome>), ApiError> {
    validate_booking_request(&req)?;

    let outcome = booking::create_booking(&state.db, &state.config.booking, &req).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Snapshot of a booking group: its reservations plus any payment
/// transactions, so a client can tell pending / confirmed / failed apart.
#[derive(Debug, Serialize)]
pub struct BookingGroupResponse {
    pub booking_number: String,
    pub reservations: Vec<Reservation>,
    pub payments: Vec<PaymentLog>,
}

/// GET /api/bookings/:booking_number
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_number): Path<String>,
) -> Result<Json<BookingGroupResponse>, ApiError> {
    let reservations: Vec<Reservation> =
        sqlx::query_as("SELECT * FROM reservations WHERE booking_number = ? ORDER BY id ASC")
            .bind(&booking_number)
            .fetch_all(&state.db)
            .await?;

    if reservations.is_empty() {
        return Err(ApiError::not_found("Booking not found"));
    }

    let payments: Vec<PaymentLog> = sqlx::query_as(
        "SELECT * FROM payment_logs WHERE booking_number = ? ORDER BY created_at ASC",
    )
    .bind(&booking_number)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(BookingGroupResponse {
        booking_number,
        reservations,
        payments,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BookingListParams {
    pub status: Option<String>,
}

/// List reservations, optionally filtered by status
///
/// GET /api/admin/bookings
pub async fn admin_list_bookings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BookingListParams>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let reservations: Vec<Reservation> = match params.status.as_deref() {
        Some(raw) => {
            let status = ReservationStatus::parse(raw).ok_or_else(|| {
                ApiError::validation_field("status", format!("Unknown status '{raw}'"))
            })?;
            sqlx::query_as(
                "SELECT * FROM reservations WHERE status = ? ORDER BY created_at DESC",
            )
            .bind(status)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM reservations ORDER BY created_at DESC")
                .fetch_all(&state.db)
                .await?
        }
    };

    Ok(Json(reservations))
}

/// Approve a booking out of band (e.g. verified bank transfer). Goes
/// through the same state machine as the gateway callback.
///
/// POST /api/admin/bookings/:booking_number/approve
pub async fn approve_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_number): Path<String>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let updated = booking::transition_group(
        &state.db,
        &booking_number,
        ReservationStatus::Confirmed,
        PaymentStatus::Paid,
    )
    .await?;

    tracing::info!(%booking_number, "Booking approved by admin");
    notifications::spawn_confirmation(state.mailer.clone(), updated.clone());
    Ok(Json(updated))
}

/// Reject a booking, releasing its room holds.
///
/// POST /api/admin/bookings/:booking_number/reject
pub async fn reject_booking(
    State(state): State<Arc<AppState>>,
    Path(booking_number): Path<String>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let updated = booking::transition_group(
        &state.db,
        &booking_number,
        ReservationStatus::Failed,
        PaymentStatus::Failed,
    )
    .await?;

    tracing::info!(%booking_number, "Booking rejected by admin");
    notifications::spawn_rejection(state.mailer.clone(), updated.clone());
    Ok(Json(updated))
}
