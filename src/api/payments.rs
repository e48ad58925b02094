//! Payment initiation, the gateway callback, and the manual re-check.

use axum::{
    extract::{Form, Path, State},
    Json,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::ApiError;
use crate::db::{Reservation, ReservationStatus};
use crate::payment::{self, Payer, PaymentError, PaymentInit, ResolvedPayment};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub booking_number: String,
}

/// Start a hosted-checkout transaction for the amount currently due on a
/// booking group.
///
/// POST /api/payments/initiate
pub async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<Json<PaymentInit>, ApiError> {
    let reservations: Vec<Reservation> =
        sqlx::query_as("SELECT * FROM reservations WHERE booking_number = ?")
            .bind(&req.booking_number)
            .fetch_all(&state.db)
            .await?;

    let first = reservations
        .first()
        .ok_or_else(|| ApiError::not_found("Booking not found"))?;

    if reservations
        .iter()
        .all(|r| r.status == ReservationStatus::Confirmed)
    {
        return Err(ApiError::conflict("Booking is already paid"));
    }
    if reservations
        .iter()
        .all(|r| r.status == ReservationStatus::Failed)
    {
        return Err(ApiError::conflict("Booking has already failed"));
    }

    // Amount due now is the advance across the group, per the configured
    // advance policy captured at booking time
    let amount: f64 = reservations.iter().map(|r| r.advance_paid).sum();
    let payer = Payer {
        name: first.guest_name.clone(),
        email: first.guest_email.clone(),
        phone: first.guest_phone.clone(),
    };

    let init = state
        .gateway
        .initiate(&state.db, amount, &payer, &req.booking_number)
        .await?;

    Ok(Json(init))
}

/// The gateway's asynchronous, signed, form-encoded result notification.
///
/// POST /payments/callback
pub async fn payment_callback(
    State(state): State<Arc<AppState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<&'static str, ApiError> {
    match payment::resolve_callback(&state.db, &state.mailer, &state.gateway, &fields).await {
        Ok(resolved) => {
            tracing::info!(outcome = ?resolved.outcome, "Payment callback processed");
            Ok("OK")
        }
        Err(err @ PaymentError::SignatureMismatch(_)) => {
            // Forged or corrupted callback. Nothing was mutated.
            tracing::error!("{err}");
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Poll the gateway for a transaction's status and apply the result
/// through the same mapping as the callback.
///
/// POST /api/admin/payments/:transaction_id/recheck
pub async fn recheck_payment(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<ResolvedPayment>, ApiError> {
    let resolved =
        payment::check_status(&state.db, &state.mailer, &state.gateway, &transaction_id).await?;
    Ok(Json(resolved))
}
