//! Payment handoff: signed initiation against the hosted gateway, callback
//! verification, and status resolution.
//!
//! The gateway reports a transaction's fate twice over: an asynchronous
//! signed callback, and an authenticated retrieve endpoint administrators
//! can poll. Both paths funnel through [`apply_gateway_status`] so the
//! status mapping can never diverge.

pub mod hash;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::booking::{transition_group, BookingError};
use crate::config::GatewayConfig;
use crate::db::{DbPool, PaymentLog, PaymentStatus, Reservation, ReservationStatus};
use crate::notifications::{self, BookingMailer};

#[derive(Debug, Error)]
pub enum PaymentError {
    /// Gateway unreachable or credentials missing; safe to retry later
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The callback signature did not verify. Fail closed: no state change.
    #[error("Signature mismatch on payment callback for transaction {0}")]
    SignatureMismatch(String),

    #[error("Malformed gateway payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown transaction {0}")]
    UnknownTransaction(String),

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// What a gateway-reported status means for the reservation group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Paid,
    Failed,
    /// Interim state ("pending", "dropped"): log it, touch nothing else
    PendingRetry,
}

/// Fixed mapping from the gateway's status vocabulary. Used identically by
/// the callback path and the manual re-check path.
pub fn map_gateway_status(raw: &str) -> PaymentOutcome {
    match raw.trim().to_lowercase().as_str() {
        "success" => PaymentOutcome::Paid,
        "failure" | "failed" | "cancel" | "cancelled" => PaymentOutcome::Failed,
        // "pending", "dropped", "in progress", and anything unrecognized:
        // leave the reservations alone until the gateway makes up its mind
        _ => PaymentOutcome::PendingRetry,
    }
}

#[derive(Debug, Clone)]
pub struct Payer {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentInit {
    pub transaction_id: String,
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
pub struct ResolvedPayment {
    pub outcome: PaymentOutcome,
    pub reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
struct InitiateResponse {
    status: i64,
    data: String,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    status: String,
}

pub struct PaymentGateway {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl PaymentGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), PaymentError> {
        match (&self.config.merchant_key, &self.config.salt) {
            (Some(key), Some(salt)) => Ok((key, salt)),
            _ => Err(PaymentError::GatewayUnavailable(
                "gateway credentials are not configured".to_string(),
            )),
        }
    }

    /// Start a hosted-checkout transaction. The payment log row is written
    /// before the gateway is contacted, so an initiated transaction always
    /// has a trace even if the redirect is never followed.
    pub async fn initiate(
        &self,
        db: &DbPool,
        amount: f64,
        payer: &Payer,
        reference: &str,
    ) -> Result<PaymentInit, PaymentError> {
        let (key, salt) = self.credentials()?;
        let transaction_id = Uuid::new_v4().simple().to_string();

        let mut fields: HashMap<String, String> = HashMap::new();
        fields.insert("key".to_string(), key.to_string());
        fields.insert("txnid".to_string(), transaction_id.clone());
        fields.insert("amount".to_string(), format!("{amount:.2}"));
        fields.insert("productinfo".to_string(), reference.to_string());
        fields.insert("firstname".to_string(), payer.name.clone());
        fields.insert("email".to_string(), payer.email.clone());
        fields.insert("phone".to_string(), payer.phone.clone());
        if let Some(surl) = &self.config.success_url {
            fields.insert("surl".to_string(), surl.clone());
        }
        if let Some(furl) = &self.config.failure_url {
            fields.insert("furl".to_string(), furl.clone());
        }
        let signature = hash::request_signature(&fields, &self.config.hash_sequence, salt);
        fields.insert("hash".to_string(), signature);

        record_initiated(db, &transaction_id, reference, amount).await?;

        let response = self
            .http
            .post(format!("{}/_payment", self.config.base_url))
            .form(&fields)
            .send()
            .await
            .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::GatewayUnavailable(format!(
                "gateway returned HTTP {}",
                response.status()
            )));
        }

        let body: InitiateResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;

        if body.status != 1 {
            return Err(PaymentError::GatewayUnavailable(format!(
                "gateway rejected initiation: {}",
                body.data
            )));
        }

        info!(%transaction_id, %reference, amount, "Payment initiated");

        Ok(PaymentInit {
            redirect_url: format!("{}/pay/{}", self.config.base_url, body.data),
            transaction_id,
        })
    }

    /// Recompute the callback signature and compare it, constant-time,
    /// against the one the gateway sent. A mismatch is fatal for the
    /// callback; nothing may be mutated after it.
    pub fn verify_callback(&self, fields: &HashMap<String, String>) -> Result<(), PaymentError> {
        let (_, salt) = self.credentials()?;
        let transaction_id = fields
            .get("txnid")
            .cloned()
            .unwrap_or_else(|| "<missing txnid>".to_string());

        let provided = fields
            .get("hash")
            .ok_or_else(|| PaymentError::SignatureMismatch(transaction_id.clone()))?;
        let expected = hash::callback_signature(fields, &self.config.hash_sequence, salt);

        if !hash::digests_match(&expected, provided) {
            return Err(PaymentError::SignatureMismatch(transaction_id));
        }
        Ok(())
    }

    /// Poll the gateway's retrieve endpoint for a transaction's current
    /// status, authenticated with the same keyed-hash scheme.
    pub async fn fetch_status(&self, transaction_id: &str) -> Result<String, PaymentError> {
        let (key, salt) = self.credentials()?;
        let signature = hash::keyed_hash(&[key, transaction_id, salt]);

        let mut form: HashMap<&str, &str> = HashMap::new();
        form.insert("key", key);
        form.insert("txnid", transaction_id);
        form.insert("hash", &signature);

        let response = self
            .http
            .post(format!("{}/retrieve", self.config.base_url))
            .form(&form)
            .send()
            .await
            .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaymentError::GatewayUnavailable(format!(
                "gateway returned HTTP {}",
                response.status()
            )));
        }

        let body: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::GatewayUnavailable(e.to_string()))?;
        Ok(body.status)
    }
}

/// Write the initial payment log row, status "initiated".
pub(crate) async fn record_initiated(
    db: &DbPool,
    transaction_id: &str,
    booking_number: &str,
    amount: f64,
) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO payment_logs (transaction_id, booking_number, amount, status, created_at, updated_at) \
         VALUES (?, ?, ?, 'initiated', ?, ?)",
    )
    .bind(transaction_id)
    .bind(booking_number)
    .bind(amount)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;
    Ok(())
}

/// Handle a verified gateway callback end to end: record it, map the
/// status, and move the reservation group when the status is final.
pub async fn resolve_callback(
    db: &DbPool,
    mailer: &Arc<BookingMailer>,
    gateway: &PaymentGateway,
    fields: &HashMap<String, String>,
) -> Result<ResolvedPayment, PaymentError> {
    gateway.verify_callback(fields)?;

    let transaction_id = fields
        .get("txnid")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PaymentError::MalformedPayload("missing txnid".to_string()))?
        .clone();
    let raw_status = fields
        .get("status")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PaymentError::MalformedPayload("missing status".to_string()))?
        .clone();
    let raw_payload = serde_json::to_string(fields)
        .map_err(|e| PaymentError::MalformedPayload(e.to_string()))?;

    apply_gateway_status(db, mailer, &transaction_id, &raw_status, Some(&raw_payload)).await
}

/// Administrators can poll the gateway when a callback never arrived; the
/// reported status goes through the exact same mapping as the callback.
pub async fn check_status(
    db: &DbPool,
    mailer: &Arc<BookingMailer>,
    gateway: &PaymentGateway,
    transaction_id: &str,
) -> Result<ResolvedPayment, PaymentError> {
    let raw_status = gateway.fetch_status(transaction_id).await?;
    let raw_payload = serde_json::json!({ "status": raw_status }).to_string();
    apply_gateway_status(db, mailer, transaction_id, &raw_status, Some(&raw_payload)).await
}

/// Apply a gateway-reported status: always update the payment log, and on
/// a final status transition the booking group and notify the guest.
pub async fn apply_gateway_status(
    db: &DbPool,
    mailer: &Arc<BookingMailer>,
    transaction_id: &str,
    raw_status: &str,
    raw_payload: Option<&str>,
) -> Result<ResolvedPayment, PaymentError> {
    let log: Option<PaymentLog> =
        sqlx::query_as("SELECT * FROM payment_logs WHERE transaction_id = ?")
            .bind(transaction_id)
            .fetch_optional(db)
            .await?;
    let log = log.ok_or_else(|| PaymentError::UnknownTransaction(transaction_id.to_string()))?;

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query(
        "UPDATE payment_logs SET status = ?, raw_payload = COALESCE(?, raw_payload), updated_at = ? \
         WHERE transaction_id = ?",
    )
    .bind(raw_status)
    .bind(raw_payload)
    .bind(&now)
    .bind(transaction_id)
    .execute(db)
    .await?;

    let outcome = map_gateway_status(raw_status);
    info!(%transaction_id, %raw_status, ?outcome, "Gateway status applied");

    let booking_number = match &log.booking_number {
        Some(number) => number.clone(),
        None => {
            warn!(%transaction_id, "Payment log has no booking number; log updated only");
            return Ok(ResolvedPayment {
                outcome,
                reservations: Vec::new(),
            });
        }
    };

    let reservations = match outcome {
        PaymentOutcome::Paid => {
            let rows = transition_group(
                db,
                &booking_number,
                ReservationStatus::Confirmed,
                PaymentStatus::Paid,
            )
            .await?;
            notifications::spawn_confirmation(mailer.clone(), rows.clone());
            rows
        }
        PaymentOutcome::Failed => {
            let rows = transition_group(
                db,
                &booking_number,
                ReservationStatus::Failed,
                PaymentStatus::Failed,
            )
            .await?;
            notifications::spawn_rejection(mailer.clone(), rows.clone());
            rows
        }
        PaymentOutcome::PendingRetry => Vec::new(),
    };

    Ok(ResolvedPayment {
        outcome,
        reservations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{create_booking, BookingItem, BookingRequest};
    use crate::config::{BookingConfig, EmailConfig};
    use crate::db::{init_in_memory, GuestDetails};

    fn gateway() -> PaymentGateway {
        PaymentGateway::new(GatewayConfig {
            merchant_key: Some("mk-test".to_string()),
            salt: Some("s3cret".to_string()),
            ..GatewayConfig::default()
        })
    }

    fn mailer() -> Arc<BookingMailer> {
        Arc::new(BookingMailer::new(EmailConfig::default()))
    }

    fn callback_fields(
        transaction_id: &str,
        status: &str,
        amount: &str,
        reference: &str,
    ) -> HashMap<String, String> {
        let mut fields: HashMap<String, String> = HashMap::new();
        fields.insert("key".to_string(), "mk-test".to_string());
        fields.insert("txnid".to_string(), transaction_id.to_string());
        fields.insert("amount".to_string(), amount.to_string());
        fields.insert("productinfo".to_string(), reference.to_string());
        fields.insert("firstname".to_string(), "Asha".to_string());
        fields.insert("email".to_string(), "asha@example.com".to_string());
        fields.insert("status".to_string(), status.to_string());
        let signature = hash::callback_signature(
            &fields,
            &GatewayConfig::default().hash_sequence,
            "s3cret",
        );
        fields.insert("hash".to_string(), signature);
        fields
    }

    #[test]
    fn test_status_mapping_table() {
        assert_eq!(map_gateway_status("success"), PaymentOutcome::Paid);
        assert_eq!(map_gateway_status("SUCCESS"), PaymentOutcome::Paid);
        assert_eq!(map_gateway_status("failure"), PaymentOutcome::Failed);
        assert_eq!(map_gateway_status("cancel"), PaymentOutcome::Failed);
        assert_eq!(map_gateway_status("pending"), PaymentOutcome::PendingRetry);
        assert_eq!(map_gateway_status("dropped"), PaymentOutcome::PendingRetry);
        assert_eq!(map_gateway_status("in progress"), PaymentOutcome::PendingRetry);
        assert_eq!(map_gateway_status("???"), PaymentOutcome::PendingRetry);
    }

    #[test]
    fn test_initiate_without_credentials_is_unavailable() {
        let gateway = PaymentGateway::new(GatewayConfig::default());
        assert!(matches!(
            gateway.credentials(),
            Err(PaymentError::GatewayUnavailable(_))
        ));
    }

    #[test]
    fn test_callback_verification_accepts_valid_signature() {
        let fields = callback_fields("txn-1", "success", "8000.00", "BK-REF");
        assert!(gateway().verify_callback(&fields).is_ok());
    }

    #[test]
    fn test_callback_verification_rejects_tampering() {
        let mut fields = callback_fields("txn-1", "success", "8000.00", "BK-REF");
        // Attacker rewrites the amount but cannot recompute the hash
        fields.insert("amount".to_string(), "1.00".to_string());
        assert!(matches!(
            gateway().verify_callback(&fields),
            Err(PaymentError::SignatureMismatch(_))
        ));
    }

    async fn seed_booking(db: &DbPool) -> String {
        sqlx::query(
            "INSERT INTO rooms (id, name, room_type, base_price, max_guests, is_active, is_available, created_at, updated_at) \
             VALUES ('r1', '101', 'Deluxe', 2000, 2, 1, 1, '2030-01-01T00:00:00Z', '2030-01-01T00:00:00Z')",
        )
        .execute(db)
        .await
        .unwrap();

        let outcome = create_booking(
            db,
            &BookingConfig {
                default_tax_rate: 0.0,
                advance_percent: 100.0,
            },
            &BookingRequest {
                check_in: "2030-12-02".parse().unwrap(),
                check_out: "2030-12-06".parse().unwrap(),
                items: vec![BookingItem {
                    room_id: None,
                    room_type: Some("Deluxe".to_string()),
                    quantity: 1,
                }],
                guest: GuestDetails {
                    name: "Asha Rao".to_string(),
                    email: "asha@example.com".to_string(),
                    phone: "5550142".to_string(),
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.reservations.len(), 1);
        assert_eq!(outcome.reservations[0].room_id, "r1");
        assert_eq!(outcome.reservations[0].total_nights, 4);
        outcome.booking_number
    }

    #[tokio::test]
    async fn test_success_callback_confirms_booking() {
        let db = init_in_memory().await;
        let booking_number = seed_booking(&db).await;
        record_initiated(&db, "txn-e2e", &booking_number, 8000.0)
            .await
            .unwrap();

        let fields = callback_fields("txn-e2e", "success", "8000.00", &booking_number);
        let resolved = resolve_callback(&db, &mailer(), &gateway(), &fields)
            .await
            .unwrap();

        assert_eq!(resolved.outcome, PaymentOutcome::Paid);
        assert_eq!(resolved.reservations.len(), 1);
        assert_eq!(resolved.reservations[0].status, ReservationStatus::Confirmed);
        assert_eq!(resolved.reservations[0].payment_status, PaymentStatus::Paid);

        let log: PaymentLog = sqlx::query_as(
            "SELECT * FROM payment_logs WHERE transaction_id = 'txn-e2e'",
        )
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(log.status, "success");
        assert!(log.raw_payload.unwrap().contains("success"));
    }

    #[tokio::test]
    async fn test_failure_callback_fails_booking() {
        let db = init_in_memory().await;
        let booking_number = seed_booking(&db).await;
        record_initiated(&db, "txn-f", &booking_number, 8000.0)
            .await
            .unwrap();

        let fields = callback_fields("txn-f", "failure", "8000.00", &booking_number);
        let resolved = resolve_callback(&db, &mailer(), &gateway(), &fields)
            .await
            .unwrap();

        assert_eq!(resolved.outcome, PaymentOutcome::Failed);
        assert_eq!(resolved.reservations[0].status, ReservationStatus::Failed);
        assert_eq!(resolved.reservations[0].payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_pending_callback_touches_log_only() {
        let db = init_in_memory().await;
        let booking_number = seed_booking(&db).await;
        record_initiated(&db, "txn-p", &booking_number, 8000.0)
            .await
            .unwrap();

        let fields = callback_fields("txn-p", "dropped", "8000.00", &booking_number);
        let resolved = resolve_callback(&db, &mailer(), &gateway(), &fields)
            .await
            .unwrap();

        assert_eq!(resolved.outcome, PaymentOutcome::PendingRetry);
        assert!(resolved.reservations.is_empty());

        let (status,): (String,) =
            sqlx::query_as("SELECT status FROM reservations WHERE booking_number = ?")
                .bind(&booking_number)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(status, "pending");
        let (log_status,): (String,) = sqlx::query_as(
            "SELECT status FROM payment_logs WHERE transaction_id = 'txn-p'",
        )
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(log_status, "dropped");
    }

    #[tokio::test]
    async fn test_forged_callback_changes_nothing() {
        let db = init_in_memory().await;
        let booking_number = seed_booking(&db).await;
        record_initiated(&db, "txn-forged", &booking_number, 8000.0)
            .await
            .unwrap();

        // Stale hash: signed over the real amount, then the field rewritten
        let mut fields = callback_fields("txn-forged", "success", "8000.00", &booking_number);
        fields.insert("amount".to_string(), "1.00".to_string());

        let result = resolve_callback(&db, &mailer(), &gateway(), &fields).await;
        assert!(matches!(result, Err(PaymentError::SignatureMismatch(_))));

        // Zero state mutation: reservation still pending, log still initiated
        let (status,): (String,) =
            sqlx::query_as("SELECT status FROM reservations WHERE booking_number = ?")
                .bind(&booking_number)
                .fetch_one(&db)
                .await
                .unwrap();
        assert_eq!(status, "pending");
        let (log_status,): (String,) = sqlx::query_as(
            "SELECT status FROM payment_logs WHERE transaction_id = 'txn-forged'",
        )
        .fetch_one(&db)
        .await
        .unwrap();
        assert_eq!(log_status, "initiated");
    }

    #[tokio::test]
    async fn test_unknown_transaction_rejected() {
        let db = init_in_memory().await;
        let result =
            apply_gateway_status(&db, &mailer(), "txn-ghost", "success", None).await;
        assert!(matches!(result, Err(PaymentError::UnknownTransaction(_))));
    }
}
