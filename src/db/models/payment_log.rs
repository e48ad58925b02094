//! Payment log model.
//!
//! One row per initiated gateway transaction. Status and payload are
//! overwritten by callbacks and manual re-checks; rows are never deleted.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentLog {
    pub transaction_id: String,
    pub booking_number: Option<String>,
    pub amount: f64,
    /// Gateway-reported status, or "initiated" before the first callback
    pub status: String,
    /// Raw JSON of the last gateway payload seen for this transaction
    pub raw_payload: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
