//! Guest profile model.
//!
//! Profile lifecycle is owned by the external auth system; the booking flow
//! only reads profiles or lazily creates a minimal row when none matches.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Guest {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Contact details submitted with a booking request
#[derive(Debug, Clone, Deserialize)]
pub struct GuestDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
}
