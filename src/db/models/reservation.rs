//! Reservation models and the canonical status enums.
//!
//! Status values are stored as lowercase text. Parsing is case-insensitive
//! and accepts the spellings found in older data ("Confirmed",
//! "Awaiting Verification", "awaiting-verification"), so normalization
//! happens once, at the storage boundary.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Lifecycle state of a single reservation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    AwaitingVerification,
    Confirmed,
    Failed,
}

impl ReservationStatus {
    /// Statuses that block a room's inventory for their date range
    pub const ACTIVE: [ReservationStatus; 3] = [
        ReservationStatus::Pending,
        ReservationStatus::AwaitingVerification,
        ReservationStatus::Confirmed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::AwaitingVerification => "awaiting_verification",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Failed => "failed",
        }
    }

    /// Case-insensitive parse accepting legacy spellings
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "pending" => Some(ReservationStatus::Pending),
            "awaiting_verification" | "awaitingverification" => {
                Some(ReservationStatus::AwaitingVerification)
            }
            "confirmed" => Some(ReservationStatus::Confirmed),
            "failed" => Some(ReservationStatus::Failed),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Confirmed | ReservationStatus::Failed
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state of a reservation row, distinct from its lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! impl_sqlx_text_enum {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Sqlite> for $ty {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <&str as sqlx::Type<sqlx::Sqlite>>::type_info()
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $ty {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<'r, sqlx::Sqlite>>::decode(value)?;
                <$ty>::parse(raw)
                    .ok_or_else(|| format!("unrecognized status value: {raw}").into())
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<'q, sqlx::Sqlite>>::encode(self.as_str(), buf)
            }
        }
    };
}

impl_sqlx_text_enum!(ReservationStatus);
impl_sqlx_text_enum!(PaymentStatus);

/// One physical room held for one date range. Multi-room bookings share a
/// booking_number across their reservation rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Reservation {
    pub id: String,
    pub booking_number: String,
    pub room_id: String,
    // Guest identity snapshot, copied at booking time
    pub guest_name: String,
    pub guest_email: String,
    pub guest_phone: String,
    /// Inclusive start of the stay (ISO date)
    pub check_in: String,
    /// Exclusive end of the stay (ISO date)
    pub check_out: String,
    pub total_nights: i64,
    pub status: ReservationStatus,
    pub payment_status: PaymentStatus,
    pub room_charges: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub advance_paid: f64,
    pub balance_amount: f64,
    pub created_at: String,
    pub updated_at: String,
}
