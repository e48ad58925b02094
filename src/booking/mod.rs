//! Room availability, allocation/pricing, and the reservation lifecycle.
//!
//! Concurrency correctness comes from the storage layer: the
//! `reservations_no_overlap` trigger rejects any insert that would
//! double-book a room, so two racing booking requests cannot both win a
//! room even though they both passed the availability read.

mod allocation;
mod availability;
mod reference;
mod state;

pub use allocation::{
    create_booking, find_or_create_guest, price_stay, stay_nights, BookingItem, BookingOutcome,
    BookingRequest, PriceBreakdown,
};
pub use availability::{find_available_rooms, list_free_rooms, validate_stay, AvailabilityQuery};
pub use reference::generate_booking_number;
pub use state::{can_transition, transition_group};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BookingError {
    /// Bad input shape or range. Never retried automatically.
    #[error("{0}")]
    Validation(String),

    /// Allocation shortfall for a single requested item. Collected per item;
    /// the rest of the request continues.
    #[error("Not enough available rooms of type {room_type}: requested {requested}, available {available}")]
    NotEnoughInventory {
        room_type: String,
        requested: u32,
        available: u32,
    },

    /// The storage layer rejected a write that would double-book a room.
    /// The caller should re-search and resubmit.
    #[error("Room {room_id} is no longer available for the selected dates")]
    Conflict { room_id: String },

    /// No reservation row exists for the given booking number.
    #[error("No reservations found for booking {0}")]
    UnknownBooking(String),

    /// Zero reservations could be created across all requested items.
    #[error("Booking failed: {}", .0.join("; "))]
    BookingFailed(Vec<String>),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl BookingError {
    /// True when a database error is the no-overlap trigger firing
    pub fn is_overlap_rejection(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err.message().contains("reservation overlap"),
            _ => false,
        }
    }
}
