//! The allocation and pricing engine.
//!
//! Items in a multi-room request are processed independently in caller
//! order; a shortfall on one item never aborts the others, so partial
//! success is a first-class outcome. Allocation within an item is
//! price-ascending with the room id as tie-break, which makes repeated
//! runs over the same inventory deterministic.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use super::availability::{list_free_rooms, validate_stay, AvailabilityQuery};
use super::reference::generate_booking_number;
use super::BookingError;
use crate::config::BookingConfig;
use crate::db::{
    DbPool, Guest, GuestDetails, PaymentStatus, Reservation, ReservationStatus, Room,
};

/// One requested line item: a room type (or a representative room id)
/// and how many rooms of that type are wanted.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingItem {
    pub room_id: Option<String>,
    pub room_type: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub items: Vec<BookingItem>,
    pub guest: GuestDetails,
}

/// Per-room price computation result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBreakdown {
    pub nights: i64,
    pub room_charges: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub advance_paid: f64,
    pub balance_amount: f64,
}

#[derive(Debug, Serialize)]
pub struct BookingOutcome {
    pub booking_number: String,
    pub reservations: Vec<Reservation>,
    /// Per-item shortfalls and per-room conflicts; non-empty together with
    /// a non-empty reservation list means partial success
    pub errors: Vec<String>,
}

/// Number of nights in a half-open stay interval
pub fn stay_nights(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute the charge breakdown for one room over `nights` nights.
/// `tax_rate` and `advance_percent` are percentages.
pub fn price_stay(
    base_price: f64,
    nights: i64,
    tax_rate: f64,
    advance_percent: f64,
) -> PriceBreakdown {
    let room_charges = round2(base_price * nights as f64);
    let tax_amount = round2(room_charges * tax_rate / 100.0);
    let total_amount = round2(room_charges + tax_amount);
    let advance_paid = round2(total_amount * advance_percent / 100.0);
    let balance_amount = round2(total_amount - advance_paid);
    PriceBreakdown {
        nights,
        room_charges,
        tax_amount,
        total_amount,
        advance_paid,
        balance_amount,
    }
}

/// Find a guest profile by email, then phone; create a minimal row when
/// neither matches.
pub async fn find_or_create_guest(
    db: &DbPool,
    details: &GuestDetails,
) -> Result<Guest, sqlx::Error> {
    let existing: Option<Guest> = sqlx::query_as("SELECT * FROM guests WHERE email = ?")
        .bind(&details.email)
        .fetch_optional(db)
        .await?;
    if let Some(guest) = existing {
        return Ok(guest);
    }

    let by_phone: Option<Guest> = sqlx::query_as("SELECT * FROM guests WHERE phone = ?")
        .bind(&details.phone)
        .fetch_optional(db)
        .await?;
    if let Some(guest) = by_phone {
        return Ok(guest);
    }

    let now = Utc::now().to_rfc3339();
    let guest = Guest {
        id: Uuid::new_v4().to_string(),
        full_name: details.name.clone(),
        email: details.email.clone(),
        phone: details.phone.clone(),
        created_at: now.clone(),
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO guests (id, full_name, email, phone, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&guest.id)
    .bind(&guest.full_name)
    .bind(&guest.email)
    .bind(&guest.phone)
    .bind(&guest.created_at)
    .bind(&guest.updated_at)
    .execute(db)
    .await?;

    info!(guest_id = %guest.id, "Created guest profile for {}", guest.email);
    Ok(guest)
}

/// Create a booking: allocate specific rooms per item, price them, and
/// insert one reservation row per room under a shared booking number.
pub async fn create_booking(
    db: &DbPool,
    policy: &BookingConfig,
    request: &BookingRequest,
) -> Result<BookingOutcome, BookingError> {
    validate_stay(request.check_in, request.check_out, Utc::now().date_naive())?;

    if request.items.is_empty() {
        return Err(BookingError::Validation(
            "at least one room item is required".to_string(),
        ));
    }

    find_or_create_guest(db, &request.guest).await?;

    let booking_number = generate_booking_number();
    let nights = stay_nights(request.check_in, request.check_out);

    let mut reservations = Vec::new();
    let mut errors = Vec::new();
    // Rooms already taken by earlier items of this same request; a fresh
    // availability read would otherwise hand them out twice before the
    // first insert lands.
    let mut taken: HashSet<String> = HashSet::new();

    for item in &request.items {
        if item.quantity == 0 {
            errors.push("Requested quantity must be at least 1".to_string());
            continue;
        }

        let room_type = match resolve_room_type(db, item).await {
            Ok(room_type) => room_type,
            Err(message) => {
                errors.push(message);
                continue;
            }
        };

        // Fresh read per item; never reuse the search results the client saw
        let free_query = AvailabilityQuery {
            check_in: request.check_in,
            check_out: request.check_out,
            room_type: Some(room_type.clone()),
            min_capacity: None,
        };
        let free: Vec<Room> = list_free_rooms(db, &free_query)
            .await?
            .into_iter()
            .filter(|room| !taken.contains(&room.id))
            .collect();

        // On a shortfall, allocate what exists and record the gap; the
        // guest keeps the rooms that could be held rather than losing all
        // of them to an all-or-nothing rule.
        if (free.len() as u32) < item.quantity {
            let shortfall = BookingError::NotEnoughInventory {
                room_type: room_type.clone(),
                requested: item.quantity,
                available: free.len() as u32,
            };
            warn!(%room_type, "{shortfall}");
            errors.push(shortfall.to_string());
        }

        for room in free.into_iter().take(item.quantity as usize) {
            let tax_rate = room.tax_rate.unwrap_or(policy.default_tax_rate);
            let price = price_stay(room.base_price, nights, tax_rate, policy.advance_percent);
            let reservation = build_reservation(&booking_number, &room, request, &price);

            match insert_reservation(db, &reservation).await {
                Ok(()) => {
                    taken.insert(room.id);
                    reservations.push(reservation);
                }
                Err(err) if BookingError::is_overlap_rejection(&err) => {
                    // Lost the race for this room between the read and the
                    // write; surface it and let the caller re-search.
                    let conflict = BookingError::Conflict {
                        room_id: room.id.clone(),
                    };
                    warn!(room_id = %room.id, "{conflict}");
                    errors.push(conflict.to_string());
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    if reservations.is_empty() {
        return Err(BookingError::BookingFailed(errors));
    }

    info!(
        %booking_number,
        rooms = reservations.len(),
        item_errors = errors.len(),
        "Booking created"
    );

    Ok(BookingOutcome {
        booking_number,
        reservations,
        errors,
    })
}

/// An item may name a room type directly, or point at a representative
/// room whose type is used for allocation.
async fn resolve_room_type(db: &DbPool, item: &BookingItem) -> Result<String, String> {
    if let Some(room_type) = &item.room_type {
        return Ok(room_type.clone());
    }
    if let Some(room_id) = &item.room_id {
        let room: Option<Room> = sqlx::query_as("SELECT * FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(db)
            .await
            .map_err(|e| format!("Failed to look up room {room_id}: {e}"))?;
        return match room {
            Some(room) => Ok(room.room_type),
            None => Err(format!("Room {room_id} does not exist")),
        };
    }
    Err("Each item must name a room_id or a room_type".to_string())
}

fn build_reservation(
    booking_number: &str,
    room: &Room,
    request: &BookingRequest,
    price: &PriceBreakdown,
) -> Reservation {
    let now = Utc::now().to_rfc3339();
    Reservation {
        id: Uuid::new_v4().to_string(),
        booking_number: booking_number.to_string(),
        room_id: room.id.clone(),
        guest_name: request.guest.name.clone(),
        guest_email: request.guest.email.clone(),
        guest_phone: request.guest.phone.clone(),
        check_in: request.check_in.to_string(),
        check_out: request.check_out.to_string(),
        total_nights: price.nights,
        status: ReservationStatus::Pending,
        payment_status: PaymentStatus::Pending,
        room_charges: price.room_charges,
        tax_amount: price.tax_amount,
        total_amount: price.total_amount,
        advance_paid: price.advance_paid,
        balance_amount: price.balance_amount,
        created_at: now.clone(),
        updated_at: now,
    }
}

async fn insert_reservation(db: &DbPool, r: &Reservation) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO reservations (id, booking_number, room_id, guest_name, guest_email, guest_phone, \
         check_in, check_out, total_nights, status, payment_status, room_charges, tax_amount, \
         total_amount, advance_paid, balance_amount, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&r.id)
    .bind(&r.booking_number)
    .bind(&r.room_id)
    .bind(&r.guest_name)
    .bind(&r.guest_email)
    .bind(&r.guest_phone)
    .bind(&r.check_in)
    .bind(&r.check_out)
    .bind(r.total_nights)
    .bind(r.status)
    .bind(r.payment_status)
    .bind(r.room_charges)
    .bind(r.tax_amount)
    .bind(r.total_amount)
    .bind(r.advance_paid)
    .bind(r.balance_amount)
    .bind(&r.created_at)
    .bind(&r.updated_at)
    .execute(db)
    .await?;
    Ok(())
}
