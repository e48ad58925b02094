//! The availability engine: which physical rooms are free for a date range.
//!
//! Stay intervals are half-open: `[check_in, check_out)`. A reservation
//! ending on the day a new one starts does not block it, so back-to-back
//! same-day turnover is always possible.

use chrono::{NaiveDate, Utc};
use std::collections::HashSet;

use super::BookingError;
use crate::db::{DbPool, Room};

#[derive(Debug, Clone)]
pub struct AvailabilityQuery {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub room_type: Option<String>,
    pub min_capacity: Option<i64>,
}

/// Validate a requested stay window against a reference "today".
///
/// Time of day is ignored on both sides; only the calendar dates matter.
pub fn validate_stay(
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: NaiveDate,
) -> Result<(), BookingError> {
    if check_in >= check_out {
        return Err(BookingError::Validation(
            "check_out must be after check_in".to_string(),
        ));
    }
    if check_in < today {
        return Err(BookingError::Validation(
            "check_in cannot be in the past".to_string(),
        ));
    }
    Ok(())
}

/// Find all rooms free for the requested window, cheapest first.
///
/// Read-only; a returned room can still be lost to a concurrent booking
/// before allocation, which is why allocation re-reads and the storage
/// trigger has the final word.
pub async fn find_available_rooms(
    db: &DbPool,
    query: &AvailabilityQuery,
) -> Result<Vec<Room>, BookingError> {
    validate_stay(query.check_in, query.check_out, Utc::now().date_naive())?;
    list_free_rooms(db, query).await
}

/// The listing step without input validation, shared with the allocation
/// engine's fresh per-item reads.
pub async fn list_free_rooms(
    db: &DbPool,
    query: &AvailabilityQuery,
) -> Result<Vec<Room>, BookingError> {
    let candidates = candidate_rooms(db, query.room_type.as_deref(), query.min_capacity).await?;
    let blocked = blocked_room_ids(db, query.check_in, query.check_out).await?;

    Ok(candidates
        .into_iter()
        .filter(|room| !blocked.contains(&room.id))
        .collect())
}

/// Bookable rooms matching the optional type/capacity filters,
/// ordered by price ascending with room id as the deterministic tie-break.
async fn candidate_rooms(
    db: &DbPool,
    room_type: Option<&str>,
    min_capacity: Option<i64>,
) -> Result<Vec<Room>, sqlx::Error> {
    let rooms: Vec<Room> = sqlx::query_as(
        "SELECT * FROM rooms WHERE is_active = 1 AND is_available = 1 \
         ORDER BY base_price ASC, id ASC",
    )
    .fetch_all(db)
    .await?;

    Ok(rooms
        .into_iter()
        .filter(|room| room_type.map_or(true, |t| room.room_type.eq_ignore_ascii_case(t)))
        .filter(|room| min_capacity.map_or(true, |c| room.max_guests >= c))
        .collect())
}

/// Rooms referenced by a reservation in an inventory-blocking status whose
/// interval overlaps the requested one (half-open overlap test).
async fn blocked_room_ids(
    db: &DbPool,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<HashSet<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT room_id FROM reservations \
         WHERE status IN ('pending', 'awaiting_verification', 'confirmed') \
           AND check_in < ? AND check_out > ?",
    )
    .bind(check_out.to_string())
    .bind(check_in.to_string())
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|(id,)| id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;
    use crate::db::{PaymentStatus, ReservationStatus};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn seed_room(db: &DbPool, id: &str, room_type: &str, price: f64, max_guests: i64) {
        sqlx::query(
            "INSERT INTO rooms (id, name, room_type, base_price, max_guests, is_active, is_available, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 1, 1, '2030-01-01T00:00:00Z', '2030-01-01T00:00:00Z')",
        )
        .bind(id)
        .bind(id)
        .bind(room_type)
        .bind(price)
        .bind(max_guests)
        .execute(db)
        .await
        .unwrap();
    }

    async fn seed_reservation(
        db: &DbPool,
        room_id: &str,
        check_in: &str,
        check_out: &str,
        status: ReservationStatus,
    ) {
        sqlx::query(
            "INSERT INTO reservations (id, booking_number, room_id, guest_name, guest_email, guest_phone, \
             check_in, check_out, total_nights, status, payment_status, room_charges, tax_amount, \
             total_amount, advance_paid, balance_amount, created_at, updated_at) \
             VALUES (?, 'BK-TEST', ?, 'Guest', 'g@example.com', '5550100', ?, ?, 1, ?, ?, 0, 0, 0, 0, 0, \
             '2030-01-01T00:00:00Z', '2030-01-01T00:00:00Z')",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(room_id)
        .bind(check_in)
        .bind(check_out)
        .bind(status)
        .bind(PaymentStatus::Pending)
        .execute(db)
        .await
        .unwrap();
    }

    fn query(check_in: &str, check_out: &str, room_type: Option<&str>) -> AvailabilityQuery {
        AvailabilityQuery {
            check_in: date(check_in),
            check_out: date(check_out),
            room_type: room_type.map(|s| s.to_string()),
            min_capacity: None,
        }
    }

    #[test]
    fn test_validate_stay() {
        let today = date("2030-06-01");
        assert!(validate_stay(date("2030-06-02"), date("2030-06-05"), today).is_ok());
        assert!(validate_stay(date("2030-06-01"), date("2030-06-02"), today).is_ok());
        // inverted window
        assert!(validate_stay(date("2030-06-05"), date("2030-06-02"), today).is_err());
        // zero-night stay
        assert!(validate_stay(date("2030-06-02"), date("2030-06-02"), today).is_err());
        // past check-in
        assert!(validate_stay(date("2030-05-30"), date("2030-06-02"), today).is_err());
    }

    #[tokio::test]
    async fn test_overlapping_reservation_blocks_room() {
        let db = init_in_memory().await;
        seed_room(&db, "r1", "Deluxe", 2000.0, 2).await;
        seed_reservation(&db, "r1", "2030-12-02", "2030-12-06", ReservationStatus::Confirmed).await;

        let free = list_free_rooms(&db, &query("2030-12-04", "2030-12-08", None))
            .await
            .unwrap();
        assert!(free.is_empty());
    }

    #[tokio::test]
    async fn test_back_to_back_turnover_is_not_an_overlap() {
        let db = init_in_memory().await;
        seed_room(&db, "r1", "Deluxe", 2000.0, 2).await;
        seed_reservation(&db, "r1", "2030-12-02", "2030-12-06", ReservationStatus::Confirmed).await;

        // New stay starting exactly on the existing check_out
        let free = list_free_rooms(&db, &query("2030-12-06", "2030-12-09", None))
            .await
            .unwrap();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].id, "r1");
    }

    #[tokio::test]
    async fn test_failed_reservation_does_not_block() {
        let db = init_in_memory().await;
        seed_room(&db, "r1", "Deluxe", 2000.0, 2).await;
        seed_reservation(&db, "r1", "2030-12-02", "2030-12-06", ReservationStatus::Failed).await;

        let free = list_free_rooms(&db, &query("2030-12-03", "2030-12-05", None))
            .await
            .unwrap();
        assert_eq!(free.len(), 1);
    }

    #[tokio::test]
    async fn test_type_and_capacity_filters() {
        let db = init_in_memory().await;
        seed_room(&db, "r1", "Standard", 1200.0, 2).await;
        seed_room(&db, "r2", "Deluxe", 2000.0, 3).await;
        seed_room(&db, "r3", "Deluxe", 2400.0, 4).await;

        let deluxe = list_free_rooms(&db, &query("2030-12-02", "2030-12-04", Some("Deluxe")))
            .await
            .unwrap();
        assert_eq!(deluxe.len(), 2);

        let mut q = query("2030-12-02", "2030-12-04", None);
        q.min_capacity = Some(4);
        let big = list_free_rooms(&db, &q).await.unwrap();
        assert_eq!(big.len(), 1);
        assert_eq!(big[0].id, "r3");
    }

    #[tokio::test]
    async fn test_ordering_is_price_ascending_with_id_tiebreak() {
        let db = init_in_memory().await;
        seed_room(&db, "b", "Deluxe", 2000.0, 2).await;
        seed_room(&db, "a", "Deluxe", 2000.0, 2).await;
        seed_room(&db, "c", "Deluxe", 1500.0, 2).await;

        let free = list_free_rooms(&db, &query("2030-12-02", "2030-12-04", None))
            .await
            .unwrap();
        let ids: Vec<&str> = free.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_inactive_and_unavailable_rooms_excluded() {
        let db = init_in_memory().await;
        seed_room(&db, "r1", "Deluxe", 2000.0, 2).await;
        sqlx::query("UPDATE rooms SET is_available = 0 WHERE id = 'r1'")
            .execute(&db)
            .await
            .unwrap();

        let free = list_free_rooms(&db, &query("2030-12-02", "2030-12-04", None))
            .await
            .unwrap();
        assert!(free.is_empty());
    }
}
