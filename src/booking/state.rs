//! The reservation state machine.
//!
//! Every status change, whether driven by a gateway callback or by an
//! administrator, goes through [`transition_group`] so there is exactly one
//! implementation of the rules.

use chrono::Utc;
use tracing::{info, warn};

use super::BookingError;
use crate::db::{DbPool, PaymentStatus, Reservation, ReservationStatus};

/// Valid lifecycle transitions. Terminal states (confirmed, failed) have
/// no outgoing edges.
pub fn can_transition(from: ReservationStatus, to: ReservationStatus) -> bool {
    use ReservationStatus::*;
    matches!(
        (from, to),
        (Pending, AwaitingVerification)
            | (Pending, Confirmed)
            | (Pending, Failed)
            | (AwaitingVerification, Confirmed)
            | (AwaitingVerification, Failed)
    )
}

/// Move every reservation in a booking group to `status`/`payment_status`.
///
/// Rows already in the target status are skipped; rows for which the
/// transition is invalid (terminal states) are logged and left untouched,
/// never silently overwritten. Returns the group as stored afterwards.
pub async fn transition_group(
    db: &DbPool,
    booking_number: &str,
    status: ReservationStatus,
    payment_status: PaymentStatus,
) -> Result<Vec<Reservation>, BookingError> {
    let rows: Vec<Reservation> =
        sqlx::query_as("SELECT * FROM reservations WHERE booking_number = ?")
            .bind(booking_number)
            .fetch_all(db)
            .await?;

    if rows.is_empty() {
        return Err(BookingError::UnknownBooking(booking_number.to_string()));
    }

    let now = Utc::now().to_rfc3339();
    for row in &rows {
        if row.status == status {
            continue;
        }
        if !can_transition(row.status, status) {
            warn!(
                reservation_id = %row.id,
                %booking_number,
                from = %row.status,
                to = %status,
                "Ignoring invalid reservation status transition"
            );
            continue;
        }
        sqlx::query(
            "UPDATE reservations SET status = ?, payment_status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(payment_status)
        .bind(&now)
        .bind(&row.id)
        .execute(db)
        .await?;
        info!(
            reservation_id = %row.id,
            %booking_number,
            from = %row.status,
            to = %status,
            "Reservation status updated"
        );
    }

    let updated: Vec<Reservation> =
        sqlx::query_as("SELECT * FROM reservations WHERE booking_number = ?")
            .bind(booking_number)
            .fetch_all(db)
            .await?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;

    #[test]
    fn test_transition_table() {
        use ReservationStatus::*;
        assert!(can_transition(Pending, Confirmed));
        assert!(can_transition(Pending, Failed));
        assert!(can_transition(Pending, AwaitingVerification));
        assert!(can_transition(AwaitingVerification, Confirmed));
        assert!(can_transition(AwaitingVerification, Failed));

        // Terminal states stay terminal
        assert!(!can_transition(Confirmed, Failed));
        assert!(!can_transition(Confirmed, Pending));
        assert!(!can_transition(Failed, Confirmed));
        assert!(!can_transition(Failed, Pending));
        // No walking backwards
        assert!(!can_transition(AwaitingVerification, Pending));
    }

    async fn seed_group(db: &DbPool, booking_number: &str, status: ReservationStatus, n: usize) {
        sqlx::query(
            "INSERT INTO rooms (id, name, room_type, base_price, max_guests, is_active, is_available, created_at, updated_at) \
             VALUES ('room-1', '101', 'Deluxe', 2000, 2, 1, 1, '2030-01-01T00:00:00Z', '2030-01-01T00:00:00Z')",
        )
        .execute(db)
        .await
        .unwrap();
        for i in 0..n {
            sqlx::query(
                "INSERT INTO reservations (id, booking_number, room_id, guest_name, guest_email, guest_phone, \
                 check_in, check_out, total_nights, status, payment_status, room_charges, tax_amount, \
                 total_amount, advance_paid, balance_amount, created_at, updated_at) \
                 VALUES (?, ?, 'room-1', 'Guest', 'g@example.com', '5550100', ?, ?, 2, ?, 'pending', \
                 4000, 0, 4000, 4000, 0, '2030-01-01T00:00:00Z', '2030-01-01T00:00:00Z')",
            )
            .bind(format!("res-{i}"))
            .bind(booking_number)
            // Non-overlapping windows so the trigger stays quiet
            .bind(format!("2030-12-{:02}", 2 + i * 2))
            .bind(format!("2030-12-{:02}", 4 + i * 2))
            .bind(status)
            .execute(db)
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn test_group_confirmation() {
        let db = init_in_memory().await;
        seed_group(&db, "BK-G1", ReservationStatus::Pending, 2).await;

        let updated = transition_group(
            &db,
            "BK-G1",
            ReservationStatus::Confirmed,
            PaymentStatus::Paid,
        )
        .await
        .unwrap();

        assert_eq!(updated.len(), 2);
        for r in &updated {
            assert_eq!(r.status, ReservationStatus::Confirmed);
            assert_eq!(r.payment_status, PaymentStatus::Paid);
        }
    }

    #[tokio::test]
    async fn test_terminal_state_is_a_logged_noop() {
        let db = init_in_memory().await;
        seed_group(&db, "BK-G1", ReservationStatus::Failed, 1).await;

        let updated = transition_group(
            &db,
            "BK-G1",
            ReservationStatus::Confirmed,
            PaymentStatus::Paid,
        )
        .await
        .unwrap();

        // The failed row is untouched
        assert_eq!(updated[0].status, ReservationStatus::Failed);
        assert_eq!(updated[0].payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_booking_number() {
        let db = init_in_memory().await;
        let result = transition_group(
            &db,
            "BK-NOPE",
            ReservationStatus::Confirmed,
            PaymentStatus::Paid,
        )
        .await;
        assert!(matches!(result, Err(BookingError::UnknownBooking(_))));
    }
}
