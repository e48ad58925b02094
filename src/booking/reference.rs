//! Booking-number generation.

use chrono::Utc;
use rand::Rng;

// No 0/O/1/I/L so the reference survives being read over the phone
const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const SUFFIX_LEN: usize = 4;

/// A human-shareable booking reference: time-based prefix plus a random
/// suffix, e.g. `BK2512021430XK7Q`. Shared by every reservation row created
/// in one checkout transaction.
pub fn generate_booking_number() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..SUFFIX_ALPHABET.len());
            SUFFIX_ALPHABET[idx] as char
        })
        .collect();
    format!("BK{}{}", Utc::now().format("%y%m%d%H%M"), suffix)
}
