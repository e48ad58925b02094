//! Input validation for API requests.
//!
//! Request bodies are strictly typed at the serde boundary; these checks
//! cover what a type signature cannot (formats, ranges, lengths). For
//! collecting multiple errors into one response, use the
//! `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Pragmatic email shape check, not a full RFC 5321 parser
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^@\s]+@[a-zA-Z0-9][-a-zA-Z0-9]*(\.[a-zA-Z0-9][-a-zA-Z0-9]*)+$").unwrap();

    /// Phone numbers: optional +, then 7-15 digits with optional separators
    static ref PHONE_REGEX: Regex =
        Regex::new(r"^\+?[0-9][0-9 \-]{5,18}[0-9]$").unwrap();

    /// Room type labels: letters, digits, spaces and dashes
    static ref ROOM_TYPE_REGEX: Regex =
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 \-]*$").unwrap();
}

/// Validate a guest's full name
pub fn validate_guest_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Guest name is required".to_string());
    }
    if trimmed.len() > 120 {
        return Err("Guest name is too long (max 120 characters)".to_string());
    }
    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// Validate a phone number
pub fn validate_phone(phone: &str) -> Result<(), String> {
    if phone.is_empty() {
        return Err("Phone number is required".to_string());
    }
    if !PHONE_REGEX.is_match(phone) {
        return Err("Invalid phone number format".to_string());
    }
    Ok(())
}

/// Validate a room display name (e.g. "101", "Garden Suite")
pub fn validate_room_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Room name is required".to_string());
    }
    if trimmed.len() > 64 {
        return Err("Room name is too long (max 64 characters)".to_string());
    }
    Ok(())
}

/// Validate a room type label
pub fn validate_room_type(room_type: &str) -> Result<(), String> {
    if room_type.is_empty() {
        return Err("Room type is required".to_string());
    }
    if room_type.len() > 64 {
        return Err("Room type is too long (max 64 characters)".to_string());
    }
    if !ROOM_TYPE_REGEX.is_match(room_type) {
        return Err("Room type may only contain letters, digits, spaces and dashes".to_string());
    }
    Ok(())
}

/// Validate a nightly base price
pub fn validate_base_price(price: f64) -> Result<(), String> {
    if !price.is_finite() {
        return Err("Base price must be a number".to_string());
    }
    if price <= 0.0 {
        return Err("Base price must be greater than zero".to_string());
    }
    Ok(())
}

/// Validate a room's guest capacity
pub fn validate_max_guests(max_guests: i64) -> Result<(), String> {
    if max_guests < 1 {
        return Err("Max guests must be at least 1".to_string());
    }
    if max_guests > 20 {
        return Err("Max guests is too high (max 20)".to_string());
    }
    Ok(())
}

/// Validate a tax-rate percentage (optional field)
pub fn validate_tax_rate(tax_rate: &Option<f64>) -> Result<(), String> {
    if let Some(rate) = tax_rate {
        if !rate.is_finite() || *rate < 0.0 || *rate > 100.0 {
            return Err("Tax rate must be between 0 and 100".to_string());
        }
    }
    Ok(())
}

/// Parse an ISO calendar date from a query parameter
pub fn parse_date(value: &str, field_name: &str) -> Result<chrono::NaiveDate, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid {field_name}: expected YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("guest@example.com").is_ok());
        assert!(validate_email("first.last@hotel.co.in").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("not-an-email").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("spaces in@example.com").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("5550142678").is_ok());
        assert!(validate_phone("+91 98765 43210").is_ok());
        assert!(validate_phone("020-7946-0958").is_ok());

        assert!(validate_phone("").is_err());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("phone").is_err());
    }

    #[test]
    fn test_validate_guest_name() {
        assert!(validate_guest_name("Asha Rao").is_ok());
        assert!(validate_guest_name("").is_err());
        assert!(validate_guest_name("   ").is_err());
        assert!(validate_guest_name(&"x".repeat(121)).is_err());
    }

    #[test]
    fn test_validate_room_type() {
        assert!(validate_room_type("Deluxe").is_ok());
        assert!(validate_room_type("Family Suite").is_ok());
        assert!(validate_room_type("2-Bed Dorm").is_ok());

        assert!(validate_room_type("").is_err());
        assert!(validate_room_type(" leading-space").is_err());
    }

    #[test]
    fn test_validate_base_price() {
        assert!(validate_base_price(1500.0).is_ok());
        assert!(validate_base_price(0.0).is_err());
        assert!(validate_base_price(-10.0).is_err());
        assert!(validate_base_price(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_max_guests() {
        assert!(validate_max_guests(2).is_ok());
        assert!(validate_max_guests(0).is_err());
        assert!(validate_max_guests(21).is_err());
    }

    #[test]
    fn test_validate_tax_rate() {
        assert!(validate_tax_rate(&None).is_ok());
        assert!(validate_tax_rate(&Some(12.0)).is_ok());
        assert!(validate_tax_rate(&Some(0.0)).is_ok());
        assert!(validate_tax_rate(&Some(-1.0)).is_err());
        assert!(validate_tax_rate(&Some(101.0)).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2030-12-02", "check_in").is_ok());
        assert!(parse_date("02/12/2030", "check_in").is_err());
        assert!(parse_date("", "check_in").is_err());
    }
}
