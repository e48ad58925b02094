//! Signature scheme for the hosted payment gateway.
//!
//! Requests and callbacks are signed with SHA-512 over a pipe-delimited
//! concatenation of fields. The field order comes from configuration
//! (`gateway.hash_sequence`); the shared salt is appended for outbound
//! requests and prepended, together with the reported status, for inbound
//! callbacks, whose field order is the reverse of the request order.

use sha2::{Digest, Sha512};
use std::collections::HashMap;
use subtle::ConstantTimeEq;

/// SHA-512 over `parts` joined with `|`, as lowercase hex
pub fn keyed_hash(parts: &[&str]) -> String {
    let joined = parts.join("|");
    let mut hasher = Sha512::new();
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

fn lookup<'a>(fields: &'a HashMap<String, String>, name: &str) -> &'a str {
    if name.is_empty() {
        // Padding slot required by the gateway's format
        return "";
    }
    fields.get(name).map(String::as_str).unwrap_or("")
}

/// Signature for an outbound payment-initiation request:
/// the configured sequence in order, salt last.
pub fn request_signature(
    fields: &HashMap<String, String>,
    sequence: &[String],
    salt: &str,
) -> String {
    let mut parts: Vec<&str> = sequence.iter().map(|name| lookup(fields, name)).collect();
    parts.push(salt);
    keyed_hash(&parts)
}

/// Signature for an inbound callback: salt first, then the gateway-reported
/// status, then the request sequence reversed.
pub fn callback_signature(
    fields: &HashMap<String, String>,
    sequence: &[String],
    salt: &str,
) -> String {
    let mut parts: Vec<&str> = vec![salt, lookup(fields, "status")];
    parts.extend(sequence.iter().rev().map(|name| lookup(fields, name)));
    keyed_hash(&parts)
}

/// Constant-time comparison of two hex digests.
pub fn digests_match(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.to_lowercase();
    let provided = provided.as_bytes();
    expected.len() == provided.len() && bool::from(expected.ct_eq(provided))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence() -> Vec<String> {
        ["key", "txnid", "amount", "productinfo", "firstname", "email"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn fields() -> HashMap<String, String> {
        [
            ("key", "mk-test"),
            ("txnid", "txn-001"),
            ("amount", "8000.00"),
            ("productinfo", "BK2512021430XK7Q"),
            ("firstname", "Asha"),
            ("email", "asha@example.com"),
            ("status", "success"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_keyed_hash_is_sha512_of_joined_parts() {
        let direct = {
            let mut hasher = Sha512::new();
            hasher.update(b"a|b|c");
            hex::encode(hasher.finalize())
        };
        assert_eq!(keyed_hash(&["a", "b", "c"]), direct);
    }

    #[test]
    fn test_request_signature_is_deterministic() {
        let a = request_signature(&fields(), &sequence(), "s3cret");
        let b = request_signature(&fields(), &sequence(), "s3cret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
    }

    #[test]
    fn test_missing_fields_hash_as_empty() {
        let mut seq = sequence();
        seq.push("udf1".to_string());
        seq.push(String::new());
        let with_padding = request_signature(&fields(), &seq, "s3cret");
        // udf1 absent from the payload and the empty padding slot both
        // contribute empty segments
        let manual = keyed_hash(&[
            "mk-test",
            "txn-001",
            "8000.00",
            "BK2512021430XK7Q",
            "Asha",
            "asha@example.com",
            "",
            "",
            "s3cret",
        ]);
        assert_eq!(with_padding, manual);
    }

    #[test]
    fn test_callback_signature_reverses_field_order() {
        let expected = keyed_hash(&[
            "s3cret",
            "success",
            "asha@example.com",
            "Asha",
            "BK2512021430XK7Q",
            "8000.00",
            "txn-001",
            "mk-test",
        ]);
        assert_eq!(callback_signature(&fields(), &sequence(), "s3cret"), expected);
    }

    #[test]
    fn test_tampered_field_changes_signature() {
        let good = callback_signature(&fields(), &sequence(), "s3cret");
        let mut tampered = fields();
        tampered.insert("amount".to_string(), "1.00".to_string());
        let bad = callback_signature(&tampered, &sequence(), "s3cret");
        assert_ne!(good, bad);
    }

    #[test]
    fn test_digest_comparison() {
        let digest = keyed_hash(&["a"]);
        assert!(digests_match(&digest, &digest));
        assert!(digests_match(&digest, &digest.to_uppercase()));
        assert!(!digests_match(&digest, &keyed_hash(&["b"])));
        assert!(!digests_match(&digest, "short"));
    }
}
