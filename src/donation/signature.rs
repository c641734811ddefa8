//! Payment gateway webhook signatures
//!
//! The gateway signs each notification with
//! `hex(SHA-512(order_id ‖ status_code ‖ gross_amount ‖ server_key))`.

use sha2::{Digest, Sha512};
use subtle::ConstantTimeEq;

/// Compute the expected signature for a notification
pub fn compute(order_id: &str, status_code: &str, gross_amount: &str, server_key: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check a received signature against the expected one, in constant time
pub fn verify(
    order_id: &str,
    status_code: &str,
    gross_amount: &str,
    server_key: &str,
    signature: &str,
) -> bool {
    let expected = compute(order_id, status_code, gross_amount, server_key);
    let expected = expected.as_bytes();
    let given = signature.as_bytes();
    expected.len() == given.len() && bool::from(expected.ct_eq(given))
}

/// Parse the gateway's decimal amount string into whole currency units.
///
/// `"50000.00"` and `"50000"` parse to 50000. Amounts with a non-zero
/// fraction, signs, or anything else that is not a plain decimal are
/// rejected.
pub fn parse_gross_amount(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (whole, fraction) = match raw.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (raw, ""),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !fraction.bytes().all(|b| b == b'0') {
        return None;
    }

    whole.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_matches_known_vector() {
        // sha512("ORDER-1" + "200" + "50000.00" + "key")
        let expected = {
            let mut hasher = Sha512::new();
            hasher.update(b"ORDER-120050000.00key");
            hex::encode(hasher.finalize())
        };
        assert_eq!(compute("ORDER-1", "200", "50000.00", "key"), expected);
        assert_eq!(expected.len(), 128);
    }

    #[test]
    fn test_verify() {
        let signature = compute("ORDER-1", "200", "50000.00", "key");
        assert!(verify("ORDER-1", "200", "50000.00", "key", &signature));
        assert!(!verify("ORDER-1", "200", "50001.00", "key", &signature));
        assert!(!verify("ORDER-1", "200", "50000.00", "other", &signature));
        assert!(!verify("ORDER-1", "200", "50000.00", "key", "deadbeef"));
        assert!(!verify(
            "ORDER-1",
            "200",
            "50000.00",
            "key",
            &signature.to_ascii_uppercase()
        ));
    }

    #[test]
    fn test_parse_gross_amount() {
        assert_eq!(parse_gross_amount("50000.00"), Some(50_000));
        assert_eq!(parse_gross_amount("50000"), Some(50_000));
        assert_eq!(parse_gross_amount(" 1.0 "), Some(1));
        assert_eq!(parse_gross_amount("50000.50"), None);
        assert_eq!(parse_gross_amount("-5.00"), None);
        assert_eq!(parse_gross_amount(".00"), None);
        assert_eq!(parse_gross_amount("1e5"), None);
    }
}
