//! Shared-secret checks for cron and admin routes

use crate::{config::Config, DonateError, DonateResult};
use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

/// Header carrying the cron secret
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

fn constant_time_eq(given: &str, expected: &str) -> bool {
    let given = given.as_bytes();
    let expected = expected.as_bytes();
    given.len() == expected.len() && given.ct_eq(expected).unwrap_u8() == 1
}

/// Verify the `x-cron-secret` header.
///
/// A missing configuration is a setup error (500), a missing or wrong
/// header is 401.
pub(crate) fn verify_cron_secret(headers: &HeaderMap, config: &Config) -> DonateResult<()> {
    let Some(expected) = config.jobs.cron_secret.as_deref() else {
        return Err(DonateError::Config(
            "Cron secret is not configured".to_string(),
        ));
    };

    let given = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| DonateError::Unauthorized("Missing cron secret".to_string()))?;

    if !constant_time_eq(given, expected) {
        return Err(DonateError::Unauthorized("Invalid cron secret".to_string()));
    }

    Ok(())
}

/// Verify the admin bearer token
pub(crate) fn verify_admin_token(headers: &HeaderMap, config: &Config) -> DonateResult<()> {
    let Some(expected) = config.admin.token.as_deref() else {
        return Err(DonateError::Forbidden(
            "Admin API is disabled (no admin token configured)".to_string(),
        ));
    };

    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    if !constant_time_eq(token, expected) {
        return Err(DonateError::Forbidden("Invalid admin token".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_cron_secret() {
        let config = test_support::config();
        assert!(verify_cron_secret(
            &headers(CRON_SECRET_HEADER, test_support::CRON_SECRET),
            &config
        )
        .is_ok());
        assert!(matches!(
            verify_cron_secret(&HeaderMap::new(), &config),
            Err(DonateError::Unauthorized(_))
        ));
        assert!(matches!(
            verify_cron_secret(&headers(CRON_SECRET_HEADER, "nope"), &config),
            Err(DonateError::Unauthorized(_))
        ));

        let mut unconfigured = config;
        unconfigured.jobs.cron_secret = None;
        assert!(matches!(
            verify_cron_secret(
                &headers(CRON_SECRET_HEADER, test_support::CRON_SECRET),
                &unconfigured
            ),
            Err(DonateError::Config(_))
        ));
    }

    #[test]
    fn test_admin_token() {
        let config = test_support::config();
        let bearer = format!("Bearer {}", test_support::ADMIN_TOKEN);
        assert!(verify_admin_token(&headers("authorization", &bearer), &config).is_ok());
        assert!(matches!(
            verify_admin_token(&headers("authorization", "Bearer wrong"), &config),
            Err(DonateError::Forbidden(_))
        ));
        assert!(matches!(
            verify_admin_token(&HeaderMap::new(), &config),
            Err(DonateError::Forbidden(_))
        ));

        let mut disabled = config;
        disabled.admin.token = None;
        assert!(matches!(
            verify_admin_token(&headers("authorization", &bearer), &disabled),
            Err(DonateError::Forbidden(_))
        ));
    }
}
