//! Boundary checks for endpoint configuration.
//!
//! Everything here runs before the store is touched; the probing engine
//! assumes the configuration it reads back has passed these checks.

use std::collections::BTreeMap;

use reqwest::header::{HeaderName, HeaderValue};
use thiserror::Error;
use url::Url;

use crate::database::models::{CheckInterval, HttpMethod};

/// Maximum number of live endpoints a single owner may have
pub const MAX_ENDPOINTS_PER_OWNER: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Name and URL are required")]
    MissingField,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Method must be GET, POST, or HEAD")]
    InvalidMethod,

    #[error("Interval must be 30, 60, 300, 600, or 1800 seconds")]
    InvalidInterval,

    #[error("Expected status code must be between 100 and 599")]
    InvalidStatusCode,

    #[error("Timeout must be greater than zero")]
    InvalidTimeout,

    #[error("Invalid header '{0}'")]
    InvalidHeader(String),
}

/// Validate an absolute http(s) URL
pub fn validate_url(target: &str) -> Result<(), ValidationError> {
    if target.trim().is_empty() {
        return Err(ValidationError::MissingField);
    }

    let url = Url::parse(target).map_err(|e| {
        if !target.contains("://") {
            ValidationError::InvalidUrl("URL must include scheme (http:// or https://)".to_string())
        } else {
            ValidationError::InvalidUrl(e.to_string())
        }
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::InvalidUrl(format!(
                "Invalid scheme '{other}'. Must be http or https"
            )));
        }
    }

    if url.host_str().is_none() {
        return Err(ValidationError::InvalidUrl("URL must have a valid host".to_string()));
    }

    Ok(())
}

pub fn validate_method(method: &str) -> Result<HttpMethod, ValidationError> {
    method.parse().map_err(|_| ValidationError::InvalidMethod)
}

pub fn validate_interval(seconds: u32) -> Result<CheckInterval, ValidationError> {
    CheckInterval::try_from(seconds).map_err(|_| ValidationError::InvalidInterval)
}

pub fn validate_status_code(code: u16) -> Result<u16, ValidationError> {
    if (100..=599).contains(&code) { Ok(code) } else { Err(ValidationError::InvalidStatusCode) }
}

pub fn validate_timeout(timeout_ms: u64) -> Result<u64, ValidationError> {
    if timeout_ms > 0 { Ok(timeout_ms) } else { Err(ValidationError::InvalidTimeout) }
}

/// Header names and values must be sendable as-is
pub fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    for (key, value) in headers {
        HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| ValidationError::InvalidHeader(key.clone()))?;
        HeaderValue::from_str(value).map_err(|_| ValidationError::InvalidHeader(key.clone()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://localhost:8080/health?x=1").is_ok());
    }

    #[test]
    fn test_invalid_urls() {
        assert_eq!(validate_url(""), Err(ValidationError::MissingField));
        assert!(matches!(validate_url("example.com"), Err(ValidationError::InvalidUrl(_))));
        assert!(matches!(validate_url("ftp://example.com"), Err(ValidationError::InvalidUrl(_))));
        assert!(matches!(validate_url("https://"), Err(ValidationError::InvalidUrl(_))));
    }

    #[test]
    fn test_method_and_interval() {
        assert_eq!(validate_method("HEAD"), Ok(HttpMethod::Head));
        assert_eq!(validate_method("DELETE"), Err(ValidationError::InvalidMethod));
        assert_eq!(validate_interval(300), Ok(CheckInterval::FiveMinutes));
        assert_eq!(validate_interval(120), Err(ValidationError::InvalidInterval));
    }

    #[test]
    fn test_headers() {
        let good = BTreeMap::from([("X-Token".to_string(), "abc".to_string())]);
        assert!(validate_headers(&good).is_ok());

        let bad_name = BTreeMap::from([("bad header".to_string(), "abc".to_string())]);
        assert_eq!(validate_headers(&bad_name), Err(ValidationError::InvalidHeader("bad header".into())));

        let bad_value = BTreeMap::from([("X-Token".to_string(), "line\nbreak".to_string())]);
        assert!(validate_headers(&bad_value).is_err());
    }

    #[test]
    fn test_status_and_timeout() {
        assert!(validate_status_code(204).is_ok());
        assert!(validate_status_code(42).is_err());
        assert!(validate_timeout(0).is_err());
        assert_eq!(validate_timeout(5_000), Ok(5_000));
    }
}
