use serde::{Deserialize, Serialize};

/// Why a probe failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The configured timeout elapsed before a response arrived
    Timeout,
    /// DNS, connect, TLS, or any other transport-level error
    Network,
    /// A response arrived with a status other than the expected one
    StatusMismatch,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Network => write!(f, "network"),
            FailureReason::StatusMismatch => write!(f, "status_mismatch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeFailure {
    pub reason: FailureReason,
    pub message: String,
}

/// Result of a single HTTP probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    /// Wall-clock time from dispatch to response or failure
    pub latency_ms: u64,

    /// HTTP status code, absent when no response arrived
    pub status_code: Option<u16>,

    pub success: bool,

    pub failure: Option<ProbeFailure>,
}

impl ProbeOutcome {
    /// Response received with the expected status code
    pub fn success(latency_ms: u64, status_code: u16) -> Self {
        Self { latency_ms, status_code: Some(status_code), success: true, failure: None }
    }

    /// Response received with an unexpected status code
    pub fn status_mismatch(latency_ms: u64, expected: u16, actual: u16) -> Self {
        Self {
            latency_ms,
            status_code: Some(actual),
            success: false,
            failure: Some(ProbeFailure {
                reason: FailureReason::StatusMismatch,
                message: format!("Expected {expected}, got {actual}"),
            }),
        }
    }

    /// No response was received
    pub fn transport_failure(latency_ms: u64, reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            latency_ms,
            status_code: None,
            success: false,
            failure: Some(ProbeFailure { reason, message: message.into() }),
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        self.failure.as_ref().map(|f| f.reason)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    /// Failed probes are worth a second attempt unless they already ran out the clock
    pub fn should_retry(&self) -> bool {
        !self.success && self.failure_reason() != Some(FailureReason::Timeout)
    }

    /// Latency to persist; only meaningful once a response phase completed
    pub fn recorded_latency(&self) -> Option<u64> {
        self.status_code.map(|_| self.latency_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mismatch_message() {
        let outcome = ProbeOutcome::status_mismatch(12, 200, 503);
        assert_eq!(outcome.error_message(), Some("Expected 200, got 503"));
        assert_eq!(outcome.status_code, Some(503));
        assert!(outcome.should_retry());
    }

    #[test]
    fn test_timeout_is_not_retried() {
        let outcome = ProbeOutcome::transport_failure(10_000, FailureReason::Timeout, "timed out");
        assert!(!outcome.should_retry());
        assert_eq!(outcome.recorded_latency(), None);
    }

    #[test]
    fn test_success_is_not_retried() {
        let outcome = ProbeOutcome::success(0, 200);
        assert!(!outcome.should_retry());
        assert_eq!(outcome.recorded_latency(), Some(0));
    }
}
