use chrono::{DateTime, Utc};

use crate::database::models::{Endpoint, Measurement};

/// Whether an endpoint needs a new check at `now`.
///
/// Never-measured endpoints are always due; paused ones never are. A last
/// measurement stamped in the future (clock skew) keeps the endpoint waiting.
pub fn is_due(endpoint: &Endpoint, last: Option<&Measurement>, now: DateTime<Utc>) -> bool {
    if endpoint.is_paused {
        return false;
    }
    match last {
        None => true,
        Some(last) => now.signed_duration_since(last.timestamp) >= endpoint.interval.as_duration(),
    }
}

/// Select the endpoints due for a check from `(endpoint, last measurement)` pairs
pub fn due_endpoints(
    entries: impl IntoIterator<Item = (Endpoint, Option<Measurement>)>,
    now: DateTime<Utc>,
) -> Vec<Endpoint> {
    entries
        .into_iter()
        .filter(|(endpoint, last)| is_due(endpoint, last.as_ref(), now))
        .map(|(endpoint, _)| endpoint)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::CheckInterval;
    use chrono::Duration;

    fn endpoint(interval: CheckInterval) -> Endpoint {
        let mut endpoint = Endpoint::new("owner", "api", "https://example.com");
        endpoint.interval = interval;
        endpoint
    }

    fn measured_at(endpoint: &Endpoint, at: DateTime<Utc>) -> Measurement {
        Measurement {
            id: 1,
            endpoint_id: endpoint.id,
            timestamp: at,
            latency_ms: Some(10),
            status_code: Some(200),
            success: true,
            error: None,
        }
    }

    #[test]
    fn test_due_boundary_is_inclusive() {
        let now = Utc::now();
        let ep = endpoint(CheckInterval::OneMinute);

        assert!(!is_due(&ep, Some(&measured_at(&ep, now - Duration::seconds(59))), now));
        assert!(is_due(&ep, Some(&measured_at(&ep, now - Duration::seconds(60))), now));
        assert!(is_due(&ep, Some(&measured_at(&ep, now - Duration::seconds(61))), now));
    }

    #[test]
    fn test_never_measured_is_due() {
        assert!(is_due(&endpoint(CheckInterval::ThirtyMinutes), None, Utc::now()));
    }

    #[test]
    fn test_paused_is_never_due() {
        let mut ep = endpoint(CheckInterval::ThirtySeconds);
        ep.is_paused = true;
        assert!(!is_due(&ep, None, Utc::now()));
    }

    #[test]
    fn test_future_timestamp_is_not_due() {
        let now = Utc::now();
        let ep = endpoint(CheckInterval::ThirtySeconds);
        assert!(!is_due(&ep, Some(&measured_at(&ep, now + Duration::seconds(5))), now));
    }

    #[test]
    fn test_due_endpoints_uses_each_interval() {
        let now = Utc::now();
        let fast = endpoint(CheckInterval::ThirtySeconds);
        let slow = endpoint(CheckInterval::TenMinutes);
        let fresh = endpoint(CheckInterval::OneMinute);

        let entries = vec![
            (fast.clone(), Some(measured_at(&fast, now - Duration::seconds(45)))),
            (slow.clone(), Some(measured_at(&slow, now - Duration::seconds(45)))),
            (fresh.clone(), None),
        ];

        let due: Vec<_> = due_endpoints(entries, now).into_iter().map(|e| e.id).collect();
        assert_eq!(due, vec![fast.id, fresh.id]);
    }
}
