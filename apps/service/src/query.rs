use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default number of measurements returned by a range query
pub const DEFAULT_QUERY_LIMIT: usize = 500;

/// Hard cap on measurements returned by a range query
pub const MAX_QUERY_LIMIT: usize = 1000;

/// History window selectable on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "1h")]
    OneHour,
    #[default]
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl TimeRange {
    /// Unrecognized or missing tokens fall back to 24h
    pub fn parse_lossy(token: Option<&str>) -> Self {
        match token {
            Some("1h") => TimeRange::OneHour,
            Some("24h") => TimeRange::OneDay,
            Some("7d") => TimeRange::SevenDays,
            Some("30d") => TimeRange::ThirtyDays,
            _ => TimeRange::default(),
        }
    }

    pub fn as_duration(&self) -> Duration {
        match self {
            TimeRange::OneHour => Duration::hours(1),
            TimeRange::OneDay => Duration::hours(24),
            TimeRange::SevenDays => Duration::hours(168),
            TimeRange::ThirtyDays => Duration::hours(720),
        }
    }

    /// Oldest timestamp included in the range
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.as_duration()
    }
}

/// Apply the default and the cap to a requested limit
pub fn clamp_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_QUERY_LIMIT).min(MAX_QUERY_LIMIT)
}
