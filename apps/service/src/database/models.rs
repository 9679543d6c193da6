use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// HTTP method used to probe an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "HEAD" => Ok(HttpMethod::Head),
            other => Err(format!("Unsupported HTTP method: {other}")),
        }
    }
}

/// Allowed check intervals, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CheckInterval {
    ThirtySeconds,
    #[default]
    OneMinute,
    FiveMinutes,
    TenMinutes,
    ThirtyMinutes,
}

impl CheckInterval {
    pub const ALL: [CheckInterval; 5] = [
        CheckInterval::ThirtySeconds,
        CheckInterval::OneMinute,
        CheckInterval::FiveMinutes,
        CheckInterval::TenMinutes,
        CheckInterval::ThirtyMinutes,
    ];

    pub fn as_secs(&self) -> u32 {
        match self {
            CheckInterval::ThirtySeconds => 30,
            CheckInterval::OneMinute => 60,
            CheckInterval::FiveMinutes => 300,
            CheckInterval::TenMinutes => 600,
            CheckInterval::ThirtyMinutes => 1800,
        }
    }

    pub fn as_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.as_secs()))
    }
}

impl TryFrom<u32> for CheckInterval {
    type Error = String;

    fn try_from(secs: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_secs() == secs)
            .ok_or_else(|| format!("Unsupported interval: {secs}s"))
    }
}

impl From<CheckInterval> for u32 {
    fn from(interval: CheckInterval) -> Self {
        interval.as_secs()
    }
}

/// Default probe timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default expected status code
pub const DEFAULT_EXPECTED_STATUS: u16 = 200;

/// Endpoint model - a monitored HTTP target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    pub interval: CheckInterval,
    pub expected_status_code: u16,
    pub headers: Option<BTreeMap<String, String>>,
    /// Serialized request body, only sent for POST
    pub body: Option<String>,
    #[serde(rename = "latencyThreshold")]
    pub latency_threshold_ms: Option<u64>,
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    pub tags: Vec<String>,
    pub is_paused: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Endpoint {
    /// Create a new endpoint with the default configuration
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        let now = truncate_to_millis(Utc::now());
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            name: name.into(),
            url: url.into(),
            method: HttpMethod::default(),
            interval: CheckInterval::default(),
            expected_status_code: DEFAULT_EXPECTED_STATUS,
            headers: None,
            body: None,
            latency_threshold_ms: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            tags: Vec::new(),
            is_paused: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Measurement model - one immutable probe result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: i64,
    pub endpoint_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub success: bool,
    pub error: Option<String>,
}

/// A measurement that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeasurement {
    pub endpoint_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub latency_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub success: bool,
    pub error: Option<String>,
}

impl NewMeasurement {
    /// Attach the store-assigned id
    pub fn into_measurement(self, id: i64) -> Measurement {
        Measurement {
            id,
            endpoint_id: self.endpoint_id,
            timestamp: self.timestamp,
            latency_ms: self.latency_ms,
            status_code: self.status_code,
            success: self.success,
            error: self.error,
        }
    }
}

/// Ordering of measurement listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Convert a timestamp to unix milliseconds for storage
pub fn timestamp_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Drop sub-millisecond precision so in-memory values equal what the store returns
pub fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    millis_to_timestamp(timestamp_to_millis(timestamp))
}

/// Convert stored unix milliseconds back to a timestamp
pub fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}
