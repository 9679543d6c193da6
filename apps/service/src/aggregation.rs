//! Dashboard statistics derived on demand from measurement history.
//!
//! Nothing here is persisted; every figure is recomputed from the
//! measurements handed in.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::models::{Endpoint, Measurement};
use crate::monitoring::health::{HealthStatus, classify};

/// Days covered by the endpoint uptime figure
pub const UPTIME_WINDOW_DAYS: i64 = 7;

/// Number of most recent measurements the endpoint percentiles are taken over
pub const PERCENTILE_SAMPLE: usize = 50;

/// Hours covered by the dashboard average latency
pub const DASHBOARD_LATENCY_HOURS: i64 = 24;

/// Share of successful measurements, rounded to a whole percent
pub fn uptime_percentage(measurements: &[Measurement]) -> Option<u32> {
    if measurements.is_empty() {
        return None;
    }
    let up = measurements.iter().filter(|m| m.success).count();
    Some((up as f64 / measurements.len() as f64 * 100.0).round() as u32)
}

/// Latencies of measurements that have one, ascending
pub fn sorted_latencies(measurements: &[Measurement]) -> Vec<u64> {
    let mut latencies: Vec<u64> = measurements.iter().filter_map(|m| m.latency_ms).collect();
    latencies.sort_unstable();
    latencies
}

/// Nearest-rank style percentile: the value at `floor(len * fraction)`
pub fn percentile(sorted: &[u64], fraction: f64) -> Option<u64> {
    let index = (sorted.len() as f64 * fraction).floor() as usize;
    sorted.get(index).copied()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencyPercentiles {
    pub p50: Option<u64>,
    pub p95: Option<u64>,
    pub p99: Option<u64>,
}

impl LatencyPercentiles {
    pub fn from_measurements(measurements: &[Measurement]) -> Self {
        let sorted = sorted_latencies(measurements);
        Self {
            p50: percentile(&sorted, 0.5),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}

/// Mean latency rounded to the nearest millisecond
pub fn average_latency(measurements: &[Measurement]) -> Option<u64> {
    let latencies: Vec<u64> = measurements.iter().filter_map(|m| m.latency_ms).collect();
    if latencies.is_empty() {
        return None;
    }
    let total: u64 = latencies.iter().sum();
    Some((total as f64 / latencies.len() as f64).round() as u64)
}

/// Mean latency of the measurements taken within `[since, until]`
pub fn rolling_average(
    measurements: &[Measurement],
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Option<u64> {
    let window: Vec<Measurement> = measurements
        .iter()
        .filter(|m| m.timestamp >= since && m.timestamp <= until)
        .cloned()
        .collect();
    average_latency(&window)
}

/// Per-endpoint figures shown on the detail view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub status: HealthStatus,
    pub last_latency_ms: Option<u64>,
    /// Uptime over the last [`UPTIME_WINDOW_DAYS`] days
    pub uptime_percentage: Option<u32>,
    /// Percentiles over the [`PERCENTILE_SAMPLE`] most recent measurements
    pub latency: LatencyPercentiles,
}

impl EndpointStats {
    /// `recent` is newest first; `window` holds the uptime window's measurements
    pub fn compute(endpoint: &Endpoint, recent: &[Measurement], window: &[Measurement]) -> Self {
        let last = recent.first();
        let sample = &recent[..recent.len().min(PERCENTILE_SAMPLE)];
        Self {
            status: classify(endpoint, last),
            last_latency_ms: last.and_then(|m| m.latency_ms),
            uptime_percentage: uptime_percentage(window),
            latency: LatencyPercentiles::from_measurements(sample),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalStatus {
    Operational,
    Degraded,
    Outage,
}

/// Owner-wide rollup for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total: usize,
    pub up: usize,
    pub down: usize,
    pub degraded: usize,
    pub paused: usize,
    /// Average over the last 24 hours, or over the latest measurements when that window is empty
    pub avg_latency_ms: Option<u64>,
    pub global_status: GlobalStatus,
}

impl DashboardSummary {
    /// `entries` pairs each endpoint with its latest measurement; `recent`
    /// holds every measurement of the owner's endpoints in the latency window.
    pub fn compute(entries: &[(Endpoint, Option<Measurement>)], recent: &[Measurement]) -> Self {
        let mut summary = Self {
            total: entries.len(),
            up: 0,
            down: 0,
            degraded: 0,
            paused: 0,
            avg_latency_ms: None,
            global_status: GlobalStatus::Operational,
        };

        for (endpoint, last) in entries {
            match classify(endpoint, last.as_ref()) {
                HealthStatus::Up => summary.up += 1,
                HealthStatus::Down => summary.down += 1,
                HealthStatus::Degraded => summary.degraded += 1,
                HealthStatus::Paused => summary.paused += 1,
            }
        }

        let latest: Vec<Measurement> = entries.iter().filter_map(|(_, last)| last.clone()).collect();
        summary.avg_latency_ms = average_latency(recent).or_else(|| average_latency(&latest));

        summary.global_status = if summary.down > 0 {
            GlobalStatus::Outage
        } else if summary.degraded > 0 {
            GlobalStatus::Degraded
        } else {
            GlobalStatus::Operational
        };

        summary
    }
}
