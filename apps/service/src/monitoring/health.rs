use serde::{Deserialize, Serialize};

use crate::database::models::{Endpoint, Measurement};

/// Health label derived from an endpoint and its latest measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Paused,
    Down,
    Degraded,
    Up,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Paused => write!(f, "PAUSED"),
            HealthStatus::Down => write!(f, "DOWN"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Up => write!(f, "UP"),
        }
    }
}

/// Classify an endpoint from its latest snapshot. First matching rule wins;
/// an endpoint that was never measured reads as paused.
pub fn classify(endpoint: &Endpoint, last: Option<&Measurement>) -> HealthStatus {
    if endpoint.is_paused {
        return HealthStatus::Paused;
    }
    let Some(last) = last else {
        return HealthStatus::Paused;
    };
    if !last.success {
        return HealthStatus::Down;
    }
    match (endpoint.latency_threshold_ms, last.latency_ms) {
        (Some(threshold), Some(latency)) if latency > threshold => HealthStatus::Degraded,
        _ => HealthStatus::Up,
    }
}
