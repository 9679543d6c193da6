use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

use super::executor::Prober;
use super::types::ProbeOutcome;
use crate::database::Database;
use crate::database::models::{Endpoint, Measurement, NewMeasurement, truncate_to_millis};

/// A finished check cycle: the final probe outcome and what was stored for it
#[derive(Debug, Clone)]
pub struct CompletedCheck {
    pub outcome: ProbeOutcome,
    pub measurement: Measurement,
}

/// Runs one probe cycle for one endpoint and persists exactly one measurement
pub struct CheckRunner {
    prober: Arc<dyn Prober>,
    database: Arc<dyn Database>,
}

impl CheckRunner {
    pub fn new(prober: Arc<dyn Prober>, database: Arc<dyn Database>) -> Self {
        Self { prober, database }
    }

    /// Probe, retry once on a non-timeout failure, then append the final outcome.
    ///
    /// Only a store failure makes this return an error; probe failures are
    /// recorded as unsuccessful measurements.
    pub async fn run(&self, endpoint: &Endpoint) -> Result<CompletedCheck> {
        let mut outcome = self.prober.probe(endpoint).await;

        if outcome.should_retry() {
            debug!(
                endpoint_id = %endpoint.id,
                reason = ?outcome.failure_reason(),
                "Probe failed, retrying once"
            );
            outcome = self.prober.probe(endpoint).await;
        }

        let measurement = self
            .database
            .append_measurement(NewMeasurement {
                endpoint_id: endpoint.id,
                timestamp: truncate_to_millis(Utc::now()),
                latency_ms: outcome.recorded_latency(),
                status_code: outcome.status_code,
                success: outcome.success,
                error: outcome.error_message().map(str::to_string),
            })
            .await?;

        info!(
            endpoint_id = %endpoint.id,
            name = %endpoint.name,
            success = outcome.success,
            latency_ms = outcome.latency_ms,
            status_code = ?outcome.status_code,
            "Check recorded"
        );

        Ok(CompletedCheck { outcome, measurement })
    }
}
