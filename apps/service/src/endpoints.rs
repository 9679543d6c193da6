//! Owner-scoped endpoint management and the manual check trigger.
//!
//! This is the configuration boundary: drafts and patches are validated here
//! and rejected before they reach the store or the probing engine.

use chrono::Utc;
use futures::future::try_join_all;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::aggregation::{
    DASHBOARD_LATENCY_HOURS, DashboardSummary, EndpointStats, PERCENTILE_SAMPLE, UPTIME_WINDOW_DAYS,
};
use crate::database::Database;
use crate::database::models::{
    DEFAULT_EXPECTED_STATUS, DEFAULT_TIMEOUT_MS, Endpoint, Measurement, SortOrder, truncate_to_millis,
};
use crate::monitoring::health::{HealthStatus, classify};
use crate::monitoring::runner::{CheckRunner, CompletedCheck};
use crate::query::{TimeRange, clamp_limit};
use crate::validation::{self, MAX_ENDPOINTS_PER_OWNER, ValidationError};

/// Measurements embedded in a single-endpoint view
const DETAIL_HISTORY: usize = 100;

/// Limit for aggregation queries that must see every row in their window
const WHOLE_WINDOW: usize = i64::MAX as usize;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Endpoint not found")]
    NotFound,

    #[error("Maximum {0} endpoints allowed")]
    LimitReached(usize),

    #[error("Store error: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Configuration for a new endpoint; omitted fields take their defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub method: Option<String>,
    pub interval: Option<u32>,
    pub expected_status_code: Option<u16>,
    pub headers: Option<BTreeMap<String, String>>,
    /// Request payload, stored in its JSON serialization
    pub body: Option<serde_json::Value>,
    pub latency_threshold: Option<u64>,
    pub tags: Option<Vec<String>>,
    pub timeout: Option<u64>,
}

/// Partial update. For nullable fields an explicit `null` clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub interval: Option<u32>,
    pub expected_status_code: Option<u16>,
    #[serde(default, deserialize_with = "nullable")]
    pub headers: Option<Option<BTreeMap<String, String>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub body: Option<Option<serde_json::Value>>,
    #[serde(default, deserialize_with = "nullable")]
    pub latency_threshold: Option<Option<u64>>,
    pub tags: Option<Vec<String>>,
    pub timeout: Option<u64>,
    pub is_paused: Option<bool>,
}

/// Distinguishes an absent field (outer `None`) from an explicit null
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn serialize_body(body: Option<serde_json::Value>) -> Option<String> {
    body.filter(|value| !value.is_null()).map(|value| value.to_string())
}

/// An endpoint with its latest measurement and derived status
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointView {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub status: HealthStatus,
    pub last_check: Option<Measurement>,
}

/// An endpoint with its recent history, newest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDetail {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    pub status: HealthStatus,
    pub checks: Vec<Measurement>,
}

pub struct EndpointService {
    database: Arc<dyn Database>,
    runner: Arc<CheckRunner>,
}

impl EndpointService {
    pub fn new(database: Arc<dyn Database>, runner: Arc<CheckRunner>) -> Self {
        Self { database, runner }
    }

    async fn owned(&self, owner_id: &str, id: Uuid) -> Result<Endpoint, ServiceError> {
        self.database.find_endpoint(id, owner_id).await?.ok_or(ServiceError::NotFound)
    }

    pub async fn list(&self, owner_id: &str) -> Result<Vec<EndpointView>, ServiceError> {
        let entries = self.database.list_endpoints_for_owner(owner_id).await?;
        Ok(entries
            .into_iter()
            .map(|(endpoint, last_check)| EndpointView {
                status: classify(&endpoint, last_check.as_ref()),
                endpoint,
                last_check,
            })
            .collect())
    }

    pub async fn create(&self, owner_id: &str, draft: EndpointDraft) -> Result<Endpoint, ServiceError> {
        if self.database.count_endpoints_for_owner(owner_id).await? >= MAX_ENDPOINTS_PER_OWNER {
            return Err(ServiceError::LimitReached(MAX_ENDPOINTS_PER_OWNER));
        }

        if draft.name.trim().is_empty() || draft.url.trim().is_empty() {
            return Err(ValidationError::MissingField.into());
        }
        validation::validate_url(&draft.url)?;

        let mut endpoint = Endpoint::new(owner_id, draft.name, draft.url);
        if let Some(method) = &draft.method {
            endpoint.method = validation::validate_method(method)?;
        }
        if let Some(interval) = draft.interval {
            endpoint.interval = validation::validate_interval(interval)?;
        }
        endpoint.expected_status_code =
            validation::validate_status_code(draft.expected_status_code.unwrap_or(DEFAULT_EXPECTED_STATUS))?;
        endpoint.timeout_ms = validation::validate_timeout(draft.timeout.unwrap_or(DEFAULT_TIMEOUT_MS))?;
        if let Some(headers) = &draft.headers {
            validation::validate_headers(headers)?;
        }
        endpoint.headers = draft.headers;
        endpoint.body = serialize_body(draft.body);
        endpoint.latency_threshold_ms = draft.latency_threshold;
        endpoint.tags = draft.tags.unwrap_or_default();

        if !self.database.insert_endpoint_within_limit(&endpoint, MAX_ENDPOINTS_PER_OWNER).await? {
            return Err(ServiceError::LimitReached(MAX_ENDPOINTS_PER_OWNER));
        }
        info!(endpoint_id = %endpoint.id, owner_id, url = %endpoint.url, "Endpoint created");

        Ok(endpoint)
    }

    pub async fn get(&self, owner_id: &str, id: Uuid) -> Result<EndpointDetail, ServiceError> {
        let endpoint = self.owned(owner_id, id).await?;
        let checks = self.database.latest_measurements(id, DETAIL_HISTORY).await?;

        Ok(EndpointDetail { status: classify(&endpoint, checks.first()), endpoint, checks })
    }

    /// Apply a patch; nothing is written if any field fails validation
    pub async fn update(
        &self,
        owner_id: &str,
        id: Uuid,
        patch: EndpointPatch,
    ) -> Result<Endpoint, ServiceError> {
        let mut endpoint = self.owned(owner_id, id).await?;

        if let Some(name) = patch.name {
            if name.trim().is_empty() {
                return Err(ValidationError::MissingField.into());
            }
            endpoint.name = name;
        }
        if let Some(url) = patch.url {
            validation::validate_url(&url)?;
            endpoint.url = url;
        }
        if let Some(method) = &patch.method {
            endpoint.method = validation::validate_method(method)?;
        }
        if let Some(interval) = patch.interval {
            endpoint.interval = validation::validate_interval(interval)?;
        }
        if let Some(code) = patch.expected_status_code {
            endpoint.expected_status_code = validation::validate_status_code(code)?;
        }
        if let Some(headers) = patch.headers {
            if let Some(headers) = &headers {
                validation::validate_headers(headers)?;
            }
            endpoint.headers = headers;
        }
        if let Some(body) = patch.body {
            endpoint.body = serialize_body(body);
        }
        if let Some(threshold) = patch.latency_threshold {
            endpoint.latency_threshold_ms = threshold;
        }
        if let Some(tags) = patch.tags {
            endpoint.tags = tags;
        }
        if let Some(timeout) = patch.timeout {
            endpoint.timeout_ms = validation::validate_timeout(timeout)?;
        }
        if let Some(paused) = patch.is_paused {
            endpoint.is_paused = paused;
        }
        endpoint.updated_at = truncate_to_millis(Utc::now());

        self.database.update_endpoint(&endpoint).await?;
        info!(endpoint_id = %endpoint.id, paused = endpoint.is_paused, "Endpoint updated");

        Ok(endpoint)
    }

    pub async fn delete(&self, owner_id: &str, id: Uuid) -> Result<(), ServiceError> {
        self.owned(owner_id, id).await?;
        if !self.database.delete_endpoint(id).await? {
            return Err(ServiceError::NotFound);
        }
        info!(endpoint_id = %id, "Endpoint deleted");
        Ok(())
    }

    /// Run a check right now, whether or not the endpoint is due or paused
    pub async fn ping(&self, owner_id: &str, id: Uuid) -> Result<CompletedCheck, ServiceError> {
        let endpoint = self.owned(owner_id, id).await?;
        Ok(self.runner.run(&endpoint).await?)
    }

    /// Measurements within `range`, oldest first
    pub async fn checks(
        &self,
        owner_id: &str,
        id: Uuid,
        range: TimeRange,
        limit: Option<usize>,
    ) -> Result<Vec<Measurement>, ServiceError> {
        self.owned(owner_id, id).await?;
        let since = range.since(Utc::now());
        Ok(self.database.list_measurements(id, since, clamp_limit(limit), SortOrder::Ascending).await?)
    }

    pub async fn stats(&self, owner_id: &str, id: Uuid) -> Result<EndpointStats, ServiceError> {
        let endpoint = self.owned(owner_id, id).await?;
        let recent = self.database.latest_measurements(id, PERCENTILE_SAMPLE).await?;
        let since = Utc::now() - chrono::Duration::days(UPTIME_WINDOW_DAYS);
        let window = self.database.list_measurements(id, since, WHOLE_WINDOW, SortOrder::Ascending).await?;

        Ok(EndpointStats::compute(&endpoint, &recent, &window))
    }

    pub async fn dashboard(&self, owner_id: &str) -> Result<DashboardSummary, ServiceError> {
        let entries = self.database.list_endpoints_for_owner(owner_id).await?;
        let since = Utc::now() - chrono::Duration::hours(DASHBOARD_LATENCY_HOURS);

        let windows = try_join_all(entries.iter().map(|(endpoint, _)| {
            self.database.list_measurements(endpoint.id, since, WHOLE_WINDOW, SortOrder::Ascending)
        }))
        .await?;
        let recent: Vec<Measurement> = windows.into_iter().flatten().collect();

        Ok(DashboardSummary::compute(&entries, &recent))
    }
}
