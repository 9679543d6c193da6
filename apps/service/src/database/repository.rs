use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Row, TransactionBehavior, params};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::models::{
    CheckInterval, Endpoint, HttpMethod, Measurement, NewMeasurement, SortOrder,
    millis_to_timestamp, timestamp_to_millis, truncate_to_millis,
};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Database trait for abstracting store operations
#[async_trait]
pub trait Database: Send + Sync {
    /// All non-paused endpoints paired with their most recent measurement
    async fn list_active_endpoints_with_last_measurement(
        &self,
    ) -> Result<Vec<(Endpoint, Option<Measurement>)>>;

    /// Append a measurement to an endpoint's history
    async fn append_measurement(&self, measurement: NewMeasurement) -> Result<Measurement>;

    /// Get an endpoint by id, scoped to its owner
    async fn find_endpoint(&self, id: Uuid, owner_id: &str) -> Result<Option<Endpoint>>;

    /// Measurements at or after `since`, capped at `limit`
    async fn list_measurements(
        &self,
        endpoint_id: Uuid,
        since: DateTime<Utc>,
        limit: usize,
        order: SortOrder,
    ) -> Result<Vec<Measurement>>;

    /// Most recent measurements for an endpoint, newest first
    async fn latest_measurements(&self, endpoint_id: Uuid, limit: usize) -> Result<Vec<Measurement>>;

    /// All endpoints of an owner (newest first) with their most recent measurement
    async fn list_endpoints_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<(Endpoint, Option<Measurement>)>>;

    /// Number of live endpoints an owner has
    async fn count_endpoints_for_owner(&self, owner_id: &str) -> Result<usize>;

    /// Insert a new endpoint
    async fn insert_endpoint(&self, endpoint: &Endpoint) -> Result<()>;

    /// Insert a new endpoint unless its owner already has `limit` of them.
    /// The count and the insert are atomic. Returns false when the limit was hit.
    async fn insert_endpoint_within_limit(&self, endpoint: &Endpoint, limit: usize) -> Result<bool>;

    /// Overwrite the configuration of an existing endpoint
    async fn update_endpoint(&self, endpoint: &Endpoint) -> Result<()>;

    /// Delete an endpoint and its measurements. Returns false if it did not exist.
    async fn delete_endpoint(&self, id: Uuid) -> Result<bool>;
}

const ENDPOINT_COLUMNS: &str = "e.id, e.owner_id, e.name, e.url, e.method, e.interval_seconds, \
     e.expected_status_code, e.headers, e.body, e.latency_threshold_ms, e.timeout_ms, e.tags, \
     e.is_paused, e.created_at, e.updated_at";

/// Number of columns selected by `ENDPOINT_COLUMNS`
const ENDPOINT_COLUMN_COUNT: i32 = 15;

const MEASUREMENT_COLUMNS: &str = "id, endpoint_id, timestamp, latency_ms, status_code, success, error";

/// Endpoint columns joined with the newest measurement of each endpoint
const ENDPOINT_WITH_LAST_MEASUREMENT: &str = "SELECT e.id, e.owner_id, e.name, e.url, e.method, \
     e.interval_seconds, e.expected_status_code, e.headers, e.body, e.latency_threshold_ms, \
     e.timeout_ms, e.tags, e.is_paused, e.created_at, e.updated_at, \
     m.id, m.timestamp, m.latency_ms, m.status_code, m.success, m.error \
     FROM endpoints e \
     LEFT JOIN measurements m ON m.id = ( \
         SELECT id FROM measurements WHERE endpoint_id = e.id \
         ORDER BY timestamp DESC, id DESC LIMIT 1)";

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>> {
        self.pool.get().await.map_err(|e| anyhow!("Failed to get database connection: {e}"))
    }

    async fn query_endpoints_with_last(
        &self,
        filter: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<(Endpoint, Option<Measurement>)>> {
        let conn = self.get_conn().await?;
        let sql = format!("{ENDPOINT_WITH_LAST_MEASUREMENT} {filter}");
        let mut rows = conn.query(&sql, params).await?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next().await? {
            let endpoint = endpoint_from_row(&row)?;
            let last = joined_measurement_from_row(&row, endpoint.id)?;
            entries.push((endpoint, last));
        }

        Ok(entries)
    }
}

fn endpoint_from_row(row: &Row) -> Result<Endpoint> {
    let id: String = row.get(0)?;
    let method: String = row.get(4)?;
    let interval_seconds: i64 = row.get(5)?;
    let headers: Option<String> = row.get(7)?;
    let tags: String = row.get(11)?;

    let headers = match headers {
        Some(raw) if !raw.is_empty() => Some(serde_json::from_str::<BTreeMap<String, String>>(&raw)?),
        _ => None,
    };

    Ok(Endpoint {
        id: Uuid::parse_str(&id)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        method: method.parse::<HttpMethod>().map_err(|e| anyhow!(e))?,
        interval: CheckInterval::try_from(u32::try_from(interval_seconds)?).map_err(|e| anyhow!(e))?,
        expected_status_code: u16::try_from(row.get::<i64>(6)?)?,
        headers,
        body: row.get(8)?,
        latency_threshold_ms: row.get::<Option<i64>>(9)?.map(|v| v as u64),
        timeout_ms: row.get::<i64>(10)? as u64,
        tags: serde_json::from_str(&tags)?,
        is_paused: row.get::<i64>(12)? != 0,
        created_at: millis_to_timestamp(row.get(13)?),
        updated_at: millis_to_timestamp(row.get(14)?),
    })
}

/// Read the LEFT JOINed measurement columns that follow the endpoint columns
fn joined_measurement_from_row(row: &Row, endpoint_id: Uuid) -> Result<Option<Measurement>> {
    let base = ENDPOINT_COLUMN_COUNT;
    let Some(id) = row.get::<Option<i64>>(base)? else {
        return Ok(None);
    };

    Ok(Some(Measurement {
        id,
        endpoint_id,
        timestamp: millis_to_timestamp(row.get(base + 1)?),
        latency_ms: row.get::<Option<i64>>(base + 2)?.map(|v| v as u64),
        status_code: row.get::<Option<i64>>(base + 3)?.map(|v| v as u16),
        success: row.get::<i64>(base + 4)? != 0,
        error: row.get(base + 5)?,
    }))
}

fn measurement_from_row(row: &Row) -> Result<Measurement> {
    let endpoint_id: String = row.get(1)?;

    Ok(Measurement {
        id: row.get(0)?,
        endpoint_id: Uuid::parse_str(&endpoint_id)?,
        timestamp: millis_to_timestamp(row.get(2)?),
        latency_ms: row.get::<Option<i64>>(3)?.map(|v| v as u64),
        status_code: row.get::<Option<i64>>(4)?.map(|v| v as u16),
        success: row.get::<i64>(5)? != 0,
        error: row.get(6)?,
    })
}

fn headers_to_column(endpoint: &Endpoint) -> Result<Option<String>> {
    Ok(match &endpoint.headers {
        Some(headers) => Some(serde_json::to_string(headers)?),
        None => None,
    })
}

async fn insert_endpoint_row(conn: &Connection, endpoint: &Endpoint) -> Result<()> {
    conn.execute(
        "INSERT INTO endpoints (id, owner_id, name, url, method, interval_seconds, expected_status_code, headers, body, latency_threshold_ms, timeout_ms, tags, is_paused, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            endpoint.id.to_string(),
            endpoint.owner_id.clone(),
            endpoint.name.clone(),
            endpoint.url.clone(),
            endpoint.method.as_str(),
            i64::from(endpoint.interval.as_secs()),
            i64::from(endpoint.expected_status_code),
            headers_to_column(endpoint)?,
            endpoint.body.clone(),
            endpoint.latency_threshold_ms.map(|v| v as i64),
            endpoint.timeout_ms as i64,
            serde_json::to_string(&endpoint.tags)?,
            if endpoint.is_paused { 1 } else { 0 },
            timestamp_to_millis(endpoint.created_at),
            timestamp_to_millis(endpoint.updated_at)
        ],
    )
    .await?;

    Ok(())
}

#[async_trait]
impl Database for DatabaseImpl {
    async fn list_active_endpoints_with_last_measurement(
        &self,
    ) -> Result<Vec<(Endpoint, Option<Measurement>)>> {
        self.query_endpoints_with_last("WHERE e.is_paused = 0", ()).await
    }

    async fn append_measurement(&self, measurement: NewMeasurement) -> Result<Measurement> {
        let conn = self.get_conn().await?;
        let measurement =
            NewMeasurement { timestamp: truncate_to_millis(measurement.timestamp), ..measurement };

        conn.execute(
            "INSERT INTO measurements (endpoint_id, timestamp, latency_ms, status_code, success, error) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                measurement.endpoint_id.to_string(),
                timestamp_to_millis(measurement.timestamp),
                measurement.latency_ms.map(|v| v as i64),
                measurement.status_code.map(|v| v as i64),
                if measurement.success { 1 } else { 0 },
                measurement.error.clone()
            ],
        )
        .await?;

        Ok(measurement.into_measurement(conn.last_insert_rowid()))
    }

    async fn find_endpoint(&self, id: Uuid, owner_id: &str) -> Result<Option<Endpoint>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {ENDPOINT_COLUMNS} FROM endpoints e WHERE e.id = ? AND e.owner_id = ?");
        let mut rows = conn.query(&sql, params![id.to_string(), owner_id.to_string()]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(endpoint_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_measurements(
        &self,
        endpoint_id: Uuid,
        since: DateTime<Utc>,
        limit: usize,
        order: SortOrder,
    ) -> Result<Vec<Measurement>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {MEASUREMENT_COLUMNS} FROM measurements WHERE endpoint_id = ? AND timestamp >= ? ORDER BY timestamp {order}, id {order} LIMIT ?",
            order = order.as_sql()
        );
        let mut rows = conn
            .query(&sql, params![endpoint_id.to_string(), timestamp_to_millis(since), limit as i64])
            .await?;
        let mut measurements = Vec::new();

        while let Some(row) = rows.next().await? {
            measurements.push(measurement_from_row(&row)?);
        }

        Ok(measurements)
    }

    async fn latest_measurements(&self, endpoint_id: Uuid, limit: usize) -> Result<Vec<Measurement>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {MEASUREMENT_COLUMNS} FROM measurements WHERE endpoint_id = ? ORDER BY timestamp DESC, id DESC LIMIT ?"
        );
        let mut rows = conn.query(&sql, params![endpoint_id.to_string(), limit as i64]).await?;
        let mut measurements = Vec::new();

        while let Some(row) = rows.next().await? {
            measurements.push(measurement_from_row(&row)?);
        }

        Ok(measurements)
    }

    async fn list_endpoints_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<(Endpoint, Option<Measurement>)>> {
        self.query_endpoints_with_last(
            "WHERE e.owner_id = ? ORDER BY e.created_at DESC",
            params![owner_id.to_string()],
        )
        .await
    }

    async fn count_endpoints_for_owner(&self, owner_id: &str) -> Result<usize> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM endpoints WHERE owner_id = ?", params![owner_id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? as usize),
            None => Ok(0),
        }
    }

    async fn insert_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        let conn = self.get_conn().await?;
        insert_endpoint_row(&conn, endpoint).await
    }

    async fn insert_endpoint_within_limit(&self, endpoint: &Endpoint, limit: usize) -> Result<bool> {
        let conn = self.get_conn().await?;
        // IMMEDIATE takes the write lock up front so concurrent creates serialize on the count
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate).await?;

        let mut rows = tx
            .query("SELECT COUNT(*) FROM endpoints WHERE owner_id = ?", params![endpoint.owner_id.clone()])
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)? as usize,
            None => 0,
        };
        drop(rows);

        if count >= limit {
            tx.rollback().await?;
            return Ok(false);
        }

        insert_endpoint_row(&tx, endpoint).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn update_endpoint(&self, endpoint: &Endpoint) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "UPDATE endpoints SET name = ?, url = ?, method = ?, interval_seconds = ?, expected_status_code = ?, headers = ?, body = ?, latency_threshold_ms = ?, timeout_ms = ?, tags = ?, is_paused = ?, updated_at = ? WHERE id = ?",
            params![
                endpoint.name.clone(),
                endpoint.url.clone(),
                endpoint.method.as_str(),
                i64::from(endpoint.interval.as_secs()),
                i64::from(endpoint.expected_status_code),
                headers_to_column(endpoint)?,
                endpoint.body.clone(),
                endpoint.latency_threshold_ms.map(|v| v as i64),
                endpoint.timeout_ms as i64,
                serde_json::to_string(&endpoint.tags)?,
                if endpoint.is_paused { 1 } else { 0 },
                timestamp_to_millis(endpoint.updated_at),
                endpoint.id.to_string()
            ],
        )
        .await?;

        Ok(())
    }

    async fn delete_endpoint(&self, id: Uuid) -> Result<bool> {
        let conn = self.get_conn().await?;
        let tx = conn.transaction().await?;

        // Explicit cascade; foreign key enforcement is per-connection in SQLite
        tx.execute("DELETE FROM measurements WHERE endpoint_id = ?", params![id.to_string()]).await?;
        let deleted = tx.execute("DELETE FROM endpoints WHERE id = ?", params![id.to_string()]).await?;
        tx.commit().await?;

        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::testing::create_test_database;
    use chrono::Duration;

    fn measurement(endpoint_id: Uuid, at: DateTime<Utc>, success: bool, latency: Option<u64>) -> NewMeasurement {
        NewMeasurement {
            endpoint_id,
            timestamp: at,
            latency_ms: latency,
            status_code: latency.map(|_| 200),
            success,
            error: (!success).then(|| "boom".to_string()),
        }
    }

    #[tokio::test]
    async fn test_endpoint_roundtrip() -> Result<()> {
        let (database, _dir) = create_test_database().await?;
        let mut endpoint = Endpoint::new("owner-a", "API", "https://example.com/health");
        endpoint.method = HttpMethod::Post;
        endpoint.interval = CheckInterval::FiveMinutes;
        endpoint.headers = Some(BTreeMap::from([("X-Key".to_string(), "abc".to_string())]));
        endpoint.body = Some(r#"{"ping":true}"#.to_string());
        endpoint.latency_threshold_ms = Some(250);
        endpoint.tags = vec!["prod".to_string()];

        database.insert_endpoint(&endpoint).await?;

        let loaded = database.find_endpoint(endpoint.id, "owner-a").await?.expect("endpoint exists");
        assert_eq!(loaded.method, HttpMethod::Post);
        assert_eq!(loaded.interval, CheckInterval::FiveMinutes);
        assert_eq!(loaded.headers, endpoint.headers);
        assert_eq!(loaded.body, endpoint.body);
        assert_eq!(loaded.latency_threshold_ms, Some(250));
        assert_eq!(loaded.tags, vec!["prod".to_string()]);

        assert!(database.find_endpoint(endpoint.id, "owner-b").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_active_listing_joins_latest_measurement() -> Result<()> {
        let (database, _dir) = create_test_database().await?;
        let active = Endpoint::new("owner", "active", "https://a.example");
        let never = Endpoint::new("owner", "never", "https://b.example");
        let mut paused = Endpoint::new("owner", "paused", "https://c.example");
        paused.is_paused = true;

        for endpoint in [&active, &never, &paused] {
            database.insert_endpoint(endpoint).await?;
        }

        let now = Utc::now();
        database.append_measurement(measurement(active.id, now - Duration::seconds(120), true, Some(10))).await?;
        let newest = database.append_measurement(measurement(active.id, now, false, None)).await?;

        let entries = database.list_active_endpoints_with_last_measurement().await?;
        assert_eq!(entries.len(), 2);

        let (_, last) = entries.iter().find(|(e, _)| e.id == active.id).expect("active listed");
        assert_eq!(last.as_ref(), Some(&newest));

        let (_, none) = entries.iter().find(|(e, _)| e.id == never.id).expect("never listed");
        assert!(none.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_measurements_respects_since_limit_and_order() -> Result<()> {
        let (database, _dir) = create_test_database().await?;
        let endpoint = Endpoint::new("owner", "api", "https://a.example");
        database.insert_endpoint(&endpoint).await?;

        let now = Utc::now();
        for minutes in [90, 30, 20, 10] {
            database
                .append_measurement(measurement(endpoint.id, now - Duration::minutes(minutes), true, Some(minutes as u64)))
                .await?;
        }

        let since = now - Duration::hours(1);
        let ascending = database.list_measurements(endpoint.id, since, 10, SortOrder::Ascending).await?;
        let latencies: Vec<_> = ascending.iter().map(|m| m.latency_ms).collect();
        assert_eq!(latencies, vec![Some(30), Some(20), Some(10)]);

        let capped = database.list_measurements(endpoint.id, since, 2, SortOrder::Descending).await?;
        assert_eq!(capped.iter().map(|m| m.latency_ms).collect::<Vec<_>>(), vec![Some(10), Some(20)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_appended_measurement_matches_stored_row() -> Result<()> {
        let (database, _dir) = create_test_database().await?;
        let endpoint = Endpoint::new("owner", "api", "https://a.example");
        database.insert_endpoint(&endpoint).await?;

        let appended = database.append_measurement(measurement(endpoint.id, Utc::now(), true, Some(12))).await?;
        let stored = database.latest_measurements(endpoint.id, 1).await?;

        assert_eq!(stored, vec![appended]);
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_within_limit_refuses_past_cap() -> Result<()> {
        let (database, _dir) = create_test_database().await?;
        let endpoint = |owner: &str| Endpoint::new(owner, "api", "https://a.example");

        assert!(database.insert_endpoint_within_limit(&endpoint("owner"), 2).await?);
        assert!(database.insert_endpoint_within_limit(&endpoint("owner"), 2).await?);
        assert!(!database.insert_endpoint_within_limit(&endpoint("owner"), 2).await?);
        assert!(database.insert_endpoint_within_limit(&endpoint("other"), 2).await?);

        assert_eq!(database.count_endpoints_for_owner("owner").await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_cascades_measurements() -> Result<()> {
        let (database, _dir) = create_test_database().await?;
        let endpoint = Endpoint::new("owner", "api", "https://a.example");
        database.insert_endpoint(&endpoint).await?;
        database.append_measurement(measurement(endpoint.id, Utc::now(), true, Some(5))).await?;

        assert!(database.delete_endpoint(endpoint.id).await?);
        assert!(!database.delete_endpoint(endpoint.id).await?);
        assert!(database.latest_measurements(endpoint.id, 10).await?.is_empty());
        assert_eq!(database.count_endpoints_for_owner("owner").await?, 0);
        Ok(())
    }
}
