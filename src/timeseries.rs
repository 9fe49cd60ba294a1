//! Public entry point
//!
//! [`Timeseries`] ties the validator, the SQLite store and the read streamer
//! together. Each call opens one connection on Tokio's blocking pool and
//! closes it when the call (or, for reads, the stream) is done.

use serde_json::Value;

use crate::config::TimeseriesConfig;
use crate::datapoint::{DataPoint, NewDataPoint};
use crate::query::{DEFAULT_STREAM_BUFFER, QueryBuilder, ReadOptions, ReadStream};
use crate::storage::{Database, SqliteStore};
use crate::validate;
use crate::{Error, Result};

/// Data access for the `datapoints` table
#[derive(Debug, Clone)]
pub struct Timeseries {
    db: Database,
    stream_buffer: usize,
}

impl Timeseries {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    pub fn from_config(config: &TimeseriesConfig) -> Self {
        Self::new(config.database_at(None)).with_stream_buffer(config.stream_buffer())
    }

    /// Points held between a stream's worker and its consumer
    pub fn with_stream_buffer(mut self, buffer: usize) -> Self {
        self.stream_buffer = buffer.max(1);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Create the datapoints table; fails if it already exists
    pub async fn create_schema(&self) -> Result<()> {
        tracing::debug!(path = %self.db.path().display(), "creating schema");
        self.with_store(|store| store.create_schema()).await
    }

    /// Drop the datapoints table; a no-op when it is absent
    pub async fn drop_schema(&self) -> Result<()> {
        tracing::debug!(path = %self.db.path().display(), "dropping schema");
        self.with_store(|store| store.drop_schema()).await
    }

    /// Column names of the datapoints table, sorted by name
    pub async fn columns(&self) -> Result<Vec<String>> {
        self.with_store(|store| store.columns()).await
    }

    /// Validate and insert one record, returning it as stored
    pub async fn put(&self, record: &Value) -> Result<DataPoint> {
        let record = validate::validate(record)?;
        tracing::debug!(
            asset = %record.asset,
            explicit_timestamp = record.timestamp.is_some(),
            "inserting data point"
        );
        let point = self.with_store(move |store| store.insert(&record)).await?;
        tracing::debug!(id = point.id, "data point stored");
        Ok(point)
    }

    pub async fn put_point(&self, point: &NewDataPoint) -> Result<DataPoint> {
        self.put(&point.to_candidate()).await
    }

    /// Fetch one data point; `Ok(None)` when no point has this id
    pub async fn get(&self, id: i64) -> Result<Option<DataPoint>> {
        let id = validate::validate_id(id)?;
        self.with_store(move |store| store.get(id)).await
    }

    /// Stream the points matching `opts`.
    ///
    /// Returns immediately; the query runs in the background and failures
    /// arrive through the stream. Must be called within a Tokio runtime.
    pub fn create_read_stream(&self, opts: ReadOptions) -> ReadStream {
        let query = QueryBuilder::from_options(&opts).build();
        ReadStream::spawn(self.db.clone(), query, self.stream_buffer)
    }

    /// Run `op` against a fresh connection on the blocking pool
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteStore) -> rusqlite::Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || {
            let store = db.connect()?;
            op(&store)
        })
        .await?;
        result.map_err(Error::Storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use chrono::{DateTime, TimeZone, Utc};
    use futures_util::StreamExt;
    use serde_json::json;

    async fn fresh() -> (tempfile::TempDir, Timeseries) {
        let dir = tempfile::tempdir().unwrap();
        let ts = Timeseries::new(Database::new(dir.path().join("timeseries_test.db")));
        ts.drop_schema().await.unwrap();
        ts.create_schema().await.unwrap();
        (dir, ts)
    }

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    async fn count_rows(ts: &Timeseries) -> usize {
        ts.create_read_stream(ReadOptions::all())
            .try_collect_all()
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_create_schema() {
        let (_dir, ts) = fresh().await;
        assert_eq!(ts.columns().await.unwrap(), vec!["asset", "id", "timestamp", "value"]);

        let err = ts.create_schema().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_drop_schema_when_absent() {
        let (_dir, ts) = fresh().await;
        ts.drop_schema().await.unwrap();
        ts.drop_schema().await.unwrap();
        assert!(ts.columns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_without_timestamp() {
        let (_dir, ts) = fresh().await;
        let before = Utc::now().timestamp_millis();

        let point = ts.put(&json!({ "value": 42.42, "asset": "anassetid" })).await.unwrap();

        assert!(point.id > 0);
        assert!(point.timestamp.timestamp_millis() >= before);
        assert_eq!(point.asset, "anassetid");
        assert_eq!(point.value, 42.42);
    }

    #[tokio::test]
    async fn test_put_with_timestamp() {
        let (_dir, ts) = fresh().await;
        let now = crate::datapoint::truncate_to_millis(Utc::now());

        let point = ts
            .put(&json!({ "value": 42.42, "asset": "anassetid", "timestamp": now.to_rfc3339() }))
            .await
            .unwrap();

        assert_eq!(point.timestamp, now);
        assert_eq!(point.timestamp.timestamp_millis(), now.timestamp_millis());
    }

    #[tokio::test]
    async fn test_put_without_value() {
        let (_dir, ts) = fresh().await;
        let err = ts.put(&json!({ "asset": "anassetid" })).await.unwrap_err();

        let validation = err.as_validation().unwrap();
        assert_eq!(validation.name(), "ValidationError");
        assert_eq!(validation.details()[0].message, "\"value\" is required");
        assert_eq!(count_rows(&ts).await, 0);
    }

    #[tokio::test]
    async fn test_put_without_asset() {
        let (_dir, ts) = fresh().await;
        let err = ts.put(&json!({ "value": 42 })).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.as_validation().unwrap().first_message(),
            Some("\"asset\" is required")
        );
        assert_eq!(count_rows(&ts).await, 0);
    }

    #[tokio::test]
    async fn test_validation_runs_before_storage() {
        // No table: a valid record would fail in storage, an invalid one never gets there.
        let dir = tempfile::tempdir().unwrap();
        let ts = Timeseries::new(Database::new(dir.path().join("empty.db")));

        let err = ts.put(&json!({ "asset": "a" })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = ts.put(&json!({ "asset": "a", "value": 1 })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[tokio::test]
    async fn test_read_back_by_asset() {
        let (_dir, ts) = fresh().await;
        ts.put_point(&NewDataPoint::new("otherasset", 1.0)).await.unwrap();
        let expected = ts.put(&json!({ "value": 42, "asset": "myasset" })).await.unwrap();

        let results: Vec<DataPoint> = ts
            .create_read_stream(ReadOptions::for_asset("myasset"))
            .map(|item| item.unwrap())
            .collect()
            .await;

        assert_eq!(results, vec![expected]);
    }

    #[tokio::test]
    async fn test_read_interval() {
        let (_dir, ts) = fresh().await;
        ts.put_point(&NewDataPoint::new("myasset", 42.0).at(day(1984, 6, 26))).await.unwrap();
        let expected = ts
            .put_point(&NewDataPoint::new("myasset", 24.0).at(day(2003, 6, 26)))
            .await
            .unwrap();
        ts.put_point(&NewDataPoint::new("myasset", 42.0).at(day(2015, 6, 26))).await.unwrap();

        let results = ts
            .create_read_stream(
                ReadOptions::for_asset("myasset")
                    .since(day(2000, 6, 26))
                    .until(day(2005, 6, 26)),
            )
            .try_collect_all()
            .await
            .unwrap();

        assert_eq!(results, vec![expected]);
    }

    #[tokio::test]
    async fn test_read_bounds_are_inclusive() {
        let (_dir, ts) = fresh().await;
        for d in [1, 2, 3] {
            ts.put_point(&NewDataPoint::new("a", d as f64).at(day(2020, 1, d))).await.unwrap();
        }

        let results = ts
            .create_read_stream(ReadOptions::all().since(day(2020, 1, 1)).until(day(2020, 1, 2)))
            .try_collect_all()
            .await
            .unwrap();

        let values: Vec<f64> = results.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let (_dir, ts) = fresh().await;
        let point = ts.put_point(&NewDataPoint::new("a", 7.5)).await.unwrap();

        assert_eq!(ts.get(point.id).await.unwrap(), Some(point.clone()));
        assert_eq!(ts.get(point.id + 1).await.unwrap(), None);
        assert_eq!(ts.get(0).await.unwrap_err().kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_stream_error_after_drop() {
        let (_dir, ts) = fresh().await;
        ts.put_point(&NewDataPoint::new("a", 1.0)).await.unwrap();
        ts.drop_schema().await.unwrap();

        let mut stream = ts.create_read_stream(ReadOptions::all());
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Stream);
        assert!(stream.next().await.is_none());
    }
}
