//! Data point types
//!
//! A data point is one time-stamped numeric measurement tied to an asset.
//! Points are created through the writer and are read-only afterwards.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A persisted measurement.
///
/// Every field is populated: `id` and (when not supplied) `timestamp` are
/// assigned by storage at insert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Storage-generated identifier, positive and never reused
    pub id: i64,
    /// Identifier of the measured entity
    pub asset: String,
    /// The measurement
    pub value: f64,
    /// Instant of the measurement, millisecond precision
    pub timestamp: DateTime<Utc>,
}

impl DataPoint {
    /// Build a point from its stored form (timestamp in epoch milliseconds)
    pub fn from_stored(id: i64, asset: String, value: f64, timestamp_ms: i64) -> Option<Self> {
        let timestamp = Utc.timestamp_millis_opt(timestamp_ms).single()?;
        Some(Self {
            id,
            asset,
            value,
            timestamp,
        })
    }
}

/// Typed input for a write.
///
/// Converted into the same JSON candidate shape untyped callers send, so both
/// go through the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDataPoint {
    pub asset: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewDataPoint {
    pub fn new(asset: impl Into<String>, value: f64) -> Self {
        Self {
            asset: asset.into(),
            value,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The candidate record handed to the validator
    pub fn to_candidate(&self) -> serde_json::Value {
        let mut record = serde_json::json!({
            "asset": self.asset,
            "value": self.value,
        });
        if let Some(ts) = self.timestamp {
            record["timestamp"] = serde_json::Value::String(ts.to_rfc3339());
        }
        record
    }
}

/// Truncate an instant to the millisecond precision storage keeps
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts.timestamp_millis())
        .single()
        .unwrap_or(ts)
}
