//! Filtered SELECT construction
//!
//! Starts from an unfiltered scan of `datapoints` and folds in one predicate
//! per supplied filter. Filter values always travel as bound parameters.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::storage::schema;

/// Filters for a read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Only points of this asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Inclusive lower bound on timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl ReadOptions {
    /// All points, no filter
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_asset(asset: impl Into<String>) -> Self {
        Self {
            asset: Some(asset.into()),
            ..Self::default()
        }
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gte,
    Lte,
}

impl Op {
    fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Gte => ">=",
            Op::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone)]
struct Predicate {
    column: &'static str,
    op: Op,
    value: Value,
}

/// A parameterized statement ready to execute
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub text: String,
    pub values: Vec<Value>,
}

/// Accumulates AND-ed predicates over the datapoints table
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    predicates: Vec<Predicate>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder for a set of read options, predicates in asset, from, to order
    pub fn from_options(opts: &ReadOptions) -> Self {
        let mut builder = Self::new();
        if let Some(asset) = &opts.asset {
            builder = builder.asset_eq(asset.clone());
        }
        if let Some(from) = opts.from {
            builder = builder.timestamp_gte(from);
        }
        if let Some(to) = opts.to {
            builder = builder.timestamp_lte(to);
        }
        builder
    }

    pub fn asset_eq(self, asset: impl Into<String>) -> Self {
        self.push("asset", Op::Eq, Value::Text(asset.into()))
    }

    pub fn timestamp_gte(self, ts: DateTime<Utc>) -> Self {
        self.push("timestamp", Op::Gte, Value::Integer(ts.timestamp_millis()))
    }

    pub fn timestamp_lte(self, ts: DateTime<Utc>) -> Self {
        self.push("timestamp", Op::Lte, Value::Integer(ts.timestamp_millis()))
    }

    fn push(mut self, column: &'static str, op: Op, value: Value) -> Self {
        self.predicates.push(Predicate { column, op, value });
        self
    }

    pub fn build(&self) -> BuiltQuery {
        let mut text = format!("SELECT {} FROM {}", schema::COLUMNS.join(", "), schema::TABLE_NAME);

        let clauses: Vec<String> = self
            .predicates
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{} {} ?{}", p.column, p.op.as_str(), i + 1))
            .collect();

        if !clauses.is_empty() {
            text.push_str(" WHERE ");
            text.push_str(&clauses.join(" AND "));
        }

        BuiltQuery {
            text,
            values: self.predicates.iter().map(|p| p.value.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_unfiltered() {
        let query = QueryBuilder::from_options(&ReadOptions::all()).build();
        assert_eq!(query.text, "SELECT id, value, asset, timestamp FROM datapoints");
        assert!(query.values.is_empty());
    }

    #[test]
    fn test_asset_only() {
        let query = QueryBuilder::from_options(&ReadOptions::for_asset("myasset")).build();
        assert_eq!(
            query.text,
            "SELECT id, value, asset, timestamp FROM datapoints WHERE asset = ?1"
        );
        assert_eq!(query.values, vec![Value::Text("myasset".into())]);
    }

    #[test]
    fn test_all_filters_in_fixed_order() {
        let opts = ReadOptions {
            to: Some(day(2005, 6, 26)),
            from: Some(day(2000, 6, 26)),
            asset: Some("myasset".into()),
        };
        let query = QueryBuilder::from_options(&opts).build();
        assert_eq!(
            query.text,
            "SELECT id, value, asset, timestamp FROM datapoints \
             WHERE asset = ?1 AND timestamp >= ?2 AND timestamp <= ?3"
        );
        assert_eq!(
            query.values,
            vec![
                Value::Text("myasset".into()),
                Value::Integer(961_977_600_000),
                Value::Integer(1_119_744_000_000),
            ]
        );
    }

    #[test]
    fn test_time_bounds_without_asset() {
        let query = QueryBuilder::from_options(&ReadOptions::all().until(day(2005, 6, 26))).build();
        assert_eq!(
            query.text,
            "SELECT id, value, asset, timestamp FROM datapoints WHERE timestamp <= ?1"
        );

        let query = QueryBuilder::from_options(&ReadOptions::all().since(day(2000, 6, 26))).build();
        assert!(query.text.ends_with("WHERE timestamp >= ?1"));
    }

    #[test]
    fn test_values_are_never_interpolated() {
        let hostile = "x'; DROP TABLE datapoints; --";
        let query = QueryBuilder::new().asset_eq(hostile).build();
        assert!(!query.text.contains(hostile));
        assert_eq!(query.values, vec![Value::Text(hostile.into())]);
    }
}
