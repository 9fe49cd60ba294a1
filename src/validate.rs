//! Record validation
//!
//! Every write passes through [`validate`] before a connection is opened.
//! The accepted shape is an object with at most these keys:
//!
//! - `id`: optional, positive integer (never written; storage assigns ids)
//! - `asset`: required, non-empty string
//! - `value`: required, number (numeric strings are converted)
//! - `timestamp`: optional, RFC 3339 / ISO-8601 string or epoch milliseconds
//!
//! All violations are collected in key order. Messages follow the
//! `"<field>" is required` form so callers can match on them exactly.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::fmt;

use crate::datapoint::truncate_to_millis;

/// Keys a candidate record may carry, in the order they are checked
pub const KNOWN_FIELDS: &[&str] = &["id", "asset", "value", "timestamp"];

/// Largest integer an id may take (2^53 - 1)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A single field-level violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// The offending field (`value` when the record itself is malformed)
    pub field: String,
    /// Human-readable message, e.g. `"value" is required`
    pub message: String,
}

impl Violation {
    fn new(field: &str, message: String) -> Self {
        Self {
            field: field.to_string(),
            message,
        }
    }

    pub fn required(field: &str) -> Self {
        Self::new(field, format!("\"{}\" is required", field))
    }

    pub fn type_mismatch(field: &str, expected: &str) -> Self {
        Self::new(field, format!("\"{}\" must be {}", field, expected))
    }

    pub fn empty(field: &str) -> Self {
        Self::new(field, format!("\"{}\" is not allowed to be empty", field))
    }

    pub fn not_allowed(field: &str) -> Self {
        Self::new(field, format!("\"{}\" is not allowed", field))
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Rejection of a candidate record, carrying every violation found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    details: Vec<Violation>,
}

impl ValidationError {
    pub fn new(details: Vec<Violation>) -> Self {
        Self { details }
    }

    /// Error name, stable for matching
    pub fn name(&self) -> &'static str {
        "ValidationError"
    }

    /// Violations in the order they were found
    pub fn details(&self) -> &[Violation] {
        &self.details
    }

    /// Message of the first violation
    pub fn first_message(&self) -> Option<&str> {
        self.details.first().map(|v| v.message.as_str())
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.name())?;
        let messages: Vec<&str> = self.details.iter().map(|v| v.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// A candidate that passed validation, normalized
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRecord {
    pub id: Option<i64>,
    pub asset: String,
    pub value: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Validate a candidate record
pub fn validate(candidate: &Value) -> Result<ValidRecord, ValidationError> {
    let Some(fields) = candidate.as_object() else {
        return Err(ValidationError::new(vec![Violation::type_mismatch(
            "value",
            "an object",
        )]));
    };

    let mut violations = Vec::new();

    let id = check_id(fields, &mut violations);
    let asset = check_asset(fields, &mut violations);
    let value = check_value(fields, &mut violations);
    let timestamp = check_timestamp(fields, &mut violations);

    for key in fields.keys() {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            violations.push(Violation::not_allowed(key));
        }
    }

    match (asset, value) {
        (Some(asset), Some(value)) if violations.is_empty() => Ok(ValidRecord {
            id,
            asset,
            value,
            timestamp,
        }),
        _ => Err(ValidationError::new(violations)),
    }
}

/// Validate an id used for lookups
pub fn validate_id(id: i64) -> Result<i64, ValidationError> {
    if id <= 0 {
        return Err(ValidationError::new(vec![Violation::type_mismatch(
            "id",
            "a positive number",
        )]));
    }
    Ok(id)
}

fn check_id(fields: &Map<String, Value>, violations: &mut Vec<Violation>) -> Option<i64> {
    let raw = fields.get("id")?;
    let Some(n) = coerce_number(raw) else {
        violations.push(Violation::type_mismatch("id", "a number"));
        return None;
    };
    if n <= 0.0 {
        violations.push(Violation::type_mismatch("id", "a positive number"));
        return None;
    }
    if n.fract() != 0.0 {
        violations.push(Violation::type_mismatch("id", "an integer"));
        return None;
    }
    if n > MAX_SAFE_INTEGER {
        violations.push(Violation::type_mismatch("id", "a safe number"));
        return None;
    }
    Some(n as i64)
}

fn check_asset(fields: &Map<String, Value>, violations: &mut Vec<Violation>) -> Option<String> {
    match fields.get("asset") {
        None => {
            violations.push(Violation::required("asset"));
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            violations.push(Violation::empty("asset"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            violations.push(Violation::type_mismatch("asset", "a string"));
            None
        }
    }
}

fn check_value(fields: &Map<String, Value>, violations: &mut Vec<Violation>) -> Option<f64> {
    let Some(raw) = fields.get("value") else {
        violations.push(Violation::required("value"));
        return None;
    };
    let n = coerce_number(raw);
    if n.is_none() {
        violations.push(Violation::type_mismatch("value", "a number"));
    }
    n
}

fn check_timestamp(
    fields: &Map<String, Value>,
    violations: &mut Vec<Violation>,
) -> Option<DateTime<Utc>> {
    let raw = fields.get("timestamp")?;
    if raw.is_null() {
        return None;
    }
    let parsed = match raw {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    };
    if parsed.is_none() {
        violations.push(Violation::type_mismatch(
            "timestamp",
            "a number of milliseconds or valid date string",
        ));
    }
    parsed.map(truncate_to_millis)
}

/// Numbers pass through; numeric strings are converted
fn coerce_number(raw: &Value) -> Option<f64> {
    let n = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Parse an ISO-8601 date or date-time; zone-less values are taken as UTC
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
