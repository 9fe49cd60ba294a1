//! Database schema and statement definitions

/// Name of the data point table
pub const TABLE_NAME: &str = "datapoints";

/// Column names in declaration order
pub const COLUMNS: &[&str] = &["id", "value", "asset", "timestamp"];

/// SQL to create the datapoints table.
///
/// `timestamp` holds epoch milliseconds; the default is the insert time,
/// truncated to the millisecond in integer arithmetic. `'now'` is fixed for
/// the duration of a statement, so both halves read the same instant.
pub const CREATE_DATAPOINTS_TABLE: &str = r#"
CREATE TABLE datapoints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    value REAL NOT NULL,
    asset TEXT NOT NULL,
    timestamp INTEGER NOT NULL DEFAULT (
        unixepoch('now') * 1000 + CAST(substr(strftime('%f', 'now'), 4) AS INTEGER)
    )
)
"#;

/// SQL to drop the datapoints table
pub const DROP_DATAPOINTS_TABLE: &str = "DROP TABLE IF EXISTS datapoints";

/// Insert letting storage assign the timestamp
pub const INSERT_WITHOUT_TIMESTAMP: &str = r#"
INSERT INTO datapoints (value, asset)
VALUES (?1, ?2)
RETURNING id, value, asset, timestamp
"#;

/// Insert with a caller-supplied timestamp
pub const INSERT_WITH_TIMESTAMP: &str = r#"
INSERT INTO datapoints (value, asset, timestamp)
VALUES (?1, ?2, ?3)
RETURNING id, value, asset, timestamp
"#;

/// Fetch one data point by id
pub const SELECT_BY_ID: &str =
    "SELECT id, value, asset, timestamp FROM datapoints WHERE id = ?1";

/// Column names of the datapoints table, sorted by name
pub const LIST_COLUMNS: &str =
    "SELECT name FROM pragma_table_info('datapoints') ORDER BY name";
