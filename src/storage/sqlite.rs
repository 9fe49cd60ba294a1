//! SQLite storage implementation

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use super::schema;
use crate::datapoint::DataPoint;
use crate::query::BuiltQuery;
use crate::validate::ValidRecord;

/// Default time a connection waits on a locked database
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// VM instructions between cancellation checks
const CANCEL_CHECK_OPS: i32 = 1000;

/// Where the data lives and how connections to it are opened.
///
/// `Clone` is cheap; each operation calls [`Database::connect`] for a
/// connection of its own.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
    wal: bool,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            wal: true,
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a connection (creates the file if it doesn't exist)
    pub fn connect(&self) -> rusqlite::Result<SqliteStore> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        if self.wal {
            // Readers and the single writer proceed concurrently.
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        Ok(SqliteStore { conn })
    }
}

/// One open connection to the data point table
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    // ========== Schema Operations ==========

    pub fn create_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute(schema::CREATE_DATAPOINTS_TABLE, [])?;
        Ok(())
    }

    pub fn drop_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute(schema::DROP_DATAPOINTS_TABLE, [])?;
        Ok(())
    }

    /// Column names of the table, sorted by name
    pub fn columns(&self) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self.conn.prepare(schema::LIST_COLUMNS)?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    // ========== Data Point Operations ==========

    /// Insert a validated record and return the stored row
    pub fn insert(&self, record: &ValidRecord) -> rusqlite::Result<DataPoint> {
        match record.timestamp {
            Some(ts) => self.conn.query_row(
                schema::INSERT_WITH_TIMESTAMP,
                params![record.value, record.asset, ts.timestamp_millis()],
                row_to_datapoint,
            ),
            None => self.conn.query_row(
                schema::INSERT_WITHOUT_TIMESTAMP,
                params![record.value, record.asset],
                row_to_datapoint,
            ),
        }
    }

    /// Get a data point by id
    pub fn get(&self, id: i64) -> rusqlite::Result<Option<DataPoint>> {
        self.conn
            .query_row(schema::SELECT_BY_ID, [id], row_to_datapoint)
            .optional()
    }

    /// Step through the rows of `query` one at a time.
    ///
    /// Rows are fetched from SQLite as `visit` asks for them; returning
    /// `ControlFlow::Break` stops the scan and finalizes the statement.
    pub fn scan<F>(&self, query: &BuiltQuery, mut visit: F) -> rusqlite::Result<()>
    where
        F: FnMut(DataPoint) -> ControlFlow<()>,
    {
        let mut stmt = self.conn.prepare(&query.text)?;
        let mut rows = stmt.query(params_from_iter(query.values.iter()))?;
        while let Some(row) = rows.next()? {
            if visit(row_to_datapoint(row)?).is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Interrupt whatever statement is running once `cancelled` is set.
    ///
    /// The statement then fails with `SQLITE_INTERRUPT`.
    pub fn cancel_on(&self, cancelled: Arc<AtomicBool>) {
        self.conn.progress_handler(
            CANCEL_CHECK_OPS,
            Some(move || cancelled.load(Ordering::Acquire)),
        );
    }

    /// Raw connection access (for tests and maintenance)
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Convert a `id, value, asset, timestamp` row to a DataPoint
fn row_to_datapoint(row: &rusqlite::Row) -> rusqlite::Result<DataPoint> {
    let timestamp_ms: i64 = row.get(3)?;
    DataPoint::from_stored(row.get(0)?, row.get(2)?, row.get(1)?, timestamp_ms)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, timestamp_ms))
}
