use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::query::DEFAULT_STREAM_BUFFER;
use crate::storage::Database;
use crate::storage::sqlite::DEFAULT_BUSY_TIMEOUT;

/// Contents of `timeseries.toml`; absent keys take their defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeseriesConfig {
    pub database: Option<String>,
    pub busy_timeout_ms: u64,
    pub stream_buffer: usize,
    pub wal: bool,
}

impl Default for TimeseriesConfig {
    fn default() -> Self {
        Self {
            database: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            wal: true,
        }
    }
}

impl TimeseriesConfig {
    /// Read the config at `path`; a missing file means all defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading config {}", path.display()));
            }
        };
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Write this config to `path`, refusing to replace a file unless `overwrite`
    pub fn save(&self, path: &Path, overwrite: bool) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        let opened = if overwrite {
            OpenOptions::new().write(true).create(true).truncate(true).open(path)
        } else {
            OpenOptions::new().write(true).create_new(true).open(path)
        };
        let mut file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display())
            }
            Err(e) => return Err(e).with_context(|| format!("writing config {}", path.display())),
        };
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    /// Connection settings for `path`, or for the configured database
    pub fn database_at(&self, path: Option<&Path>) -> Database {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| self.database.as_ref().map(PathBuf::from))
            .unwrap_or_else(default_database_path);
        Database::new(path)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_wal(self.wal)
    }

    pub fn stream_buffer(&self) -> usize {
        self.stream_buffer.max(1)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("timeseries.toml")
}

pub fn default_database_path() -> PathBuf {
    PathBuf::from("timeseries.db")
}

/// Create the directory the database file lives in
pub fn prepare_database_dir(db: &Database) -> anyhow::Result<()> {
    match db.path().parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("creating database directory {}", dir.display())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = TimeseriesConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, TimeseriesConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeseries.toml");
        std::fs::write(&path, "database = \"data/points.db\"\nstream_buffer = 0\n").unwrap();

        let config = TimeseriesConfig::load(&path).unwrap();
        assert_eq!(config.database.as_deref(), Some("data/points.db"));
        assert_eq!(config.busy_timeout_ms, 5000);
        assert!(config.wal);
        assert_eq!(config.stream_buffer(), 1);
        assert_eq!(config.database_at(None).path(), Path::new("data/points.db"));
        assert_eq!(
            config.database_at(Some(Path::new("other.db"))).path(),
            Path::new("other.db")
        );
    }

    #[test]
    fn test_malformed_config_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeseries.toml");
        std::fs::write(&path, "stream_buffer = \"lots\"\n").unwrap();

        let err = TimeseriesConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeseries.toml"));
    }

    #[test]
    fn test_save_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeseries.toml");
        let config = TimeseriesConfig {
            stream_buffer: 8,
            ..TimeseriesConfig::default()
        };

        TimeseriesConfig::default().save(&path, false).unwrap();
        let err = config.save(&path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));

        config.save(&path, true).unwrap();
        assert_eq!(TimeseriesConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_prepare_database_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("nested").join("points.db"));
        prepare_database_dir(&db).unwrap();
        prepare_database_dir(&db).unwrap();
        assert!(db.path().parent().unwrap().is_dir());

        prepare_database_dir(&Database::new("points.db")).unwrap();
    }
}
