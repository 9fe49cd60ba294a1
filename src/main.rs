//! Timeseries CLI - manage and query the data point table

use clap::{Parser, Subcommand, ValueEnum};
use futures_util::StreamExt;
use std::path::PathBuf;
use timeseries::config::{self, TimeseriesConfig};
use timeseries::validate::parse_timestamp;
use timeseries::{Error, ReadOptions, Timeseries, ui};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "timeseries")]
#[command(version)]
#[command(about = "Validated writes and streaming range reads over a data point table")]
#[command(long_about = r#"
Stores timestamped numeric measurements keyed by asset in a SQLite table and
streams them back filtered by asset and/or time interval.

Example usage:
  timeseries create-schema
  timeseries put --asset pump-1 --value 42.42
  timeseries put --asset pump-1 --value 24 --timestamp 2003-06-26
  timeseries read --asset pump-1 --from 2000-06-26 --to 2005-06-26
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file with default settings
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    #[command(flatten)]
    Data(DataCommand),
}

/// Commands that work against the database
#[derive(Subcommand)]
enum DataCommand {
    /// Create the datapoints table
    CreateSchema,

    /// Drop the datapoints table (no-op when absent)
    DropSchema,

    /// List the table's columns
    Columns,

    /// Insert one data point
    Put {
        /// Asset identifier
        #[arg(short, long)]
        asset: String,

        /// Measured value
        #[arg(long)]
        value: String,

        /// Timestamp (ISO-8601); defaults to now
        #[arg(short, long)]
        timestamp: Option<String>,
    },

    /// Fetch one data point by id
    Get {
        #[arg(long)]
        id: i64,
    },

    /// Stream data points matching the filters
    Read {
        /// Only this asset
        #[arg(short, long)]
        asset: Option<String>,

        /// Inclusive lower time bound (ISO-8601)
        #[arg(long)]
        from: Option<String>,

        /// Inclusive upper time bound (ISO-8601)
        #[arg(long)]
        to: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
    Table,
}

fn parse_bound(label: &str, raw: Option<String>) -> anyhow::Result<Option<chrono::DateTime<chrono::Utc>>> {
    raw.map(|s| {
        parse_timestamp(&s).ok_or_else(|| anyhow::anyhow!("invalid --{} timestamp: {}", label, s))
    })
    .transpose()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    match cli.command {
        Commands::Init { force } => {
            let defaults = TimeseriesConfig {
                database: cli.database.as_ref().map(|p| p.display().to_string()),
                ..TimeseriesConfig::default()
            };
            defaults.save(&config_path, force)?;
            ui::success(&format!("Wrote config to {}", config_path.display()));
        }

        Commands::Data(command) => {
            let settings = TimeseriesConfig::load(&config_path)?;
            let db = settings.database_at(cli.database.as_deref());
            config::prepare_database_dir(&db)?;
            tracing::debug!("Using database {:?}", db.path());
            let store = Timeseries::new(db).with_stream_buffer(settings.stream_buffer());
            run(&store, command).await?;
        }
    }

    Ok(())
}

async fn run(store: &Timeseries, command: DataCommand) -> anyhow::Result<()> {
    match command {
        DataCommand::CreateSchema => {
            store.create_schema().await?;
            ui::database(store.database().path());
            ui::success("Schema created");
        }

        DataCommand::DropSchema => {
            store.drop_schema().await?;
            ui::success("Schema dropped");
        }

        DataCommand::Columns => {
            let columns = store.columns().await?;
            if columns.is_empty() {
                ui::empty("No datapoints table.");
            } else {
                ui::header("Columns");
                for column in columns {
                    ui::column(&column);
                }
            }
        }

        DataCommand::Put { asset, value, timestamp } => {
            // Numeric strings are converted by the validator.
            let mut record = serde_json::json!({ "asset": asset, "value": value });
            if let Some(ts) = timestamp {
                record["timestamp"] = serde_json::Value::String(ts);
            }

            match store.put(&record).await {
                Ok(point) => {
                    ui::success("Stored");
                    ui::point(&point);
                }
                Err(Error::Validation(e)) => {
                    ui::violations(&e);
                    anyhow::bail!("record rejected");
                }
                Err(e) => return Err(e.into()),
            }
        }

        DataCommand::Get { id } => match store.get(id).await? {
            Some(point) => ui::point(&point),
            None => ui::empty(&format!("No data point with id {}.", id)),
        },

        DataCommand::Read { asset, from, to, format } => {
            let opts = ReadOptions {
                asset,
                from: parse_bound("from", from)?,
                to: parse_bound("to", to)?,
            };
            let mut stream = store.create_read_stream(opts);

            let mut count = 0usize;
            let mut table = ui::DataPointTable::new();
            while let Some(item) = stream.next().await {
                let point = item?;
                count += 1;
                match format {
                    Format::Text => ui::point(&point),
                    Format::Json => println!("{}", serde_json::to_string(&point)?),
                    Format::Table => table.add_point(&point),
                }
            }

            if !table.is_empty() {
                println!("{}", table.build());
            }
            if count == 0 && !matches!(format, Format::Json) {
                ui::empty("No data points found.");
            }
            tracing::debug!("Streamed {} data points", count);
        }
    }

    Ok(())
}
