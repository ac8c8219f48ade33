//! webext-storage CLI
//!
//! Inspect and edit a persisted storage database from the command line.

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};
use webext_storage::{AreaName, BrowserStorage, Config, Items, Keys, StorageError};

/// webext-storage CLI
#[derive(Parser, Debug)]
#[command(name = "webext-storage-cli")]
#[command(about = "Read and write extension storage areas")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./webext_storage_data")]
    data_dir: String,

    /// Database name
    #[arg(long, default_value = Config::DEFAULT_DB_NAME)]
    db_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get keys from an area (all keys when none are given)
    Get {
        /// Area: local, sync or managed
        area: AreaName,

        /// Keys to read
        keys: Vec<String>,

        /// JSON object of keys to defaults; overrides positional keys
        #[arg(long)]
        defaults: Option<String>,
    },

    /// Set a key to a JSON value (bare text is stored as a string)
    Set {
        /// Area: local, sync or managed
        area: AreaName,

        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Remove keys from an area
    Remove {
        /// Area: local, sync or managed
        area: AreaName,

        /// Keys to remove
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Remove every key from an area
    Clear {
        /// Area: local, sync or managed
        area: AreaName,
    },

    /// Print the approximate bytes used by keys (all keys when none are given)
    Bytes {
        /// Area: local, sync or managed
        area: AreaName,

        /// Keys to measure
        keys: Vec<String>,
    },
}

fn main() {
    // Initialize tracing/logging (stderr, so stdout stays machine-readable)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,webext_storage=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(args)) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> webext_storage::Result<()> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .db_name(&args.db_name)
        .build();

    tracing::debug!("Data directory: {}", args.data_dir);
    let storage = BrowserStorage::open(&config)?;

    match args.command {
        Commands::Get {
            area,
            keys,
            defaults,
        } => {
            let selector = match defaults {
                Some(text) => Keys::from_value(serde_json::from_str(&text)?)?,
                None => positional_keys(keys),
            };
            let items = storage.area(area).get(selector).await?;
            print_json(&Value::Object(items))?;
        }
        Commands::Set { area, key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            let mut items = Items::new();
            items.insert(key, value);
            storage.area(area).set(items).await?;
        }
        Commands::Remove { area, keys } => {
            storage.area(area).remove(keys).await?;
        }
        Commands::Clear { area } => {
            storage.area(area).clear().await?;
        }
        Commands::Bytes { area, keys } => {
            let bytes = storage.area(area).get_bytes_in_use(positional_keys(keys)).await?;
            println!("{}", bytes);
        }
    }

    Ok(())
}

fn positional_keys(mut keys: Vec<String>) -> Keys {
    match keys.len() {
        0 => Keys::All,
        1 => Keys::One(keys.remove(0)),
        _ => Keys::Many(keys),
    }
}

fn print_json(value: &Value) -> Result<(), StorageError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
