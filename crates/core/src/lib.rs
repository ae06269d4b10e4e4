//! Shared pieces of the meteo-sheets ETL:
//! - Configuration file discovery and loading (XDG-compliant)
//! - Filesystem helpers
//! - Built-in defaults

mod config;
pub mod fs;

pub use config::{find_config_file, load_config, ConfigSource};
pub use fs::{ensure_dir_exists, path_exists};

/// Application name used for XDG paths
pub const APP_NAME: &str = "meteo-sheets";

/// Default ingestion coordinate (Delhi)
pub const DEFAULT_LATITUDE: f64 = 28.61;
pub const DEFAULT_LONGITUDE: f64 = 77.23;

/// Default destination spreadsheet name
pub const DEFAULT_SHEET_NAME: &str = "Weather_Data";

/// Default service-account key file
pub const DEFAULT_CREDENTIALS_PATH: &str = "service_account.json";

/// Default run-state file
pub const DEFAULT_STATE_PATH: &str = "etl_state.json";

/// Default backfill span: the previous 7 complete days, excluding today
pub const DEFAULT_BACKFILL_DAYS: i64 = 7;

/// Default forecast horizon in hours
pub const DEFAULT_FORECAST_HOURS: u32 = 12;

/// Default rows per append call against the sheet
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default whole-run deadline in seconds
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 300;

/// Open-Meteo endpoints
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const DEFAULT_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";
