use std::env;
use std::time::Duration;

use clap::Parser;
use meteo_sheets_core::{
    find_config_file, load_config, ConfigSource, DEFAULT_ARCHIVE_URL, DEFAULT_BACKFILL_DAYS,
    DEFAULT_BATCH_SIZE, DEFAULT_CREDENTIALS_PATH, DEFAULT_FORECAST_HOURS, DEFAULT_FORECAST_URL,
    DEFAULT_LATITUDE, DEFAULT_LONGITUDE, DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_SHEET_NAME,
    DEFAULT_STATE_PATH,
};
use slog::{o, Drain, Level, Logger};

use crate::state::WindowPolicy;

#[derive(Parser, Clone, Debug, serde::Deserialize, Default)]
#[command(
    author,
    version,
    about = "Weather ETL - appends hourly Open-Meteo rows to a Google Sheet"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $METEO_ETL_CONFIG, ./etl.toml,
    /// $XDG_CONFIG_HOME/meteo-sheets/etl.toml, /etc/meteo-sheets/etl.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "METEO_ETL_LEVEL")]
    pub level: Option<String>,

    /// Latitude of the ingestion coordinate
    #[arg(long, env = "METEO_ETL_LATITUDE")]
    pub latitude: Option<f64>,

    /// Longitude of the ingestion coordinate
    #[arg(long, env = "METEO_ETL_LONGITUDE")]
    pub longitude: Option<f64>,

    /// Name of the destination spreadsheet
    #[arg(short, long, env = "METEO_ETL_SHEET_NAME")]
    pub sheet_name: Option<String>,

    /// Path to the service-account key file
    #[arg(long, env = "METEO_ETL_CREDENTIALS")]
    pub credentials_path: Option<String>,

    /// Path to the persisted run-state file
    #[arg(long, env = "METEO_ETL_STATE_PATH")]
    pub state_path: Option<String>,

    /// Days of history ingested by the first run, ending yesterday
    #[arg(long, env = "METEO_ETL_BACKFILL_DAYS")]
    pub backfill_days: Option<i64>,

    /// Forecast horizon in hours for steady-state runs
    #[arg(long, env = "METEO_ETL_FORECAST_HOURS")]
    pub forecast_hours: Option<u32>,

    /// Rows per append call against the sheet
    #[arg(long, env = "METEO_ETL_BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Whole-run deadline in seconds
    #[arg(long, env = "METEO_ETL_RUN_TIMEOUT_SECS")]
    pub run_timeout_secs: Option<u64>,

    /// Override the Open-Meteo forecast endpoint
    #[arg(long, env = "METEO_ETL_FORECAST_URL")]
    pub forecast_url: Option<String>,

    /// Override the Open-Meteo archive endpoint
    #[arg(long, env = "METEO_ETL_ARCHIVE_URL")]
    pub archive_url: Option<String>,
}

impl Cli {
    /// Get the effective configuration value with defaults
    pub fn latitude(&self) -> f64 {
        self.latitude.unwrap_or(DEFAULT_LATITUDE)
    }

    pub fn longitude(&self) -> f64 {
        self.longitude.unwrap_or(DEFAULT_LONGITUDE)
    }

    pub fn sheet_name(&self) -> String {
        self.sheet_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string())
    }

    pub fn credentials_path(&self) -> String {
        self.credentials_path
            .clone()
            .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string())
    }

    pub fn state_path(&self) -> String {
        self.state_path
            .clone()
            .unwrap_or_else(|| DEFAULT_STATE_PATH.to_string())
    }

    pub fn backfill_days(&self) -> i64 {
        self.backfill_days.unwrap_or(DEFAULT_BACKFILL_DAYS)
    }

    pub fn forecast_hours(&self) -> u32 {
        self.forecast_hours.unwrap_or(DEFAULT_FORECAST_HOURS)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs.unwrap_or(DEFAULT_RUN_TIMEOUT_SECS))
    }

    pub fn forecast_url(&self) -> String {
        self.forecast_url
            .clone()
            .unwrap_or_else(|| DEFAULT_FORECAST_URL.to_string())
    }

    pub fn archive_url(&self) -> String {
        self.archive_url
            .clone()
            .unwrap_or_else(|| DEFAULT_ARCHIVE_URL.to_string())
    }

    pub fn window_policy(&self) -> WindowPolicy {
        WindowPolicy {
            backfill_days: self.backfill_days(),
            forecast_hours: self.forecast_hours(),
        }
    }
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> Cli {
    let cli_args = Cli::parse();

    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file("METEO_ETL_CONFIG", "etl.toml")
    };

    let file_config: Cli = load_config(&source).unwrap_or_default();

    // CLI args override file config (env vars are handled by clap)
    Cli {
        config: cli_args.config,
        level: cli_args.level.or(file_config.level),
        latitude: cli_args.latitude.or(file_config.latitude),
        longitude: cli_args.longitude.or(file_config.longitude),
        sheet_name: cli_args.sheet_name.or(file_config.sheet_name),
        credentials_path: cli_args.credentials_path.or(file_config.credentials_path),
        state_path: cli_args.state_path.or(file_config.state_path),
        backfill_days: cli_args.backfill_days.or(file_config.backfill_days),
        forecast_hours: cli_args.forecast_hours.or(file_config.forecast_hours),
        batch_size: cli_args.batch_size.or(file_config.batch_size),
        run_timeout_secs: cli_args.run_timeout_secs.or(file_config.run_timeout_secs),
        forecast_url: cli_args.forecast_url.or(file_config.forecast_url),
        archive_url: cli_args.archive_url.or(file_config.archive_url),
    }
}

pub fn setup_logger(cli: &Cli) -> Logger {
    let level_name = cli
        .level
        .clone()
        .or_else(|| env::var("RUST_LOG").ok())
        .unwrap_or_default();
    let log_level = match level_name.to_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "warn" => Level::Warning,
        "error" => Level::Error,
        _ => Level::Info,
    };

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(log_level).fuse();
    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let cli = Cli::default();
        assert_eq!(cli.latitude(), DEFAULT_LATITUDE);
        assert_eq!(cli.longitude(), DEFAULT_LONGITUDE);
        assert_eq!(cli.sheet_name(), "Weather_Data");
        assert_eq!(cli.credentials_path(), "service_account.json");
        assert_eq!(cli.state_path(), "etl_state.json");
        assert_eq!(cli.backfill_days(), 7);
        assert_eq!(cli.forecast_hours(), 12);
        assert_eq!(cli.batch_size(), 100);
    }

    #[test]
    fn window_policy_follows_configured_spans() {
        let cli = Cli {
            backfill_days: Some(5),
            forecast_hours: Some(24),
            ..Cli::default()
        };
        let policy = cli.window_policy();
        assert_eq!(policy.backfill_days, 5);
        assert_eq!(policy.forecast_hours, 24);
    }
}
