use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use slog::{info, warn, Logger};
use time::{Date, Duration};

/// Persistent record deciding the mode of the next run.
///
/// Created fresh (`first_run = true`) when nothing is on disk, read once at
/// the start of an invocation, and rewritten exactly once after a fully
/// successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// True until the first successful ingestion completes.
    pub first_run: bool,
    /// RFC 3339 timestamp of the last successful completion.
    pub last_run: Option<String>,
}

impl Default for RunState {
    fn default() -> Self {
        RunState {
            first_run: true,
            last_run: None,
        }
    }
}

/// Spans for the two run modes. Deployments have wanted anything from a few
/// days to a month of backfill, so both spans are configuration rather than
/// contract.
#[derive(Debug, Clone)]
pub struct WindowPolicy {
    pub backfill_days: i64,
    pub forecast_hours: u32,
}

/// The window a single run requests from the weather API. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchWindow {
    /// Closed date range against the archive endpoint.
    Historical { start_date: Date, end_date: Date },
    /// Next N hours against the forecast endpoint.
    Forecast { hours: u32 },
}

impl RunState {
    /// Pick the window for this run: a historical backfill ending yesterday
    /// until the first run has succeeded, a short forecast window on every
    /// run after that. Today is excluded from backfills to avoid
    /// partial-day data.
    pub fn fetch_window(&self, today: Date, policy: &WindowPolicy) -> FetchWindow {
        if self.first_run {
            FetchWindow::Historical {
                start_date: today - Duration::days(policy.backfill_days),
                end_date: today - Duration::days(1),
            }
        } else {
            FetchWindow::Forecast {
                hours: policy.forecast_hours,
            }
        }
    }
}

/// JSON-file-backed store for [`RunState`].
pub struct StateStore {
    path: PathBuf,
    logger: Logger,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>, logger: Logger) -> Self {
        StateStore {
            path: path.into(),
            logger,
        }
    }

    /// Read the persisted state. A missing file means a fresh first run; an
    /// unreadable one is logged as a warning and treated the same way,
    /// never as a fatal error.
    pub fn load(&self) -> RunState {
        if !self.path.exists() {
            info!(
                self.logger,
                "no state file at {}, starting fresh",
                self.path.display()
            );
            return RunState::default();
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) => {
                warn!(
                    self.logger,
                    "state file {} unreadable ({}), falling back to first run",
                    self.path.display(),
                    err
                );
                return RunState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(err) => {
                warn!(
                    self.logger,
                    "state file {} corrupt ({}), falling back to first run",
                    self.path.display(),
                    err
                );
                RunState::default()
            }
        }
    }

    /// Replace the state record on disk. The record is written to a sibling
    /// temp file and renamed into place, so a reader never observes a
    /// partially written state.
    pub fn save(&self, state: &RunState) -> Result<(), anyhow::Error> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                meteo_sheets_core::ensure_dir_exists(parent);
            }
        }

        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::o;
    use time::macros::date;

    fn test_logger() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    fn policy() -> WindowPolicy {
        WindowPolicy {
            backfill_days: 7,
            forecast_hours: 12,
        }
    }

    #[test]
    fn first_run_selects_historical_window_ending_yesterday() {
        let window = RunState::default().fetch_window(date!(2024 - 01 - 15), &policy());
        assert_eq!(
            window,
            FetchWindow::Historical {
                start_date: date!(2024 - 01 - 08),
                end_date: date!(2024 - 01 - 14),
            }
        );
    }

    #[test]
    fn later_runs_select_forecast_window() {
        let state = RunState {
            first_run: false,
            last_run: Some("2024-01-14T10:00:00Z".to_string()),
        };
        let window = state.fetch_window(date!(2024 - 01 - 15), &policy());
        assert_eq!(window, FetchWindow::Forecast { hours: 12 });
    }

    #[test]
    fn load_returns_default_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("etl_state.json"), test_logger());
        assert_eq!(store.load(), RunState::default());
    }

    #[test]
    fn load_falls_back_to_default_on_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl_state.json");
        fs::write(&path, "{not json").unwrap();

        let store = StateStore::new(&path, test_logger());
        assert_eq!(store.load(), RunState::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("etl_state.json"), test_logger());

        let state = RunState {
            first_run: false,
            last_run: Some("2024-01-15T11:00:00Z".to_string()),
        };
        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
    }

    #[test]
    fn save_overwrites_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("etl_state.json"), test_logger());

        store.save(&RunState::default()).unwrap();
        let updated = RunState {
            first_run: false,
            last_run: Some("2024-01-15T12:00:00Z".to_string()),
        };
        store.save(&updated).unwrap();
        assert_eq!(store.load(), updated);
    }

    #[test]
    fn save_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/etl_state.json"), test_logger());
        store.save(&RunState::default()).unwrap();
        assert_eq!(store.load(), RunState::default());
    }
}
