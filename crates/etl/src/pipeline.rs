use slog::{info, Logger};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::dedup::{dedup, existing_timestamps};
use crate::domains::sink::{SinkWriter, Table};
use crate::domains::weather::{normalize, WeatherSource};
use crate::error::EtlError;
use crate::state::{FetchWindow, RunState, StateStore, WindowPolicy};

/// What a completed run did, for the final log line.
#[derive(Debug)]
pub struct RunSummary {
    pub window: FetchWindow,
    pub fetched: usize,
    pub appended: usize,
}

/// The run orchestrator: state decides the window, the source fills it, the
/// normalizer and dedup filter shape it, the writer lands it.
pub struct Pipeline<'a, S, T> {
    logger: Logger,
    source: &'a S,
    table: &'a T,
    store: StateStore,
    policy: WindowPolicy,
    batch_size: usize,
}

impl<'a, S: WeatherSource, T: Table> Pipeline<'a, S, T> {
    pub fn new(
        logger: Logger,
        source: &'a S,
        table: &'a T,
        store: StateStore,
        policy: WindowPolicy,
        batch_size: usize,
    ) -> Self {
        Pipeline {
            logger,
            source,
            table,
            store,
            policy,
            batch_size,
        }
    }

    /// One full ingestion pass. Run state is advanced and persisted only
    /// after every new row has been appended; any earlier failure leaves
    /// the stored state untouched so the next invocation retries the same
    /// window and the dedup filter absorbs whatever already landed.
    pub async fn run(&self) -> Result<RunSummary, EtlError> {
        let state = self.store.load();
        let now = OffsetDateTime::now_utc();
        let window = state.fetch_window(now.date(), &self.policy);
        match &window {
            FetchWindow::Historical {
                start_date,
                end_date,
            } => info!(self.logger, "backfill mode: {} to {}", start_date, end_date),
            FetchWindow::Forecast { hours } => {
                info!(self.logger, "incremental mode: next {} hours", hours)
            }
        }

        let hourly = self.source.fetch(&window).await?;
        let fetched = hourly.time.len();

        let observations =
            normalize(&hourly, now).map_err(|e| EtlError::Normalize(e.to_string()))?;
        info!(
            self.logger,
            "normalized {} of {} fetched hours",
            observations.len(),
            fetched
        );

        let table_rows = self
            .table
            .read_all_rows()
            .await
            .map_err(|e| EtlError::Sink(format!("reading existing rows: {}", e)))?;
        let existing = existing_timestamps(&table_rows);
        let fresh = dedup(observations, &existing);

        let appended = if fresh.is_empty() {
            info!(self.logger, "no new rows to add");
            0
        } else {
            let writer = SinkWriter::new(self.table, self.logger.clone(), self.batch_size);
            writer.ensure_header().await?;
            writer.append_batch(&fresh).await?
        };

        let completed_at = now
            .format(&Rfc3339)
            .map_err(|e| EtlError::State(format!("formatting completion time: {}", e)))?;
        let next = RunState {
            first_run: false,
            last_run: Some(completed_at),
        };
        self.store
            .save(&next)
            .map_err(|e| EtlError::State(format!("persisting run state: {}", e)))?;

        info!(self.logger, "run complete, appended {} rows", appended);
        Ok(RunSummary {
            window,
            fetched,
            appended,
        })
    }
}
