use std::time::Duration;

use slog::{debug, info, Logger};
use tokio::time::sleep;

use super::table::Table;
use crate::domains::weather::WeatherObservation;
use crate::error::EtlError;

/// Fixed destination schema, in column order.
pub const HEADER: [&str; 7] = [
    "Time",
    "Temperature_2m",
    "Humidity_2m",
    "Visibility",
    "WeatherCode",
    "Precipitation",
    "Fetched_At",
];

/// Pause between consecutive append calls. A fixed delay to stay under the
/// sheet API's write rate limits, not adaptive backoff.
const BATCH_PAUSE: Duration = Duration::from_secs(1);

/// Appends normalized rows to the destination table in bounded chunks.
pub struct SinkWriter<'a, T: Table + ?Sized> {
    table: &'a T,
    logger: Logger,
    batch_size: usize,
}

impl<'a, T: Table + ?Sized> SinkWriter<'a, T> {
    pub fn new(table: &'a T, logger: Logger, batch_size: usize) -> Self {
        SinkWriter {
            table,
            logger,
            batch_size: batch_size.max(1),
        }
    }

    /// Write the header row only when the table is empty (no rows, or a
    /// blank first row). An existing header is never overwritten.
    pub async fn ensure_header(&self) -> Result<(), EtlError> {
        let row_count = self
            .table
            .row_count()
            .await
            .map_err(|e| EtlError::Sink(format!("reading row count: {}", e)))?;

        let needs_header = row_count == 0
            || self
                .table
                .first_row_values()
                .await
                .map_err(|e| EtlError::Sink(format!("reading first row: {}", e)))?
                .is_empty();

        if needs_header {
            let header = HEADER.iter().map(|s| s.to_string()).collect();
            self.table
                .append_row(header)
                .await
                .map_err(|e| EtlError::Sink(format!("writing header row: {}", e)))?;
            info!(self.logger, "header row written");
        }

        Ok(())
    }

    /// Append observations in fixed-size chunks with a pause between
    /// chunks. A failure after at least one chunk landed is reported as a
    /// partial write carrying the landed count, so the caller knows not to
    /// advance run state.
    pub async fn append_batch(
        &self,
        observations: &[WeatherObservation],
    ) -> Result<usize, EtlError> {
        let total = observations.len();
        let mut written = 0;

        for (index, chunk) in observations.chunks(self.batch_size).enumerate() {
            if index > 0 {
                sleep(BATCH_PAUSE).await;
            }

            let rows: Vec<Vec<String>> = chunk.iter().map(WeatherObservation::to_row).collect();
            if let Err(err) = self.table.append_rows(rows).await {
                if written > 0 {
                    return Err(EtlError::PartialWrite {
                        written,
                        total,
                        reason: err.to_string(),
                    });
                }
                return Err(EtlError::Sink(format!("appending rows: {}", err)));
            }

            written += chunk.len();
            debug!(self.logger, "appended {}/{} rows", written, total);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::sink::MockTable;
    use anyhow::anyhow;
    use mockall::Sequence;
    use slog::o;

    fn test_logger() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    fn observation(hour: usize) -> WeatherObservation {
        WeatherObservation {
            timestamp: format!("2024-01-01T{:02}:00", hour % 24),
            temperature_c: Some(20.0),
            humidity_pct: Some(60.0),
            visibility_m: 24_000.0,
            weather_code: 0,
            precipitation_mm: 0.0,
            fetched_at: "2024-01-15 10:00:00".to_string(),
        }
    }

    fn observations(count: usize) -> Vec<WeatherObservation> {
        (0..count).map(observation).collect()
    }

    #[tokio::test]
    async fn header_written_when_table_is_empty() {
        let mut table = MockTable::new();
        table.expect_row_count().returning(|| Ok(0));
        table
            .expect_append_row()
            .withf(|row| row.len() == HEADER.len() && row[0] == "Time")
            .times(1)
            .returning(|_| Ok(()));

        SinkWriter::new(&table, test_logger(), 100)
            .ensure_header()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn existing_header_left_alone() {
        let mut table = MockTable::new();
        table.expect_row_count().returning(|| Ok(3));
        table
            .expect_first_row_values()
            .returning(|| Ok(HEADER.iter().map(|s| s.to_string()).collect()));
        table.expect_append_row().never();

        SinkWriter::new(&table, test_logger(), 100)
            .ensure_header()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn blank_first_row_counts_as_empty() {
        let mut table = MockTable::new();
        table.expect_row_count().returning(|| Ok(2));
        table.expect_first_row_values().returning(|| Ok(Vec::new()));
        table.expect_append_row().times(1).returning(|_| Ok(()));

        SinkWriter::new(&table, test_logger(), 100)
            .ensure_header()
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_chunked_to_the_configured_size() {
        let mut table = MockTable::new();
        let mut seq = Sequence::new();
        for expected in [2usize, 2, 1] {
            table
                .expect_append_rows()
                .withf(move |rows| rows.len() == expected)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let written = SinkWriter::new(&table, test_logger(), 2)
            .append_batch(&observations(5))
            .await
            .unwrap();
        assert_eq!(written, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn later_chunk_failure_reports_partial_write() {
        let mut table = MockTable::new();
        let mut seq = Sequence::new();
        table
            .expect_append_rows()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        table
            .expect_append_rows()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow!("quota exhausted")));

        let err = SinkWriter::new(&table, test_logger(), 2)
            .append_batch(&observations(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EtlError::PartialWrite {
                written: 2,
                total: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn first_chunk_failure_is_a_plain_sink_error() {
        let mut table = MockTable::new();
        table
            .expect_append_rows()
            .times(1)
            .returning(|_| Err(anyhow!("permission denied")));

        let err = SinkWriter::new(&table, test_logger(), 100)
            .append_batch(&observations(3))
            .await
            .unwrap_err();
        assert!(matches!(err, EtlError::Sink(_)));
    }
}
