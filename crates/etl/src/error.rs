use thiserror::Error;

/// Failure classes of a single ETL run. Every variant names the stage that
/// produced it, so the one diagnostic printed on exit is enough to tell
/// credential trouble from fetch trouble from sheet trouble.
#[derive(Debug, Error)]
pub enum EtlError {
    /// Missing or unreadable credentials/configuration; aborts before any
    /// network call.
    #[error("config: {0}")]
    Config(String),

    /// The weather fetch exhausted its retries or hit a non-retryable
    /// response. Run state stays as it was, so the next invocation requests
    /// the same window again.
    #[error("weather fetch failed: {0}")]
    FetchFailed(String),

    /// The weather API answered with a structurally unexpected payload.
    /// Retrying the identical request within this run is assumed futile.
    #[error("invalid weather response: {0}")]
    InvalidResponse(String),

    #[error("normalize: {0}")]
    Normalize(String),

    /// A destination-table operation failed before any data row landed.
    #[error("sink: {0}")]
    Sink(String),

    /// A later chunk failed after earlier chunks were appended. Run state
    /// must not be advanced; the dedup filter absorbs the overlap on the
    /// next run.
    #[error("partial write: {written} of {total} rows appended before failure: {reason}")]
    PartialWrite {
        written: usize,
        total: usize,
        reason: String,
    },

    #[error("run state: {0}")]
    State(String),
}
