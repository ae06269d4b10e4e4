use std::collections::HashSet;

use crate::domains::weather::WeatherObservation;

/// Timestamps already present in the destination table: the first column of
/// every row after the header. Read fresh each run, this set is the sole
/// source of truth for "already ingested".
pub fn existing_timestamps(rows: &[Vec<String>]) -> HashSet<String> {
    rows.iter()
        .skip(1)
        .filter_map(|row| row.first().cloned())
        .collect()
}

/// Drop observations whose timestamp is already in the table.
///
/// Pure and order-preserving. Applying it twice with the same existing set
/// is a no-op, so a re-run over an overlapping window appends nothing
/// twice.
pub fn dedup(
    observations: Vec<WeatherObservation>,
    existing: &HashSet<String>,
) -> Vec<WeatherObservation> {
    observations
        .into_iter()
        .filter(|obs| !existing.contains(&obs.timestamp))
        .collect()
}
