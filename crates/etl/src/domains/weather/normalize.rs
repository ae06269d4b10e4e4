use anyhow::{anyhow, Error};
use time::{macros::format_description, OffsetDateTime};

use super::open_meteo::HourlyBlock;

/// Default when the provider omits visibility for an hour (meters).
pub const DEFAULT_VISIBILITY_M: f64 = 24_000.0;
/// Default weather classification when absent (clear sky).
pub const DEFAULT_WEATHER_CODE: i64 = 0;
/// Default precipitation when absent (mm).
pub const DEFAULT_PRECIPITATION_MM: f64 = 0.0;

/// One normalized hourly reading. `timestamp` is the dedup key; raw
/// positional arrays never travel past this type.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    /// Local datetime string as returned by the provider, e.g.
    /// `2024-01-01T10:00`. Unique within the destination table.
    pub timestamp: String,
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub visibility_m: f64,
    pub weather_code: i64,
    pub precipitation_mm: f64,
    /// Ingestion wall-clock time, shared by every row of a batch. Not part
    /// of the dedup key.
    pub fetched_at: String,
}

impl WeatherObservation {
    /// Render as a sheet row in destination-column order. Optional fields
    /// without a documented default become empty cells.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.temperature_c.map(|v| v.to_string()).unwrap_or_default(),
            self.humidity_pct.map(|v| v.to_string()).unwrap_or_default(),
            self.visibility_m.to_string(),
            self.weather_code.to_string(),
            self.precipitation_mm.to_string(),
            self.fetched_at.clone(),
        ]
    }
}

/// Flatten the provider's parallel arrays into typed rows.
///
/// The time array is authoritative for the row count; shorter value arrays
/// read as absent values, never as an index error. An hour carrying neither
/// temperature nor humidity is unusable and dropped. Rows keep the source
/// order and all share one `fetched_at` stamp.
pub fn normalize(
    hourly: &HourlyBlock,
    fetched_at: OffsetDateTime,
) -> Result<Vec<WeatherObservation>, Error> {
    let stamp_format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let stamp = fetched_at
        .format(&stamp_format)
        .map_err(|e| anyhow!("error formatting ingestion time: {}", e))?;

    let mut observations = Vec::with_capacity(hourly.time.len());
    for (index, timestamp) in hourly.time.iter().enumerate() {
        let temperature_c = value_at(&hourly.temperature_2m, index);
        let humidity_pct = value_at(&hourly.relative_humidity_2m, index);
        if temperature_c.is_none() && humidity_pct.is_none() {
            continue;
        }

        observations.push(WeatherObservation {
            timestamp: timestamp.clone(),
            temperature_c,
            humidity_pct,
            visibility_m: value_at(&hourly.visibility, index).unwrap_or(DEFAULT_VISIBILITY_M),
            weather_code: value_at(&hourly.weather_code, index).unwrap_or(DEFAULT_WEATHER_CODE),
            precipitation_mm: value_at(&hourly.precipitation, index)
                .unwrap_or(DEFAULT_PRECIPITATION_MM),
            fetched_at: stamp.clone(),
        });
    }

    Ok(observations)
}

fn value_at<T: Copy>(values: &[Option<T>], index: usize) -> Option<T> {
    values.get(index).copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn block(times: &[&str]) -> HourlyBlock {
        HourlyBlock {
            time: times.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn drops_rows_missing_both_temperature_and_humidity() {
        let mut hourly = block(&["2024-01-01T10:00", "2024-01-01T11:00"]);
        hourly.temperature_2m = vec![Some(21.0), None];
        hourly.relative_humidity_2m = vec![Some(60.0), None];
        hourly.precipitation = vec![Some(0.2), Some(5.0)];

        let rows = normalize(&hourly, datetime!(2024-01-15 10:00:00 UTC)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp, "2024-01-01T10:00");
    }

    #[test]
    fn keeps_rows_with_only_one_of_temperature_or_humidity() {
        let mut hourly = block(&["2024-01-01T10:00", "2024-01-01T11:00"]);
        hourly.temperature_2m = vec![Some(21.0), None];
        hourly.relative_humidity_2m = vec![None, Some(55.0)];

        let rows = normalize(&hourly, datetime!(2024-01-15 10:00:00 UTC)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].humidity_pct, None);
        assert_eq!(rows[1].temperature_c, None);
    }

    #[test]
    fn substitutes_documented_defaults_for_absent_fields() {
        let mut hourly = block(&["2024-01-01T10:00"]);
        hourly.temperature_2m = vec![Some(21.0)];
        hourly.relative_humidity_2m = vec![Some(60.0)];
        // visibility, weather_code, precipitation arrays entirely absent

        let rows = normalize(&hourly, datetime!(2024-01-15 10:00:00 UTC)).unwrap();
        assert_eq!(rows[0].visibility_m, DEFAULT_VISIBILITY_M);
        assert_eq!(rows[0].weather_code, DEFAULT_WEATHER_CODE);
        assert_eq!(rows[0].precipitation_mm, DEFAULT_PRECIPITATION_MM);
    }

    #[test]
    fn short_value_arrays_read_as_absent_not_as_index_errors() {
        let mut hourly = block(&["2024-01-01T10:00", "2024-01-01T11:00", "2024-01-01T12:00"]);
        hourly.temperature_2m = vec![Some(20.0)];
        hourly.relative_humidity_2m = vec![Some(58.0), Some(59.0)];
        hourly.visibility = vec![Some(9_000.0)];

        let rows = normalize(&hourly, datetime!(2024-01-15 10:00:00 UTC)).unwrap();
        // hour 3 has neither temperature nor humidity and is dropped
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].visibility_m, 9_000.0);
        assert_eq!(rows[1].visibility_m, DEFAULT_VISIBILITY_M);
    }

    #[test]
    fn preserves_source_order_and_shares_one_fetched_at_stamp() {
        let mut hourly = block(&["2024-01-01T10:00", "2024-01-01T11:00", "2024-01-01T12:00"]);
        hourly.temperature_2m = vec![Some(20.0), Some(21.0), Some(22.0)];

        let rows = normalize(&hourly, datetime!(2024-01-15 10:30:45 UTC)).unwrap();
        let times: Vec<&str> = rows.iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(
            times,
            vec!["2024-01-01T10:00", "2024-01-01T11:00", "2024-01-01T12:00"]
        );
        assert!(rows.iter().all(|r| r.fetched_at == "2024-01-15 10:30:45"));
    }

    #[test]
    fn to_row_always_yields_seven_cells() {
        let mut hourly = block(&["2024-01-01T10:00"]);
        hourly.temperature_2m = vec![Some(21.5)];

        let rows = normalize(&hourly, datetime!(2024-01-15 10:00:00 UTC)).unwrap();
        let row = rows[0].to_row();
        assert_eq!(
            row,
            vec![
                "2024-01-01T10:00",
                "21.5",
                "",
                "24000",
                "0",
                "0",
                "2024-01-15 10:00:00",
            ]
        );
    }
}
