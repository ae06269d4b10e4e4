use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use slog::{debug, Logger};
use time::macros::format_description;

use crate::error::EtlError;
use crate::state::FetchWindow;

/// Hourly variables requested from both endpoints.
const HOURLY_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,visibility,weather_code,precipitation";

/// Timestamps come back in the coordinate's local timezone, matching the
/// values already in the destination table.
const TIMEZONE: &str = "auto";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transient failures (timeouts, 5xx, connection errors) are retried this
/// many times; 4xx and decode failures are not retried at all.
const MAX_RETRIES: u32 = 3;

/// Top-level Open-Meteo response. Both the forecast and the archive
/// endpoint share this shape.
#[derive(Debug, Deserialize)]
pub struct HourlyResponse {
    pub hourly: Option<HourlyBlock>,
}

/// Parallel arrays keyed by field name; `time` is the authoritative series.
/// Value arrays may be missing entirely, shorter than `time`, or contain
/// nulls, all of which read as an absent value for that hour.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlyBlock {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub visibility: Vec<Option<f64>>,
    #[serde(default, alias = "weathercode")]
    pub weather_code: Vec<Option<i64>>,
    #[serde(default)]
    pub precipitation: Vec<Option<f64>>,
}

/// Anything that can answer a fetch window with an hourly series. The
/// production implementation talks to Open-Meteo; tests substitute fakes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch(&self, window: &FetchWindow) -> Result<HourlyBlock, EtlError>;
}

/// Open-Meteo client for one fixed coordinate. Historical windows go to the
/// archive endpoint, forecast windows to the forecast endpoint.
pub struct OpenMeteo {
    logger: Logger,
    client: ClientWithMiddleware,
    forecast_url: String,
    archive_url: String,
    latitude: f64,
    longitude: f64,
}

impl OpenMeteo {
    pub fn new(
        logger: Logger,
        forecast_url: String,
        archive_url: String,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, EtlError> {
        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_secs(1), Duration::from_secs(4))
            .build_with_max_retries(MAX_RETRIES);
        let inner = Client::builder()
            .build()
            .map_err(|e| EtlError::Config(format!("building http client: {}", e)))?;
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(OpenMeteo {
            logger,
            client,
            forecast_url,
            archive_url,
            latitude,
            longitude,
        })
    }

    fn request_parts(
        &self,
        window: &FetchWindow,
    ) -> Result<(String, Vec<(String, String)>), EtlError> {
        let mut query = vec![
            ("latitude".to_string(), self.latitude.to_string()),
            ("longitude".to_string(), self.longitude.to_string()),
            ("hourly".to_string(), HOURLY_FIELDS.to_string()),
            ("timezone".to_string(), TIMEZONE.to_string()),
        ];

        let url = match window {
            FetchWindow::Historical {
                start_date,
                end_date,
            } => {
                let date_format = format_description!("[year]-[month]-[day]");
                let start = start_date
                    .format(&date_format)
                    .map_err(|e| EtlError::FetchFailed(format!("formatting start date: {}", e)))?;
                let end = end_date
                    .format(&date_format)
                    .map_err(|e| EtlError::FetchFailed(format!("formatting end date: {}", e)))?;
                query.push(("start_date".to_string(), start));
                query.push(("end_date".to_string(), end));
                self.archive_url.clone()
            }
            FetchWindow::Forecast { hours } => {
                query.push(("forecast_hours".to_string(), hours.to_string()));
                self.forecast_url.clone()
            }
        };

        Ok((url, query))
    }
}

#[async_trait]
impl WeatherSource for OpenMeteo {
    async fn fetch(&self, window: &FetchWindow) -> Result<HourlyBlock, EtlError> {
        let (url, query) = self.request_parts(window)?;
        debug!(self.logger, "requesting: {} for {:?}", url, window);

        let response = self
            .client
            .get(&url)
            .query(&query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| EtlError::FetchFailed(format!("error sending request: {}", e)))?;

        if !response.status().is_success() {
            return Err(EtlError::FetchFailed(format!(
                "error response from weather api: {}",
                response.status()
            )));
        }

        let body: HourlyResponse = response
            .json()
            .await
            .map_err(|e| EtlError::InvalidResponse(format!("error decoding body: {}", e)))?;
        validate(body)
    }
}

/// Reject responses without a usable hourly series instead of letting them
/// flow downstream as an empty batch.
fn validate(body: HourlyResponse) -> Result<HourlyBlock, EtlError> {
    let hourly = body
        .hourly
        .ok_or_else(|| EtlError::InvalidResponse("missing hourly section".to_string()))?;
    if hourly.time.is_empty() {
        return Err(EtlError::InvalidResponse(
            "empty hourly time series".to_string(),
        ));
    }
    Ok(hourly)
}
