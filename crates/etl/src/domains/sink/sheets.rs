use anyhow::{anyhow, Error};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use slog::{debug, info, Logger};

use super::table::Table;
use crate::error::EtlError;

const SHEETS_URL: &str = "https://sheets.googleapis.com";
const DRIVE_URL: &str = "https://www.googleapis.com";

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// Widest range read back from the worksheet; this job only ever writes
/// seven columns.
const VALUE_RANGE: &str = "A1:Z";

/// Exchange the service-account key file for a bearer token. Must succeed
/// before any table operation; a missing or unreadable key aborts the run
/// before any network call to the weather API.
pub async fn access_token(credentials_path: &str) -> Result<String, EtlError> {
    if !meteo_sheets_core::path_exists(credentials_path) {
        return Err(EtlError::Config(format!(
            "credentials file not found: {}",
            credentials_path
        )));
    }

    let key = yup_oauth2::read_service_account_key(credentials_path)
        .await
        .map_err(|e| EtlError::Config(format!("reading service account key: {}", e)))?;
    let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
        .build()
        .await
        .map_err(|e| EtlError::Config(format!("building authenticator: {}", e)))?;
    let token = auth
        .token(SCOPES)
        .await
        .map_err(|e| EtlError::Config(format!("requesting access token: {}", e)))?;

    token
        .token()
        .map(str::to_owned)
        .ok_or_else(|| EtlError::Config("token response carried no access token".to_string()))
}

/// Authenticated client for the spreadsheet provider.
pub struct SheetsClient {
    http: Client,
    token: String,
    sheets_url: String,
    drive_url: String,
    logger: Logger,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Deserialize)]
struct FileEntry {
    id: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl SheetsClient {
    pub fn new(token: String, logger: Logger) -> Self {
        SheetsClient {
            http: Client::new(),
            token,
            sheets_url: SHEETS_URL.to_string(),
            drive_url: DRIVE_URL.to_string(),
            logger,
        }
    }

    /// Resolve a spreadsheet by name through the Drive listing and hand
    /// back a handle to its first worksheet.
    pub async fn open(self, name: &str) -> Result<SheetsTable, Error> {
        let query = format!(
            "name = '{}' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
            name
        );
        let url = format!("{}/drive/v3/files", self.drive_url);

        let list: FileList = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id)"),
                ("pageSize", "1"),
            ])
            .send()
            .await
            .map_err(|e| anyhow!("error listing spreadsheets: {}", e))?
            .error_for_status()
            .map_err(|e| anyhow!("spreadsheet lookup rejected: {}", e))?
            .json()
            .await
            .map_err(|e| anyhow!("error decoding spreadsheet listing: {}", e))?;

        let spreadsheet_id = list
            .files
            .into_iter()
            .next()
            .map(|f| f.id)
            .ok_or_else(|| {
                anyhow!(
                    "no spreadsheet named {:?} is visible to the service account",
                    name
                )
            })?;

        info!(self.logger, "opened spreadsheet {:?} ({})", name, spreadsheet_id);
        Ok(SheetsTable {
            client: self,
            spreadsheet_id,
        })
    }
}

/// One worksheet, addressed through the values API.
pub struct SheetsTable {
    client: SheetsClient,
    spreadsheet_id: String,
}

impl SheetsTable {
    async fn read_range(&self, range: &str) -> Result<Vec<Vec<String>>, Error> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.client.sheets_url, self.spreadsheet_id, range
        );

        let body: ValueRange = self
            .client
            .http
            .get(&url)
            .bearer_auth(&self.client.token)
            .send()
            .await
            .map_err(|e| anyhow!("error reading sheet values: {}", e))?
            .error_for_status()
            .map_err(|e| anyhow!("sheet read rejected: {}", e))?
            .json()
            .await
            .map_err(|e| anyhow!("error decoding sheet values: {}", e))?;

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

/// Cells come back as JSON strings or numbers; flatten both to text.
fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[async_trait]
impl Table for SheetsTable {
    async fn read_all_rows(&self) -> Result<Vec<Vec<String>>, Error> {
        self.read_range(VALUE_RANGE).await
    }

    async fn append_row(&self, row: Vec<String>) -> Result<(), Error> {
        self.append_rows(vec![row]).await
    }

    async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<(), Error> {
        let url = format!(
            "{}/v4/spreadsheets/{}/values/A1:append",
            self.client.sheets_url, self.spreadsheet_id
        );
        debug!(self.client.logger, "appending {} rows", rows.len());

        self.client
            .http
            .post(&url)
            .bearer_auth(&self.client.token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": rows }))
            .send()
            .await
            .map_err(|e| anyhow!("error appending rows: {}", e))?
            .error_for_status()
            .map_err(|e| anyhow!("sheet append rejected: {}", e))?;

        Ok(())
    }

    async fn row_count(&self) -> Result<usize, Error> {
        Ok(self.read_range(VALUE_RANGE).await?.len())
    }

    async fn first_row_values(&self) -> Result<Vec<String>, Error> {
        Ok(self
            .read_range("1:1")
            .await?
            .into_iter()
            .next()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_flatten_to_text() {
        assert_eq!(cell_to_string(json!("2024-01-01T10:00")), "2024-01-01T10:00");
        assert_eq!(cell_to_string(json!(24000)), "24000");
        assert_eq!(cell_to_string(json!(21.5)), "21.5");
    }

    #[test]
    fn value_range_tolerates_missing_values_field() {
        let body: ValueRange = serde_json::from_str(r#"{"range": "Sheet1!1:1"}"#).unwrap();
        assert!(body.values.is_empty());
    }
}
