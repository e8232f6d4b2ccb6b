//! # Google Sheets
//!
//! Remote grid store over the Sheets v4 values API.
//!
//! ## Auth
//! - Service account JSON, exchanged for a bearer token through a signed RS256 JWT
//! - Token cached until a minute before expiry
//! - Missing or broken credentials do not stop startup, every call reports `Unavailable` instead
//!
//! ## Addressing
//! - Spreadsheet by id, or by title resolved once through the Drive files API
//! - Worksheets by title inside an A1 range, e.g. `'ATTENDANCE 2026'!B:B`
//!
//! ## Writes
//! - `valueInputOption=RAW`, labels such as dates are stored verbatim
//! - Batches go out in chunks of [`BATCH_CHUNK`] ranges, a failed chunk reports the committed prefix
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use crate::{
    address::{CellAddress, column_letters, quote_sheet},
    store::{BatchWriteError, CellWrite, GridStore, Row, StoreError, position_in_column},
};

pub const SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const DRIVE_FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const SCOPES: &str =
    "https://www.googleapis.com/auth/spreadsheets https://www.googleapis.com/auth/drive.readonly";
pub const BATCH_CHUNK: usize = 100;

const TOKEN_LIFETIME_SECS: i64 = 3600;
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize, Clone)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccount {
    pub fn from_json(raw: &str) -> Result<Self, StoreError> {
        serde_json::from_str(raw)
            .map_err(|e| StoreError::Unavailable(format!("invalid service account credentials: {e}")))
    }
}

/// Base URLs of the Sheets values API and the Drive files API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub sheets: String,
    pub drive_files: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            sheets: SHEETS_ENDPOINT.to_string(),
            drive_files: DRIVE_FILES_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpreadsheetRef {
    Id(String),
    Title(String),
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

pub struct GoogleSheets {
    http: Client,
    credentials: Option<ServiceAccount>,
    spreadsheet: SpreadsheetRef,
    spreadsheet_id: OnceCell<String>,
    token: Mutex<Option<CachedToken>>,
    endpoints: Endpoints,
}

impl GoogleSheets {
    pub fn new(credentials: Option<ServiceAccount>, spreadsheet: SpreadsheetRef, timeout: Duration) -> Self {
        if credentials.is_none() {
            warn!("Google Sheets client has no credentials, store calls will fail");
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {e}");
                Client::new()
            });

        Self {
            http,
            credentials,
            spreadsheet,
            spreadsheet_id: OnceCell::new(),
            token: Mutex::new(None),
            endpoints: Endpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn access_token(&self) -> Result<String, StoreError> {
        let account = self.credentials.as_ref().ok_or_else(|| {
            StoreError::Unavailable("client is not initialized due to credential error".to_string())
        })?;

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.refresh_at > Instant::now()) {
            return Ok(token.value.clone());
        }

        let iat = Utc::now().timestamp();
        let claims = Claims {
            iss: &account.client_email,
            scope: SCOPES,
            aud: &account.token_uri,
            iat,
            exp: iat + TOKEN_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| StoreError::Unavailable(format!("invalid private key: {e}")))?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| StoreError::Unavailable(format!("failed to sign token request: {e}")))?;

        let response = self
            .http
            .post(&account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!("token exchange failed ({status}): {body}")));
        }

        let token: TokenResponse = response.json().await.map_err(decode)?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_MARGIN);

        debug!("Refreshed Google access token, valid for {}s", lifetime.as_secs());
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    async fn spreadsheet_id(&self) -> Result<&str, StoreError> {
        let id = self
            .spreadsheet_id
            .get_or_try_init(|| async {
                match &self.spreadsheet {
                    SpreadsheetRef::Id(id) => Ok(id.clone()),
                    SpreadsheetRef::Title(title) => self.resolve_title(title).await,
                }
            })
            .await?;

        Ok(id.as_str())
    }

    async fn resolve_title(&self, title: &str) -> Result<String, StoreError> {
        let token = self.access_token().await?;
        let query = format!(
            "name = '{}' and mimeType = 'application/vnd.google-apps.spreadsheet' and trashed = false",
            title.replace('\'', "\\'")
        );

        let response = self
            .http
            .get(&self.endpoints.drive_files)
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("fields", "files(id)")])
            .send()
            .await
            .map_err(transport)?;

        let list: FileList = checked(response).await?.json().await.map_err(decode)?;

        list.files
            .into_iter()
            .next()
            .map(|file| {
                debug!("Resolved spreadsheet '{title}' to {}", file.id);
                file.id
            })
            .ok_or_else(|| StoreError::NotFound(format!("spreadsheet '{title}'")))
    }

    fn values_url(&self, id: &str, range: &str) -> Result<Url, StoreError> {
        let mut url =
            Url::parse(&self.endpoints.sheets).map_err(|e| StoreError::Protocol(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Protocol("endpoint cannot be a base".to_string()))?
            .push(id)
            .push("values")
            .push(range);

        Ok(url)
    }

    async fn get_values(&self, range: &str, major_dimension: &str) -> Result<Vec<Row>, StoreError> {
        let token = self.access_token().await?;
        let url = self.values_url(self.spreadsheet_id().await?, range)?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[("majorDimension", major_dimension)])
            .send()
            .await
            .map_err(transport)?;

        let range: ValueRange = checked(response).await?.json().await.map_err(decode)?;
        Ok(range.values)
    }

    async fn put_batch(&self, table: &str, writes: &[CellWrite]) -> Result<(), StoreError> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/{}/values:batchUpdate",
            self.endpoints.sheets,
            self.spreadsheet_id().await?
        );

        let data: Vec<_> = writes
            .iter()
            .map(|write| {
                json!({
                    "range": cell_range(table, write.address),
                    "majorDimension": "ROWS",
                    "values": [[write.value]],
                })
            })
            .collect();

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({ "valueInputOption": "RAW", "data": data }))
            .send()
            .await
            .map_err(transport)?;

        checked(response).await?;
        Ok(())
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn decode(e: reqwest::Error) -> StoreError {
    StoreError::Protocol(e.to_string())
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify(status, &body))
}

/// Maps a failed API response onto the store taxonomy.
fn classify(status: StatusCode, body: &str) -> StoreError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::BAD_REQUEST if message.contains("Unable to parse range") => {
            StoreError::NotFound(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Unavailable(message)
        }
        s if s.is_server_error() => StoreError::Unavailable(message),
        _ => StoreError::Rejected(format!("{status}: {message}")),
    }
}

fn cell_range(table: &str, address: CellAddress) -> String {
    format!("{}!{}", quote_sheet(table), address.to_a1())
}

fn row_range(table: &str, row: usize) -> String {
    format!("{}!{row}:{row}", quote_sheet(table))
}

fn column_range(table: &str, col: usize) -> String {
    let letters = column_letters(col);
    format!("{}!{letters}:{letters}", quote_sheet(table))
}

#[async_trait]
impl GridStore for GoogleSheets {
    async fn read_all(&self, table: &str) -> Result<Vec<Row>, StoreError> {
        self.get_values(&quote_sheet(table), "ROWS").await
    }

    async fn read_row(&self, table: &str, row: usize) -> Result<Row, StoreError> {
        let rows = self.get_values(&row_range(table, row), "ROWS").await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    async fn read_column(&self, table: &str, col: usize) -> Result<Vec<String>, StoreError> {
        let columns = self.get_values(&column_range(table, col), "COLUMNS").await?;
        Ok(columns.into_iter().next().unwrap_or_default())
    }

    async fn find_in_column(
        &self,
        table: &str,
        col: usize,
        value: &str,
    ) -> Result<Option<CellAddress>, StoreError> {
        let column = self.read_column(table, col).await?;
        Ok(position_in_column(&column, col, value))
    }

    async fn write_cell(&self, table: &str, address: CellAddress, value: &str) -> Result<(), StoreError> {
        let token = self.access_token().await?;
        let range = cell_range(table, address);
        let url = self.values_url(self.spreadsheet_id().await?, &range)?;

        let response = self
            .http
            .put(url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": [[value]] }))
            .send()
            .await
            .map_err(transport)?;

        checked(response).await?;
        debug!("write_cell {range} = {value:?}");
        Ok(())
    }

    async fn write_cells(&self, table: &str, writes: &[CellWrite]) -> Result<(), BatchWriteError> {
        for (index, chunk) in writes.chunks(BATCH_CHUNK).enumerate() {
            if let Err(source) = self.put_batch(table, chunk).await {
                warn!("Batch chunk {index} on {table} failed: {source}");
                return Err(BatchWriteError {
                    applied: index * BATCH_CHUNK,
                    failed_at: chunk[0].address,
                    source,
                });
            }
        }

        debug!("write_cells {table}: {} cells", writes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;

    use super::{
        GoogleSheets, ServiceAccount, SpreadsheetRef, cell_range, classify, column_range, row_range,
    };
    use crate::{
        address::CellAddress,
        store::{CellWrite, GridStore, StoreError},
    };

    #[test]
    fn test_ranges() {
        assert_eq!(cell_range("PAYMENTS2026", CellAddress::new(4, 5)), "'PAYMENTS2026'!E4");
        assert_eq!(row_range("ATTENDANCE 2026", 1), "'ATTENDANCE 2026'!1:1");
        assert_eq!(column_range("ATTENDANCE 2026", 28), "'ATTENDANCE 2026'!AB:AB");
    }

    #[test]
    fn test_classify() {
        let body = r#"{"error":{"code":400,"message":"Unable to parse range: 'Nope'!A1","status":"INVALID_ARGUMENT"}}"#;
        assert!(matches!(classify(StatusCode::BAD_REQUEST, body), StoreError::NotFound(_)));

        assert!(matches!(classify(StatusCode::NOT_FOUND, ""), StoreError::NotFound(_)));
        assert!(matches!(classify(StatusCode::FORBIDDEN, "{}"), StoreError::Unavailable(_)));
        assert!(matches!(classify(StatusCode::BAD_GATEWAY, "oops"), StoreError::Unavailable(_)));
        assert!(matches!(classify(StatusCode::BAD_REQUEST, "bad"), StoreError::Rejected(_)));
    }

    #[test]
    fn test_service_account_defaults() {
        let account = ServiceAccount::from_json(
            r#"{"client_email":"bot@example.iam.gserviceaccount.com","private_key":"pem"}"#,
        )
        .unwrap();

        assert_eq!(account.token_uri, super::DEFAULT_TOKEN_URI);
        assert!(ServiceAccount::from_json("not json").is_err());
    }

    #[tokio::test]
    async fn test_uninitialized_client_is_unavailable() {
        let sheets = GoogleSheets::new(
            None,
            SpreadsheetRef::Title("Team".to_string()),
            Duration::from_secs(1),
        );

        let err = sheets.read_all("PAYMENTS2026").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        let err = sheets
            .write_cells("PAYMENTS2026", &[CellWrite::new(2, 4, "TRUE")])
            .await
            .unwrap_err();
        assert_eq!(err.applied, 0);
        assert_eq!(err.failed_at, CellAddress::new(2, 4));
    }
}
