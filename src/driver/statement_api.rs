//! Databricks SQL Statement Execution API client.
//!
//! Results are requested inline as JSON arrays and read one chunk at a time,
//! following `next_chunk_internal_link` until the statement is exhausted.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::driver::{ColumnDescriptor, ConnectionDescriptor, RawCell, SqlClient, SqlConnection, SqlStatement};
use crate::error::QueryError;
use crate::query::CancelToken;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Longest server-side wait the API accepts on submit.
const MAX_WAIT_TIMEOUT_SECS: u64 = 50;

/// Opens Statement Execution API sessions against a SQL warehouse.
#[derive(Debug, Clone)]
pub struct StatementApiClient {
    timeout_secs: u64,
    poll_interval: Duration,
    cancel: CancelToken,
}

impl StatementApiClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            poll_interval: POLL_INTERVAL,
            cancel: CancelToken::new(),
        }
    }

    /// Token observed while a statement is pending; cancelling it cancels
    /// the statement on the warehouse.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// `wait_timeout` sent on submit: the caller's timeout capped at 50 s.
/// The API rejects 1 to 4 s, so short timeouts return immediately and poll.
fn wait_timeout(timeout_secs: u64) -> String {
    match timeout_secs.min(MAX_WAIT_TIMEOUT_SECS) {
        secs @ 5.. => format!("{secs}s"),
        _ => "0s".to_string(),
    }
}

pub struct StatementApiConnection {
    client: Client,
    base_url: String,
    token: SecretString,
    warehouse_id: String,
    catalog: Option<String>,
    schema: Option<String>,
    timeout_secs: u64,
    poll_interval: Duration,
    cancel: CancelToken,
}

#[derive(Serialize)]
struct StatementRequest<'a> {
    warehouse_id: &'a str,
    statement: &'a str,
    wait_timeout: String,
    on_wait_timeout: &'static str,
    disposition: &'static str,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    catalog: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
}

#[derive(Deserialize)]
struct StatementResponse {
    statement_id: Option<String>,
    status: StatementStatus,
    manifest: Option<Manifest>,
    result: Option<ResultChunk>,
}

#[derive(Deserialize)]
struct StatementStatus {
    state: String,
    error: Option<StatementError>,
}

#[derive(Deserialize)]
struct StatementError {
    error_code: Option<String>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct Manifest {
    schema: Option<SchemaInfo>,
}

#[derive(Deserialize)]
struct SchemaInfo {
    columns: Option<Vec<ColumnInfo>>,
}

#[derive(Deserialize)]
struct ColumnInfo {
    name: String,
    type_name: Option<String>,
    type_text: Option<String>,
    position: Option<u16>,
}

#[derive(Deserialize, Default)]
struct ResultChunk {
    data_array: Option<Vec<Vec<Option<String>>>>,
    next_chunk_internal_link: Option<String>,
}

/// Extract the warehouse id from an HTTP path such as `/sql/1.0/warehouses/abc123`.
pub fn warehouse_id_from_path(http_path: &str) -> Result<String, QueryError> {
    let mut segments = http_path.trim_matches('/').split('/');
    while let Some(segment) = segments.next() {
        if segment == "warehouses" || segment == "endpoints" {
            if let Some(id) = segments.next().filter(|id| !id.is_empty()) {
                return Ok(id.to_string());
            }
        }
    }
    Err(QueryError::config(format!(
        "HTTP path '{http_path}' does not name a SQL warehouse (expected /sql/1.0/warehouses/<id>)"
    )))
}

fn base_url(host: &str) -> String {
    let host = host
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    format!("https://{host}")
}

fn map_http_error(status: StatusCode) -> QueryError {
    match status.as_u16() {
        401 => QueryError::Connection {
            message: "invalid or expired token".to_string(),
        },
        403 => QueryError::Connection {
            message: "insufficient warehouse permissions".to_string(),
        },
        404 => QueryError::config("warehouse not found"),
        other => QueryError::Connection {
            message: format!("HTTP error: {other}"),
        },
    }
}

fn failure_message(status: StatementStatus) -> String {
    match status.error {
        Some(StatementError {
            error_code: Some(code),
            message: Some(message),
        }) => format!("{code}: {message}"),
        Some(StatementError {
            message: Some(message),
            ..
        }) => message,
        _ => "unknown error".to_string(),
    }
}

impl SqlClient for StatementApiClient {
    type Connection = StatementApiConnection;

    fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Self::Connection, QueryError> {
        let token = descriptor
            .credential()
            .ok_or_else(|| QueryError::config("no access token configured"))?;
        let warehouse_id = warehouse_id_from_path(&descriptor.http_path)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| QueryError::Connection {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(StatementApiConnection {
            client,
            base_url: base_url(&descriptor.host),
            token,
            warehouse_id,
            catalog: descriptor.catalog.clone(),
            schema: descriptor.schema.clone(),
            timeout_secs: self.timeout_secs,
            poll_interval: self.poll_interval,
            cancel: self.cancel.clone(),
        })
    }
}

impl StatementApiConnection {
    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    fn statements_url(&self) -> String {
        format!("{}/api/2.0/sql/statements", self.base_url)
    }

    fn get<T: for<'de> Deserialize<'de>>(&self, url: &str, what: &str) -> Result<T, QueryError> {
        let resp = self
            .client
            .get(url)
            .header("Authorization", self.auth_header())
            .send()
            .map_err(|e| QueryError::Connection {
                message: format!("failed to {what}: {e}"),
            })?;

        if !resp.status().is_success() {
            return Err(map_http_error(resp.status()));
        }

        resp.json().map_err(|e| QueryError::Query {
            message: format!("failed to parse response to {what}: {e}"),
        })
    }

    fn cancel(&self, statement_id: &str) {
        let url = format!("{}/{}/cancel", self.statements_url(), statement_id);
        if let Err(e) = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .send()
        {
            warn!(statement_id, error = %e, "failed to cancel statement");
        }
    }

    fn submit(&self, sql: &str) -> Result<StatementResponse, QueryError> {
        let request = StatementRequest {
            warehouse_id: &self.warehouse_id,
            statement: sql,
            wait_timeout: wait_timeout(self.timeout_secs),
            on_wait_timeout: "CONTINUE",
            disposition: "INLINE",
            format: "JSON_ARRAY",
            catalog: self.catalog.as_deref(),
            schema: self.schema.as_deref(),
        };

        let resp = self
            .client
            .post(format!("{}/", self.statements_url()))
            .header("Authorization", self.auth_header())
            .json(&request)
            .send()
            .map_err(|e| QueryError::Connection {
                message: format!("failed to execute statement: {e}"),
            })?;

        if !resp.status().is_success() {
            return Err(map_http_error(resp.status()));
        }

        resp.json().map_err(|e| QueryError::Query {
            message: format!("failed to parse response: {e}"),
        })
    }

    /// Wait until the statement leaves PENDING/RUNNING, cancelling it once
    /// the timeout is exceeded or the cancel token fires.
    fn wait(&self, mut response: StatementResponse) -> Result<StatementResponse, QueryError> {
        let start = Instant::now();
        loop {
            match response.status.state.as_str() {
                "SUCCEEDED" => return Ok(response),
                "FAILED" => {
                    return Err(QueryError::query(failure_message(response.status)));
                }
                "CANCELED" | "CLOSED" => {
                    return Err(QueryError::query(format!(
                        "statement was {}",
                        response.status.state.to_lowercase()
                    )));
                }
                "PENDING" | "RUNNING" => {}
                other => {
                    return Err(QueryError::query(format!(
                        "unexpected statement state: {other}"
                    )));
                }
            }

            let statement_id = response
                .statement_id
                .clone()
                .ok_or_else(|| QueryError::query("no statement_id in pending response"))?;

            if self.cancel.is_cancelled() {
                self.cancel(&statement_id);
                return Err(QueryError::Cancelled);
            }
            if start.elapsed().as_secs() >= self.timeout_secs {
                self.cancel(&statement_id);
                return Err(QueryError::Timeout {
                    seconds: self.timeout_secs,
                });
            }

            std::thread::sleep(self.poll_interval);
            let url = format!("{}/{}", self.statements_url(), statement_id);
            response = self.get(&url, "poll statement")?;
        }
    }
}

impl SqlConnection for StatementApiConnection {
    type Statement<'c> = StatementApiStatement<'c>;

    fn create_statement(&self) -> Result<Self::Statement<'_>, QueryError> {
        Ok(StatementApiStatement {
            connection: self,
            columns: Vec::new(),
            positions: HashMap::new(),
            rows: Vec::new().into_iter(),
            next_chunk: None,
        })
    }
}

/// A statement on the Statement Execution API. Produces at most one result set.
pub struct StatementApiStatement<'c> {
    connection: &'c StatementApiConnection,
    columns: Vec<ColumnDescriptor>,
    /// Ordinal to index into a `data_array` row.
    positions: HashMap<u16, usize>,
    rows: std::vec::IntoIter<Vec<Option<String>>>,
    next_chunk: Option<String>,
}

impl StatementApiStatement<'_> {
    fn load_chunk(&mut self, chunk: ResultChunk) {
        self.rows = chunk.data_array.unwrap_or_default().into_iter();
        self.next_chunk = chunk.next_chunk_internal_link;
    }
}

fn columns_from_manifest(manifest: Option<Manifest>) -> Vec<ColumnDescriptor> {
    let mut columns: Vec<ColumnDescriptor> = manifest
        .and_then(|m| m.schema)
        .and_then(|s| s.columns)
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(idx, c)| {
            let ordinal = c.position.map(|p| p + 1).unwrap_or(idx as u16 + 1);
            let type_name = c
                .type_text
                .or(c.type_name)
                .unwrap_or_else(|| "STRING".to_string());
            ColumnDescriptor::new(ordinal, c.name, type_name)
        })
        .collect();
    columns.sort_by_key(|c| c.ordinal);
    columns
}

fn positions_of(columns: &[ColumnDescriptor]) -> HashMap<u16, usize> {
    columns
        .iter()
        .map(|c| (c.ordinal, usize::from(c.ordinal - 1)))
        .collect()
}

impl SqlStatement for StatementApiStatement<'_> {
    fn execute(&mut self, sql: &str) -> Result<bool, QueryError> {
        let submitted = self.connection.submit(sql)?;
        let response = self.connection.wait(submitted)?;

        self.columns = columns_from_manifest(response.manifest);
        self.positions = positions_of(&self.columns);
        self.load_chunk(response.result.unwrap_or_default());
        debug!(columns = self.columns.len(), "statement succeeded");

        Ok(!self.columns.is_empty())
    }

    fn columns(&mut self) -> Result<Vec<ColumnDescriptor>, QueryError> {
        Ok(self.columns.clone())
    }

    fn next_row(
        &mut self,
        columns: &[ColumnDescriptor],
    ) -> Result<Option<Vec<RawCell>>, QueryError> {
        loop {
            if let Some(row) = self.rows.next() {
                // Cells arrive in column position order.
                let cells = columns
                    .iter()
                    .map(|column| {
                        let idx = *self.positions.get(&column.ordinal).ok_or_else(|| {
                            QueryError::query(format!("unknown column ordinal {}", column.ordinal))
                        })?;
                        Ok(match row.get(idx).cloned().flatten() {
                            Some(text) => RawCell::Text(text),
                            None => RawCell::Null,
                        })
                    })
                    .collect::<Result<Vec<_>, QueryError>>()?;
                return Ok(Some(cells));
            }

            let Some(link) = self.next_chunk.take() else {
                return Ok(None);
            };
            let url = format!("{}{}", self.connection.base_url, link);
            let chunk: ResultChunk = self.connection.get(&url, "fetch result chunk")?;
            self.load_chunk(chunk);
        }
    }

    fn more_results(&mut self) -> Result<bool, QueryError> {
        Ok(false)
    }
}
