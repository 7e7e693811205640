//! Query execution: render the task's properties, run the SQL, stream every
//! row to storage and report where it went.

pub mod convert;
pub mod streamer;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use metrics::counter;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::driver::{
    AttributeValue, CREDENTIAL_ATTRIBUTE, ConnectionDescriptor, SqlClient, SqlConnection,
    SqlStatement,
};
use crate::error::QueryError;
use crate::storage::Storage;
use crate::template::{Render, required};
use convert::{DatabricksCellConverter, Zone};

/// Counter incremented with the number of fetched rows of each query.
pub const FETCH_SIZE_METRIC: &str = "fetch.size";

/// Driver defaults applied before catalog, schema, credential and user
/// properties. Arrow result serialization is off unless a property turns it back on.
pub const DEFAULT_ATTRIBUTES: &[(&str, &str)] = &[
    ("Port", "443"),
    ("SSL", "1"),
    ("ThriftTransport", "2"),
    ("AuthMech", "3"),
    ("UID", "token"),
    ("EnableArrow", "0"),
];

/// Query task properties as authored. Every string may contain `{{ }}` templates.
#[derive(Debug, Clone, Default)]
pub struct QueryTemplate {
    pub host: Option<String>,
    pub http_path: Option<String>,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub access_token: Option<SecretString>,
    pub properties: IndexMap<String, String>,
    pub sql: Option<String>,
    pub time_zone_id: Option<String>,
}

impl QueryTemplate {
    /// Render every property. Host, HTTP path and SQL must render to
    /// non-empty text; any failure on those three is a configuration error.
    pub fn render(&self, renderer: &dyn Render) -> Result<QuerySpec, QueryError> {
        let host = required(self.host.as_deref(), "host", renderer)?;
        let http_path = required(self.http_path.as_deref(), "httpPath", renderer)?;
        let sql = required(self.sql.as_deref(), "sql", renderer)?;

        let credential = self
            .access_token
            .as_ref()
            .map(|token| renderer.render(token.expose_secret()).map(SecretString::from))
            .transpose()?;

        let mut properties = IndexMap::with_capacity(self.properties.len());
        for (key, value) in &self.properties {
            properties.insert(renderer.render(key)?, renderer.render(value)?);
        }

        Ok(QuerySpec {
            host,
            http_path,
            catalog: renderer.render_opt(self.catalog.as_deref())?,
            schema: renderer.render_opt(self.schema.as_deref())?,
            credential,
            properties,
            sql,
            time_zone_id: renderer.render_opt(self.time_zone_id.as_deref())?,
        })
    }
}

/// A fully rendered query.
#[derive(Debug, Clone)]
pub struct QuerySpec {
    pub host: String,
    pub http_path: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    pub credential: Option<SecretString>,
    pub properties: IndexMap<String, String>,
    pub sql: String,
    pub time_zone_id: Option<String>,
}

impl QuerySpec {
    /// Assemble driver attributes: defaults, then catalog and schema, then the
    /// credential, then user properties (which may override any of them).
    pub fn connection_descriptor(&self) -> ConnectionDescriptor {
        let mut descriptor = ConnectionDescriptor::new(self.host.clone(), self.http_path.clone());
        descriptor.catalog = self.catalog.clone();
        descriptor.schema = self.schema.clone();

        for (key, value) in DEFAULT_ATTRIBUTES {
            descriptor.set_plain(*key, *value);
        }
        if let Some(catalog) = &self.catalog {
            descriptor.set_plain("Catalog", catalog.clone());
        }
        if let Some(schema) = &self.schema {
            descriptor.set_plain("Schema", schema.clone());
        }
        if let Some(credential) = &self.credential {
            descriptor.set(CREDENTIAL_ATTRIBUTE, AttributeValue::Secret(credential.clone()));
        }
        for (key, value) in &self.properties {
            descriptor.set_plain(key.clone(), value.clone());
        }
        descriptor
    }

    pub fn zone(&self) -> Result<Zone, QueryError> {
        Zone::from_id(self.time_zone_id.as_deref())
    }
}

/// Where the rows went and how many there were.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub uri: Url,
    pub size: u64,
}

/// Cooperative cancellation flag, checked between rows.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), QueryError> {
        if self.is_cancelled() {
            Err(QueryError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Runs queries through a SQL client and publishes results to storage.
pub struct QueryExecutor<C, S> {
    client: C,
    storage: S,
    cancel: CancelToken,
    show_secrets: bool,
}

impl<C, S> QueryExecutor<C, S>
where
    C: SqlClient,
    S: Storage,
{
    pub fn new(client: C, storage: S) -> Self {
        Self {
            client,
            storage,
            cancel: CancelToken::new(),
            show_secrets: false,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn show_secrets(mut self, show: bool) -> Self {
        self.show_secrets = show;
        self
    }

    /// Execute `spec` on a fresh connection and statement.
    ///
    /// Both are released before this returns, whatever the outcome. The
    /// output is published only after every row was written.
    pub fn execute(&self, spec: &QuerySpec) -> Result<ResultSummary, QueryError> {
        let zone = spec.zone()?;
        let converter = DatabricksCellConverter::new(zone);
        let descriptor = spec.connection_descriptor();
        debug!(connection = %descriptor.display(self.show_secrets), "opening connection");

        let mut sink = self.storage.create_sink()?;
        let size = {
            let connection = self.client.connect(&descriptor)?;
            let mut statement = connection.create_statement()?;
            debug!(sql = %spec.sql, "starting query");
            self.cancel.check()?;
            let has_result_set = statement.execute(&spec.sql)?;
            streamer::stream(&mut statement, has_result_set, &converter, &mut sink, &self.cancel)?
        };

        let uri = self.storage.put_file(sink.finish()?)?;
        counter!(FETCH_SIZE_METRIC).increment(size);
        info!(rows = size, uri = %uri, "query complete");

        Ok(ResultSummary { uri, size })
    }
}
