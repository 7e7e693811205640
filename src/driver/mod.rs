//! SQL client boundary.
//!
//! The query executor only talks to these traits, so any client that can
//! connect, execute, walk rows and advance result sets can stand in for the
//! Databricks drivers shipped here.

#[cfg(feature = "odbc")]
pub mod odbc;
pub mod statement_api;

use secrecy::SecretString;

use crate::error::QueryError;
use crate::masking;
use crate::query::convert::SqlType;

/// Metadata for a single result column, read fresh for every result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// 1-based position in the result set.
    pub ordinal: u16,
    pub name: String,
    pub type_name: String,
    pub sql_type: SqlType,
}

impl ColumnDescriptor {
    pub fn new(ordinal: u16, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let sql_type = SqlType::parse(&type_name);
        Self {
            ordinal,
            name: name.into(),
            type_name,
            sql_type,
        }
    }
}

/// A cell as handed over by the driver, before conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Null,
    Text(String),
    Bytes(Vec<u8>),
}

/// Value of a connection attribute.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    Plain(String),
    Secret(SecretString),
}

/// Everything a driver needs to open a connection.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub http_path: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    attributes: Vec<(String, AttributeValue)>,
}

/// Attribute holding the access token.
pub const CREDENTIAL_ATTRIBUTE: &str = "PWD";

impl ConnectionDescriptor {
    pub fn new(host: impl Into<String>, http_path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            http_path: http_path.into(),
            catalog: None,
            schema: None,
            attributes: Vec::new(),
        }
    }

    /// Set an attribute, replacing an existing one with the same
    /// (case-insensitive) key in place.
    pub fn set(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        match self
            .attributes
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn set_plain(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.set(key, AttributeValue::Plain(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn attributes(&self) -> &[(String, AttributeValue)] {
        &self.attributes
    }

    /// The access token, if one was configured.
    pub fn credential(&self) -> Option<SecretString> {
        match self.get(CREDENTIAL_ATTRIBUTE)? {
            AttributeValue::Secret(secret) => Some(secret.clone()),
            AttributeValue::Plain(value) => Some(SecretString::from(value.clone())),
        }
    }

    /// Render for diagnostics, masking secrets unless `show_secrets` is set.
    pub fn display(&self, show_secrets: bool) -> String {
        let mut parts = vec![
            format!("Host={}", self.host),
            format!("HTTPPath={}", self.http_path),
        ];
        parts.extend(
            self.attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, masking::format_attribute(k, v, show_secrets))),
        );
        parts.join(";")
    }
}

/// Opens connections.
pub trait SqlClient {
    type Connection: SqlConnection;

    fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Self::Connection, QueryError>;
}

/// An open connection. Dropping it releases the connection.
pub trait SqlConnection {
    type Statement<'c>: SqlStatement
    where
        Self: 'c;

    fn create_statement(&self) -> Result<Self::Statement<'_>, QueryError>;
}

/// A statement handle. Dropping it releases the statement.
pub trait SqlStatement {
    /// Execute `sql`. Returns true when the first result is a result set.
    fn execute(&mut self, sql: &str) -> Result<bool, QueryError>;

    /// Describe the columns of the current result set.
    fn columns(&mut self) -> Result<Vec<ColumnDescriptor>, QueryError>;

    /// Fetch the next row of the current result set, one cell per column in
    /// `columns` order. `None` once the result set is exhausted.
    fn next_row(
        &mut self,
        columns: &[ColumnDescriptor],
    ) -> Result<Option<Vec<RawCell>>, QueryError>;

    /// Advance past an exhausted result set. Returns true if another result
    /// set follows.
    fn more_results(&mut self) -> Result<bool, QueryError>;
}
