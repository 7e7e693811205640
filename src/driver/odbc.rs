//! ODBC client for the Databricks (Simba Spark) ODBC driver.

use std::sync::OnceLock;

use odbc_api::{
    Connection, ConnectionOptions, Cursor, CursorImpl, DataType, Environment, ResultSetMetadata,
    handles::StatementImpl,
};
use secrecy::ExposeSecret;

use crate::driver::{
    AttributeValue, ColumnDescriptor, ConnectionDescriptor, RawCell, SqlClient, SqlConnection,
    SqlStatement,
};
use crate::error::QueryError;
use crate::query::convert::SqlType;

const DEFAULT_DRIVER: &str = "Simba Spark ODBC Driver";

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

fn environment() -> Result<&'static Environment, QueryError> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new().map_err(|e| QueryError::Connection {
        message: format!("ODBC environment error: {e}"),
    })?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

/// Build the ODBC connection string. A `Driver` property replaces the default driver name.
pub fn connection_string(descriptor: &ConnectionDescriptor) -> String {
    let driver = match descriptor.get("Driver") {
        Some(AttributeValue::Plain(name)) => name.clone(),
        _ => DEFAULT_DRIVER.to_string(),
    };

    let mut parts = vec![
        format!("Driver={{{driver}}}"),
        format!("Host={}", odbc_api::escape_attribute_value(&descriptor.host)),
        format!(
            "HTTPPath={}",
            odbc_api::escape_attribute_value(&descriptor.http_path)
        ),
    ];

    for (key, value) in descriptor.attributes() {
        if key.eq_ignore_ascii_case("Driver") {
            continue;
        }
        let value = match value {
            AttributeValue::Plain(v) => odbc_api::escape_attribute_value(v).into_owned(),
            AttributeValue::Secret(s) => {
                odbc_api::escape_attribute_value(s.expose_secret()).into_owned()
            }
        };
        parts.push(format!("{key}={value}"));
    }

    parts.join(";") + ";"
}

/// Name a declared ODBC type the way the cell converter expects.
fn type_name(data_type: &DataType) -> String {
    match data_type {
        DataType::Bit => "BOOLEAN".to_string(),
        DataType::TinyInt => "TINYINT".to_string(),
        DataType::SmallInt => "SMALLINT".to_string(),
        DataType::Integer => "INT".to_string(),
        DataType::BigInt => "BIGINT".to_string(),
        DataType::Real => "FLOAT".to_string(),
        DataType::Float { .. } | DataType::Double => "DOUBLE".to_string(),
        DataType::Numeric { precision, scale } | DataType::Decimal { precision, scale } => {
            format!("DECIMAL({precision},{scale})")
        }
        DataType::Date => "DATE".to_string(),
        DataType::Time { .. } => "TIME".to_string(),
        DataType::Timestamp { .. } => "TIMESTAMP".to_string(),
        DataType::Binary { .. } | DataType::Varbinary { .. } | DataType::LongVarbinary { .. } => {
            "BINARY".to_string()
        }
        DataType::Char { .. }
        | DataType::WChar { .. }
        | DataType::Varchar { .. }
        | DataType::WVarchar { .. }
        | DataType::LongVarchar { .. } => "STRING".to_string(),
        // Left unrecognised so conversion rejects the column.
        DataType::Other { data_type, .. } => format!("ODBC_SQL_TYPE_{}", data_type.0),
        DataType::Unknown => "UNKNOWN".to_string(),
        #[allow(unreachable_patterns)]
        other => format!("{other:?}"),
    }
}

/// Opens ODBC connections.
#[derive(Debug, Clone)]
pub struct OdbcClient {
    login_timeout_secs: u32,
    query_timeout_secs: u64,
}

impl OdbcClient {
    pub fn new(query_timeout_secs: u64) -> Self {
        Self {
            login_timeout_secs: 30,
            query_timeout_secs,
        }
    }
}

pub struct OdbcConnection {
    connection: Connection<'static>,
    query_timeout_secs: u64,
}

impl SqlClient for OdbcClient {
    type Connection = OdbcConnection;

    fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Self::Connection, QueryError> {
        let conn_str = connection_string(descriptor);
        let connection = environment()?
            .connect_with_connection_string(
                &conn_str,
                ConnectionOptions {
                    login_timeout_sec: Some(self.login_timeout_secs),
                    ..Default::default()
                },
            )
            .map_err(|e| QueryError::Connection {
                message: format!("connection failed: {e}"),
            })?;

        Ok(OdbcConnection {
            connection,
            query_timeout_secs: self.query_timeout_secs,
        })
    }
}

impl SqlConnection for OdbcConnection {
    type Statement<'c> = OdbcStatement<'c>;

    fn create_statement(&self) -> Result<Self::Statement<'_>, QueryError> {
        Ok(OdbcStatement {
            connection: &self.connection,
            query_timeout_secs: self.query_timeout_secs,
            cursor: None,
            buf: Vec::new(),
        })
    }
}

/// Statement handle; the ODBC statement lives inside the open cursor.
pub struct OdbcStatement<'c> {
    connection: &'c Connection<'static>,
    query_timeout_secs: u64,
    cursor: Option<CursorImpl<StatementImpl<'c>>>,
    buf: Vec<u8>,
}

impl SqlStatement for OdbcStatement<'_> {
    fn execute(&mut self, sql: &str) -> Result<bool, QueryError> {
        self.cursor = self
            .connection
            .execute(sql, (), Some(self.query_timeout_secs as usize))
            .map_err(|e| QueryError::Query {
                message: format!("query execution failed: {e}"),
            })?;
        Ok(self.cursor.is_some())
    }

    fn columns(&mut self) -> Result<Vec<ColumnDescriptor>, QueryError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(Vec::new());
        };

        let num_cols = cursor.num_result_cols().map_err(|e| QueryError::Query {
            message: format!("failed to get column count: {e}"),
        })?;

        let mut columns = Vec::with_capacity(num_cols.max(0) as usize);
        for i in 1..=num_cols.max(0) as u16 {
            let name = cursor.col_name(i).map_err(|e| QueryError::Query {
                message: format!("failed to describe column {i}: {e}"),
            })?;
            let data_type = cursor.col_data_type(i).map_err(|e| QueryError::Query {
                message: format!("failed to read type of column {i}: {e}"),
            })?;
            columns.push(ColumnDescriptor::new(i, name, type_name(&data_type)));
        }
        Ok(columns)
    }

    fn next_row(
        &mut self,
        columns: &[ColumnDescriptor],
    ) -> Result<Option<Vec<RawCell>>, QueryError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        let Some(mut row) = cursor.next_row().map_err(|e| QueryError::Query {
            message: format!("fetch error: {e}"),
        })?
        else {
            return Ok(None);
        };

        let mut cells = Vec::with_capacity(columns.len());
        for column in columns {
            self.buf.clear();
            let binary = column.sql_type == SqlType::Binary;
            let present = if binary {
                row.get_binary(column.ordinal, &mut self.buf)
            } else {
                row.get_text(column.ordinal, &mut self.buf)
            }
            .map_err(|e| QueryError::Query {
                message: format!("failed to read column '{}': {e}", column.name),
            })?;

            // Text stays as bytes; the converter rejects invalid UTF-8.
            cells.push(if present {
                RawCell::Bytes(self.buf.clone())
            } else {
                RawCell::Null
            });
        }
        Ok(Some(cells))
    }

    fn more_results(&mut self) -> Result<bool, QueryError> {
        let Some(cursor) = self.cursor.take() else {
            return Ok(false);
        };
        self.cursor = cursor.more_results().map_err(|e| QueryError::Query {
            message: format!("failed to advance to the next result set: {e}"),
        })?;
        Ok(self.cursor.is_some())
    }
}
