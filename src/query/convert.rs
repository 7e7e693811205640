use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bigdecimal::BigDecimal;
use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::ser::{Error as _, Serialize, Serializer};

use crate::driver::{ColumnDescriptor, RawCell};
use crate::error::QueryError;

/// Declared SQL type of a column, reduced to the categories that convert differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    String,
    /// Intervals have no portable structured form; they are kept as text.
    Interval,
    Binary,
    Date,
    Time,
    Timestamp,
    TimestampNtz,
    Array,
    Map,
    Struct,
    Variant,
    Void,
    Unknown(String),
}

impl SqlType {
    /// Parse a declared type name such as `INT`, `DECIMAL(10,2)` or `ARRAY<STRING>`.
    pub fn parse(type_name: &str) -> SqlType {
        let normalized = type_name.trim().to_uppercase();
        let base = normalized
            .split(['(', '<', ' '])
            .next()
            .unwrap_or_default();

        match base {
            "BOOLEAN" | "BOOL" | "BIT" => SqlType::Boolean,
            "TINYINT" | "BYTE" => SqlType::TinyInt,
            "SMALLINT" | "SHORT" => SqlType::SmallInt,
            "INT" | "INTEGER" => SqlType::Int,
            "BIGINT" | "LONG" => SqlType::BigInt,
            "FLOAT" | "REAL" => SqlType::Float,
            "DOUBLE" => SqlType::Double,
            "DECIMAL" | "DEC" | "NUMERIC" => SqlType::Decimal,
            "STRING" | "VARCHAR" | "CHAR" | "WVARCHAR" | "WCHAR" | "LONGVARCHAR" => {
                SqlType::String
            }
            "INTERVAL" => SqlType::Interval,
            "BINARY" | "VARBINARY" | "LONGVARBINARY" => SqlType::Binary,
            "DATE" => SqlType::Date,
            "TIME" => SqlType::Time,
            "TIMESTAMP" | "TIMESTAMP_LTZ" => SqlType::Timestamp,
            "TIMESTAMP_NTZ" => SqlType::TimestampNtz,
            "ARRAY" => SqlType::Array,
            "MAP" => SqlType::Map,
            "STRUCT" => SqlType::Struct,
            "VARIANT" => SqlType::Variant,
            "VOID" | "NULL" => SqlType::Void,
            _ => SqlType::Unknown(type_name.trim().to_string()),
        }
    }
}

/// Time zone applied to timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Named(Tz),
    /// The zone of the machine running the query.
    Local,
}

impl Zone {
    pub fn parse(id: &str) -> Result<Zone, QueryError> {
        id.trim()
            .parse::<Tz>()
            .map(Zone::Named)
            .map_err(|_| QueryError::config(format!("unknown time zone id '{id}'")))
    }

    /// `Local` when no id is configured.
    pub fn from_id(id: Option<&str>) -> Result<Zone, QueryError> {
        id.map(Zone::parse).transpose().map(|z| z.unwrap_or(Zone::Local))
    }

    fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            Zone::Named(tz) => instant.with_timezone(tz).fixed_offset(),
            Zone::Local => instant.with_timezone(&chrono::Local).fixed_offset(),
        }
    }
}

/// A converted cell, ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Long(i64),
    Double(f64),
    Decimal(BigDecimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(DateTime<FixedOffset>),
    LocalTimestamp(NaiveDateTime),
    /// Arrays, maps, structs and variants.
    Structured(serde_json::Value),
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Null => serializer.serialize_none(),
            CellValue::Boolean(b) => serializer.serialize_bool(*b),
            CellValue::Long(n) => serializer.serialize_i64(*n),
            CellValue::Double(f) if f.is_finite() => serializer.serialize_f64(*f),
            CellValue::Double(f) if f.is_nan() => serializer.serialize_str("NaN"),
            CellValue::Double(f) if *f > 0.0 => serializer.serialize_str("Infinity"),
            CellValue::Double(_) => serializer.serialize_str("-Infinity"),
            CellValue::Decimal(d) => {
                // Plain notation keeps every digit of the declared scale.
                let number =
                    serde_json::Number::from_str(&d.to_plain_string()).map_err(S::Error::custom)?;
                number.serialize(serializer)
            }
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Bytes(b) => serializer.serialize_str(&BASE64.encode(b)),
            CellValue::Date(d) => serializer.collect_str(&d.format("%Y-%m-%d")),
            CellValue::Time(t) => serializer.collect_str(&t.format("%H:%M:%S%.f")),
            CellValue::Timestamp(ts) => {
                serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, false))
            }
            CellValue::LocalTimestamp(ts) => {
                serializer.collect_str(&ts.format("%Y-%m-%dT%H:%M:%S%.f"))
            }
            CellValue::Structured(v) => v.serialize(serializer),
        }
    }
}

/// Converts one raw cell of a column into a [`CellValue`].
///
/// Implementations must be pure: the result depends only on the column's
/// declared type and the raw value.
pub trait CellConverter {
    fn convert(&self, column: &ColumnDescriptor, raw: RawCell) -> Result<CellValue, QueryError>;
}

/// Conversion rules for values produced by the Databricks drivers.
#[derive(Debug, Clone, Copy)]
pub struct DatabricksCellConverter {
    zone: Zone,
}

impl DatabricksCellConverter {
    pub fn new(zone: Zone) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }
}

impl CellConverter for DatabricksCellConverter {
    fn convert(&self, column: &ColumnDescriptor, raw: RawCell) -> Result<CellValue, QueryError> {
        if let SqlType::Unknown(name) = &column.sql_type {
            return Err(unsupported(column, name));
        }

        let text = match raw {
            RawCell::Null => return Ok(CellValue::Null),
            RawCell::Bytes(bytes) if column.sql_type == SqlType::Binary => {
                return Ok(CellValue::Bytes(bytes));
            }
            RawCell::Bytes(bytes) => String::from_utf8(bytes).map_err(|e| QueryError::Conversion {
                column: column.name.clone(),
                message: format!("value is not valid UTF-8: {e}"),
            })?,
            RawCell::Text(text) => text,
        };

        let trimmed = text.trim();
        let value = match &column.sql_type {
            SqlType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => CellValue::Boolean(true),
                "false" | "0" => CellValue::Boolean(false),
                _ => return Err(invalid(column, trimmed, "not a boolean")),
            },
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Int | SqlType::BigInt => {
                CellValue::Long(trimmed.parse::<i64>().map_err(|e| invalid(column, trimmed, e))?)
            }
            SqlType::Float | SqlType::Double => {
                CellValue::Double(trimmed.parse::<f64>().map_err(|e| invalid(column, trimmed, e))?)
            }
            SqlType::Decimal => CellValue::Decimal(
                BigDecimal::from_str(trimmed).map_err(|e| invalid(column, trimmed, e))?,
            ),
            SqlType::Binary => CellValue::Bytes(
                BASE64
                    .decode(trimmed)
                    .map_err(|e| invalid(column, trimmed, e))?,
            ),
            SqlType::Date => CellValue::Date(
                NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                    .map_err(|e| invalid(column, trimmed, e))?,
            ),
            SqlType::Time => CellValue::Time(
                NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
                    .map_err(|e| invalid(column, trimmed, e))?,
            ),
            SqlType::Timestamp => {
                let instant = parse_instant(trimmed).map_err(|e| invalid(column, trimmed, e))?;
                CellValue::Timestamp(self.zone.localize(instant))
            }
            SqlType::TimestampNtz => CellValue::LocalTimestamp(
                parse_naive_timestamp(trimmed).map_err(|e| invalid(column, trimmed, e))?,
            ),
            SqlType::Array | SqlType::Map | SqlType::Struct | SqlType::Variant => {
                CellValue::Structured(
                    serde_json::from_str(trimmed).map_err(|e| invalid(column, trimmed, e))?,
                )
            }
            SqlType::Void => CellValue::Null,
            SqlType::Unknown(name) => return Err(unsupported(column, name)),
            SqlType::String | SqlType::Interval => CellValue::Text(text),
        };

        Ok(value)
    }
}

fn unsupported(column: &ColumnDescriptor, type_name: &str) -> QueryError {
    QueryError::Conversion {
        column: column.name.clone(),
        message: format!("unsupported SQL type '{type_name}'"),
    }
}

fn invalid(column: &ColumnDescriptor, text: &str, reason: impl std::fmt::Display) -> QueryError {
    QueryError::Conversion {
        column: column.name.clone(),
        message: format!("cannot read '{text}' as {}: {reason}", column.type_name),
    }
}

/// Parse a timestamp carrying an offset, or a bare one read as UTC.
fn parse_instant(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(text) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(_) => parse_naive_timestamp(text).map(|naive| Utc.from_utc_datetime(&naive)),
    }
}

fn parse_naive_timestamp(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f"))
}
