use std::str::FromStr;

use bigdecimal::BigDecimal;
use dbquery::driver::{ColumnDescriptor, RawCell};
use dbquery::error::QueryError;
use dbquery::query::convert::{CellConverter, CellValue, DatabricksCellConverter, SqlType, Zone};

fn make_converter(zone: &str) -> DatabricksCellConverter {
    DatabricksCellConverter::new(Zone::parse(zone).unwrap())
}

fn column(type_name: &str) -> ColumnDescriptor {
    ColumnDescriptor::new(1, "c", type_name)
}

fn convert(type_name: &str, raw: &str) -> Result<CellValue, QueryError> {
    make_converter("UTC").convert(&column(type_name), RawCell::Text(raw.to_string()))
}

fn to_json(value: &CellValue) -> String {
    serde_json::to_string(value).unwrap()
}

#[test]
fn conversion_is_deterministic() {
    let converter = make_converter("Europe/Paris");
    let cases = [
        ("BOOLEAN", "true"),
        ("INT", "42"),
        ("DOUBLE", "1.5"),
        ("DECIMAL(38,18)", "12345678901234567890.123456789012345678"),
        ("STRING", "hello"),
        ("DATE", "2024-02-29"),
        ("TIMESTAMP", "2024-07-01 10:00:00"),
        ("ARRAY<INT>", "[1,2,3]"),
    ];

    for (type_name, raw) in cases {
        let col = column(type_name);
        let first = converter
            .convert(&col, RawCell::Text(raw.to_string()))
            .unwrap();
        let second = converter
            .convert(&col, RawCell::Text(raw.to_string()))
            .unwrap();
        assert_eq!(first, second, "type {type_name}");
        assert_eq!(to_json(&first), to_json(&second), "type {type_name}");
    }
}

#[test]
fn decimal_keeps_every_digit() {
    let raw = "12345678901234567890.123456789012345678";
    let value = convert("DECIMAL(38,18)", raw).unwrap();
    assert_eq!(value, CellValue::Decimal(BigDecimal::from_str(raw).unwrap()));
    assert_eq!(to_json(&value), raw);
}

#[test]
fn decimal_keeps_declared_scale_in_plain_notation() {
    let tiny = convert("DECIMAL(38,18)", "0.000000000000000001").unwrap();
    assert_eq!(to_json(&tiny), "0.000000000000000001");

    let zero = convert("DECIMAL(38,18)", "0E-18").unwrap();
    assert_eq!(to_json(&zero), "0.000000000000000000");
}

#[test]
fn invalid_utf8_text_is_a_conversion_error() {
    let err = make_converter("UTC")
        .convert(&column("STRING"), RawCell::Bytes(vec![0x66, 0xff, 0x6f]))
        .unwrap_err();
    assert!(matches!(err, QueryError::Conversion { .. }), "Got: {err}");

    let value = make_converter("UTC")
        .convert(&column("STRING"), RawCell::Bytes(b"ok".to_vec()))
        .unwrap();
    assert_eq!(value, CellValue::Text("ok".to_string()));
}

#[test]
fn decimal_is_not_routed_through_floating_point() {
    let value = convert("DECIMAL(3,2)", "0.10").unwrap();
    assert_eq!(to_json(&value), "0.10");
}

#[test]
fn integers_become_json_integers() {
    for type_name in ["TINYINT", "SMALLINT", "INT", "BIGINT"] {
        assert_eq!(convert(type_name, "7").unwrap(), CellValue::Long(7));
    }
    assert_eq!(
        to_json(&convert("BIGINT", "9223372036854775807").unwrap()),
        "9223372036854775807"
    );
}

#[test]
fn non_finite_doubles_are_strings() {
    assert_eq!(to_json(&convert("DOUBLE", "NaN").unwrap()), r#""NaN""#);
    assert_eq!(to_json(&convert("DOUBLE", "inf").unwrap()), r#""Infinity""#);
    assert_eq!(to_json(&convert("FLOAT", "-inf").unwrap()), r#""-Infinity""#);
}

#[test]
fn booleans_accept_words_and_digits() {
    assert_eq!(convert("BOOLEAN", "TRUE").unwrap(), CellValue::Boolean(true));
    assert_eq!(convert("BOOLEAN", "0").unwrap(), CellValue::Boolean(false));
    assert!(matches!(
        convert("BOOLEAN", "maybe"),
        Err(QueryError::Conversion { .. })
    ));
}

#[test]
fn timestamp_uses_configured_zone() {
    let value = make_converter("Europe/Paris")
        .convert(&column("TIMESTAMP"), RawCell::Text("2024-01-15 12:00:00".to_string()))
        .unwrap();
    assert_eq!(to_json(&value), r#""2024-01-15T13:00:00+01:00""#);

    let summer = make_converter("Europe/Paris")
        .convert(&column("TIMESTAMP"), RawCell::Text("2024-07-15T12:00:00Z".to_string()))
        .unwrap();
    assert_eq!(to_json(&summer), r#""2024-07-15T14:00:00+02:00""#);
}

#[test]
fn timestamp_keeps_fractional_seconds() {
    let value = convert("TIMESTAMP", "2024-01-15 12:00:00.250").unwrap();
    assert_eq!(to_json(&value), r#""2024-01-15T12:00:00.250+00:00""#);
}

#[test]
fn timestamp_ntz_ignores_zone() {
    let value = make_converter("Asia/Tokyo")
        .convert(&column("TIMESTAMP_NTZ"), RawCell::Text("2024-01-15 12:00:00".to_string()))
        .unwrap();
    assert_eq!(to_json(&value), r#""2024-01-15T12:00:00""#);
}

#[test]
fn date_and_time_are_iso_text() {
    assert_eq!(to_json(&convert("DATE", "2024-02-29").unwrap()), r#""2024-02-29""#);
    assert_eq!(to_json(&convert("TIME", "08:30:00").unwrap()), r#""08:30:00""#);
    assert!(matches!(
        convert("DATE", "2023-02-29"),
        Err(QueryError::Conversion { .. })
    ));
}

#[test]
fn binary_is_base64() {
    let value = make_converter("UTC")
        .convert(&column("BINARY"), RawCell::Bytes(vec![0xde, 0xad, 0xbe, 0xef]))
        .unwrap();
    assert_eq!(to_json(&value), r#""3q2+7w==""#);

    let from_text = convert("BINARY", "3q2+7w==").unwrap();
    assert_eq!(from_text, value);
}

#[test]
fn composite_types_are_nested_json() {
    let value = convert("STRUCT<a: INT, b: ARRAY<STRING>>", r#"{"a":1,"b":["x","y"]}"#).unwrap();
    assert_eq!(to_json(&value), r#"{"a":1,"b":["x","y"]}"#);

    let map = convert("MAP<STRING,INT>", r#"{"z":1,"a":2}"#).unwrap();
    assert_eq!(to_json(&map), r#"{"z":1,"a":2}"#);
}

#[test]
fn interval_falls_back_to_text() {
    let value = convert("INTERVAL DAY TO SECOND", "1 02:00:00.000000000").unwrap();
    assert_eq!(value, CellValue::Text("1 02:00:00.000000000".to_string()));
}

#[test]
fn null_converts_to_null() {
    let value = make_converter("UTC")
        .convert(&column("INT"), RawCell::Null)
        .unwrap();
    assert_eq!(to_json(&value), "null");
}

#[test]
fn unknown_type_fails_even_for_null() {
    let col = column("GEOGRAPHY");
    assert_eq!(col.sql_type, SqlType::Unknown("GEOGRAPHY".to_string()));

    let err = make_converter("UTC").convert(&col, RawCell::Null).unwrap_err();
    match err {
        QueryError::Conversion { column, message } => {
            assert_eq!(column, "c");
            assert!(message.contains("GEOGRAPHY"), "Got: {message}");
        }
        other => panic!("Expected conversion error, got {other}"),
    }
}

#[test]
fn malformed_number_is_a_conversion_error() {
    let err = convert("INT", "forty-two").unwrap_err();
    assert!(err.to_string().starts_with("conversion: column 'c'"), "Got: {err}");
}

#[test]
fn unknown_zone_id_is_a_config_error() {
    assert!(matches!(
        Zone::parse("Mars/Olympus"),
        Err(QueryError::Config { .. })
    ));
    assert_eq!(Zone::from_id(None).unwrap(), Zone::Local);
}
