use crate::error::QueryError;
use crate::query::ResultSummary;
use serde::Serialize;

/// Print the query outcome to stdout as a single JSON object.
pub fn print_summary(summary: &ResultSummary) -> Result<(), QueryError> {
    println!("{}", summary_json(summary)?);
    Ok(())
}

/// JSON form of a summary: `{"uri": "...", "size": N}`.
pub fn summary_json(summary: &ResultSummary) -> Result<String, QueryError> {
    serde_json::to_string(summary).map_err(|e| QueryError::Io(e.into()))
}

/// Pretty-print any serializable payload to stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), QueryError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| QueryError::Io(e.into()))?;
    println!("{text}");
    Ok(())
}

/// Print error to stderr in the contract format: error: <category>: <message>
pub fn print_error(err: &QueryError) {
    eprintln!("error: {}", err);
}
