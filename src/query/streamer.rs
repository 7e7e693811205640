//! Streams every result set of an executed statement into a record sink.

use std::io::Write;

use indexmap::IndexMap;
use tracing::trace;

use crate::driver::{ColumnDescriptor, RawCell, SqlStatement};
use crate::error::QueryError;
use crate::query::CancelToken;
use crate::query::convert::{CellConverter, CellValue};

/// One converted row, keyed by column name in ordinal order.
pub type Row = IndexMap<String, CellValue>;

#[derive(Debug)]
enum Phase {
    /// Reading rows of the current result set.
    Consuming(Vec<ColumnDescriptor>),
    /// Current result set exhausted; asking the driver for the next one.
    Advancing,
    Done,
}

/// Drain all result sets of `statement`, writing one JSON record per line to
/// `sink`. Returns the number of rows written across all result sets.
///
/// `has_result_set` is what [`SqlStatement::execute`] returned. A result set
/// is always exhausted before the driver is asked whether another follows.
pub fn stream<S, C, W>(
    statement: &mut S,
    has_result_set: bool,
    converter: &C,
    sink: &mut W,
    cancel: &CancelToken,
) -> Result<u64, QueryError>
where
    S: SqlStatement + ?Sized,
    C: CellConverter + ?Sized,
    W: Write + ?Sized,
{
    let mut count = 0u64;
    let mut result_sets = 0usize;
    let mut phase = if has_result_set {
        result_sets += 1;
        Phase::Consuming(describe(statement)?)
    } else {
        Phase::Advancing
    };

    loop {
        phase = match phase {
            Phase::Consuming(columns) => match statement.next_row(&columns)? {
                Some(cells) => {
                    cancel.check()?;
                    let row = convert_row(&columns, cells, converter)?;
                    write_record(sink, &row)?;
                    count += 1;
                    Phase::Consuming(columns)
                }
                None => Phase::Advancing,
            },
            Phase::Advancing => {
                if statement.more_results()? {
                    result_sets += 1;
                    Phase::Consuming(describe(statement)?)
                } else {
                    Phase::Done
                }
            }
            Phase::Done => {
                trace!(rows = count, result_sets, "result sets exhausted");
                return Ok(count);
            }
        };
    }
}

/// Columns of the current result set, in ascending ordinal order.
fn describe<S: SqlStatement + ?Sized>(statement: &mut S) -> Result<Vec<ColumnDescriptor>, QueryError> {
    let mut columns = statement.columns()?;
    columns.sort_by_key(|c| c.ordinal);
    Ok(columns)
}

/// Convert every cell of a fetched row, in ascending ordinal order.
pub fn convert_row<C>(
    columns: &[ColumnDescriptor],
    cells: Vec<RawCell>,
    converter: &C,
) -> Result<Row, QueryError>
where
    C: CellConverter + ?Sized,
{
    if cells.len() != columns.len() {
        return Err(QueryError::query(format!(
            "driver returned {} cells for {} columns",
            cells.len(),
            columns.len()
        )));
    }

    let mut row = Row::with_capacity(columns.len());
    for (column, raw) in columns.iter().zip(cells) {
        row.insert(column.name.clone(), converter.convert(column, raw)?);
    }
    Ok(row)
}

fn write_record<W: Write + ?Sized>(sink: &mut W, row: &Row) -> Result<(), QueryError> {
    serde_json::to_writer(&mut *sink, row).map_err(std::io::Error::from)?;
    sink.write_all(b"\n")?;
    Ok(())
}
