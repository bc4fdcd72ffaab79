//! JSON and CSV rendering of decoded records
//!
//! Exporters only produce text. Writing it anywhere is the caller's job.

use serde::Serialize;

use crate::error::ReaderError;
use crate::flatten::{ColumnOrder, FlatRecord};
use crate::reader::AvroValue;

/// Pretty-printed JSON array of flat objects, each with its own key set in
/// its own order.
pub fn to_json_flat(records: &[FlatRecord]) -> Result<String, ReaderError> {
    to_pretty_json(records)
}

/// Pretty-printed JSON array of decoded records, nesting kept.
pub fn to_json_nested(records: &[AvroValue]) -> Result<String, ReaderError> {
    to_pretty_json(records)
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ReaderError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ReaderError::Export(format!("JSON serialization failed: {}", e)))
}

/// CSV text with the union of observed columns as the header.
///
/// Columns appear in first-seen order. A record missing a column, or holding
/// null in it, gets an empty cell. No records means empty output.
pub fn to_csv(records: &[FlatRecord]) -> Result<String, ReaderError> {
    let columns: ColumnOrder = records.iter().collect();
    to_csv_with_columns(records, columns.columns())
}

/// CSV text with an explicit column list.
pub fn to_csv_with_columns(
    records: &[FlatRecord],
    columns: &[String],
) -> Result<String, ReaderError> {
    if columns.is_empty() {
        return Ok(String::new());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns).map_err(csv_error)?;
    for record in records {
        let row = columns.iter().map(|column| {
            record
                .get(column)
                .map(|value| value.to_cell())
                .unwrap_or_default()
        });
        writer.write_record(row).map_err(csv_error)?;
    }

    let buffer = writer
        .into_inner()
        .map_err(|e| ReaderError::Export(format!("CSV flush failed: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| ReaderError::Export(format!("CSV output is not UTF-8: {}", e)))
}

fn csv_error(err: csv::Error) -> ReaderError {
    ReaderError::Export(format!("CSV serialization failed: {}", err))
}
