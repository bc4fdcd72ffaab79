//! JSON and CSV conversion of whole files.

use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use crate::error::ReaderError;
use crate::export::{to_csv_with_columns, to_json_flat, to_json_nested};
use crate::flatten::{ColumnOrder, FlatRecord, Flattener};
use crate::reader::{decode_records, AvroValue, ContainerFile, DecodeStatus};

use super::options::ConvertOptions;

/// Output of a conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Rendered JSON or CSV text
    pub output: String,
    /// Records included in the output
    pub record_count: usize,
    /// Flat columns in first-seen order; empty for nested JSON
    pub columns: Vec<String>,
    /// Whether the whole file was read or `max_records` stopped it
    pub status: DecodeStatus,
}

/// Decode a file and render its records as a JSON array.
///
/// Records are flattened unless [`ConvertOptions::nested`] is set.
///
/// # Errors
/// Header and schema errors surface before any record is read. A corrupt
/// block is terminal and reported as [`ReaderError::CorruptBlock`], carrying
/// its offset and the number of records decoded before it.
pub fn convert_to_json(
    bytes: impl Into<Bytes>,
    options: &ConvertOptions,
) -> Result<Conversion, ReaderError> {
    let file = open(bytes, options)?;
    let (records, status) = read_all(&file, options)?;

    if options.nested {
        return Ok(Conversion {
            output: to_json_nested(&records)?,
            record_count: records.len(),
            columns: Vec::new(),
            status,
        });
    }

    let (flat, columns) = flatten_all(&records, options);
    Ok(Conversion {
        output: to_json_flat(&flat)?,
        record_count: flat.len(),
        columns,
        status,
    })
}

/// Decode a file and render its flattened records as CSV.
///
/// # Errors
/// Same as [`convert_to_json`].
pub fn convert_to_csv(
    bytes: impl Into<Bytes>,
    options: &ConvertOptions,
) -> Result<Conversion, ReaderError> {
    let file = open(bytes, options)?;
    let (records, status) = read_all(&file, options)?;
    let (flat, columns) = flatten_all(&records, options);
    Ok(Conversion {
        output: to_csv_with_columns(&flat, &columns)?,
        record_count: flat.len(),
        columns,
        status,
    })
}

/// Read a file from disk and [`convert_to_json`] it.
pub fn convert_to_json_file(
    path: impl AsRef<Path>,
    options: &ConvertOptions,
) -> Result<Conversion, ReaderError> {
    convert_to_json(std::fs::read(path)?, options)
}

/// Read a file from disk and [`convert_to_csv`] it.
pub fn convert_to_csv_file(
    path: impl AsRef<Path>,
    options: &ConvertOptions,
) -> Result<Conversion, ReaderError> {
    convert_to_csv(std::fs::read(path)?, options)
}

fn open(bytes: impl Into<Bytes>, options: &ConvertOptions) -> Result<ContainerFile, ReaderError> {
    match &options.schema_cache {
        Some(cache) => ContainerFile::parse_with_cache(bytes, cache),
        None => ContainerFile::parse(bytes),
    }
}

fn read_all(
    file: &ContainerFile,
    options: &ConvertOptions,
) -> Result<(Vec<AvroValue>, DecodeStatus), ReaderError> {
    let mut stream = decode_records(file, options.max_records);
    let mut records = Vec::new();
    for record in stream.by_ref() {
        records.push(record?);
    }
    let status = stream.status().unwrap_or(DecodeStatus::Complete);
    debug!(records = records.len(), ?status, "read records for conversion");
    Ok((records, status))
}

fn flatten_all(records: &[AvroValue], options: &ConvertOptions) -> (Vec<FlatRecord>, Vec<String>) {
    let flattener = Flattener::new(options.flatten.clone());
    let flat: Vec<FlatRecord> = records.iter().map(|r| flattener.flatten(r)).collect();
    let columns: ColumnOrder = flat.iter().collect();
    (flat, columns.into_columns())
}
