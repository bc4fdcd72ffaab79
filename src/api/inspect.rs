//! File inspection: header summary, block walk and first record.

use std::path::Path;

use bytes::Bytes;
use serde::Serialize;

use crate::codec::Codec;
use crate::error::ReaderError;
use crate::reader::{decode_records, AvroValue, ContainerFile};

/// Summary of a container file.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub file_size: u64,
    pub codec: Codec,
    /// Schema JSON as stored in the header
    pub schema_json: String,
    /// Parsing Canonical Form of the schema
    pub canonical_form: String,
    /// CRC-64-AVRO fingerprint of the canonical form
    pub fingerprint: u64,
    /// Header metadata keys, sorted
    pub metadata_keys: Vec<String>,
    pub block_count: usize,
    /// Sum of the record counts declared by each block
    pub record_count: u64,
    /// First record in the file, if any
    pub first_record: Option<AvroValue>,
}

impl Inspection {
    /// Fingerprint as 16 lowercase hex digits.
    pub fn fingerprint_hex(&self) -> String {
        format!("{:016x}", self.fingerprint)
    }
}

/// Summarize a container file.
///
/// Blocks are walked without decoding their records; only the first record
/// is decoded.
///
/// # Errors
/// Header and schema errors, and the first corrupt block met during the walk.
pub fn inspect(bytes: impl Into<Bytes>) -> Result<Inspection, ReaderError> {
    let file = ContainerFile::parse(bytes)?;
    inspect_container(&file)
}

/// Read a file from disk and [`inspect`] it.
pub fn inspect_file(path: impl AsRef<Path>) -> Result<Inspection, ReaderError> {
    inspect(std::fs::read(path)?)
}

fn inspect_container(file: &ContainerFile) -> Result<Inspection, ReaderError> {
    let mut block_count = 0;
    let mut record_count = 0;
    for block in file.blocks() {
        let block = block?;
        block_count += 1;
        record_count += block.record_count;
    }

    let first_record = decode_records(file, Some(1)).next().transpose()?;
    let schema = file.schema();

    Ok(Inspection {
        file_size: file.file_size(),
        codec: file.codec(),
        schema_json: file.schema_json().to_string(),
        canonical_form: schema.canonical_form(),
        fingerprint: schema.fingerprint(),
        metadata_keys: file
            .metadata_keys()
            .into_iter()
            .map(str::to_string)
            .collect(),
        block_count,
        record_count,
        first_record,
    })
}
