//! Avro Object Container File explorer
//!
//! Reads container files without an Avro runtime: resolves the embedded
//! schema, decodes blocks lazily, flattens nested records into rows, checks
//! structural integrity and renders records as JSON or CSV.
//!
//! # Example
//! ```no_run
//! use avro_explorer::{check_integrity, decode_records, flatten, parse_header, IntegrityOptions};
//!
//! let bytes = std::fs::read("users.avro")?;
//! let file = parse_header(bytes.clone())?;
//! for record in decode_records(&file, Some(10)) {
//!     let row = flatten(&record?);
//!     println!("{:?}", row);
//! }
//!
//! let report = check_integrity(bytes, &IntegrityOptions::default());
//! println!("valid: {}", report.valid);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api;
pub mod codec;
pub mod error;
pub mod export;
pub mod flatten;
pub mod integrity;
pub mod reader;
pub mod schema;

// Re-export main types
pub use api::{
    check_integrity_file, convert_to_csv, convert_to_csv_file, convert_to_json,
    convert_to_json_file, inspect, inspect_file, Conversion, ConvertOptions, Inspection,
};
pub use codec::Codec;
pub use error::{
    CodecError, CorruptBlockError, CorruptionKind, DecodeError, FormatError, ReadError,
    ReadErrorKind, ReaderError, SchemaError,
};
pub use export::{to_csv, to_json_flat, to_json_nested};
pub use flatten::{flatten, ColumnOrder, FlatRecord, FlatValue, FlattenConfig, Flattener};
pub use integrity::{
    check_integrity, CancellationToken, IntegrityOptions, IntegrityReport, StopReason,
};
pub use reader::{
    decode_records, parse_header, AvroValue, BlockInfo, ContainerFile, DecodeStatus,
    RecordStream,
};
pub use schema::{
    parse_schema, AvroSchema, ResolvedSchema, SchemaCache, SchemaParser, SchemaResolutionContext,
};
