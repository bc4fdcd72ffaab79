//! Avro container file reading
//!
//! Header parsing, block framing, the binary value decoder and the lazy
//! record stream built on top of them.

mod block;
pub mod decode;
mod header;
mod stream;
pub mod varint;

pub use block::{find_sync_marker, BlockInfo, Blocks, MAX_BLOCK_RECORDS};
pub(crate) use block::{block_extent, decode_block_with_limit, scan_block};
pub use decode::{decode_value, decimal_to_string, AvroValue, MAX_NESTING_DEPTH};
pub use header::{ContainerFile, AVRO_MAGIC, CODEC_KEY, SCHEMA_KEY, SYNC_MARKER_SIZE};
pub use stream::{decode_records, DecodeStatus, RecordStream, StreamState};

use bytes::Bytes;

use crate::error::ReaderError;

/// Parse the header of an Avro container file.
///
/// # Example
/// ```no_run
/// let bytes = std::fs::read("users.avro").unwrap();
/// let file = avro_explorer::parse_header(bytes).unwrap();
/// println!("codec: {}", file.codec());
/// ```
pub fn parse_header(bytes: impl Into<Bytes>) -> Result<ContainerFile, ReaderError> {
    ContainerFile::parse(bytes)
}
