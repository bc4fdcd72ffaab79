//! Avro file header parsing
//!
//! Parses the Avro Object Container File header which contains:
//! - Magic bytes ("Obj\x01")
//! - Metadata map (including schema and codec)
//! - 16-byte sync marker

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::codec::Codec;
use crate::error::{DecodeError, FormatError, ReaderError};
use crate::schema::{parse_schema, ResolvedSchema, SchemaCache};

use super::varint::decode_zigzag_with_offset;

/// The Avro magic bytes that identify an Object Container File.
/// Format: "Obj" followed by version byte (0x01)
pub const AVRO_MAGIC: [u8; 4] = [b'O', b'b', b'j', 0x01];

/// Size of the sync marker in bytes
pub const SYNC_MARKER_SIZE: usize = 16;

/// Metadata key holding the writer schema JSON.
pub const SCHEMA_KEY: &str = "avro.schema";

/// Metadata key holding the codec name.
pub const CODEC_KEY: &str = "avro.codec";

/// The raw header fields, before schema resolution.
#[derive(Debug, Clone)]
pub(crate) struct RawHeader {
    pub metadata: HashMap<String, Vec<u8>>,
    pub sync_marker: [u8; 16],
    pub header_size: u64,
}

impl RawHeader {
    /// Read magic, metadata map and sync marker from the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut cursor = bytes;
        let mut offset: u64 = 0;

        parse_magic(&mut cursor, &mut offset)?;
        let metadata = parse_metadata(&mut cursor, &mut offset)?;
        let sync_marker = parse_sync_marker(&mut cursor, &mut offset)?;

        Ok(Self {
            metadata,
            sync_marker,
            header_size: offset,
        })
    }

    /// Schema JSON text from metadata.
    pub fn schema_json(&self) -> Result<&str, FormatError> {
        let bytes = self
            .metadata
            .get(SCHEMA_KEY)
            .ok_or(FormatError::MissingSchema)?;
        std::str::from_utf8(bytes).map_err(|_| FormatError::NotUtf8 {
            key: SCHEMA_KEY.to_string(),
        })
    }

    /// Codec from metadata, `null` when absent.
    pub fn codec(&self) -> Result<Codec, FormatError> {
        match self.metadata.get(CODEC_KEY) {
            Some(codec_bytes) => {
                let name = std::str::from_utf8(codec_bytes).map_err(|_| FormatError::NotUtf8 {
                    key: CODEC_KEY.to_string(),
                })?;
                // An empty codec value is written by some producers to mean null
                if name.is_empty() {
                    return Ok(Codec::Null);
                }
                Codec::from_name(name).map_err(|_| FormatError::UnsupportedCodec(name.to_string()))
            }
            None => Ok(Codec::Null),
        }
    }
}

/// A parsed container file: header fields plus the shared input bytes.
///
/// Immutable once built. Cloning is cheap (the input and schema are shared),
/// and each call to [`decode_records`](super::decode_records) starts an
/// independent decode from the first block.
#[derive(Debug, Clone)]
pub struct ContainerFile {
    data: Bytes,
    metadata: HashMap<String, Vec<u8>>,
    sync_marker: [u8; 16],
    schema: Arc<ResolvedSchema>,
    codec: Codec,
    header_size: u64,
}

impl ContainerFile {
    /// Parse the header of an Avro container file.
    ///
    /// # Errors
    /// - `ReaderError::Format` for bad magic, a truncated or malformed
    ///   metadata map, a missing schema or an unsupported codec
    /// - `ReaderError::Schema` if the embedded schema is invalid
    pub fn parse(bytes: impl Into<Bytes>) -> Result<Self, ReaderError> {
        let data = bytes.into();
        let raw = RawHeader::parse(&data)?;
        let schema = Arc::new(parse_schema(raw.schema_json()?)?);
        Self::assemble(data, raw, schema)
    }

    /// Parse the header, resolving the schema through `cache`.
    pub fn parse_with_cache(
        bytes: impl Into<Bytes>,
        cache: &SchemaCache,
    ) -> Result<Self, ReaderError> {
        let data = bytes.into();
        let raw = RawHeader::parse(&data)?;
        let schema = cache.get_or_parse(raw.schema_json()?)?;
        Self::assemble(data, raw, schema)
    }

    fn assemble(
        data: Bytes,
        raw: RawHeader,
        schema: Arc<ResolvedSchema>,
    ) -> Result<Self, ReaderError> {
        let codec = raw.codec()?;
        debug!(
            header_size = raw.header_size,
            codec = %codec,
            metadata_entries = raw.metadata.len(),
            "parsed container header"
        );
        Ok(Self {
            data,
            metadata: raw.metadata,
            sync_marker: raw.sync_marker,
            schema,
            codec,
            header_size: raw.header_size,
        })
    }

    /// The magic bytes (always [`AVRO_MAGIC`] for a parsed file).
    pub fn magic(&self) -> [u8; 4] {
        AVRO_MAGIC
    }

    pub fn metadata(&self) -> &HashMap<String, Vec<u8>> {
        &self.metadata
    }

    /// Get a metadata value by key.
    pub fn get_metadata(&self, key: &str) -> Option<&[u8]> {
        self.metadata.get(key).map(|v| v.as_slice())
    }

    /// Get a metadata value as a string.
    pub fn get_metadata_string(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Metadata keys in sorted order.
    pub fn metadata_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.metadata.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn sync_marker(&self) -> &[u8; 16] {
        &self.sync_marker
    }

    pub fn schema(&self) -> &Arc<ResolvedSchema> {
        &self.schema
    }

    /// The schema JSON exactly as stored in the file.
    pub fn schema_json(&self) -> &str {
        self.get_metadata_string(SCHEMA_KEY).unwrap_or_default()
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Offset where the first block begins.
    pub fn header_size(&self) -> u64 {
        self.header_size
    }

    /// The whole input, header included.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Total input size in bytes.
    pub fn file_size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Bytes following the header.
    pub fn body(&self) -> Bytes {
        self.data.slice(self.header_size as usize..)
    }
}

/// Parse and validate the magic bytes.
fn parse_magic(cursor: &mut &[u8], offset: &mut u64) -> Result<(), FormatError> {
    if cursor.len() < 4 {
        let mut found = [0u8; 4];
        found[..cursor.len()].copy_from_slice(cursor);
        if cursor.is_empty() || !AVRO_MAGIC.starts_with(cursor) {
            return Err(FormatError::InvalidMagic(found));
        }
        return Err(FormatError::Truncated {
            offset: *offset,
            message: format!("expected 4 magic bytes, found {}", cursor.len()),
        });
    }

    let mut magic = [0u8; 4];
    magic.copy_from_slice(&cursor[..4]);
    if magic != AVRO_MAGIC {
        return Err(FormatError::InvalidMagic(magic));
    }

    *cursor = &cursor[4..];
    *offset += 4;
    Ok(())
}

/// Parse the metadata map.
///
/// Avro metadata is encoded as a map with string keys and bytes values.
/// The map is encoded as a series of blocks, where each block starts with
/// a count (negative when followed by the block size in bytes), followed by
/// key-value pairs, and ends with a zero count.
fn parse_metadata(
    cursor: &mut &[u8],
    offset: &mut u64,
) -> Result<HashMap<String, Vec<u8>>, FormatError> {
    let mut metadata = HashMap::new();

    loop {
        let count = decode_zigzag_with_offset(cursor, offset)
            .map_err(|e| header_error(e, *offset, "metadata block count"))?;

        if count == 0 {
            break;
        }

        let count = if count < 0 {
            decode_zigzag_with_offset(cursor, offset)
                .map_err(|e| header_error(e, *offset, "metadata block size"))?;
            count.unsigned_abs()
        } else {
            count as u64
        };

        // Every entry needs at least two length bytes
        if count > (cursor.len() as u64) / 2 + 1 {
            return Err(FormatError::Metadata {
                offset: *offset,
                message: format!(
                    "block declares {} entries but only {} bytes remain",
                    count,
                    cursor.len()
                ),
            });
        }

        for _ in 0..count {
            let key_offset = *offset;
            let key = decode_bytes(cursor, offset)
                .map_err(|e| header_error(e, *offset, "metadata key"))?;
            let key = String::from_utf8(key).map_err(|_| FormatError::Metadata {
                offset: key_offset,
                message: "metadata key is not valid UTF-8".to_string(),
            })?;

            let value = decode_bytes(cursor, offset).map_err(|e| {
                header_error(e, *offset, &format!("metadata value for key '{}'", key))
            })?;

            if metadata.insert(key.clone(), value).is_some() {
                warn!(key = %key, "duplicate metadata key; keeping last value");
            }
        }
    }

    Ok(metadata)
}

/// Parse the 16-byte sync marker.
fn parse_sync_marker(cursor: &mut &[u8], offset: &mut u64) -> Result<[u8; 16], FormatError> {
    if cursor.len() < SYNC_MARKER_SIZE {
        return Err(FormatError::Truncated {
            offset: *offset,
            message: format!(
                "not enough bytes for sync marker: expected 16, got {}",
                cursor.len()
            ),
        });
    }

    let mut sync_marker = [0u8; 16];
    sync_marker.copy_from_slice(&cursor[..SYNC_MARKER_SIZE]);
    *cursor = &cursor[SYNC_MARKER_SIZE..];
    *offset += SYNC_MARKER_SIZE as u64;

    Ok(sync_marker)
}

fn header_error(err: DecodeError, offset: u64, what: &str) -> FormatError {
    match err {
        DecodeError::UnexpectedEof => FormatError::Truncated {
            offset,
            message: format!("input ended while reading {}", what),
        },
        other => FormatError::Metadata {
            offset,
            message: format!("failed to decode {}: {}", what, other),
        },
    }
}

/// Decode length-prefixed bytes.
fn decode_bytes(cursor: &mut &[u8], offset: &mut u64) -> Result<Vec<u8>, DecodeError> {
    let len = decode_zigzag_with_offset(cursor, offset)?;

    if len < 0 {
        return Err(DecodeError::InvalidData(format!(
            "Negative length for bytes: {}",
            len
        )));
    }

    let len = len as usize;

    if cursor.len() < len {
        return Err(DecodeError::UnexpectedEof);
    }

    let bytes = cursor[..len].to_vec();
    *cursor = &cursor[len..];
    *offset += len as u64;

    Ok(bytes)
}
