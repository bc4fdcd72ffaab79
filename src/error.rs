//! Error types for Avro container reading

use std::io;
use thiserror::Error;

/// Errors raised while parsing or resolving a schema.
///
/// Schema errors are always fatal: they surface before any block is read.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Schema text is not valid JSON
    #[error("Parse error: {0}")]
    ParseError(String),
    /// Structurally invalid schema (missing attributes, wrong shapes)
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// Two named types share a full name
    #[error("Duplicate named type: '{0}'")]
    DuplicateName(String),
    /// Two fields with the same name inside one record
    #[error("Duplicate field '{field}' in record '{record}'")]
    DuplicateField { record: String, field: String },
    /// Union with indistinguishable branches
    #[error("Ambiguous union: {0}")]
    AmbiguousUnion(String),
    /// Reference to a name that is never defined
    #[error("Unresolved named type reference: '{0}'")]
    UnresolvedReference(String),
}

/// Errors that can occur during codec operations
#[derive(Debug, Error)]
pub enum CodecError {
    /// Codec name not supported by this build
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),
    /// Decompression error
    #[error("Decompression error: {0}")]
    DecompressionError(String),
}

/// Errors raised while decoding a single value from a block buffer.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Bytes do not match the expected encoding
    #[error("Invalid data: {0}")]
    InvalidData(String),
    /// Unexpected end of data
    #[error("Unexpected end of data")]
    UnexpectedEof,
    /// Invalid varint encoding
    #[error("Invalid varint encoding")]
    InvalidVarint,
    /// String is not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// Failure inside a named field, array element or map entry
    #[error("at '{path}': {source}")]
    Field {
        path: String,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Attach a record field name to this error's path.
    pub fn in_field(self, name: &str) -> Self {
        self.prefixed(name)
    }

    /// Attach an array element index to this error's path.
    pub fn in_element(self, index: usize) -> Self {
        self.prefixed(&format!("[{}]", index))
    }

    /// Attach a map key to this error's path.
    pub fn in_entry(self, key: &str) -> Self {
        self.prefixed(key)
    }

    fn prefixed(self, segment: &str) -> Self {
        match self {
            DecodeError::Field { path, source } => {
                let path = if path.starts_with('[') {
                    format!("{}{}", segment, path)
                } else {
                    format!("{}.{}", segment, path)
                };
                DecodeError::Field { path, source }
            }
            other => DecodeError::Field {
                path: segment.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Field path where decoding failed, if one was recorded.
    pub fn path(&self) -> Option<&str> {
        match self {
            DecodeError::Field { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The innermost error, without path context.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            DecodeError::Field { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Errors in the container header. No partial result is possible.
#[derive(Debug, Error)]
pub enum FormatError {
    /// First four bytes are not `Obj\x01`
    #[error("Invalid magic bytes at offset 0: expected 'Obj\\x01', found {0:?}")]
    InvalidMagic([u8; 4]),
    /// Header ended before a complete structure could be read
    #[error("Truncated header at offset {offset}: {message}")]
    Truncated { offset: u64, message: String },
    /// Metadata map is malformed
    #[error("Malformed metadata at offset {offset}: {message}")]
    Metadata { offset: u64, message: String },
    /// `avro.schema` is absent from the metadata
    #[error("Missing 'avro.schema' in header metadata")]
    MissingSchema,
    /// A metadata value that must be text is not UTF-8
    #[error("Metadata '{key}' is not valid UTF-8")]
    NotUtf8 { key: String },
    /// `avro.codec` names a codec this build cannot read
    #[error("Unsupported codec '{0}'")]
    UnsupportedCodec(String),
}

impl FormatError {
    /// Byte offset the error refers to.
    pub fn offset(&self) -> u64 {
        match self {
            FormatError::Truncated { offset, .. } | FormatError::Metadata { offset, .. } => *offset,
            _ => 0,
        }
    }
}

/// What went wrong inside a block.
#[derive(Debug, Error)]
pub enum CorruptionKind {
    /// Record count is negative or implausibly large
    #[error("invalid record count {0}")]
    InvalidRecordCount(i64),
    /// Block byte length is negative
    #[error("invalid block length {0}")]
    InvalidBlockLength(i64),
    /// Block header varints could not be read
    #[error("unreadable block header: {0}")]
    Header(DecodeError),
    /// Fewer bytes remain than the block declares
    #[error("truncated block: need {needed} bytes, {available} available")]
    Truncated { needed: u64, available: u64 },
    /// Codec failed on the payload
    #[error("{0}")]
    Decompression(#[from] CodecError),
    /// A record inside the payload could not be decoded
    #[error("record {record_index}: {source}")]
    Record {
        record_index: usize,
        #[source]
        source: DecodeError,
    },
    /// Payload holds more bytes than the declared records consume
    #[error("{remaining} trailing bytes after {record_count} records")]
    TrailingBytes { remaining: usize, record_count: usize },
    /// Bytes after the payload are not the header's sync marker
    #[error("sync marker mismatch: expected {}, found {}", hex(expected), hex(actual))]
    SyncMismatch { expected: [u8; 16], actual: [u8; 16] },
}

/// A block that is not laid out as its header declares.
///
/// Fatal for ordinary decoding; collected by the integrity checker.
#[derive(Debug, Error)]
#[error("Corrupt block {block_index} at offset {offset} ({records_decoded} records decoded before it): {kind}")]
pub struct CorruptBlockError {
    /// Sequential block number (0-indexed)
    pub block_index: usize,
    /// File offset where the block starts
    pub offset: u64,
    /// Records successfully produced before this block
    pub records_decoded: usize,
    /// Specific failure
    #[source]
    pub kind: CorruptionKind,
}

/// Top-level reader error type
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Container header error
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Block-level corruption
    #[error("{0}")]
    CorruptBlock(#[from] CorruptBlockError),

    /// Reading the input failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Export serialization failed
    #[error("Export error: {0}")]
    Export(String),
}

/// Recoverable error collected during an integrity scan
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReadError {
    /// The kind of error that occurred
    pub kind: ReadErrorKind,
    /// Block index where error occurred
    pub block_index: usize,
    /// Record index within block (if applicable)
    pub record_index: Option<usize>,
    /// File offset where error occurred
    pub offset: u64,
    /// Human-readable error message
    pub message: String,
}

impl ReadError {
    /// Create a new ReadError
    pub fn new(
        kind: ReadErrorKind,
        block_index: usize,
        record_index: Option<usize>,
        offset: u64,
        message: String,
    ) -> Self {
        Self {
            kind,
            block_index,
            record_index,
            offset,
            message,
        }
    }

    /// Build a ReadError from a corrupt block.
    pub fn from_corrupt_block(err: &CorruptBlockError) -> Self {
        let (kind, record_index) = match &err.kind {
            CorruptionKind::SyncMismatch { .. } => (ReadErrorKind::InvalidSyncMarker, None),
            CorruptionKind::Decompression(_) => (ReadErrorKind::DecompressionFailed, None),
            CorruptionKind::Record { record_index, .. } => {
                (ReadErrorKind::RecordDecodeFailed, Some(*record_index))
            }
            CorruptionKind::TrailingBytes { .. } => (ReadErrorKind::TrailingBytes, None),
            CorruptionKind::InvalidRecordCount(_)
            | CorruptionKind::InvalidBlockLength(_)
            | CorruptionKind::Header(_)
            | CorruptionKind::Truncated { .. } => (ReadErrorKind::BlockParseFailed, None),
        };
        Self::new(
            kind,
            err.block_index,
            record_index,
            err.offset,
            err.kind.to_string(),
        )
    }
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.record_index {
            Some(record_idx) => write!(
                f,
                "{:?} at block {}, record {}, offset {}: {}",
                self.kind, self.block_index, record_idx, self.offset, self.message
            ),
            None => write!(
                f,
                "{:?} at block {}, offset {}: {}",
                self.kind, self.block_index, self.offset, self.message
            ),
        }
    }
}

/// Types of recoverable errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ReadErrorKind {
    /// The file could not be opened or read
    FileUnreadable,
    /// Header could not be parsed; nothing after it is trustworthy
    InvalidHeader,
    /// Block count/length prefix unreadable or out of range
    BlockParseFailed,
    /// Sync marker doesn't match expected value
    InvalidSyncMarker,
    /// Block decompression failed
    DecompressionFailed,
    /// Record decoding failed
    RecordDecodeFailed,
    /// Decoded records did not consume the whole payload
    TrailingBytes,
    /// Resynchronization found no further sync marker
    ResyncFailed,
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
