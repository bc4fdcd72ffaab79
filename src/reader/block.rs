//! Avro block parsing
//!
//! Each data block contains:
//! - Record count (zigzag varint)
//! - Payload size in bytes (zigzag varint)
//! - Payload, compressed with the file's codec
//! - 16-byte sync marker
//!
//! Parsing works on the bytes following the header. A block is only
//! accepted once every declared record decodes, the payload is fully
//! consumed and the trailing sync marker matches the header's.

use tracing::debug;

use crate::codec::{Codec, DEFAULT_MAX_DECOMPRESSED_SIZE};
use crate::error::{CorruptBlockError, CorruptionKind};
use crate::schema::ResolvedSchema;

use super::decode::{decode_value_in, AvroValue, ItemBudget, ZERO_WIDTH_ITEM_ALLOWANCE};
use super::header::{ContainerFile, SYNC_MARKER_SIZE};
use super::varint::decode_zigzag;

/// Largest record count a single block may declare.
pub const MAX_BLOCK_RECORDS: i64 = 1 << 30;

/// Location and size of one block, as walked by [`ContainerFile::blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BlockInfo {
    /// Sequential block number (0-indexed)
    pub block_index: usize,
    /// File offset where the block starts
    pub offset: u64,
    /// Declared number of records
    pub record_count: u64,
    /// Payload size in bytes, before decompression
    pub payload_size: u64,
    /// Bytes taken by the whole block, sync marker included
    pub total_size: u64,
}

/// Block framing: counts read, payload located, sync marker not yet checked.
#[derive(Debug)]
struct Frame<'a> {
    record_count: usize,
    payload: &'a [u8],
    sync: &'a [u8],
    /// Bytes from block start up to and including the sync marker
    consumed: usize,
}

fn read_frame(data: &[u8]) -> Result<Frame<'_>, CorruptionKind> {
    let mut cursor = data;

    let record_count = decode_zigzag(&mut cursor).map_err(CorruptionKind::Header)?;
    if !(0..=MAX_BLOCK_RECORDS).contains(&record_count) {
        return Err(CorruptionKind::InvalidRecordCount(record_count));
    }

    let payload_size = decode_zigzag(&mut cursor).map_err(CorruptionKind::Header)?;
    if payload_size < 0 {
        return Err(CorruptionKind::InvalidBlockLength(payload_size));
    }

    let needed = (payload_size as u64).saturating_add(SYNC_MARKER_SIZE as u64);
    if (cursor.len() as u64) < needed {
        return Err(CorruptionKind::Truncated {
            needed,
            available: cursor.len() as u64,
        });
    }

    let header_len = data.len() - cursor.len();
    let payload_size = payload_size as usize;
    Ok(Frame {
        record_count: record_count as usize,
        payload: &cursor[..payload_size],
        sync: &cursor[payload_size..payload_size + SYNC_MARKER_SIZE],
        consumed: header_len + payload_size + SYNC_MARKER_SIZE,
    })
}

fn check_sync(frame: &Frame<'_>, expected: &[u8; 16]) -> Result<(), CorruptionKind> {
    if frame.sync != expected {
        let mut actual = [0u8; 16];
        actual.copy_from_slice(frame.sync);
        return Err(CorruptionKind::SyncMismatch {
            expected: *expected,
            actual,
        });
    }
    Ok(())
}

/// A fully validated block and its records.
#[derive(Debug)]
pub(crate) struct DecodedBlock {
    pub records: Vec<AvroValue>,
    /// Bytes taken by the whole block, sync marker included
    pub consumed: usize,
}

/// Decode the block at the start of `data`, with the default cap on the
/// decompressed payload.
pub(crate) fn decode_block(
    data: &[u8],
    codec: Codec,
    schema: &ResolvedSchema,
    sync_marker: &[u8; 16],
) -> Result<DecodedBlock, CorruptionKind> {
    decode_block_with_limit(data, codec, schema, sync_marker, DEFAULT_MAX_DECOMPRESSED_SIZE)
}

/// Decode the block at the start of `data`.
///
/// Steps run in file order: counts, decompression, record decoding, the
/// trailing-bytes check and finally the sync marker comparison. Records and
/// collection items together may not outnumber the decompressed payload
/// bytes by more than [`ZERO_WIDTH_ITEM_ALLOWANCE`].
pub(crate) fn decode_block_with_limit(
    data: &[u8],
    codec: Codec,
    schema: &ResolvedSchema,
    sync_marker: &[u8; 16],
    max_decompressed: usize,
) -> Result<DecodedBlock, CorruptionKind> {
    let frame = read_frame(data)?;
    let payload = codec.decompress_with_limit(frame.payload, max_decompressed)?;

    let budget = ItemBudget::for_buffer(payload.len());
    budget
        .spend(frame.record_count as u64)
        .map_err(|_| CorruptionKind::InvalidRecordCount(frame.record_count as i64))?;

    let mut cursor = payload.as_slice();
    let mut records = Vec::with_capacity(frame.record_count.min(payload.len().max(1)));
    for record_index in 0..frame.record_count {
        let record = decode_value_in(&mut cursor, schema.root(), schema.context(), &budget)
            .map_err(|source| CorruptionKind::Record {
                record_index,
                source,
            })?;
        records.push(record);
    }

    if !cursor.is_empty() {
        return Err(CorruptionKind::TrailingBytes {
            remaining: cursor.len(),
            record_count: frame.record_count,
        });
    }

    check_sync(&frame, sync_marker)?;

    Ok(DecodedBlock {
        records,
        consumed: frame.consumed,
    })
}

/// Validate block framing and sync marker without decoding records.
pub(crate) fn scan_block(
    data: &[u8],
    sync_marker: &[u8; 16],
) -> Result<(u64, u64, usize), CorruptionKind> {
    let frame = read_frame(data)?;
    check_sync(&frame, sync_marker)?;
    Ok((
        frame.record_count as u64,
        frame.payload.len() as u64,
        frame.consumed,
    ))
}

/// Bytes a block would take if its framing is readable, ignoring its sync marker.
pub(crate) fn block_extent(data: &[u8]) -> Option<usize> {
    read_frame(data).ok().map(|frame| frame.consumed)
}

/// Find the position of a sync marker in a byte slice.
///
/// Returns the offset of the first byte of the sync marker if found,
/// or `None` if not found.
pub fn find_sync_marker(data: &[u8], sync_marker: &[u8; 16]) -> Option<usize> {
    if data.len() < SYNC_MARKER_SIZE {
        return None;
    }
    data.windows(SYNC_MARKER_SIZE)
        .position(|window| window == sync_marker)
}

impl ContainerFile {
    /// Walk block headers and sync markers without decoding records.
    ///
    /// Stops after the first corrupt block.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            file: self,
            offset: self.header_size() as usize,
            block_index: 0,
            records_seen: 0,
            done: false,
        }
    }
}

/// Iterator over [`BlockInfo`] for every block of a file.
#[derive(Debug)]
pub struct Blocks<'a> {
    file: &'a ContainerFile,
    offset: usize,
    block_index: usize,
    records_seen: usize,
    done: bool,
}

impl Iterator for Blocks<'_> {
    type Item = Result<BlockInfo, CorruptBlockError>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.file.data();
        if self.done || self.offset >= data.len() {
            return None;
        }

        match scan_block(&data[self.offset..], self.file.sync_marker()) {
            Ok((record_count, payload_size, consumed)) => {
                let info = BlockInfo {
                    block_index: self.block_index,
                    offset: self.offset as u64,
                    record_count,
                    payload_size,
                    total_size: consumed as u64,
                };
                debug!(
                    block_index = info.block_index,
                    offset = info.offset,
                    record_count,
                    "walked block"
                );
                self.offset += consumed;
                self.block_index += 1;
                self.records_seen += record_count as usize;
                Some(Ok(info))
            }
            Err(kind) => {
                self.done = true;
                Some(Err(CorruptBlockError {
                    block_index: self.block_index,
                    offset: self.offset as u64,
                    records_decoded: self.records_seen,
                    kind,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::varint::encode_zigzag;
    use super::*;
    use crate::schema::parse_schema;

    const SYNC: [u8; 16] = [7; 16];

    fn create_test_block(record_count: i64, data: &[u8], sync_marker: &[u8; 16]) -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(&encode_zigzag(record_count));
        block.extend_from_slice(&encode_zigzag(data.len() as i64));
        block.extend_from_slice(data);
        block.extend_from_slice(sync_marker);
        block
    }

    fn long_schema() -> ResolvedSchema {
        parse_schema(r#""long""#).unwrap()
    }

    #[test]
    fn test_decode_block_simple() {
        let block = create_test_block(3, &[0x02, 0x04, 0x06], &SYNC);
        let decoded = decode_block(&block, Codec::Null, &long_schema(), &SYNC).unwrap();
        assert_eq!(
            decoded.records,
            vec![AvroValue::Long(1), AvroValue::Long(2), AvroValue::Long(3)]
        );
        assert_eq!(decoded.consumed, block.len());
    }

    #[test]
    fn test_decode_block_empty() {
        let block = create_test_block(0, &[], &SYNC);
        let decoded = decode_block(&block, Codec::Null, &long_schema(), &SYNC).unwrap();
        assert!(decoded.records.is_empty());
    }

    #[test]
    fn test_negative_record_count() {
        let block = create_test_block(-1, &[0x02], &SYNC);
        let err = decode_block(&block, Codec::Null, &long_schema(), &SYNC).unwrap_err();
        assert!(matches!(err, CorruptionKind::InvalidRecordCount(-1)));
    }

    #[test]
    fn test_absurd_record_count() {
        let block = create_test_block(MAX_BLOCK_RECORDS + 1, &[0x02], &SYNC);
        let err = decode_block(&block, Codec::Null, &long_schema(), &SYNC).unwrap_err();
        assert!(matches!(err, CorruptionKind::InvalidRecordCount(_)));
    }

    #[test]
    fn test_negative_size() {
        let mut block = encode_zigzag(1);
        block.extend_from_slice(&encode_zigzag(-5));
        let err = decode_block(&block, Codec::Null, &long_schema(), &SYNC).unwrap_err();
        assert!(matches!(err, CorruptionKind::InvalidBlockLength(-5)));
    }

    #[test]
    fn test_truncated_block() {
        let mut block = create_test_block(1, &[0x02, 0x04], &SYNC);
        block.truncate(block.len() - 4);
        let err = decode_block(&block, Codec::Null, &long_schema(), &SYNC).unwrap_err();
        assert!(matches!(
            err,
            CorruptionKind::Truncated {
                needed: 18,
                available: 14
            }
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let block = create_test_block(1, &[0x02, 0x04], &SYNC);
        let err = decode_block(&block, Codec::Null, &long_schema(), &SYNC).unwrap_err();
        assert!(matches!(
            err,
            CorruptionKind::TrailingBytes {
                remaining: 1,
                record_count: 1
            }
        ));
    }

    #[test]
    fn test_sync_mismatch() {
        let block = create_test_block(1, &[0x02], &[9; 16]);
        let err = decode_block(&block, Codec::Null, &long_schema(), &SYNC).unwrap_err();
        match err {
            CorruptionKind::SyncMismatch { expected, actual } => {
                assert_eq!(expected, SYNC);
                assert_eq!(actual, [9; 16]);
            }
            other => panic!("expected SyncMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_record_decode_failure_has_index() {
        // Second record is an unterminated varint
        let block = create_test_block(2, &[0x02, 0x80], &SYNC);
        let err = decode_block(&block, Codec::Null, &long_schema(), &SYNC).unwrap_err();
        assert!(matches!(err, CorruptionKind::Record { record_index: 1, .. }));
    }

    #[test]
    fn test_zero_width_record_count_bounded_by_payload() {
        let null_schema = parse_schema(r#""null""#).unwrap();
        let ok = create_test_block(1000, &[], &SYNC);
        let decoded = decode_block(&ok, Codec::Null, &null_schema, &SYNC).unwrap();
        assert_eq!(decoded.records.len(), 1000);

        let count = ZERO_WIDTH_ITEM_ALLOWANCE as i64 + 1;
        let hostile = create_test_block(count, &[], &SYNC);
        let err = decode_block(&hostile, Codec::Null, &null_schema, &SYNC).unwrap_err();
        assert!(matches!(err, CorruptionKind::InvalidRecordCount(c) if c == count));
    }

    #[cfg(feature = "deflate")]
    #[test]
    fn test_decompressed_size_limit() {
        use flate2::write::DeflateEncoder;
        use flate2::Compression;
        use std::io::Write;

        // 4000 zero longs
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&[0u8; 4000]).unwrap();
        let compressed = encoder.finish().unwrap();
        let block = create_test_block(4000, &compressed, &SYNC);

        let decoded =
            decode_block_with_limit(&block, Codec::Deflate, &long_schema(), &SYNC, 4000).unwrap();
        assert_eq!(decoded.records.len(), 4000);

        let err = decode_block_with_limit(&block, Codec::Deflate, &long_schema(), &SYNC, 1024)
            .unwrap_err();
        assert!(matches!(err, CorruptionKind::Decompression(_)));
    }

    #[test]
    fn test_scan_block_skips_decoding() {
        // Payload bytes are not valid longs, but scanning does not look at them
        let block = create_test_block(2, &[0x80, 0x80], &SYNC);
        let (count, payload, consumed) = scan_block(&block, &SYNC).unwrap();
        assert_eq!((count, payload, consumed), (2, 2, block.len()));
    }

    #[test]
    fn test_find_sync_marker() {
        let mut data = vec![0u8; 10];
        data.extend_from_slice(&SYNC);
        data.extend_from_slice(&[1, 2, 3]);
        assert_eq!(find_sync_marker(&data, &SYNC), Some(10));
        assert_eq!(find_sync_marker(&SYNC, &SYNC), Some(0));
        assert_eq!(find_sync_marker(&data[..20], &SYNC), None);
        assert_eq!(find_sync_marker(&[], &SYNC), None);

        // Partial match followed by the real marker
        let mut partial = SYNC[..8].to_vec();
        partial.extend_from_slice(&SYNC);
        assert_eq!(find_sync_marker(&partial, &SYNC), Some(8));
    }
}
