//! Lazy, forward-only record stream over a container file
//!
//! `RecordStream` decodes one block at a time and hands out its records
//! only after the block's sync marker validates. A corrupt block ends the
//! stream with a single `CorruptBlockError`; records already yielded stay
//! valid. Calling [`decode_records`] again on the same file starts a fresh,
//! independent decode.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::codec::Codec;
use crate::error::CorruptBlockError;
use crate::schema::ResolvedSchema;

use super::block::{decode_block, scan_block};
use super::decode::AvroValue;
use super::header::ContainerFile;

/// How a stream finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStatus {
    /// Every block was decoded
    Complete,
    /// `max_records` was reached with input left unread
    LimitReached,
}

/// Position of a stream in the block state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Between blocks, possibly with records of the last block still queued
    AtBlockBoundary,
    /// All blocks consumed
    Eof,
    /// Stopped early at `max_records`
    LimitReached,
    /// Stopped at a corrupt block
    Corrupt,
}

/// Iterator of decoded records. See the module docs.
#[derive(Debug)]
pub struct RecordStream {
    /// Whole input; dropped once the stream stops
    data: Option<Bytes>,
    schema: Arc<ResolvedSchema>,
    codec: Codec,
    sync_marker: [u8; 16],
    offset: usize,
    block_index: usize,
    pending: VecDeque<AvroValue>,
    yielded: usize,
    max_records: Option<usize>,
    state: StreamState,
}

/// Start decoding records from the first block of `file`.
///
/// With `max_records = Some(k)` at most `k` records are produced and the
/// stream reports [`DecodeStatus::LimitReached`] if anything was left unread.
pub fn decode_records(file: &ContainerFile, max_records: Option<usize>) -> RecordStream {
    RecordStream {
        data: Some(file.data().clone()),
        schema: Arc::clone(file.schema()),
        codec: file.codec(),
        sync_marker: *file.sync_marker(),
        offset: file.header_size() as usize,
        block_index: 0,
        pending: VecDeque::new(),
        yielded: 0,
        max_records,
        state: StreamState::AtBlockBoundary,
    }
}

impl RecordStream {
    /// Final status, or `None` while records remain or after corruption.
    pub fn status(&self) -> Option<DecodeStatus> {
        match self.state {
            StreamState::Eof => Some(DecodeStatus::Complete),
            StreamState::LimitReached => Some(DecodeStatus::LimitReached),
            StreamState::AtBlockBoundary | StreamState::Corrupt => None,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Records produced so far.
    pub fn records_read(&self) -> usize {
        self.yielded
    }

    /// Blocks fully validated so far.
    pub fn blocks_read(&self) -> usize {
        self.block_index
    }

    /// File offset of the next unread block.
    pub fn offset(&self) -> u64 {
        self.offset as u64
    }

    pub fn schema(&self) -> &Arc<ResolvedSchema> {
        &self.schema
    }

    /// Whether records may remain. Trailing blocks that frame cleanly and
    /// declare zero records do not count.
    fn has_unread_input(&self) -> bool {
        if !self.pending.is_empty() {
            return true;
        }
        let Some(data) = self.data.as_ref() else {
            return false;
        };
        let mut offset = self.offset;
        while offset < data.len() {
            match scan_block(&data[offset..], &self.sync_marker) {
                Ok((0, _, consumed)) => offset += consumed,
                _ => return true,
            }
        }
        false
    }

    fn stop(&mut self, state: StreamState) {
        self.state = state;
        self.pending.clear();
        self.data = None;
    }

    fn limit_hit(&self) -> bool {
        self.max_records.is_some_and(|limit| self.yielded >= limit)
    }

    /// Settle the final state once the limit is reached.
    fn check_limit(&mut self) {
        if self.limit_hit() {
            if self.has_unread_input() {
                debug!(records = self.yielded, "record limit reached");
                self.stop(StreamState::LimitReached);
            } else {
                self.stop(StreamState::Eof);
            }
        }
    }
}

impl Iterator for RecordStream {
    type Item = Result<AvroValue, CorruptBlockError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != StreamState::AtBlockBoundary {
            return None;
        }
        self.check_limit();
        if self.state != StreamState::AtBlockBoundary {
            return None;
        }

        loop {
            if let Some(record) = self.pending.pop_front() {
                self.yielded += 1;
                if self.pending.is_empty()
                    && self.data.as_ref().is_some_and(|d| self.offset >= d.len())
                {
                    self.stop(StreamState::Eof);
                } else {
                    self.check_limit();
                }
                return Some(Ok(record));
            }

            let data = match &self.data {
                Some(data) if self.offset < data.len() => data,
                _ => {
                    self.stop(StreamState::Eof);
                    return None;
                }
            };

            match decode_block(
                &data[self.offset..],
                self.codec,
                &self.schema,
                &self.sync_marker,
            ) {
                Ok(block) => {
                    debug!(
                        block_index = self.block_index,
                        offset = self.offset,
                        records = block.records.len(),
                        "decoded block"
                    );
                    self.offset += block.consumed;
                    self.block_index += 1;
                    self.pending.extend(block.records);
                }
                Err(kind) => {
                    let err = CorruptBlockError {
                        block_index: self.block_index,
                        offset: self.offset as u64,
                        records_decoded: self.yielded,
                        kind,
                    };
                    self.stop(StreamState::Corrupt);
                    return Some(Err(err));
                }
            }
        }
    }
}

impl std::iter::FusedIterator for RecordStream {}

#[cfg(test)]
mod tests {
    use super::super::varint::encode_zigzag;
    use super::*;
    use crate::error::CorruptionKind;
    use crate::reader::header::{AVRO_MAGIC, SCHEMA_KEY};

    const SYNC: [u8; 16] = [0x5A; 16];

    fn put_bytes(out: &mut Vec<u8>, b: &[u8]) {
        out.extend_from_slice(&encode_zigzag(b.len() as i64));
        out.extend_from_slice(b);
    }

    /// File with schema "long" and one block per entry of `blocks`.
    fn long_file(blocks: &[&[i64]]) -> Vec<u8> {
        let mut out = AVRO_MAGIC.to_vec();
        out.extend_from_slice(&encode_zigzag(1));
        put_bytes(&mut out, SCHEMA_KEY.as_bytes());
        put_bytes(&mut out, br#""long""#);
        out.push(0);
        out.extend_from_slice(&SYNC);
        for values in blocks {
            let payload: Vec<u8> = values.iter().flat_map(|v| encode_zigzag(*v)).collect();
            out.extend_from_slice(&encode_zigzag(values.len() as i64));
            put_bytes(&mut out, &payload);
            out.extend_from_slice(&SYNC);
        }
        out
    }

    fn longs(stream: &mut RecordStream) -> Vec<i64> {
        stream
            .by_ref()
            .map(|r| match r.unwrap() {
                AvroValue::Long(v) => v,
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_reads_all_blocks() {
        let file = ContainerFile::parse(long_file(&[&[1, 2], &[3], &[4, 5, 6]])).unwrap();
        let mut stream = decode_records(&file, None);
        assert_eq!(longs(&mut stream), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(stream.status(), Some(DecodeStatus::Complete));
        assert_eq!(stream.blocks_read(), 3);
    }

    #[test]
    fn test_no_blocks() {
        let file = ContainerFile::parse(long_file(&[])).unwrap();
        let mut stream = decode_records(&file, None);
        assert!(stream.next().is_none());
        assert_eq!(stream.status(), Some(DecodeStatus::Complete));
    }

    #[test]
    fn test_limit_mid_block() {
        let file = ContainerFile::parse(long_file(&[&[1, 2, 3], &[4]])).unwrap();
        let mut stream = decode_records(&file, Some(2));
        assert_eq!(longs(&mut stream), vec![1, 2]);
        assert_eq!(stream.status(), Some(DecodeStatus::LimitReached));
        assert!(stream.data.is_none());
    }

    #[test]
    fn test_limit_at_block_boundary_with_more_blocks() {
        let file = ContainerFile::parse(long_file(&[&[1, 2], &[3]])).unwrap();
        let mut stream = decode_records(&file, Some(2));
        assert_eq!(longs(&mut stream), vec![1, 2]);
        assert_eq!(stream.status(), Some(DecodeStatus::LimitReached));
    }

    #[test]
    fn test_limit_equal_to_total_is_complete() {
        let file = ContainerFile::parse(long_file(&[&[1], &[2]])).unwrap();
        let mut stream = decode_records(&file, Some(2));
        assert_eq!(longs(&mut stream), vec![1, 2]);
        assert_eq!(stream.status(), Some(DecodeStatus::Complete));
    }

    #[test]
    fn test_limit_equal_to_total_with_trailing_empty_block() {
        let file = ContainerFile::parse(long_file(&[&[1, 2], &[]])).unwrap();
        let mut stream = decode_records(&file, Some(2));
        assert_eq!(longs(&mut stream), vec![1, 2]);
        assert_eq!(stream.status(), Some(DecodeStatus::Complete));
    }

    #[test]
    fn test_limit_before_empty_then_full_block() {
        let file = ContainerFile::parse(long_file(&[&[1, 2], &[], &[3]])).unwrap();
        let mut stream = decode_records(&file, Some(2));
        assert_eq!(longs(&mut stream), vec![1, 2]);
        assert_eq!(stream.status(), Some(DecodeStatus::LimitReached));
    }

    #[test]
    fn test_limit_zero() {
        let file = ContainerFile::parse(long_file(&[&[1, 2]])).unwrap();
        let mut stream = decode_records(&file, Some(0));
        assert!(stream.next().is_none());
        assert_eq!(stream.status(), Some(DecodeStatus::LimitReached));
        assert_eq!(stream.records_read(), 0);
    }

    #[test]
    fn test_corrupt_block_keeps_prior_records() {
        let mut bytes = long_file(&[&[1, 2], &[3]]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF; // break the second block's sync marker
        let file = ContainerFile::parse(bytes).unwrap();

        let mut stream = decode_records(&file, None);
        assert!(matches!(stream.next(), Some(Ok(AvroValue::Long(1)))));
        assert!(matches!(stream.next(), Some(Ok(AvroValue::Long(2)))));
        let err = stream.next().unwrap().unwrap_err();
        assert_eq!(err.block_index, 1);
        assert_eq!(err.records_decoded, 2);
        assert!(matches!(err.kind, CorruptionKind::SyncMismatch { .. }));
        assert!(stream.next().is_none());
        assert_eq!(stream.status(), None);
        assert_eq!(stream.state(), StreamState::Corrupt);
    }

    #[test]
    fn test_reopen_is_independent() {
        let file = ContainerFile::parse(long_file(&[&[1, 2], &[3]])).unwrap();
        let mut first = decode_records(&file, None);
        first.next();
        let mut second = decode_records(&file, None);
        assert_eq!(longs(&mut second), vec![1, 2, 3]);
        assert_eq!(longs(&mut first), vec![2, 3]);
    }
}
