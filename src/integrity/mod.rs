//! Structural integrity checking
//!
//! [`check_integrity`] walks every block the way the record stream does, but
//! records corrupt blocks as [`ReadError`] entries and resynchronizes at the
//! next sync marker instead of stopping. It never fails: header problems,
//! corruption, deadlines and cancellation all end in a report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{Codec, DEFAULT_MAX_DECOMPRESSED_SIZE};
use crate::error::{CorruptBlockError, CorruptionKind, ReadError, ReadErrorKind, ReaderError};
use crate::reader::{
    block_extent, decode_block_with_limit, find_sync_marker, scan_block, ContainerFile,
    SYNC_MARKER_SIZE,
};

/// Default cap on collected errors.
pub const DEFAULT_MAX_ERRORS: usize = 100;

/// Default number of bytes searched for a sync marker after a corrupt block.
pub const DEFAULT_RESYNC_WINDOW: usize = 16 * 1024 * 1024;

/// Shared flag for aborting a running scan from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Options for [`check_integrity`].
#[derive(Debug, Clone)]
pub struct IntegrityOptions {
    /// Errors kept before the scan stops (default: 100).
    pub max_errors: usize,
    /// Bytes searched for the next sync marker after corruption (default: 16 MiB).
    pub resync_window: usize,
    /// Stop once this many records have been counted (default: no limit).
    pub max_records: Option<usize>,
    /// Abort when this instant passes, checked once per block.
    pub deadline: Option<Instant>,
    /// Abort when cancelled, checked once per block.
    pub cancel: Option<CancellationToken>,
    /// Decode every record rather than only checking block framing (default: true).
    pub decode_records: bool,
    /// Largest decompressed block payload accepted (default: 256 MiB).
    pub max_block_size: usize,
}

impl Default for IntegrityOptions {
    fn default() -> Self {
        Self {
            max_errors: DEFAULT_MAX_ERRORS,
            resync_window: DEFAULT_RESYNC_WINDOW,
            max_records: None,
            deadline: None,
            cancel: None,
            decode_records: true,
            max_block_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
        }
    }
}

impl IntegrityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_resync_window(mut self, bytes: usize) -> Self {
        self.resync_window = bytes;
        self
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_max_block_size(mut self, bytes: usize) -> Self {
        self.max_block_size = bytes;
        self
    }

    /// Only check counts, lengths and sync markers.
    pub fn framing_only(mut self) -> Self {
        self.decode_records = false;
        self
    }
}

/// Why a scan ended before the end of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `max_errors` entries were collected
    ErrorCap,
    /// The deadline passed
    Deadline,
    /// The cancellation token fired
    Cancelled,
    /// `max_records` records were counted
    RecordLimit,
}

/// Result of an integrity scan.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    /// No errors were found and the scan was not cut short by a deadline,
    /// cancellation or the error cap
    pub valid: bool,
    /// The header parsed and its schema resolved
    pub header_valid: bool,
    /// Blocks whose framing, records and sync marker all checked out
    pub block_count: usize,
    /// Records in those blocks
    pub record_count: u64,
    /// Collected errors in file order
    pub errors: Vec<ReadError>,
    /// Set when the error list or the scan itself was cut short
    pub truncated: bool,
    pub stop_reason: Option<StopReason>,
    /// Offset the scan reached
    pub bytes_scanned: u64,
    pub file_size: u64,
    pub codec: Option<Codec>,
}

impl IntegrityReport {
    fn new(file_size: u64) -> Self {
        Self {
            valid: false,
            header_valid: false,
            block_count: 0,
            record_count: 0,
            errors: Vec::new(),
            truncated: false,
            stop_reason: None,
            bytes_scanned: 0,
            file_size,
            codec: None,
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Report for input that could not be read at all.
    pub(crate) fn unreadable(err: &std::io::Error) -> Self {
        let mut report = Self::new(0);
        report.errors.push(ReadError::new(
            ReadErrorKind::FileUnreadable,
            0,
            None,
            0,
            err.to_string(),
        ));
        report
    }
}

struct Scan<'a> {
    options: &'a IntegrityOptions,
    report: IntegrityReport,
}

impl Scan<'_> {
    /// Record an error; false once the cap is reached.
    fn record(&mut self, error: ReadError) -> bool {
        if self.report.errors.len() >= self.options.max_errors {
            self.stop(StopReason::ErrorCap);
            return false;
        }
        self.report.errors.push(error);
        true
    }

    fn stop(&mut self, reason: StopReason) {
        self.report.stop_reason = Some(reason);
        if reason != StopReason::RecordLimit {
            self.report.truncated = true;
        }
    }

    fn should_stop(&mut self) -> bool {
        if self
            .options
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            self.stop(StopReason::Cancelled);
            return true;
        }
        if self.options.deadline.is_some_and(|d| Instant::now() >= d) {
            self.stop(StopReason::Deadline);
            return true;
        }
        if self
            .options
            .max_records
            .is_some_and(|max| self.report.record_count >= max as u64)
        {
            self.stop(StopReason::RecordLimit);
            return true;
        }
        false
    }
}

/// Scan a container file and report every structural problem found.
///
/// # Example
/// ```no_run
/// use avro_explorer::{check_integrity, IntegrityOptions};
///
/// let bytes = std::fs::read("events.avro").unwrap();
/// let report = check_integrity(bytes, &IntegrityOptions::default());
/// for error in &report.errors {
///     eprintln!("{}", error);
/// }
/// ```
pub fn check_integrity(bytes: impl Into<Bytes>, options: &IntegrityOptions) -> IntegrityReport {
    let bytes = bytes.into();
    let mut scan = Scan {
        options,
        report: IntegrityReport::new(bytes.len() as u64),
    };

    let file = match ContainerFile::parse(bytes) {
        Ok(file) => file,
        Err(err) => {
            warn!(error = %err, "container header is invalid");
            let offset = match &err {
                ReaderError::Format(format) => format.offset(),
                _ => 0,
            };
            scan.record(ReadError::new(
                ReadErrorKind::InvalidHeader,
                0,
                None,
                offset,
                err.to_string(),
            ));
            return scan.report;
        }
    };

    scan.report.header_valid = true;
    scan.report.codec = Some(file.codec());

    let data = file.data();
    let sync = file.sync_marker();
    let mut offset = file.header_size() as usize;
    let mut block_index = 0usize;

    while offset < data.len() {
        if scan.should_stop() {
            break;
        }

        let result = if options.decode_records {
            decode_block_with_limit(
                &data[offset..],
                file.codec(),
                file.schema(),
                sync,
                options.max_block_size,
            )
            .map(|block| (block.records.len() as u64, block.consumed))
        } else {
            scan_block(&data[offset..], sync).map(|(count, _, consumed)| (count, consumed))
        };

        match result {
            Ok((records, consumed)) => {
                scan.report.record_count += records;
                scan.report.block_count += 1;
                offset += consumed;
                block_index += 1;
            }
            Err(kind) => {
                let err = CorruptBlockError {
                    block_index,
                    offset: offset as u64,
                    records_decoded: scan.report.record_count as usize,
                    kind,
                };
                warn!(error = %err, "corrupt block");
                if !scan.record(ReadError::from_corrupt_block(&err)) {
                    break;
                }

                match resync(data, offset, &err.kind, sync, options.resync_window) {
                    Some(next) => {
                        debug!(
                            block_index,
                            from = offset,
                            to = next,
                            "resynchronized after corrupt block"
                        );
                        offset = next;
                        block_index += 1;
                    }
                    None => {
                        let search_start = offset + 1;
                        let searched = data.len().saturating_sub(search_start).min(options.resync_window);
                        let message = if search_start + searched >= data.len() {
                            "no sync marker found before end of input".to_string()
                        } else {
                            format!("no sync marker found within {} bytes", searched)
                        };
                        scan.record(ReadError::new(
                            ReadErrorKind::ResyncFailed,
                            block_index,
                            None,
                            search_start as u64,
                            message,
                        ));
                        offset = data.len();
                        break;
                    }
                }
            }
        }
    }

    scan.report.bytes_scanned = offset.min(data.len()) as u64;
    scan.report.valid = scan.report.errors.is_empty()
        && !matches!(
            scan.report.stop_reason,
            Some(StopReason::ErrorCap | StopReason::Deadline | StopReason::Cancelled)
        );

    info!(
        valid = scan.report.valid,
        blocks = scan.report.block_count,
        records = scan.report.record_count,
        errors = scan.report.errors.len(),
        "integrity scan finished"
    );
    scan.report
}

/// Find where the next block starts after a corrupt one.
///
/// A block whose only fault is its sync marker is assumed to have the right
/// length, so the block after it is tried first. Otherwise the input is
/// scanned for the sync marker, starting one byte past the corrupt block.
fn resync(
    data: &[u8],
    offset: usize,
    kind: &CorruptionKind,
    sync: &[u8; 16],
    window: usize,
) -> Option<usize> {
    if matches!(kind, CorruptionKind::SyncMismatch { .. }) {
        if let Some(extent) = block_extent(&data[offset..]) {
            let next = offset + extent;
            if next == data.len() || scan_block(&data[next..], sync).is_ok() {
                return Some(next);
            }
        }
    }

    let start = offset + 1;
    if start >= data.len() {
        return None;
    }
    let end = data.len().min(start.saturating_add(window));
    find_sync_marker(&data[start..end], sync).map(|pos| start + pos + SYNC_MARKER_SIZE)
}
