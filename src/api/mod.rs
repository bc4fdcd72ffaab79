//! Whole-file entry points.
//!
//! These functions take the raw bytes of a container file (or a path, for
//! the `*_file` variants) and return a finished result:
//!
//! - [`inspect`]: header summary, block and record counts, first record
//! - [`convert_to_json`] / [`convert_to_csv`]: decoded, flattened and rendered records
//! - [`check_integrity_file`]: the integrity scan over a file on disk
//!
//! The lower-level pieces ([`crate::parse_header`], [`crate::decode_records`],
//! [`crate::flatten()`], [`crate::check_integrity`]) stay available for
//! callers that want to drive decoding themselves.

mod convert;
mod inspect;
pub mod options;

use std::path::Path;

pub use convert::{
    convert_to_csv, convert_to_csv_file, convert_to_json, convert_to_json_file, Conversion,
};
pub use inspect::{inspect, inspect_file, Inspection};
pub use options::{ConvertOptions, DEFAULT_CONVERT_MAX_RECORDS};

use tracing::warn;

use crate::integrity::{check_integrity, IntegrityOptions, IntegrityReport};

/// Read a file from disk and run [`check_integrity`] over it.
///
/// A file that cannot be read yields an invalid report with a single
/// [`ReadErrorKind::FileUnreadable`](crate::error::ReadErrorKind::FileUnreadable) entry.
pub fn check_integrity_file(path: impl AsRef<Path>, options: &IntegrityOptions) -> IntegrityReport {
    let path = path.as_ref();
    match std::fs::read(path) {
        Ok(bytes) => check_integrity(bytes, options),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read file for integrity check");
            IntegrityReport::unreadable(&err)
        }
    }
}
