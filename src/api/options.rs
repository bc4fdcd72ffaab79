//! Conversion options.
//!
//! `ConvertOptions` controls how many records a conversion reads, how they are
//! flattened and whether a schema cache is shared across files. Integrity
//! options live next to the validator in [`crate::integrity::IntegrityOptions`].

use std::sync::Arc;

use crate::flatten::FlattenConfig;
use crate::schema::SchemaCache;

/// Records read by a conversion unless told otherwise.
pub const DEFAULT_CONVERT_MAX_RECORDS: usize = 10_000;

/// Options for [`convert_to_json`](super::convert_to_json) and
/// [`convert_to_csv`](super::convert_to_csv).
///
/// # Example
/// ```
/// use avro_explorer::{ConvertOptions, FlattenConfig};
///
/// let opts = ConvertOptions::new()
///     .with_max_records(500)
///     .with_flatten(FlattenConfig::new().with_array_inline_threshold(5));
/// assert_eq!(opts.max_records, Some(500));
/// ```
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Maximum records to read (default: 10,000).
    ///
    /// `None` reads the whole file. When the limit stops the read early the
    /// conversion reports [`DecodeStatus::LimitReached`](crate::DecodeStatus).
    pub max_records: Option<usize>,

    /// How records are flattened for flat JSON and CSV output.
    pub flatten: FlattenConfig,

    /// Emit JSON records with their nesting kept (default: false).
    ///
    /// Ignored by CSV conversion, which always flattens.
    pub nested: bool,

    /// Shared schema cache. Files with the same schema text then resolve it once.
    pub schema_cache: Option<Arc<SchemaCache>>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            max_records: Some(DEFAULT_CONVERT_MAX_RECORDS),
            flatten: FlattenConfig::default(),
            nested: false,
            schema_cache: None,
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    /// Read every record in the file.
    pub fn unlimited(mut self) -> Self {
        self.max_records = None;
        self
    }

    pub fn with_flatten(mut self, flatten: FlattenConfig) -> Self {
        self.flatten = flatten;
        self
    }

    pub fn with_nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    pub fn with_schema_cache(mut self, cache: Arc<SchemaCache>) -> Self {
        self.schema_cache = Some(cache);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ConvertOptions::default();
        assert_eq!(opts.max_records, Some(10_000));
        assert!(!opts.nested);
        assert!(opts.schema_cache.is_none());
        assert_eq!(opts.flatten.array_inline_threshold, 20);
    }

    #[test]
    fn test_builder_chain() {
        let cache = Arc::new(SchemaCache::new());
        let opts = ConvertOptions::new()
            .unlimited()
            .with_nested(true)
            .with_schema_cache(Arc::clone(&cache));
        assert_eq!(opts.max_records, None);
        assert!(opts.nested);
        assert!(Arc::ptr_eq(opts.schema_cache.as_ref().unwrap(), &cache));
    }
}
