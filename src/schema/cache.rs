//! Shared cache of parsed schemas.
//!
//! Many files written by the same producer carry the same schema text, so
//! resolved schemas are shared by fingerprint. Readers take the read lock;
//! only a miss takes the write lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::schema::canonical::rabin_fingerprint;
use crate::schema::{ResolvedSchema, SchemaParser};

/// Default number of distinct schemas kept before new ones stop being cached.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Thread-safe schema cache keyed by the fingerprint of the normalized schema JSON.
///
/// Normalized JSON (sorted keys, no whitespace) rather than canonical form is
/// used as the key, so two schemas differing only in `logicalType` never share
/// an entry.
#[derive(Debug)]
pub struct SchemaCache {
    entries: RwLock<HashMap<u64, CacheEntry>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug)]
struct CacheEntry {
    /// Normalized schema text the fingerprint was taken over
    normalized: String,
    schema: Arc<ResolvedSchema>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that holds at most `capacity` schemas. Zero disables caching.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached schema for `json`, parsing and inserting it on a miss.
    ///
    /// A fingerprint hit only counts when the normalized text matches too.
    /// Parse failures are not cached.
    pub fn get_or_parse(&self, json: &str) -> Result<Arc<ResolvedSchema>, SchemaError> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;
        let normalized = value.to_string();
        let key = rabin_fingerprint(normalized.as_bytes());

        if let Some(entry) = self.read_entries().get(&key) {
            if entry.normalized == normalized {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(fingerprint = format_args!("{:016x}", key), "schema cache hit");
                return Ok(Arc::clone(&entry.schema));
            }
            warn!(
                fingerprint = format_args!("{:016x}", key),
                "schema fingerprint collision; bypassing cache"
            );
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let parsed = Arc::new(SchemaParser::new().parse_document(&value)?);

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match entries.get(&key) {
            Some(existing) if existing.normalized == normalized => {
                return Ok(Arc::clone(&existing.schema));
            }
            Some(_) => return Ok(parsed),
            None => {}
        }
        if entries.len() < self.capacity {
            entries.insert(
                key,
                CacheEntry {
                    normalized,
                    schema: Arc::clone(&parsed),
                },
            );
            debug!(
                fingerprint = format_args!("{:016x}", key),
                named_types = parsed.named_types().len(),
                "schema cached"
            );
        } else {
            debug!(capacity = self.capacity, "schema cache full; not caching");
        }
        Ok(parsed)
    }

    /// Drop every cached schema. Schemas already handed out stay valid.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u64, CacheEntry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
