//! Avro schema types and parsing.
//!
//! This module defines the Avro schema tree, JSON parsing with named type
//! registration, the resolved schema used by decoders, Parsing Canonical
//! Form fingerprints and a shared schema cache.

mod cache;
mod canonical;
mod parser;
mod resolution;
mod types;

pub use cache::{SchemaCache, DEFAULT_CACHE_CAPACITY};
pub use canonical::{canonical_form, rabin_fingerprint};
pub use parser::{parse_schema, SchemaParser};
pub use resolution::{ResolvedSchema, SchemaResolutionContext};
pub use types::*;
