//! Named type registry and the resolved schema handed to decoders.
//!
//! Resolution never rewrites the tree: [`AvroSchema::Named`] keys stay in
//! place and are looked up on demand, which keeps recursive schemas finite.

use std::collections::HashMap;

use crate::error::SchemaError;
use crate::schema::canonical::{canonical_form, rabin_fingerprint};
use crate::schema::AvroSchema;

/// A context for resolving named type references.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolutionContext {
    /// Registry of named types by their fully qualified name
    named_types: HashMap<String, AvroSchema>,
}

impl SchemaResolutionContext {
    /// Create a new empty resolution context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolution context from a HashMap of named types.
    pub fn from_named_types(named_types: HashMap<String, AvroSchema>) -> Self {
        Self { named_types }
    }

    /// Get a named type from the context.
    pub fn get(&self, name: &str) -> Option<&AvroSchema> {
        self.named_types.get(name)
    }

    /// Check if a named type exists in the context.
    pub fn contains(&self, name: &str) -> bool {
        self.named_types.contains_key(name)
    }

    /// Get all registered named types.
    pub fn named_types(&self) -> &HashMap<String, AvroSchema> {
        &self.named_types
    }

    pub fn len(&self) -> usize {
        self.named_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.named_types.is_empty()
    }

    /// Follow a `Named` key to its definition; other schemas are returned as is.
    pub fn resolve<'a>(&'a self, schema: &'a AvroSchema) -> Result<&'a AvroSchema, SchemaError> {
        match schema {
            AvroSchema::Named(name) => self
                .named_types
                .get(name)
                .ok_or_else(|| SchemaError::UnresolvedReference(name.clone())),
            other => Ok(other),
        }
    }
}

/// A parsed schema whose references are all known to resolve.
///
/// Immutable once built and cheap to share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    root: AvroSchema,
    context: SchemaResolutionContext,
}

impl ResolvedSchema {
    pub(crate) fn new(root: AvroSchema, context: SchemaResolutionContext) -> Self {
        Self { root, context }
    }

    /// The top-level schema.
    pub fn root(&self) -> &AvroSchema {
        &self.root
    }

    /// Registry of every named type in the schema.
    pub fn context(&self) -> &SchemaResolutionContext {
        &self.context
    }

    pub fn named_types(&self) -> &HashMap<String, AvroSchema> {
        self.context.named_types()
    }

    /// Follow a `Named` key to its definition.
    pub fn resolve<'a>(&'a self, schema: &'a AvroSchema) -> Result<&'a AvroSchema, SchemaError> {
        self.context.resolve(schema)
    }

    /// Schema JSON as parsed (docs and defaults kept).
    pub fn to_json(&self) -> String {
        self.root.to_json()
    }

    /// Parsing Canonical Form of the schema.
    pub fn canonical_form(&self) -> String {
        canonical_form(&self.root)
    }

    /// CRC-64-AVRO fingerprint of the Parsing Canonical Form.
    pub fn fingerprint(&self) -> u64 {
        rabin_fingerprint(self.canonical_form().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    #[test]
    fn test_resolve_named_reference() {
        let schema = parse_schema(
            r#"{"type":"record","name":"L","fields":[{"name":"next","type":["null","L"]}]}"#,
        )
        .unwrap();
        let named = AvroSchema::Named("L".into());
        assert!(matches!(schema.resolve(&named), Ok(AvroSchema::Record(_))));
        assert!(matches!(schema.resolve(&AvroSchema::Int), Ok(AvroSchema::Int)));
    }

    #[test]
    fn test_resolve_missing_reference() {
        let ctx = SchemaResolutionContext::new();
        let err = ctx.resolve(&AvroSchema::Named("Nope".into())).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedReference(ref n) if n == "Nope"));
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_fingerprint_ignores_docs() {
        let a = parse_schema(
            r#"{"type":"record","name":"R","doc":"one","fields":[{"name":"x","type":"int","doc":"d"}]}"#,
        )
        .unwrap();
        let b = parse_schema(r#"{"type":"record","name":"R","fields":[{"name":"x","type":"int"}]}"#)
            .unwrap();
        assert_eq!(a.canonical_form(), b.canonical_form());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
