//! JSON schema parser for Avro schemas.
//!
//! Parses Avro schema JSON into the [`AvroSchema`] tree and collects every
//! named type into a registry keyed by full name.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SchemaError;
use crate::schema::types::fullname;
use crate::schema::{
    AvroSchema, EnumSchema, FieldSchema, FixedSchema, LogicalType, LogicalTypeName, RecordSchema,
    ResolvedSchema, SchemaResolutionContext,
};

/// Parse an Avro schema from a JSON string.
///
/// # Example
/// ```
/// use avro_explorer::schema::parse_schema;
///
/// let schema = parse_schema(r#"{"type":"record","name":"R","fields":[{"name":"a","type":"int"}]}"#).unwrap();
/// assert_eq!(schema.named_types().len(), 1);
/// ```
pub fn parse_schema(json: &str) -> Result<ResolvedSchema, SchemaError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;
    SchemaParser::new().parse_document(&value)
}

/// Schema parser with named type resolution context.
///
/// A named type is registered under its full name *before* its body is
/// parsed, so fields may refer back to the enclosing record. References to
/// names not yet seen are kept as [`AvroSchema::Named`] keys and checked once
/// the whole document has been read.
#[derive(Debug, Default)]
pub struct SchemaParser {
    /// Registry of named types by their fully qualified name
    named_types: HashMap<String, AvroSchema>,
    /// Current namespace for resolving unqualified names
    current_namespace: Option<String>,
    /// Every reference seen, as (qualified, bare) candidates
    references: Vec<(String, String)>,
    /// Fail on naming-rule violations instead of warning
    strict_names: bool,
}

impl SchemaParser {
    /// Create a new SchemaParser with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail on names that break Avro naming rules instead of logging a warning.
    pub fn with_strict_names(mut self, strict: bool) -> Self {
        self.strict_names = strict;
        self
    }

    /// Parse a complete schema document and verify every reference resolves.
    pub fn parse_document(mut self, value: &Value) -> Result<ResolvedSchema, SchemaError> {
        let root = self.parse(value)?;

        for (qualified, bare) in std::mem::take(&mut self.references) {
            if self.named_types.contains_key(&qualified) {
                continue;
            }
            // An unqualified reference may name a type in the null namespace
            match self.named_types.get(&bare).cloned() {
                Some(schema) if qualified != bare => {
                    self.named_types.insert(qualified, schema);
                }
                _ => return Err(SchemaError::UnresolvedReference(qualified)),
            }
        }

        Ok(ResolvedSchema::new(
            root,
            SchemaResolutionContext::from_named_types(self.named_types),
        ))
    }

    /// Parse a JSON value into an AvroSchema.
    pub fn parse(&mut self, value: &Value) -> Result<AvroSchema, SchemaError> {
        match value {
            Value::String(s) => Ok(self.parse_string_schema(s)),
            Value::Object(obj) => self.parse_object_schema(obj),
            Value::Array(arr) => self.parse_union_schema(arr),
            _ => Err(SchemaError::InvalidSchema(format!(
                "Expected string, object, or array, found: {}",
                value
            ))),
        }
    }

    /// Parse a primitive type or named type reference from a string.
    fn parse_string_schema(&mut self, s: &str) -> AvroSchema {
        match primitive(s) {
            Some(schema) => schema,
            None => self.reference(s),
        }
    }

    fn reference(&mut self, name: &str) -> AvroSchema {
        let qualified = self.resolve_name(name);
        self.references.push((qualified.clone(), name.to_string()));
        AvroSchema::Named(qualified)
    }

    /// Parse a complex type from a JSON object.
    fn parse_object_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::InvalidSchema("Missing 'type' field".to_string()))?;

        let type_str = match type_value {
            Value::String(s) => s.as_str(),
            // {"type": {...}} or {"type": [...]} wraps another schema
            nested => return self.parse(nested),
        };

        let schema = match type_str {
            "record" | "error" => self.parse_record_schema(obj)?,
            "enum" => self.parse_enum_schema(obj)?,
            "array" => self.parse_array_schema(obj)?,
            "map" => self.parse_map_schema(obj)?,
            "fixed" => self.parse_fixed_schema(obj)?,
            other => match primitive(other) {
                Some(schema) => schema,
                None => self.reference(other),
            },
        };

        match obj.get("logicalType").and_then(Value::as_str) {
            Some(logical) => Ok(self.wrap_logical(obj, logical, schema)),
            None => Ok(schema),
        }
    }

    /// Parse a union schema from a JSON array.
    fn parse_union_schema(&mut self, arr: &[Value]) -> Result<AvroSchema, SchemaError> {
        if arr.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "Union schema cannot be empty".to_string(),
            ));
        }

        let variants = arr
            .iter()
            .map(|v| self.parse(v))
            .collect::<Result<Vec<_>, _>>()?;

        validate_union(&variants)?;

        Ok(AvroSchema::Union(variants))
    }

    /// Work out (short name, namespace, full name) for a named type definition.
    fn named_identity(
        &self,
        obj: &Map<String, Value>,
        kind: &str,
    ) -> Result<(String, Option<String>, String), SchemaError> {
        let raw = obj.get("name").and_then(Value::as_str).ok_or_else(|| {
            SchemaError::InvalidSchema(format!("{} missing 'name' field", kind))
        })?;

        let (name, namespace) = match raw.rsplit_once('.') {
            Some((ns, short)) => (short.to_string(), Some(ns.to_string())),
            None => {
                let explicit = obj
                    .get("namespace")
                    .and_then(Value::as_str)
                    .map(String::from);
                (raw.to_string(), explicit.or_else(|| self.current_namespace.clone()))
            }
        };
        let namespace = namespace.filter(|ns| !ns.is_empty());

        self.validate_name(&name, kind)?;
        let full = fullname(&name, namespace.as_deref());
        Ok((name, namespace, full))
    }

    fn register(&mut self, fullname: &str, schema: AvroSchema) -> Result<(), SchemaError> {
        if self.named_types.contains_key(fullname) {
            return Err(SchemaError::DuplicateName(fullname.to_string()));
        }
        self.named_types.insert(fullname.to_string(), schema);
        Ok(())
    }

    /// Parse a record schema.
    fn parse_record_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let (name, namespace, full) = self.named_identity(obj, "Record")?;

        // Registered before the fields so they can refer back to this record
        self.register(&full, AvroSchema::Named(full.clone()))?;

        let fields_value = obj.get("fields").and_then(Value::as_array).ok_or_else(|| {
            SchemaError::InvalidSchema(format!("Record '{}' missing 'fields' array", full))
        })?;

        let prev_namespace = std::mem::replace(&mut self.current_namespace, namespace.clone());
        let fields = fields_value
            .iter()
            .map(|f| self.parse_field_schema(f))
            .collect::<Result<Vec<_>, _>>();
        self.current_namespace = prev_namespace;
        let fields = fields?;

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    record: full.clone(),
                    field: field.name.clone(),
                });
            }
        }

        let schema = AvroSchema::Record(RecordSchema {
            name,
            namespace,
            fields,
            doc: obj.get("doc").and_then(Value::as_str).map(String::from),
        });

        self.named_types.insert(full, schema.clone());
        Ok(schema)
    }

    /// Parse a field schema within a record.
    fn parse_field_schema(&mut self, value: &Value) -> Result<FieldSchema, SchemaError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::InvalidSchema("Field must be an object".to_string()))?;

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::InvalidSchema("Field missing 'name'".to_string()))?
            .to_string();

        self.validate_name(&name, "Field")?;

        let type_value = obj.get("type").ok_or_else(|| {
            SchemaError::InvalidSchema(format!("Field '{}' missing 'type'", name))
        })?;

        Ok(FieldSchema {
            schema: self.parse(type_value)?,
            default: obj.get("default").cloned(),
            doc: obj.get("doc").and_then(Value::as_str).map(String::from),
            name,
        })
    }

    /// Parse an enum schema.
    fn parse_enum_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let (name, namespace, full) = self.named_identity(obj, "Enum")?;

        let symbols = obj
            .get("symbols")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SchemaError::InvalidSchema(format!("Enum '{}' missing 'symbols' array", full))
            })?
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    SchemaError::InvalidSchema(format!("Enum '{}' has a non-string symbol", full))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if symbols.is_empty() {
            return Err(SchemaError::InvalidSchema(format!(
                "Enum '{}' must have at least one symbol",
                full
            )));
        }

        let mut seen = HashSet::new();
        for symbol in &symbols {
            self.validate_name(symbol, "Enum symbol")?;
            if !seen.insert(symbol.as_str()) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Enum '{}' repeats symbol '{}'",
                    full, symbol
                )));
            }
        }

        let schema = AvroSchema::Enum(EnumSchema {
            name,
            namespace,
            symbols,
            doc: obj.get("doc").and_then(Value::as_str).map(String::from),
        });
        self.register(&full, schema.clone())?;
        Ok(schema)
    }

    /// Parse an array schema.
    fn parse_array_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let items = obj
            .get("items")
            .ok_or_else(|| SchemaError::InvalidSchema("Array missing 'items' field".to_string()))?;
        Ok(AvroSchema::Array(Box::new(self.parse(items)?)))
    }

    /// Parse a map schema.
    fn parse_map_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let values = obj
            .get("values")
            .ok_or_else(|| SchemaError::InvalidSchema("Map missing 'values' field".to_string()))?;
        Ok(AvroSchema::Map(Box::new(self.parse(values)?)))
    }

    /// Parse a fixed schema.
    fn parse_fixed_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let (name, namespace, full) = self.named_identity(obj, "Fixed")?;

        let size = obj.get("size").and_then(Value::as_u64).ok_or_else(|| {
            SchemaError::InvalidSchema(format!("Fixed '{}' missing 'size' field", full))
        })? as usize;

        let schema = AvroSchema::Fixed(FixedSchema {
            name,
            namespace,
            size,
        });
        self.register(&full, schema.clone())?;
        Ok(schema)
    }

    /// Attach a logical type to an already parsed base schema.
    ///
    /// Unknown logical types, or ones on an incompatible base type, are
    /// ignored and the base schema is returned unchanged.
    fn wrap_logical(
        &self,
        obj: &Map<String, Value>,
        logical: &str,
        base: AvroSchema,
    ) -> AvroSchema {
        let logical_type = match (logical, &base) {
            ("decimal", AvroSchema::Bytes | AvroSchema::Fixed(_)) => {
                let precision = obj.get("precision").and_then(Value::as_u64);
                let scale = obj.get("scale").and_then(Value::as_u64).unwrap_or(0);
                match precision {
                    Some(p) if p > 0 && scale <= p => LogicalTypeName::Decimal {
                        precision: p as u32,
                        scale: scale as u32,
                    },
                    _ => {
                        warn!(logical, "decimal without a valid precision/scale; ignoring");
                        return base;
                    }
                }
            }
            ("uuid", AvroSchema::String) => LogicalTypeName::Uuid,
            ("date", AvroSchema::Int) => LogicalTypeName::Date,
            ("time-millis", AvroSchema::Int) => LogicalTypeName::TimeMillis,
            ("time-micros", AvroSchema::Long) => LogicalTypeName::TimeMicros,
            ("timestamp-millis", AvroSchema::Long) => LogicalTypeName::TimestampMillis,
            ("timestamp-micros", AvroSchema::Long) => LogicalTypeName::TimestampMicros,
            ("local-timestamp-millis", AvroSchema::Long) => LogicalTypeName::LocalTimestampMillis,
            ("local-timestamp-micros", AvroSchema::Long) => LogicalTypeName::LocalTimestampMicros,
            _ => return base,
        };

        AvroSchema::Logical(LogicalType::new(base, logical_type))
    }

    /// Resolve a type name to its fully qualified form.
    fn resolve_name(&self, name: &str) -> String {
        if name.contains('.') {
            name.to_string()
        } else {
            fullname(name, self.current_namespace.as_deref())
        }
    }

    /// Check a name against `[A-Za-z_][A-Za-z0-9_]*`.
    fn validate_name(&self, name: &str, context: &str) -> Result<(), SchemaError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) => {
                (first.is_ascii_alphabetic() || first == '_')
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        };

        if valid {
            return Ok(());
        }

        let msg = format!("{} name '{}' does not follow Avro naming rules", context, name);
        if self.strict_names {
            Err(SchemaError::InvalidSchema(msg))
        } else {
            warn!("{}", msg);
            Ok(())
        }
    }
}

fn primitive(name: &str) -> Option<AvroSchema> {
    match name {
        "null" => Some(AvroSchema::Null),
        "boolean" => Some(AvroSchema::Boolean),
        "int" => Some(AvroSchema::Int),
        "long" => Some(AvroSchema::Long),
        "float" => Some(AvroSchema::Float),
        "double" => Some(AvroSchema::Double),
        "bytes" => Some(AvroSchema::Bytes),
        "string" => Some(AvroSchema::String),
        _ => None,
    }
}

/// Reject nested unions and branches that a reader could not tell apart.
fn validate_union(variants: &[AvroSchema]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for (i, variant) in variants.iter().enumerate() {
        if matches!(variant, AvroSchema::Union(_)) {
            return Err(SchemaError::InvalidSchema(format!(
                "Union contains nested union at position {}",
                i
            )));
        }
        let key = variant.union_key();
        if !seen.insert(key.clone()) {
            return Err(SchemaError::AmbiguousUnion(format!(
                "branch {} duplicates '{}'",
                i,
                key.trim_start_matches("named:")
            )));
        }
    }
    Ok(())
}
