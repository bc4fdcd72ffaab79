//! Avro schema tree.
//!
//! Named types (record, enum, fixed) appear inline where they are defined and
//! as [`AvroSchema::Named`] lookup keys everywhere else. The keys are resolved
//! against a [`SchemaResolutionContext`](super::SchemaResolutionContext), so a
//! recursive schema never needs a pointer cycle.

use serde_json::{json, Map, Value};

/// Represents an Avro schema.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    /// Null type - no value.
    Null,
    /// Boolean type.
    Boolean,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 32-bit IEEE 754 floating-point.
    Float,
    /// 64-bit IEEE 754 floating-point.
    Double,
    /// Sequence of bytes.
    Bytes,
    /// Unicode string.
    String,

    /// Record type with named fields.
    Record(RecordSchema),
    /// Enumeration type.
    Enum(EnumSchema),
    /// Array of items with a single schema.
    Array(Box<AvroSchema>),
    /// Map with string keys and values of a single schema.
    Map(Box<AvroSchema>),
    /// Union of multiple schemas; branch order is significant.
    Union(Vec<AvroSchema>),
    /// Fixed-size byte array.
    Fixed(FixedSchema),

    /// Reference to a named type by full name.
    Named(String),

    /// Logical type annotation over a base type.
    Logical(LogicalType),
}

/// Schema for a record type.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub fields: Vec<FieldSchema>,
    pub doc: Option<String>,
}

impl RecordSchema {
    /// Create a new RecordSchema with the given name and fields.
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            fields,
            doc: None,
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Get the fully qualified name.
    pub fn fullname(&self) -> String {
        fullname(&self.name, self.namespace.as_deref())
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = named_header("record", &self.name, self.namespace.as_deref());
        if let Some(doc) = &self.doc {
            obj.insert("doc".to_string(), json!(doc));
        }
        let fields: Vec<Value> = self.fields.iter().map(|f| f.to_json_value()).collect();
        obj.insert("fields".to_string(), Value::Array(fields));
        Value::Object(obj)
    }
}

/// Schema for a field within a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub schema: AvroSchema,
    /// Default value as written in the schema JSON. Carried for display only;
    /// defaults matter for schema evolution, which this crate does not do.
    pub default: Option<Value>,
    pub doc: Option<String>,
}

impl FieldSchema {
    /// Create a new FieldSchema with the given name and schema.
    pub fn new(name: impl Into<String>, schema: AvroSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
            doc: None,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".to_string(), json!(&self.name));
        obj.insert("type".to_string(), self.schema.to_json_value());
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), default.clone());
        }
        if let Some(doc) = &self.doc {
            obj.insert("doc".to_string(), json!(doc));
        }
        Value::Object(obj)
    }
}

/// Schema for an enumeration type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub symbols: Vec<String>,
    pub doc: Option<String>,
}

impl EnumSchema {
    /// Create a new EnumSchema with the given name and symbols.
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            symbols,
            doc: None,
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Get the fully qualified name.
    pub fn fullname(&self) -> String {
        fullname(&self.name, self.namespace.as_deref())
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = named_header("enum", &self.name, self.namespace.as_deref());
        if let Some(doc) = &self.doc {
            obj.insert("doc".to_string(), json!(doc));
        }
        obj.insert("symbols".to_string(), json!(&self.symbols));
        Value::Object(obj)
    }
}

/// Schema for a fixed-size byte array.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub size: usize,
}

impl FixedSchema {
    /// Create a new FixedSchema with the given name and size.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            size,
        }
    }

    /// Set the namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Get the fully qualified name.
    pub fn fullname(&self) -> String {
        fullname(&self.name, self.namespace.as_deref())
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = named_header("fixed", &self.name, self.namespace.as_deref());
        obj.insert("size".to_string(), json!(self.size));
        Value::Object(obj)
    }
}

/// Logical type wrapper around a base schema.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalType {
    pub base: Box<AvroSchema>,
    pub logical_type: LogicalTypeName,
}

impl LogicalType {
    pub fn new(base: AvroSchema, logical_type: LogicalTypeName) -> Self {
        Self {
            base: Box::new(base),
            logical_type,
        }
    }

    /// Serialize as the base type object with a `logicalType` attribute added.
    pub fn to_json_value(&self) -> Value {
        let mut obj = match self.base.to_json_value() {
            Value::Object(m) => m,
            other => {
                let mut m = Map::new();
                m.insert("type".to_string(), other);
                m
            }
        };

        obj.insert("logicalType".to_string(), json!(self.logical_type.name()));
        if let LogicalTypeName::Decimal { precision, scale } = &self.logical_type {
            obj.insert("precision".to_string(), json!(precision));
            obj.insert("scale".to_string(), json!(scale));
        }

        Value::Object(obj)
    }
}

/// Logical type names with their parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalTypeName {
    /// Decimal on bytes or fixed.
    Decimal { precision: u32, scale: u32 },
    /// UUID on string.
    Uuid,
    /// Days since Unix epoch.
    Date,
    TimeMillis,
    TimeMicros,
    TimestampMillis,
    TimestampMicros,
    LocalTimestampMillis,
    LocalTimestampMicros,
}

impl LogicalTypeName {
    /// Get the string name of the logical type.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalTypeName::Decimal { .. } => "decimal",
            LogicalTypeName::Uuid => "uuid",
            LogicalTypeName::Date => "date",
            LogicalTypeName::TimeMillis => "time-millis",
            LogicalTypeName::TimeMicros => "time-micros",
            LogicalTypeName::TimestampMillis => "timestamp-millis",
            LogicalTypeName::TimestampMicros => "timestamp-micros",
            LogicalTypeName::LocalTimestampMillis => "local-timestamp-millis",
            LogicalTypeName::LocalTimestampMicros => "local-timestamp-micros",
        }
    }
}

impl AvroSchema {
    /// Check if this schema is a primitive type.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            AvroSchema::Null
                | AvroSchema::Boolean
                | AvroSchema::Int
                | AvroSchema::Long
                | AvroSchema::Float
                | AvroSchema::Double
                | AvroSchema::Bytes
                | AvroSchema::String
        )
    }

    /// Check if this schema defines a named type (record, enum, or fixed).
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            AvroSchema::Record(_) | AvroSchema::Enum(_) | AvroSchema::Fixed(_)
        )
    }

    /// Get the fully qualified name of a named type or reference.
    pub fn fullname(&self) -> Option<String> {
        match self {
            AvroSchema::Record(r) => Some(r.fullname()),
            AvroSchema::Enum(e) => Some(e.fullname()),
            AvroSchema::Fixed(f) => Some(f.fullname()),
            AvroSchema::Named(n) => Some(n.clone()),
            AvroSchema::Logical(lt) => lt.base.fullname(),
            _ => None,
        }
    }

    /// Key used to decide whether two union branches are indistinguishable.
    ///
    /// Unnamed types collide by category; named types (and references to
    /// them) collide only on full name.
    pub fn union_key(&self) -> String {
        match self {
            AvroSchema::Null => "null".to_string(),
            AvroSchema::Boolean => "boolean".to_string(),
            AvroSchema::Int => "int".to_string(),
            AvroSchema::Long => "long".to_string(),
            AvroSchema::Float => "float".to_string(),
            AvroSchema::Double => "double".to_string(),
            AvroSchema::Bytes => "bytes".to_string(),
            AvroSchema::String => "string".to_string(),
            AvroSchema::Array(_) => "array".to_string(),
            AvroSchema::Map(_) => "map".to_string(),
            AvroSchema::Union(_) => "union".to_string(),
            AvroSchema::Record(_)
            | AvroSchema::Enum(_)
            | AvroSchema::Fixed(_)
            | AvroSchema::Named(_) => {
                format!("named:{}", self.fullname().unwrap_or_default())
            }
            AvroSchema::Logical(lt) => lt.base.union_key(),
        }
    }

    /// Check if this schema represents a nullable type (union with null).
    pub fn is_nullable(&self) -> bool {
        match self {
            AvroSchema::Union(variants) => variants.iter().any(|v| matches!(v, AvroSchema::Null)),
            _ => false,
        }
    }

    /// Serialize the schema to a JSON string.
    ///
    /// # Example
    /// ```
    /// use avro_explorer::schema::AvroSchema;
    ///
    /// assert_eq!(AvroSchema::String.to_json(), r#""string""#);
    /// ```
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Serialize the schema to a JSON Value.
    pub fn to_json_value(&self) -> Value {
        match self {
            AvroSchema::Null => json!("null"),
            AvroSchema::Boolean => json!("boolean"),
            AvroSchema::Int => json!("int"),
            AvroSchema::Long => json!("long"),
            AvroSchema::Float => json!("float"),
            AvroSchema::Double => json!("double"),
            AvroSchema::Bytes => json!("bytes"),
            AvroSchema::String => json!("string"),
            AvroSchema::Record(r) => r.to_json_value(),
            AvroSchema::Enum(e) => e.to_json_value(),
            AvroSchema::Array(items) => json!({
                "type": "array",
                "items": items.to_json_value()
            }),
            AvroSchema::Map(values) => json!({
                "type": "map",
                "values": values.to_json_value()
            }),
            AvroSchema::Union(variants) => {
                Value::Array(variants.iter().map(|v| v.to_json_value()).collect())
            }
            AvroSchema::Fixed(f) => f.to_json_value(),
            AvroSchema::Named(name) => json!(name),
            AvroSchema::Logical(lt) => lt.to_json_value(),
        }
    }
}

pub(crate) fn fullname(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() && !name.contains('.') => format!("{}.{}", ns, name),
        _ => name.to_string(),
    }
}

fn named_header(kind: &str, name: &str, namespace: Option<&str>) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(kind));
    obj.insert("name".to_string(), json!(name));
    if let Some(ns) = namespace {
        obj.insert("namespace".to_string(), json!(ns));
    }
    obj
}
