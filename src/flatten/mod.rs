//! Record flattening
//!
//! Projects a nested [`AvroValue`] into a flat, ordered mapping from a path
//! string to a scalar:
//!
//! - record fields and map entries join with the separator (`parent.child`)
//! - arrays shorter than the inline threshold expand to `parent[i]`; longer
//!   ones become a single JSON-text cell under `parent`
//! - unions flatten as their branch; a null branch is an explicit null
//!
//! [`ColumnOrder`] accumulates the first-seen column order across records.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

use crate::reader::decode::encode_base64;
use crate::reader::{decimal_to_string, AvroValue};

/// Default number of elements below which arrays are expanded into columns.
pub const DEFAULT_ARRAY_INLINE_THRESHOLD: usize = 20;

/// Column name used when the top-level value is not a record.
pub const TOP_LEVEL_COLUMN: &str = "value";

/// Scalar cell of a flattened record.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl FlatValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FlatValue::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            FlatValue::Null => Value::Null,
            FlatValue::Bool(b) => Value::Bool(*b),
            FlatValue::Int(i) => Value::Number((*i).into()),
            FlatValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FlatValue::String(s) => Value::String(s.clone()),
        }
    }

    /// Text used in a delimited cell. Null is the empty string.
    pub fn to_cell(&self) -> String {
        match self {
            FlatValue::Null => String::new(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FlatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlatValue::Null => write!(f, "null"),
            FlatValue::Bool(b) => write!(f, "{}", b),
            FlatValue::Int(i) => write!(f, "{}", i),
            FlatValue::Float(x) => match serde_json::Number::from_f64(*x) {
                Some(n) => write!(f, "{}", n),
                None => write!(f, "{}", x),
            },
            FlatValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for FlatValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FlatValue::Null => serializer.serialize_unit(),
            FlatValue::Bool(b) => serializer.serialize_bool(*b),
            FlatValue::Int(i) => serializer.serialize_i64(*i),
            FlatValue::Float(f) => serializer.serialize_f64(*f),
            FlatValue::String(s) => serializer.serialize_str(s),
        }
    }
}

/// A flattened record: path → scalar, in the order paths were produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatRecord {
    entries: Vec<(String, FlatValue)>,
    // path -> position in `entries`
    index: HashMap<String, usize>,
}

impl FlatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. A repeated path keeps its first position and takes
    /// the new value.
    pub fn insert(&mut self, path: impl Into<String>, value: FlatValue) {
        let path = path.into();
        match self.index.get(&path) {
            Some(&position) => self.entries[position].1 = value,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, value));
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<&FlatValue> {
        self.index.get(path).map(|&position| &self.entries[position].1)
    }

    pub fn contains_key(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlatValue)> {
        self.entries.iter().map(|(p, v)| (p.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object with this record's keys. Key order follows `serde_json`'s map.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(p, v)| (p.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl Serialize for FlatRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, value) in &self.entries {
            map.serialize_entry(path, value)?;
        }
        map.end()
    }
}

impl FromIterator<(String, FlatValue)> for FlatRecord {
    fn from_iter<I: IntoIterator<Item = (String, FlatValue)>>(iter: I) -> Self {
        let mut record = FlatRecord::new();
        for (path, value) in iter {
            record.insert(path, value);
        }
        record
    }
}

impl IntoIterator for FlatRecord {
    type Item = (String, FlatValue);
    type IntoIter = std::vec::IntoIter<(String, FlatValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<&FlatValue> for AvroValue {
    fn from(value: &FlatValue) -> Self {
        match value {
            FlatValue::Null => AvroValue::Null,
            FlatValue::Bool(b) => AvroValue::Boolean(*b),
            FlatValue::Int(i) => AvroValue::Long(*i),
            FlatValue::Float(f) => AvroValue::Double(*f),
            FlatValue::String(s) => AvroValue::String(s.clone()),
        }
    }
}

/// A flat record read back as a depth-1 record; flattening it again yields
/// the same columns and values.
impl From<&FlatRecord> for AvroValue {
    fn from(record: &FlatRecord) -> Self {
        AvroValue::Record(
            record
                .entries
                .iter()
                .map(|(p, v)| (p.clone(), AvroValue::from(v)))
                .collect(),
        )
    }
}

/// Flattening options.
#[derive(Debug, Clone)]
pub struct FlattenConfig {
    /// Arrays with fewer elements than this are expanded to `parent[i]`
    /// columns (default: 20).
    pub array_inline_threshold: usize,
    /// Joins record fields and map keys (default: ".").
    pub separator: String,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            array_inline_threshold: DEFAULT_ARRAY_INLINE_THRESHOLD,
            separator: ".".to_string(),
        }
    }
}

impl FlattenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the array inline threshold. Zero serializes every array as JSON text.
    pub fn with_array_inline_threshold(mut self, threshold: usize) -> Self {
        self.array_inline_threshold = threshold;
        self
    }

    /// Set the path separator for record fields and map keys.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

/// Flattens decoded values according to a [`FlattenConfig`].
#[derive(Debug, Clone, Default)]
pub struct Flattener {
    config: FlattenConfig,
}

impl Flattener {
    pub fn new(config: FlattenConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FlattenConfig {
        &self.config
    }

    /// Flatten one decoded value.
    ///
    /// A record contributes its fields at the top level; any other value is
    /// placed under the [`TOP_LEVEL_COLUMN`] column.
    pub fn flatten(&self, value: &AvroValue) -> FlatRecord {
        let mut out = FlatRecord::new();
        match value.unwrap_union() {
            AvroValue::Record(fields) => {
                for (name, field) in fields {
                    self.walk(name.clone(), field, &mut out);
                }
            }
            other => self.walk(TOP_LEVEL_COLUMN.to_string(), other, &mut out),
        }
        out
    }

    fn join(&self, parent: &str, child: &str) -> String {
        let mut path = String::with_capacity(parent.len() + self.config.separator.len() + child.len());
        path.push_str(parent);
        path.push_str(&self.config.separator);
        path.push_str(child);
        path
    }

    fn walk(&self, path: String, value: &AvroValue, out: &mut FlatRecord) {
        match value {
            AvroValue::Union(_, inner) => self.walk(path, inner, out),
            AvroValue::Record(fields) if fields.is_empty() => {
                out.insert(path, FlatValue::String("{}".to_string()))
            }
            AvroValue::Record(fields) => {
                for (name, field) in fields {
                    self.walk(self.join(&path, name), field, out);
                }
            }
            AvroValue::Map(entries) if entries.is_empty() => {
                out.insert(path, FlatValue::String("{}".to_string()))
            }
            AvroValue::Map(entries) => {
                for (key, entry) in entries {
                    self.walk(self.join(&path, key), entry, out);
                }
            }
            AvroValue::Array(items) if items.is_empty() => {
                out.insert(path, FlatValue::String("[]".to_string()))
            }
            AvroValue::Array(items) if items.len() < self.config.array_inline_threshold => {
                for (i, item) in items.iter().enumerate() {
                    self.walk(format!("{}[{}]", path, i), item, out);
                }
            }
            AvroValue::Array(_) => {
                let text = serde_json::to_string(value).unwrap_or_else(|_| value.to_json().to_string());
                out.insert(path, FlatValue::String(text));
            }
            scalar => out.insert(path, scalar_value(scalar)),
        }
    }
}

/// Render a non-container value as a flat cell.
fn scalar_value(value: &AvroValue) -> FlatValue {
    match value {
        AvroValue::Null => FlatValue::Null,
        AvroValue::Boolean(b) => FlatValue::Bool(*b),
        AvroValue::Int(i) | AvroValue::Date(i) | AvroValue::TimeMillis(i) => {
            FlatValue::Int(i64::from(*i))
        }
        AvroValue::Long(l)
        | AvroValue::TimeMicros(l)
        | AvroValue::TimestampMillis(l)
        | AvroValue::TimestampMicros(l)
        | AvroValue::LocalTimestampMillis(l)
        | AvroValue::LocalTimestampMicros(l) => FlatValue::Int(*l),
        AvroValue::Float(f) => FlatValue::Float(f64::from(*f)),
        AvroValue::Double(d) => FlatValue::Float(*d),
        AvroValue::Bytes(b) | AvroValue::Fixed(b) => FlatValue::String(encode_base64(b)),
        AvroValue::String(s) | AvroValue::Uuid(s) => FlatValue::String(s.clone()),
        AvroValue::Enum(_, symbol) => FlatValue::String(symbol.clone()),
        AvroValue::Decimal {
            unscaled, scale, ..
        } => FlatValue::String(decimal_to_string(unscaled, *scale)),
        AvroValue::Union(_, inner) => scalar_value(inner),
        // Containers are handled by the walker
        AvroValue::Record(_) | AvroValue::Map(_) | AvroValue::Array(_) => {
            FlatValue::String(value.to_json().to_string())
        }
    }
}

/// Flatten a value with the default configuration.
pub fn flatten(value: &AvroValue) -> FlatRecord {
    Flattener::default().flatten(value)
}

/// First-seen column order across many flat records.
#[derive(Debug, Clone, Default)]
pub struct ColumnOrder {
    columns: Vec<String>,
    seen: HashSet<String>,
}

impl ColumnOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append any path of `record` not seen before.
    pub fn observe(&mut self, record: &FlatRecord) {
        for key in record.keys() {
            if !self.seen.contains(key) {
                self.seen.insert(key.to_string());
                self.columns.push(key.to_string());
            }
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn into_columns(self) -> Vec<String> {
        self.columns
    }
}

impl<'a> FromIterator<&'a FlatRecord> for ColumnOrder {
    fn from_iter<I: IntoIterator<Item = &'a FlatRecord>>(iter: I) -> Self {
        let mut order = ColumnOrder::new();
        for record in iter {
            order.observe(record);
        }
        order
    }
}
