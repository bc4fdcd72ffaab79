//! Avro binary decoder for primitive and complex types.
//!
//! This module decodes Avro binary data into [`AvroValue`] trees. The decoder
//! follows the Avro specification for binary encoding:
//! - Varints use zigzag encoding for signed integers
//! - Floats and doubles are little-endian IEEE 754
//! - Bytes and strings are length-prefixed
//! - Arrays and maps are sequences of counted blocks ending in a zero count
//!
//! Errors raised below a record field, array element or map entry carry the
//! path to that position (see [`DecodeError::path`]).

use std::cell::Cell;

use base64::Engine;
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::schema::{AvroSchema, EnumSchema, LogicalTypeName, SchemaResolutionContext};

/// Deepest value nesting accepted before the data is treated as corrupt.
pub const MAX_NESTING_DEPTH: usize = 512;

/// Items a buffer may declare beyond one per byte. Values of a zero-width
/// type (null, empty records) take no bytes.
pub const ZERO_WIDTH_ITEM_ALLOWANCE: u64 = 1 << 16;

/// A decoded Avro value.
///
/// Union values keep the index of the branch they were written with.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    /// Null value
    Null,
    /// Boolean value
    Boolean(bool),
    /// 32-bit signed integer
    Int(i32),
    /// 64-bit signed integer
    Long(i64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// Byte array
    Bytes(Vec<u8>),
    /// UTF-8 string
    String(String),
    /// Record with named fields, in schema order
    Record(Vec<(String, AvroValue)>),
    /// Enum variant (index and symbol name)
    Enum(i32, String),
    /// Array of values
    Array(Vec<AvroValue>),
    /// Map with string keys, in encoded order
    Map(Vec<(String, AvroValue)>),
    /// Union variant (branch index and value)
    Union(i32, Box<AvroValue>),
    /// Fixed-size byte array
    Fixed(Vec<u8>),

    // Logical type values
    /// Decimal value
    Decimal {
        /// The unscaled value as big-endian two's complement bytes
        unscaled: Vec<u8>,
        /// The precision (total number of digits)
        precision: u32,
        /// The scale (number of digits after decimal point)
        scale: u32,
    },
    /// UUID value (as string)
    Uuid(String),
    /// Date value (days since Unix epoch, 1970-01-01)
    Date(i32),
    /// Time in milliseconds since midnight
    TimeMillis(i32),
    /// Time in microseconds since midnight
    TimeMicros(i64),
    /// Timestamp in milliseconds since Unix epoch
    TimestampMillis(i64),
    /// Timestamp in microseconds since Unix epoch
    TimestampMicros(i64),
    /// Local timestamp in milliseconds, no time zone
    LocalTimestampMillis(i64),
    /// Local timestamp in microseconds, no time zone
    LocalTimestampMicros(i64),
}

impl AvroValue {
    /// Convert the AvroValue to a nested `serde_json::Value`.
    ///
    /// Unions render as their branch value, enums as their symbol, bytes and
    /// fixed as base64 text and decimals as decimal strings.
    pub fn to_json(&self) -> Value {
        match self {
            AvroValue::Null => Value::Null,
            AvroValue::Boolean(b) => Value::Bool(*b),
            AvroValue::Int(i) => Value::Number((*i).into()),
            AvroValue::Long(l) => Value::Number((*l).into()),
            AvroValue::Float(f) => float_to_json(*f as f64),
            AvroValue::Double(d) => float_to_json(*d),
            AvroValue::Bytes(b) | AvroValue::Fixed(b) => Value::String(encode_base64(b)),
            AvroValue::String(s) | AvroValue::Uuid(s) => Value::String(s.clone()),
            AvroValue::Record(fields) => {
                let mut map = Map::new();
                for (name, value) in fields {
                    map.insert(name.clone(), value.to_json());
                }
                Value::Object(map)
            }
            AvroValue::Enum(_index, symbol) => Value::String(symbol.clone()),
            AvroValue::Array(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            AvroValue::Map(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    map.insert(key.clone(), value.to_json());
                }
                Value::Object(map)
            }
            AvroValue::Union(_index, value) => value.to_json(),
            AvroValue::Decimal {
                unscaled, scale, ..
            } => Value::String(decimal_to_string(unscaled, *scale)),
            AvroValue::Date(days) => Value::Number((*days).into()),
            AvroValue::TimeMillis(ms) => Value::Number((*ms).into()),
            AvroValue::TimeMicros(v)
            | AvroValue::TimestampMillis(v)
            | AvroValue::TimestampMicros(v)
            | AvroValue::LocalTimestampMillis(v)
            | AvroValue::LocalTimestampMicros(v) => Value::Number((*v).into()),
        }
    }

    /// Strip union wrappers, returning the branch value.
    pub fn unwrap_union(&self) -> &AvroValue {
        match self {
            AvroValue::Union(_, inner) => inner.unwrap_union(),
            other => other,
        }
    }

    /// Look up a record field by name.
    pub fn field(&self, name: &str) -> Option<&AvroValue> {
        match self.unwrap_union() {
            AvroValue::Record(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Same rendering as [`AvroValue::to_json`], with record fields and map
/// entries kept in their decoded order.
impl serde::Serialize for AvroValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};

        match self {
            AvroValue::Null => serializer.serialize_unit(),
            AvroValue::Boolean(b) => serializer.serialize_bool(*b),
            AvroValue::Int(i) | AvroValue::Date(i) | AvroValue::TimeMillis(i) => {
                serializer.serialize_i32(*i)
            }
            AvroValue::Long(v)
            | AvroValue::TimeMicros(v)
            | AvroValue::TimestampMillis(v)
            | AvroValue::TimestampMicros(v)
            | AvroValue::LocalTimestampMillis(v)
            | AvroValue::LocalTimestampMicros(v) => serializer.serialize_i64(*v),
            AvroValue::Float(f) => serializer.serialize_f32(*f),
            AvroValue::Double(d) => serializer.serialize_f64(*d),
            AvroValue::Bytes(b) | AvroValue::Fixed(b) => serializer.serialize_str(&encode_base64(b)),
            AvroValue::String(s) | AvroValue::Uuid(s) | AvroValue::Enum(_, s) => {
                serializer.serialize_str(s)
            }
            AvroValue::Decimal {
                unscaled, scale, ..
            } => serializer.serialize_str(&decimal_to_string(unscaled, *scale)),
            AvroValue::Union(_, inner) => inner.serialize(serializer),
            AvroValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            AvroValue::Record(entries) | AvroValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

fn float_to_json(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Render big-endian two's complement bytes as a decimal string with `scale`
/// fractional digits. Works for any width.
pub fn decimal_to_string(bytes: &[u8], scale: u32) -> String {
    let negative = bytes.first().is_some_and(|b| b & 0x80 != 0);

    // Magnitude as big-endian bytes
    let mut magnitude: Vec<u8> = if negative {
        let mut inverted: Vec<u8> = bytes.iter().map(|b| !b).collect();
        for byte in inverted.iter_mut().rev() {
            let (sum, carry) = byte.overflowing_add(1);
            *byte = sum;
            if !carry {
                break;
            }
        }
        inverted
    } else {
        bytes.to_vec()
    };

    // Repeated division by 10 over base-256 digits
    let mut digits = Vec::new();
    while magnitude.iter().any(|&b| b != 0) {
        let mut remainder: u32 = 0;
        for byte in magnitude.iter_mut() {
            let acc = (remainder << 8) | *byte as u32;
            *byte = (acc / 10) as u8;
            remainder = acc % 10;
        }
        digits.push(b'0' + remainder as u8);
    }
    let scale = scale as usize;
    while digits.len() <= scale {
        digits.push(b'0');
    }
    digits.reverse();

    let mut out = String::with_capacity(digits.len() + 2);
    if negative {
        out.push('-');
    }
    let split = digits.len() - scale;
    out.push_str(std::str::from_utf8(&digits[..split]).unwrap_or("0"));
    if scale > 0 {
        out.push('.');
        out.push_str(std::str::from_utf8(&digits[split..]).unwrap_or("0"));
    }
    out
}

/// Decode a boolean value.
///
/// Avro booleans are encoded as a single byte: 0x00 for false, 0x01 for true.
#[inline]
pub fn decode_boolean(data: &mut &[u8]) -> Result<bool, DecodeError> {
    let (&byte, rest) = data.split_first().ok_or(DecodeError::UnexpectedEof)?;
    *data = rest;
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodeError::InvalidData(format!(
            "Invalid boolean value: {}, expected 0 or 1",
            byte
        ))),
    }
}

/// Decode a 32-bit signed integer (zigzag varint encoded).
#[inline]
pub fn decode_int(data: &mut &[u8]) -> Result<i32, DecodeError> {
    let long = decode_long(data)?;
    i32::try_from(long).map_err(|_| {
        DecodeError::InvalidData(format!("Integer overflow: {} does not fit in i32", long))
    })
}

/// Decode a 64-bit signed integer (zigzag varint encoded).
#[inline]
pub fn decode_long(data: &mut &[u8]) -> Result<i64, DecodeError> {
    super::varint::decode_zigzag(data)
}

/// Decode a 32-bit IEEE 754 floating-point number (little-endian).
#[inline]
pub fn decode_float(data: &mut &[u8]) -> Result<f32, DecodeError> {
    let bytes = take(data, 4)?;
    Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode a 64-bit IEEE 754 floating-point number (little-endian).
#[inline]
pub fn decode_double(data: &mut &[u8]) -> Result<f64, DecodeError> {
    let bytes = take(data, 8)?;
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    Ok(f64::from_le_bytes(buf))
}

/// Decode a length-prefixed byte array.
#[inline]
pub fn decode_bytes(data: &mut &[u8]) -> Result<Vec<u8>, DecodeError> {
    decode_bytes_ref(data).map(<[u8]>::to_vec)
}

/// Decode a length-prefixed byte array without copying.
#[inline]
pub fn decode_bytes_ref<'a>(data: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = decode_long(data)?;
    if len < 0 {
        return Err(DecodeError::InvalidData(format!(
            "Negative bytes length: {}",
            len
        )));
    }
    take(data, len as usize)
}

/// Decode a length-prefixed UTF-8 string.
#[inline]
pub fn decode_string(data: &mut &[u8]) -> Result<String, DecodeError> {
    let bytes = decode_bytes(data)?;
    String::from_utf8(bytes).map_err(DecodeError::from)
}

/// Decode a fixed-size byte array.
#[inline]
pub fn decode_fixed(data: &mut &[u8], size: usize) -> Result<Vec<u8>, DecodeError> {
    take(data, size).map(<[u8]>::to_vec)
}

/// Decode an enum index and look up its symbol.
pub fn decode_enum(data: &mut &[u8], schema: &EnumSchema) -> Result<(i32, String), DecodeError> {
    let index = decode_int(data)?;
    let symbol = usize::try_from(index)
        .ok()
        .and_then(|i| schema.symbols.get(i))
        .ok_or_else(|| {
            DecodeError::InvalidData(format!(
                "Enum index {} out of range for '{}' (0..{})",
                index,
                schema.fullname(),
                schema.symbols.len()
            ))
        })?;
    Ok((index, symbol.clone()))
}

/// Decode a union branch index.
#[inline]
pub fn decode_union_index(data: &mut &[u8], num_variants: usize) -> Result<i32, DecodeError> {
    let index = decode_int(data)?;
    if index < 0 || index as usize >= num_variants {
        return Err(DecodeError::InvalidData(format!(
            "Union index {} out of range (0..{})",
            index, num_variants
        )));
    }
    Ok(index)
}

/// Decode any Avro value based on its schema, resolving named type references
/// through `context`.
///
/// # Example
/// ```
/// use avro_explorer::reader::{decode_value, AvroValue};
/// use avro_explorer::schema::{AvroSchema, SchemaResolutionContext};
///
/// let mut data: &[u8] = &[0x02, 0x06, b'a', b'b', b'c'];
/// let schema = AvroSchema::Union(vec![AvroSchema::Null, AvroSchema::String]);
/// let value = decode_value(&mut data, &schema, &SchemaResolutionContext::new()).unwrap();
/// assert_eq!(value, AvroValue::Union(1, Box::new(AvroValue::String("abc".into()))));
/// ```
pub fn decode_value(
    data: &mut &[u8],
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<AvroValue, DecodeError> {
    let budget = ItemBudget::for_buffer(data.len());
    decode_value_in(data, schema, context, &budget)
}

/// Decode one value, charging its collection items to `budget`.
pub(crate) fn decode_value_in(
    data: &mut &[u8],
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
    budget: &ItemBudget,
) -> Result<AvroValue, DecodeError> {
    Decoder { context, budget }.value(data, schema, 0)
}

/// Number of items every value decoded from one buffer may declare in total:
/// one per byte of the buffer plus [`ZERO_WIDTH_ITEM_ALLOWANCE`].
#[derive(Debug)]
pub(crate) struct ItemBudget {
    remaining: Cell<u64>,
}

impl ItemBudget {
    pub(crate) fn for_buffer(len: usize) -> Self {
        Self {
            remaining: Cell::new((len as u64).saturating_add(ZERO_WIDTH_ITEM_ALLOWANCE)),
        }
    }

    pub(crate) fn spend(&self, count: u64) -> Result<(), DecodeError> {
        let remaining = self.remaining.get();
        if count > remaining {
            return Err(DecodeError::InvalidData(format!(
                "Collection block declares {} items but only {} more fit in this buffer",
                count, remaining
            )));
        }
        self.remaining.set(remaining - count);
        Ok(())
    }
}

struct Decoder<'c> {
    context: &'c SchemaResolutionContext,
    budget: &'c ItemBudget,
}

impl Decoder<'_> {
    fn value(
        &self,
        data: &mut &[u8],
        schema: &AvroSchema,
        depth: usize,
    ) -> Result<AvroValue, DecodeError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(DecodeError::InvalidData(format!(
                "Value nesting deeper than {}",
                MAX_NESTING_DEPTH
            )));
        }

        match schema {
            AvroSchema::Null => Ok(AvroValue::Null),
            AvroSchema::Boolean => decode_boolean(data).map(AvroValue::Boolean),
            AvroSchema::Int => decode_int(data).map(AvroValue::Int),
            AvroSchema::Long => decode_long(data).map(AvroValue::Long),
            AvroSchema::Float => decode_float(data).map(AvroValue::Float),
            AvroSchema::Double => decode_double(data).map(AvroValue::Double),
            AvroSchema::Bytes => decode_bytes(data).map(AvroValue::Bytes),
            AvroSchema::String => decode_string(data).map(AvroValue::String),

            AvroSchema::Record(record) => {
                let mut fields = Vec::with_capacity(record.fields.len());
                for field in &record.fields {
                    let value = self
                        .value(data, &field.schema, depth + 1)
                        .map_err(|e| e.in_field(&field.name))?;
                    fields.push((field.name.clone(), value));
                }
                Ok(AvroValue::Record(fields))
            }
            AvroSchema::Enum(enum_schema) => {
                let (index, symbol) = decode_enum(data, enum_schema)?;
                Ok(AvroValue::Enum(index, symbol))
            }
            AvroSchema::Array(item_schema) => {
                let mut items = Vec::new();
                while let Some(count) = block_count(data)? {
                    self.budget.spend(count as u64)?;
                    items.reserve(count.min(data.len()));
                    for _ in 0..count {
                        let index = items.len();
                        let value = self
                            .value(data, item_schema, depth + 1)
                            .map_err(|e| e.in_element(index))?;
                        items.push(value);
                    }
                }
                Ok(AvroValue::Array(items))
            }
            AvroSchema::Map(value_schema) => {
                let mut entries = Vec::new();
                while let Some(count) = block_count(data)? {
                    self.budget.spend(count as u64)?;
                    entries.reserve(count.min(data.len()));
                    for _ in 0..count {
                        let key = decode_string(data)
                            .map_err(|e| e.in_element(entries.len()))?;
                        let value = self
                            .value(data, value_schema, depth + 1)
                            .map_err(|e| e.in_entry(&key))?;
                        entries.push((key, value));
                    }
                }
                Ok(AvroValue::Map(entries))
            }
            AvroSchema::Union(variants) => {
                let index = decode_union_index(data, variants.len())?;
                let value = self.value(data, &variants[index as usize], depth + 1)?;
                Ok(AvroValue::Union(index, Box::new(value)))
            }
            AvroSchema::Fixed(fixed) => decode_fixed(data, fixed.size).map(AvroValue::Fixed),

            AvroSchema::Named(_) => {
                let resolved = self
                    .context
                    .resolve(schema)
                    .map_err(|e| DecodeError::InvalidData(e.to_string()))?;
                self.value(data, resolved, depth + 1)
            }

            AvroSchema::Logical(logical) => {
                let base = self
                    .context
                    .resolve(&logical.base)
                    .map_err(|e| DecodeError::InvalidData(e.to_string()))?;
                decode_logical(data, logical.logical_type, base)
            }
        }
    }
}

/// Read the next collection block header, returning `None` at the
/// terminating zero count.
fn block_count(data: &mut &[u8]) -> Result<Option<usize>, DecodeError> {
    let count = decode_long(data)?;
    if count == 0 {
        return Ok(None);
    }

    let count = if count < 0 {
        // Negative count is followed by the block's byte size
        let size = decode_long(data)?;
        if size < 0 {
            return Err(DecodeError::InvalidData(format!(
                "Negative collection block size: {}",
                size
            )));
        }
        count.unsigned_abs()
    } else {
        count as u64
    };

    usize::try_from(count).map(Some).map_err(|_| {
        DecodeError::InvalidData(format!("Collection block declares {} items", count))
    })
}

fn decode_logical(
    data: &mut &[u8],
    logical_type: LogicalTypeName,
    base: &AvroSchema,
) -> Result<AvroValue, DecodeError> {
    match logical_type {
        LogicalTypeName::Decimal { precision, scale } => {
            let unscaled = match base {
                AvroSchema::Fixed(fixed) => decode_fixed(data, fixed.size)?,
                _ => decode_bytes(data)?,
            };
            Ok(AvroValue::Decimal {
                unscaled,
                precision,
                scale,
            })
        }
        LogicalTypeName::Uuid => decode_string(data).map(AvroValue::Uuid),
        LogicalTypeName::Date => decode_int(data).map(AvroValue::Date),
        LogicalTypeName::TimeMillis => decode_int(data).map(AvroValue::TimeMillis),
        LogicalTypeName::TimeMicros => decode_long(data).map(AvroValue::TimeMicros),
        LogicalTypeName::TimestampMillis => decode_long(data).map(AvroValue::TimestampMillis),
        LogicalTypeName::TimestampMicros => decode_long(data).map(AvroValue::TimestampMicros),
        LogicalTypeName::LocalTimestampMillis => {
            decode_long(data).map(AvroValue::LocalTimestampMillis)
        }
        LogicalTypeName::LocalTimestampMicros => {
            decode_long(data).map(AvroValue::LocalTimestampMicros)
        }
    }
}

#[inline]
fn take<'a>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8], DecodeError> {
    if data.len() < len {
        return Err(DecodeError::UnexpectedEof);
    }
    let (head, rest) = data.split_at(len);
    *data = rest;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::varint::encode_zigzag;
    use crate::schema::parse_schema;

    fn decode(bytes: &[u8], schema_json: &str) -> Result<AvroValue, DecodeError> {
        let schema = parse_schema(schema_json).unwrap();
        let mut cursor = bytes;
        let value = decode_value(&mut cursor, schema.root(), schema.context())?;
        assert!(cursor.is_empty(), "decoder left {} bytes", cursor.len());
        Ok(value)
    }

    fn string(s: &str) -> Vec<u8> {
        let mut out = encode_zigzag(s.len() as i64);
        out.extend_from_slice(s.as_bytes());
        out
    }

    #[test]
    fn test_decode_boolean() {
        assert!(!decode_boolean(&mut &[0x00][..]).unwrap());
        assert!(decode_boolean(&mut &[0x01][..]).unwrap());
        assert!(matches!(
            decode_boolean(&mut &[0x02][..]),
            Err(DecodeError::InvalidData(_))
        ));
        assert!(matches!(
            decode_boolean(&mut &[][..]),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_decode_int_overflow() {
        let bytes = encode_zigzag(i64::from(i32::MAX) + 1);
        assert!(matches!(
            decode_int(&mut &bytes[..]),
            Err(DecodeError::InvalidData(_))
        ));
    }

    #[test]
    fn test_decode_float_and_double_little_endian() {
        let mut data: &[u8] = &[0x00, 0x00, 0x80, 0x3F];
        assert_eq!(decode_float(&mut data).unwrap(), 1.0);
        let bytes = 2.5f64.to_le_bytes();
        assert_eq!(decode_double(&mut &bytes[..]).unwrap(), 2.5);
        assert!(matches!(
            decode_double(&mut &bytes[..7]),
            Err(DecodeError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_decode_string_invalid_utf8() {
        let mut data: &[u8] = &[0x04, 0xFF, 0xFE];
        assert!(matches!(
            decode_string(&mut data),
            Err(DecodeError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_decode_record() {
        let mut bytes = encode_zigzag(42);
        bytes.extend(string("ada"));
        let value = decode(
            &bytes,
            r#"{"type":"record","name":"U","fields":[{"name":"id","type":"long"},{"name":"name","type":"string"}]}"#,
        )
        .unwrap();
        assert_eq!(
            value,
            AvroValue::Record(vec![
                ("id".into(), AvroValue::Long(42)),
                ("name".into(), AvroValue::String("ada".into())),
            ])
        );
        assert_eq!(value.field("name"), Some(&AvroValue::String("ada".into())));
    }

    #[test]
    fn test_decode_array_multiple_blocks_and_negative_count() {
        // Block of 2, then block of -1 with byte size, then end
        let mut bytes = encode_zigzag(2);
        bytes.extend(encode_zigzag(1));
        bytes.extend(encode_zigzag(2));
        bytes.extend(encode_zigzag(-1));
        bytes.extend(encode_zigzag(1));
        bytes.extend(encode_zigzag(3));
        bytes.push(0x00);
        let value = decode(&bytes, r#"{"type":"array","items":"int"}"#).unwrap();
        assert_eq!(
            value,
            AvroValue::Array(vec![AvroValue::Int(1), AvroValue::Int(2), AvroValue::Int(3)])
        );
    }

    #[test]
    fn test_decode_map() {
        let mut bytes = encode_zigzag(1);
        bytes.extend(string("k"));
        bytes.extend(encode_zigzag(7));
        bytes.push(0x00);
        let value = decode(&bytes, r#"{"type":"map","values":"long"}"#).unwrap();
        assert_eq!(
            value,
            AvroValue::Map(vec![("k".into(), AvroValue::Long(7))])
        );
    }

    #[test]
    fn test_decode_enum_and_fixed() {
        let value = decode(&[0x02], r#"{"type":"enum","name":"E","symbols":["A","B"]}"#).unwrap();
        assert_eq!(value, AvroValue::Enum(1, "B".into()));
        let err = decode(&[0x04], r#"{"type":"enum","name":"E","symbols":["A","B"]}"#).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let value = decode(&[1, 2, 3], r#"{"type":"fixed","name":"F","size":3}"#).unwrap();
        assert_eq!(value, AvroValue::Fixed(vec![1, 2, 3]));
    }

    #[test]
    fn test_union_branch_out_of_range() {
        let err = decode(&[0x04], r#"["null","int"]"#).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidData(_)));
    }

    #[test]
    fn test_recursive_record() {
        // Node(1) -> Node(2) -> null
        let bytes = [0x02, 0x02, 0x04, 0x00];
        let value = decode(
            &bytes,
            r#"{"type":"record","name":"Node","fields":[
                {"name":"v","type":"int"},{"name":"next","type":["null","Node"]}]}"#,
        )
        .unwrap();
        let next = value.field("next").unwrap().unwrap_union();
        assert_eq!(next.field("v"), Some(&AvroValue::Int(2)));
        assert_eq!(next.field("next"), Some(&AvroValue::Union(0, Box::new(AvroValue::Null))));
    }

    #[test]
    fn test_error_path_points_at_nested_field() {
        // addresses: [{zip: string}] with the second zip truncated
        let mut bytes = encode_zigzag(2);
        bytes.extend(string("123"));
        bytes.extend(encode_zigzag(10));
        bytes.extend_from_slice(b"12");
        let err = decode(
            &bytes,
            r#"{"type":"record","name":"P","fields":[{"name":"addresses","type":{"type":"array",
                "items":{"type":"record","name":"A","fields":[{"name":"zip","type":"string"}]}}}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.path(), Some("addresses[1].zip"));
        assert!(matches!(err.root_cause(), DecodeError::UnexpectedEof));
    }

    #[test]
    fn test_absurd_collection_count_rejected() {
        let mut bytes = encode_zigzag(1 << 40);
        bytes.extend(encode_zigzag(1));
        let err = decode(&bytes, r#"{"type":"array","items":"long"}"#).unwrap_err();
        assert!(err.to_string().contains("declares"));
    }

    #[test]
    fn test_repeated_zero_width_blocks_exhaust_budget() {
        // Blocks of 4096 nulls cost two header bytes each
        let header = encode_zigzag(4096);
        let blocks = (ZERO_WIDTH_ITEM_ALLOWANCE / 4096) as usize + 2;
        let mut bytes = Vec::new();
        for _ in 0..blocks {
            bytes.extend_from_slice(&header);
        }
        bytes.push(0x00);

        let err = decode(&bytes, r#"{"type":"array","items":"null"}"#).unwrap_err();
        assert!(err.to_string().contains("declares"), "{}", err);
    }

    #[test]
    fn test_zero_width_items_within_allowance() {
        let mut bytes = encode_zigzag(4096);
        bytes.extend(encode_zigzag(4096));
        bytes.push(0x00);
        let value = decode(&bytes, r#"{"type":"array","items":"null"}"#).unwrap();
        assert!(matches!(value, AvroValue::Array(ref items) if items.len() == 8192));
    }

    #[test]
    fn test_nesting_limit() {
        let bytes = vec![0x02; MAX_NESTING_DEPTH + 10];
        let err = decode(
            &bytes,
            r#"{"type":"record","name":"N","fields":[{"name":"n","type":["null","N"]}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("nesting"));
    }

    #[test]
    fn test_logical_values() {
        let value = decode(&encode_zigzag(19000), r#"{"type":"int","logicalType":"date"}"#).unwrap();
        assert_eq!(value, AvroValue::Date(19000));

        let uuid = "123e4567-e89b-12d3-a456-426614174000";
        let value = decode(&string(uuid), r#"{"type":"string","logicalType":"uuid"}"#).unwrap();
        assert_eq!(value, AvroValue::Uuid(uuid.into()));

        let mut bytes = encode_zigzag(2);
        bytes.extend_from_slice(&[0x30, 0x39]); // 12345
        let value = decode(
            &bytes,
            r#"{"type":"bytes","logicalType":"decimal","precision":6,"scale":2}"#,
        )
        .unwrap();
        assert_eq!(value.to_json(), Value::String("123.45".into()));
    }

    #[test]
    fn test_decimal_to_string() {
        assert_eq!(decimal_to_string(&[], 0), "0");
        assert_eq!(decimal_to_string(&[0x01], 2), "0.01");
        assert_eq!(decimal_to_string(&[0xFF], 0), "-1");
        assert_eq!(decimal_to_string(&[0xCF, 0xC7], 2), "-123.45");
        // Wider than i128
        let mut wide = vec![0x01];
        wide.extend(vec![0x00; 17]);
        assert_eq!(decimal_to_string(&wide, 0), "87112285931760246646623899502532662132736");
    }

    #[test]
    fn test_to_json_rendering() {
        let value = AvroValue::Record(vec![
            ("b".into(), AvroValue::Bytes(vec![0xDE, 0xAD])),
            ("e".into(), AvroValue::Enum(0, "RED".into())),
            ("u".into(), AvroValue::Union(1, Box::new(AvroValue::Long(5)))),
            ("nan".into(), AvroValue::Double(f64::NAN)),
        ]);
        let json = value.to_json();
        assert_eq!(json["b"], "3q0=");
        assert_eq!(json["e"], "RED");
        assert_eq!(json["u"], 5);
        assert!(json["nan"].is_null());
    }

    #[test]
    fn test_serialize_keeps_field_order() {
        let value = AvroValue::Record(vec![
            ("z".into(), AvroValue::Int(1)),
            ("a".into(), AvroValue::Union(0, Box::new(AvroValue::Null))),
            ("m".into(), AvroValue::Map(vec![("k".into(), AvroValue::Boolean(true))])),
        ]);
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"z":1,"a":null,"m":{"k":true}}"#
        );
    }
}
