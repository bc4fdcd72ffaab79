//! Test-only Avro encoder and container file builder.
//!
//! Integration tests build their input files here instead of shipping binary
//! fixtures, so every file's layout (block split, codec, sync marker) is
//! known to the test that reads it.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::Compression;

use avro_explorer::reader::varint::encode_zigzag;
use avro_explorer::reader::{AvroValue, AVRO_MAGIC, CODEC_KEY, SCHEMA_KEY};
use avro_explorer::schema::{parse_schema, AvroSchema, LogicalTypeName, SchemaResolutionContext};

pub const SYNC: [u8; 16] = [
    0x4F, 0x62, 0x6A, 0x3D, 0x91, 0x2E, 0x07, 0xB4, 0xC8, 0x13, 0x5A, 0xE6, 0x70, 0x2B, 0x99, 0xD1,
];

pub const USER_SCHEMA: &str = r#"{
    "type": "record",
    "name": "User",
    "namespace": "com.example",
    "fields": [
        {"name": "id", "type": "long"},
        {"name": "name", "type": "string"},
        {"name": "email", "type": ["null", "string"], "default": null},
        {"name": "active", "type": "boolean"}
    ]
}"#;

/// A `User` record matching [`USER_SCHEMA`].
pub fn user(id: i64, name: &str, email: Option<&str>, active: bool) -> AvroValue {
    let email = match email {
        Some(e) => AvroValue::Union(1, Box::new(AvroValue::String(e.to_string()))),
        None => AvroValue::Union(0, Box::new(AvroValue::Null)),
    };
    AvroValue::Record(vec![
        ("id".to_string(), AvroValue::Long(id)),
        ("name".to_string(), AvroValue::String(name.to_string())),
        ("email".to_string(), email),
        ("active".to_string(), AvroValue::Boolean(active)),
    ])
}

pub fn users(n: usize) -> Vec<AvroValue> {
    (0..n)
        .map(|i| {
            let email = format!("user{}@example.com", i);
            let email = if i % 3 == 0 { None } else { Some(email.as_str()) };
            user(i as i64, &format!("user-{}", i), email, i % 2 == 0)
        })
        .collect()
}

fn put_long(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&encode_zigzag(v));
}

fn put_bytes(out: &mut Vec<u8>, b: &[u8]) {
    put_long(out, b.len() as i64);
    out.extend_from_slice(b);
}

/// Encode `value` in Avro binary form according to `schema`.
///
/// Panics when the value does not match the schema.
pub fn encode_value(
    value: &AvroValue,
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
    out: &mut Vec<u8>,
) {
    match (schema, value) {
        (AvroSchema::Named(_), _) => {
            let resolved = context.resolve(schema).expect("named type resolves");
            encode_value(value, resolved, context, out);
        }
        (AvroSchema::Null, AvroValue::Null) => {}
        (AvroSchema::Boolean, AvroValue::Boolean(b)) => out.push(u8::from(*b)),
        (AvroSchema::Int, AvroValue::Int(i)) => put_long(out, i64::from(*i)),
        (AvroSchema::Long, AvroValue::Long(l)) => put_long(out, *l),
        (AvroSchema::Float, AvroValue::Float(f)) => out.extend_from_slice(&f.to_le_bytes()),
        (AvroSchema::Double, AvroValue::Double(d)) => out.extend_from_slice(&d.to_le_bytes()),
        (AvroSchema::Bytes, AvroValue::Bytes(b)) => put_bytes(out, b),
        (AvroSchema::String, AvroValue::String(s)) => put_bytes(out, s.as_bytes()),
        (AvroSchema::Fixed(fixed), AvroValue::Fixed(b)) => {
            assert_eq!(b.len(), fixed.size, "fixed size mismatch");
            out.extend_from_slice(b);
        }
        (AvroSchema::Enum(e), AvroValue::Enum(index, symbol)) => {
            assert_eq!(&e.symbols[*index as usize], symbol);
            put_long(out, i64::from(*index));
        }
        (AvroSchema::Record(record), AvroValue::Record(fields)) => {
            assert_eq!(record.fields.len(), fields.len(), "field count mismatch");
            for (field, (name, v)) in record.fields.iter().zip(fields) {
                assert_eq!(&field.name, name);
                encode_value(v, &field.schema, context, out);
            }
        }
        (AvroSchema::Array(items), AvroValue::Array(values)) => {
            if !values.is_empty() {
                put_long(out, values.len() as i64);
                for v in values {
                    encode_value(v, items, context, out);
                }
            }
            put_long(out, 0);
        }
        (AvroSchema::Map(values_schema), AvroValue::Map(entries)) => {
            if !entries.is_empty() {
                put_long(out, entries.len() as i64);
                for (k, v) in entries {
                    put_bytes(out, k.as_bytes());
                    encode_value(v, values_schema, context, out);
                }
            }
            put_long(out, 0);
        }
        (AvroSchema::Union(branches), AvroValue::Union(index, inner)) => {
            put_long(out, i64::from(*index));
            encode_value(inner, &branches[*index as usize], context, out);
        }
        (AvroSchema::Logical(logical), v) => {
            let base = context.resolve(&logical.base).expect("logical base resolves");
            match (logical.logical_type, v) {
                (LogicalTypeName::Decimal { .. }, AvroValue::Decimal { unscaled, .. }) => {
                    match base {
                        AvroSchema::Fixed(_) => out.extend_from_slice(unscaled),
                        _ => put_bytes(out, unscaled),
                    }
                }
                (LogicalTypeName::Uuid, AvroValue::Uuid(s)) => put_bytes(out, s.as_bytes()),
                (LogicalTypeName::Date, AvroValue::Date(d))
                | (LogicalTypeName::TimeMillis, AvroValue::TimeMillis(d)) => {
                    put_long(out, i64::from(*d))
                }
                (LogicalTypeName::TimeMicros, AvroValue::TimeMicros(l))
                | (LogicalTypeName::TimestampMillis, AvroValue::TimestampMillis(l))
                | (LogicalTypeName::TimestampMicros, AvroValue::TimestampMicros(l))
                | (LogicalTypeName::LocalTimestampMillis, AvroValue::LocalTimestampMillis(l))
                | (LogicalTypeName::LocalTimestampMicros, AvroValue::LocalTimestampMicros(l)) => {
                    put_long(out, *l)
                }
                (lt, v) => panic!("value {:?} does not match logical type {:?}", v, lt),
            }
        }
        (s, v) => panic!("value {:?} does not match schema {:?}", v, s),
    }
}

/// Builds container files from decoded values.
#[derive(Debug, Clone)]
pub struct ContainerBuilder {
    schema_json: String,
    codec: Option<String>,
    sync: [u8; 16],
    block_size: usize,
    metadata: Vec<(String, Vec<u8>)>,
}

/// A built file plus the offset where each block starts.
#[derive(Debug, Clone)]
pub struct BuiltFile {
    pub bytes: Vec<u8>,
    pub header_size: usize,
    pub block_offsets: Vec<usize>,
}

impl ContainerBuilder {
    pub fn new(schema_json: &str) -> Self {
        Self {
            schema_json: schema_json.to_string(),
            codec: None,
            sync: SYNC,
            block_size: 100,
            metadata: Vec::new(),
        }
    }

    pub fn codec(mut self, codec: &str) -> Self {
        self.codec = Some(codec.to_string());
        self
    }

    /// Records per block.
    pub fn block_size(mut self, n: usize) -> Self {
        assert!(n > 0);
        self.block_size = n;
        self
    }

    pub fn sync(mut self, sync: [u8; 16]) -> Self {
        self.sync = sync;
        self
    }

    pub fn metadata(mut self, key: &str, value: &[u8]) -> Self {
        self.metadata.push((key.to_string(), value.to_vec()));
        self
    }

    pub fn build(&self, records: &[AvroValue]) -> Vec<u8> {
        self.build_file(records).bytes
    }

    pub fn build_file(&self, records: &[AvroValue]) -> BuiltFile {
        let schema = parse_schema(&self.schema_json).expect("test schema parses");

        let mut out = AVRO_MAGIC.to_vec();
        let mut entries: Vec<(&str, &[u8])> = vec![(SCHEMA_KEY, self.schema_json.as_bytes())];
        if let Some(codec) = &self.codec {
            entries.push((CODEC_KEY, codec.as_bytes()));
        }
        for (k, v) in &self.metadata {
            entries.push((k.as_str(), v.as_slice()));
        }
        put_long(&mut out, entries.len() as i64);
        for (k, v) in entries {
            put_bytes(&mut out, k.as_bytes());
            put_bytes(&mut out, v);
        }
        put_long(&mut out, 0);
        out.extend_from_slice(&self.sync);
        let header_size = out.len();

        let mut block_offsets = Vec::new();
        for chunk in records.chunks(self.block_size) {
            let mut payload = Vec::new();
            for record in chunk {
                encode_value(record, schema.root(), schema.context(), &mut payload);
            }
            let payload = match self.codec.as_deref() {
                Some("deflate") => deflate(&payload),
                _ => payload,
            };
            block_offsets.push(out.len());
            put_long(&mut out, chunk.len() as i64);
            put_bytes(&mut out, &payload);
            out.extend_from_slice(&self.sync);
        }

        BuiltFile {
            bytes: out,
            header_size,
            block_offsets,
        }
    }
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("deflate write");
    encoder.finish().expect("deflate finish")
}
