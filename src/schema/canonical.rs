//! Parsing Canonical Form and the CRC-64-AVRO (Rabin) fingerprint.
//!
//! Canonical form keeps only the attributes that affect how data is read
//! (`name`, `type`, `fields`, `symbols`, `items`, `values`, `size`), in that
//! order, with full names and no whitespace.

use std::collections::HashSet;
use std::fmt::Write;

use crate::schema::AvroSchema;

const EMPTY: u64 = 0xc15d_213a_a4d7_a795;

const FINGERPRINT_TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut fp = i as u64;
        let mut j = 0;
        while j < 8 {
            fp = (fp >> 1) ^ (EMPTY & (0u64.wrapping_sub(fp & 1)));
            j += 1;
        }
        table[i] = fp;
        i += 1;
    }
    table
}

/// 64-bit Rabin fingerprint as defined for Avro schema fingerprints.
pub fn rabin_fingerprint(data: &[u8]) -> u64 {
    data.iter().fold(EMPTY, |fp, &b| {
        (fp >> 8) ^ FINGERPRINT_TABLE[((fp ^ b as u64) & 0xff) as usize]
    })
}

/// Render a schema in Parsing Canonical Form.
pub fn canonical_form(schema: &AvroSchema) -> String {
    let mut out = String::new();
    let mut defined = HashSet::new();
    write_canonical(schema, &mut out, &mut defined);
    out
}

fn quoted(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn write_canonical(schema: &AvroSchema, out: &mut String, defined: &mut HashSet<String>) {
    match schema {
        AvroSchema::Null => out.push_str("\"null\""),
        AvroSchema::Boolean => out.push_str("\"boolean\""),
        AvroSchema::Int => out.push_str("\"int\""),
        AvroSchema::Long => out.push_str("\"long\""),
        AvroSchema::Float => out.push_str("\"float\""),
        AvroSchema::Double => out.push_str("\"double\""),
        AvroSchema::Bytes => out.push_str("\"bytes\""),
        AvroSchema::String => out.push_str("\"string\""),
        AvroSchema::Named(name) => out.push_str(&quoted(name)),
        AvroSchema::Logical(lt) => write_canonical(&lt.base, out, defined),
        AvroSchema::Array(items) => {
            out.push_str("{\"type\":\"array\",\"items\":");
            write_canonical(items, out, defined);
            out.push('}');
        }
        AvroSchema::Map(values) => {
            out.push_str("{\"type\":\"map\",\"values\":");
            write_canonical(values, out, defined);
            out.push('}');
        }
        AvroSchema::Union(variants) => {
            out.push('[');
            for (i, v) in variants.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out, defined);
            }
            out.push(']');
        }
        AvroSchema::Record(r) => {
            let name = r.fullname();
            if !defined.insert(name.clone()) {
                out.push_str(&quoted(&name));
                return;
            }
            let _ = write!(out, "{{\"name\":{},\"type\":\"record\",\"fields\":[", quoted(&name));
            for (i, field) in r.fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{{\"name\":{},\"type\":", quoted(&field.name));
                write_canonical(&field.schema, out, defined);
                out.push('}');
            }
            out.push_str("]}");
        }
        AvroSchema::Enum(e) => {
            let name = e.fullname();
            if !defined.insert(name.clone()) {
                out.push_str(&quoted(&name));
                return;
            }
            let symbols: Vec<String> = e.symbols.iter().map(|s| quoted(s)).collect();
            let _ = write!(
                out,
                "{{\"name\":{},\"type\":\"enum\",\"symbols\":[{}]}}",
                quoted(&name),
                symbols.join(",")
            );
        }
        AvroSchema::Fixed(f) => {
            let name = f.fullname();
            if !defined.insert(name.clone()) {
                out.push_str(&quoted(&name));
                return;
            }
            let _ = write!(
                out,
                "{{\"name\":{},\"type\":\"fixed\",\"size\":{}}}",
                quoted(&name),
                f.size
            );
        }
    }
}
