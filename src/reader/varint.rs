//! Zigzag varint encoding shared by the header, block and value decoders.
//!
//! Avro longs are written as base-128 varints (7 data bits per byte, MSB set
//! on every byte except the last, least-significant group first) after the
//! zigzag mapping `0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, ...`.

use crate::error::DecodeError;

/// Longest valid encoding of a 64-bit value.
pub const MAX_VARINT_LEN: usize = 10;

/// Decode an unsigned varint, advancing the cursor past it.
///
/// # Errors
/// - `DecodeError::UnexpectedEof` if the input ends mid-varint
/// - `DecodeError::InvalidVarint` if more than ten bytes carry the continuation bit
#[inline]
pub fn decode_varint(data: &mut &[u8]) -> Result<u64, DecodeError> {
    let mut result: u64 = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(DecodeError::InvalidVarint);
        }
        result |= ((byte & 0x7F) as u64) << (7 * i as u32);
        if byte & 0x80 == 0 {
            *data = &data[i + 1..];
            return Ok(result);
        }
    }

    if data.len() >= MAX_VARINT_LEN {
        Err(DecodeError::InvalidVarint)
    } else {
        Err(DecodeError::UnexpectedEof)
    }
}

/// Decode a zigzag-encoded signed varint.
#[inline]
pub fn decode_zigzag(data: &mut &[u8]) -> Result<i64, DecodeError> {
    let unsigned = decode_varint(data)?;
    Ok(((unsigned >> 1) as i64) ^ (-((unsigned & 1) as i64)))
}

/// Decode a zigzag varint and add the bytes consumed to `offset`.
///
/// Used by the header and block parsers, which report file offsets in errors.
#[inline]
pub fn decode_zigzag_with_offset(cursor: &mut &[u8], offset: &mut u64) -> Result<i64, DecodeError> {
    let before = cursor.len();
    let value = decode_zigzag(cursor)?;
    *offset += (before - cursor.len()) as u64;
    Ok(value)
}

/// Append the varint encoding of `value` to `out`.
#[inline]
pub fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Encode an unsigned integer as a varint.
#[inline]
pub fn encode_varint(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAX_VARINT_LEN);
    write_varint(value, &mut out);
    out
}

/// Encode a signed integer as a zigzag varint.
#[inline]
pub fn encode_zigzag(value: i64) -> Vec<u8> {
    encode_varint(((value << 1) ^ (value >> 63)) as u64)
}
