//! Compression codec support for Avro blocks
//!
//! Only the two codecs every Avro writer supports are handled: `null` and
//! `deflate`. Any other `avro.codec` value is rejected at header time.

use crate::error::CodecError;

#[cfg(feature = "deflate")]
use flate2::read::DeflateDecoder;

#[cfg(feature = "deflate")]
use std::io::Read;

/// Largest decompressed block payload accepted by default (256 MiB).
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

/// Compression codec used within Avro blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// No compression (passthrough)
    #[default]
    Null,
    /// Raw DEFLATE (RFC 1951, no zlib header)
    Deflate,
}

impl Codec {
    /// Parse a codec from its name string as found in Avro metadata.
    ///
    /// # Examples
    /// ```
    /// use avro_explorer::codec::Codec;
    ///
    /// assert_eq!(Codec::from_name("deflate").unwrap(), Codec::Deflate);
    /// assert!(Codec::from_name("snappy").is_err());
    /// ```
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name {
            "null" => Ok(Codec::Null),
            "deflate" => Ok(Codec::Deflate),
            unknown => Err(CodecError::UnsupportedCodec(format!(
                "Unknown codec '{}'. Supported codecs: null, deflate",
                unknown
            ))),
        }
    }

    /// Get the canonical name of this codec.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Null => "null",
            Codec::Deflate => "deflate",
        }
    }

    /// Decompress a block payload, capped at [`DEFAULT_MAX_DECOMPRESSED_SIZE`].
    ///
    /// For the null codec this copies the input.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.decompress_with_limit(data, DEFAULT_MAX_DECOMPRESSED_SIZE)
    }

    /// Decompress a block payload, failing once the output would exceed
    /// `limit` bytes. The null codec output is the input itself and is not capped.
    pub fn decompress_with_limit(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        #[cfg(not(feature = "deflate"))]
        let _ = limit;
        match self {
            Codec::Null => Ok(data.to_vec()),
            #[cfg(feature = "deflate")]
            Codec::Deflate => decompress_deflate(data, limit),
            #[cfg(not(feature = "deflate"))]
            Codec::Deflate => Err(CodecError::UnsupportedCodec(
                "Deflate codec not enabled. Enable the 'deflate' feature.".to_string(),
            )),
        }
    }
}

#[cfg(feature = "deflate")]
fn decompress_deflate(data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    // One byte past the limit is enough to tell an oversized block apart
    let mut decoder = DeflateDecoder::new(data).take((limit as u64).saturating_add(1));
    let mut decompressed = Vec::with_capacity(data.len().saturating_mul(2).min(limit));

    decoder.read_to_end(&mut decompressed).map_err(|e| {
        CodecError::DecompressionError(format!("Deflate decompression failed: {}", e))
    })?;

    if decompressed.len() > limit {
        return Err(CodecError::DecompressionError(format!(
            "Decompressed block exceeds the {} byte limit",
            limit
        )));
    }
    Ok(decompressed)
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
