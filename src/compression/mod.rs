//! Payload compression adapters.
//!
//! Every column persists the name of its compressor so a reader can pick
//! the matching decompressor. Files written with [`Version::Min`] carry no
//! name and always use LZ4.
//!
//! [`Version::Min`]: crate::format::Version::Min

use std::fmt;

use crate::{Error, Result};

/// Largest payload the compact encoding can describe.
pub const MAX_COMPRESS_INPUT: usize = i32::MAX as usize;

/// Compression algorithm applied to block payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Compression {
    /// Payloads are stored as written.
    None,
    /// LZ4 block compression.
    #[default]
    Lz4,
    /// Snappy raw compression.
    Snappy,
}

impl Compression {
    /// Persisted name of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            Compression::None => "none",
            Compression::Lz4 => "lz4",
            Compression::Snappy => "snappy",
        }
    }

    /// Look up an algorithm by its persisted name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(Compression::None),
            "lz4" => Ok(Compression::Lz4),
            "snappy" => Ok(Compression::Snappy),
            other => Err(Error::UnknownCompression(other.to_string())),
        }
    }

    /// Check if compression is enabled.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Compression::None)
    }

    /// Compress `raw`.
    ///
    /// Returns `None` when the algorithm stores payloads as written.
    pub fn compress(&self, raw: &[u8]) -> Result<Option<Vec<u8>>> {
        if raw.len() > MAX_COMPRESS_INPUT {
            return Err(Error::Capacity {
                size: raw.len(),
                max: MAX_COMPRESS_INPUT,
            });
        }

        match self {
            Compression::None => Ok(None),
            Compression::Lz4 => Ok(Some(lz4_flex::compress(raw))),
            Compression::Snappy => snap::raw::Encoder::new()
                .compress_vec(raw)
                .map(Some)
                .map_err(|e| Error::internal(format!("snappy compress failed: {}", e))),
        }
    }

    /// Upper bound on the bytes `compressed_len` compressed bytes can
    /// expand to.
    pub fn max_decompressed_len(&self, compressed_len: usize) -> usize {
        let ratio = match self {
            Compression::None => return compressed_len,
            // one 0xFF length byte extends a match by 255
            Compression::Lz4 => 255,
            // a 3-byte copy emits at most 64 bytes
            Compression::Snappy => 32,
        };
        compressed_len.saturating_mul(ratio).saturating_add(64)
    }

    /// Decompress `compressed` into exactly `raw_len` bytes.
    pub fn decompress(&self, compressed: &[u8], raw_len: usize) -> Result<Vec<u8>> {
        let raw = match self {
            Compression::None => {
                return Err(Error::corruption(
                    "compressed payload in a column without compression",
                ))
            }
            Compression::Lz4 => lz4_flex::decompress(compressed, raw_len)
                .map_err(|e| Error::corruption(format!("lz4 decompress failed: {}", e)))?,
            Compression::Snappy => {
                let len = snap::raw::decompress_len(compressed)
                    .map_err(|e| Error::corruption(format!("snappy decompress failed: {}", e)))?;
                if len != raw_len {
                    return Err(Error::corruption(format!(
                        "snappy payload of {} bytes, expected {}",
                        len, raw_len
                    )));
                }
                snap::raw::Decoder::new()
                    .decompress_vec(compressed)
                    .map_err(|e| Error::corruption(format!("snappy decompress failed: {}", e)))?
            }
        };

        if raw.len() != raw_len {
            return Err(Error::corruption(format!(
                "decompressed {} bytes, expected {}",
                raw.len(),
                raw_len
            )));
        }
        Ok(raw)
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Check whether compressing `raw` bytes down to `compressed` bytes pays off.
///
/// With the default divisor of 8 the compressed form must be smaller than
/// 7/8 of the input.
#[inline]
pub fn is_good_compression_ratio(raw: usize, compressed: usize, divisor: usize) -> bool {
    compressed < raw - raw / divisor.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compressible() -> Vec<u8> {
        b"columnstore ".repeat(200)
    }

    #[test]
    fn test_names_roundtrip() {
        for c in [Compression::None, Compression::Lz4, Compression::Snappy] {
            assert_eq!(Compression::from_name(c.name()).unwrap(), c);
        }
        assert!(matches!(
            Compression::from_name("zstd"),
            Err(Error::UnknownCompression(_))
        ));
    }

    #[test]
    fn test_lz4_roundtrip() {
        let raw = compressible();
        let compressed = Compression::Lz4.compress(&raw).unwrap().unwrap();
        assert!(compressed.len() < raw.len());
        assert_eq!(Compression::Lz4.decompress(&compressed, raw.len()).unwrap(), raw);
    }

    #[test]
    fn test_snappy_roundtrip() {
        let raw = compressible();
        let compressed = Compression::Snappy.compress(&raw).unwrap().unwrap();
        assert_eq!(
            Compression::Snappy.decompress(&compressed, raw.len()).unwrap(),
            raw
        );
    }

    #[test]
    fn test_none_does_not_compress() {
        assert!(Compression::None.compress(b"abc").unwrap().is_none());
        assert!(Compression::None.decompress(b"abc", 3).is_err());
    }

    #[test]
    fn test_decompress_length_mismatch() {
        let raw = compressible();
        let compressed = Compression::Snappy.compress(&raw).unwrap().unwrap();
        assert!(Compression::Snappy
            .decompress(&compressed, raw.len() + 1)
            .unwrap_err()
            .is_format_error());
    }

    #[test]
    fn test_max_decompressed_len_bounds_real_output() {
        let raw = vec![0u8; 64 * 1024];
        for c in [Compression::Lz4, Compression::Snappy] {
            let compressed = c.compress(&raw).unwrap().unwrap();
            assert!(c.max_decompressed_len(compressed.len()) >= raw.len(), "{}", c);
            assert!(c.max_decompressed_len(compressed.len()) < i32::MAX as usize);
        }
        assert_eq!(Compression::None.max_decompressed_len(10), 10);
    }

    #[test]
    fn test_good_ratio() {
        assert!(is_good_compression_ratio(800, 699, 8));
        assert!(!is_good_compression_ratio(800, 700, 8));
        assert!(!is_good_compression_ratio(4, 4, 8));
        assert!(is_good_compression_ratio(100, 49, 2));
    }
}
