//! Compact payload encoding.
//!
//! ```text
//! empty payload     : zvint(0)
//! stored raw        : zvint(-raw_len)        | raw bytes
//! stored compressed : zvint(+compressed_len) | compressed bytes | zvlong(raw_len - MAX_DATA_BLOCK_SIZE)
//! ```
//!
//! Payload bytes are encrypted in place at their file offset when a cipher
//! is given.

use crate::compression::{is_good_compression_ratio, Compression, MAX_COMPRESS_INPUT};
use crate::encryption::Cipher;
use crate::format::MAX_DATA_BLOCK_SIZE;
use crate::store::{DataInput, DataOutput, IndexInput, IndexOutput};
use crate::{Error, Result};

/// How a payload ended up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactKind {
    /// No payload bytes.
    Empty,
    /// Stored as written.
    Raw,
    /// Stored compressed.
    Compressed,
}

/// Write `data` in compact form.
///
/// `scratch` holds the bytes actually written, so encryption never touches
/// `data`.
pub fn write_compact(
    out: &mut dyn IndexOutput,
    compression: Compression,
    cipher: Option<&dyn Cipher>,
    ratio_divisor: usize,
    data: &[u8],
    scratch: &mut Vec<u8>,
) -> Result<CompactKind> {
    if data.is_empty() {
        out.write_zvint(0)?;
        return Ok(CompactKind::Empty);
    }
    if data.len() > MAX_COMPRESS_INPUT {
        return Err(Error::Capacity {
            size: data.len(),
            max: MAX_COMPRESS_INPUT,
        });
    }

    if let Some(compressed) = compression.compress(data)? {
        if is_good_compression_ratio(data.len(), compressed.len(), ratio_divisor) {
            out.write_zvint(compressed.len() as i32)?;
            write_payload(out, cipher, compressed, scratch)?;
            out.write_zvlong(data.len() as i64 - MAX_DATA_BLOCK_SIZE as i64)?;
            return Ok(CompactKind::Compressed);
        }
    }

    out.write_zvint(-(data.len() as i32))?;
    scratch.clear();
    scratch.extend_from_slice(data);
    write_payload(out, cipher, std::mem::take(scratch), scratch)?;
    Ok(CompactKind::Raw)
}

fn write_payload(
    out: &mut dyn IndexOutput,
    cipher: Option<&dyn Cipher>,
    mut bytes: Vec<u8>,
    scratch: &mut Vec<u8>,
) -> Result<()> {
    if let Some(cipher) = cipher {
        cipher.encrypt(out.file_pointer(), &mut bytes)?;
    }
    out.write_bytes(&bytes)?;
    *scratch = bytes;
    Ok(())
}

/// Read a compact payload.
pub fn read_compact(
    input: &mut dyn IndexInput,
    compression: Compression,
    cipher: Option<&dyn Cipher>,
    scratch: &mut Vec<u8>,
) -> Result<(CompactKind, Vec<u8>)> {
    let size = input.read_zvint()?;
    if size == 0 {
        return Ok((CompactKind::Empty, Vec::new()));
    }

    let stored = size.unsigned_abs() as usize;
    let remaining = input.length().saturating_sub(input.file_pointer());
    if stored as u64 > remaining {
        return Err(Error::corruption(format!(
            "payload of {} bytes exceeds remaining {} bytes",
            stored, remaining
        )));
    }

    let offset = input.file_pointer();
    if size < 0 {
        let mut raw = vec![0u8; stored];
        input.read_bytes(&mut raw)?;
        if let Some(cipher) = cipher {
            cipher.decrypt(offset, &mut raw)?;
        }
        return Ok((CompactKind::Raw, raw));
    }

    scratch.clear();
    scratch.resize(stored, 0);
    input.read_bytes(scratch)?;
    if let Some(cipher) = cipher {
        cipher.decrypt(offset, scratch)?;
    }

    let raw_len = input
        .read_zvlong()?
        .saturating_add(MAX_DATA_BLOCK_SIZE as i64);
    let limit = compression
        .max_decompressed_len(stored)
        .min(MAX_COMPRESS_INPUT);
    if raw_len <= 0 || raw_len as u64 > limit as u64 {
        return Err(Error::corruption(format!(
            "invalid decompressed length {} for {} compressed bytes",
            raw_len, stored
        )));
    }
    let raw = compression.decompress(scratch, raw_len as usize)?;
    Ok((CompactKind::Compressed, raw))
}
