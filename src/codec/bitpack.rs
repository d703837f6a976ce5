//! Fixed-width bit packing.
//!
//! Values are packed least-significant bit first into little-endian 64-bit
//! words. The number of packed values is always rounded up to a multiple of
//! [`PACK_BLOCK`], so a packed array of `n` values at width `bits` occupies
//! exactly `ceil(n / 64) * bits` words and never straddles a partial word.

use crate::{Error, Result};

/// Packing granularity in values.
pub const PACK_BLOCK: usize = 64;

/// Number of bits needed to represent `value`.
#[inline]
pub fn bits_required(value: u64) -> u32 {
    64 - value.leading_zeros()
}

/// Number of bits needed to represent every value in `values`.
pub fn bits_required_all(values: &[u64]) -> u32 {
    bits_required(values.iter().fold(0, |acc, &v| acc | v))
}

/// `count` rounded up to the packing granularity.
#[inline]
pub fn padded_len(count: usize) -> usize {
    count.div_ceil(PACK_BLOCK) * PACK_BLOCK
}

/// Number of 64-bit words holding `count` values of width `bits`.
#[inline]
pub fn packed_words(count: usize, bits: u32) -> usize {
    padded_len(count) / PACK_BLOCK * bits as usize
}

#[inline]
fn mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Pack `values` at width `bits` into `words`, replacing its contents.
pub fn pack_into(values: &[u64], bits: u32, words: &mut Vec<u64>) {
    debug_assert!(bits <= 64);
    words.clear();
    words.resize(packed_words(values.len(), bits), 0);
    if bits == 0 {
        return;
    }

    let mask = mask(bits);
    for (i, &value) in values.iter().enumerate() {
        debug_assert!(value & !mask == 0, "value {} wider than {} bits", value, bits);
        let pos = i * bits as usize;
        let word = pos / 64;
        let shift = (pos % 64) as u32;
        words[word] |= (value & mask) << shift;
        if shift + bits > 64 {
            words[word + 1] |= (value & mask) >> (64 - shift);
        }
    }
}

/// Unpack `count` values of width `bits` from `words` into `out`.
pub fn unpack_into(words: &[u64], bits: u32, count: usize, out: &mut Vec<u64>) -> Result<()> {
    out.clear();
    if bits == 0 {
        out.resize(count, 0);
        return Ok(());
    }
    if bits > 64 || words.len() < packed_words(count, bits) {
        return Err(Error::corruption(format!(
            "packed array too short: {} words for {} values of {} bits",
            words.len(),
            count,
            bits
        )));
    }

    let mask = mask(bits);
    out.reserve(count);
    for i in 0..count {
        let pos = i * bits as usize;
        let word = pos / 64;
        let shift = (pos % 64) as u32;
        let mut value = words[word] >> shift;
        if shift + bits > 64 {
            value |= words[word + 1] << (64 - shift);
        }
        out.push(value & mask);
    }
    Ok(())
}

/// Pack `values` at width `bits` into little-endian bytes.
pub fn pack(values: &[u64], bits: u32) -> Vec<u8> {
    let mut words = Vec::new();
    pack_into(values, bits, &mut words);
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Unpack `count` values of width `bits` from little-endian bytes.
pub fn unpack(bytes: &[u8], bits: u32, count: usize) -> Result<Vec<u64>> {
    let words: Vec<u64> = bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect();
    let mut out = Vec::with_capacity(count);
    unpack_into(&words, bits, count, &mut out)?;
    Ok(out)
}
