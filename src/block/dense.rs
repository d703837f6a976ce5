//! Blocks whose keys form one contiguous run.

use bytes::Bytes;

use crate::codec::avg::{check_rle, read_rle};
use crate::compression::Compression;
use crate::encryption::Cipher;
use crate::store::IndexInput;
use crate::types::DocId;
use crate::{Error, Result};

use super::{read_mask_payload, read_offsets, read_payload, value_range, DecodeBuffers};

/// Contiguous keys, explicit payload offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseBlock {
    min: DocId,
    offsets: Vec<u64>,
    data: Bytes,
}

impl DenseBlock {
    pub(super) fn load(
        count: usize,
        input: &mut dyn IndexInput,
        compression: Compression,
        cipher: Option<&dyn Cipher>,
        buffers: &mut DecodeBuffers,
    ) -> Result<Self> {
        let min = read_dense_keys(count, input)?;
        let offsets = read_offsets(count, input, buffers)?;
        let data = read_payload(input, compression, cipher, buffers)?;
        value_range(&offsets, count - 1, data.len())?;
        Ok(Self { min, offsets, data })
    }

    pub(super) fn len(&self) -> usize {
        self.offsets.len()
    }

    pub(super) fn key(&self, i: usize) -> DocId {
        self.min + i as DocId
    }

    pub(super) fn value(&self, i: usize) -> Bytes {
        let end = self
            .offsets
            .get(i + 1)
            .map_or(self.data.len(), |&o| o as usize);
        self.data.slice(self.offsets[i] as usize..end)
    }

    pub(super) fn lower_bound(&self, from: usize, target: DocId) -> usize {
        contiguous_lower_bound(self.min, self.len(), from, target)
    }
}

/// Contiguous keys, every value starts at a fixed stride.
///
/// The value at position `i` starts at `base + i * stride`; the last value
/// extends to the end of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseFixedBlock {
    min: DocId,
    count: usize,
    base: u64,
    stride: u64,
    data: Bytes,
}

impl DenseFixedBlock {
    pub(super) fn load(
        count: usize,
        input: &mut dyn IndexInput,
        compression: Compression,
        cipher: Option<&dyn Cipher>,
        buffers: &mut DecodeBuffers,
    ) -> Result<Self> {
        let min = read_dense_keys(count, input)?;
        let offsets = read_rle(input, "fixed block offsets")?;
        if offsets.stride < 0 {
            return Err(Error::corruption(format!(
                "negative value length {} in fixed block",
                offsets.stride
            )));
        }
        let data = read_payload(input, compression, cipher, buffers)?;

        let (base, stride) = (offsets.base, offsets.stride as u64);
        let last = stride
            .checked_mul(count as u64 - 1)
            .and_then(|o| o.checked_add(base))
            .filter(|&o| o <= data.len() as u64);
        if last.is_none() {
            return Err(Error::corruption(format!(
                "fixed block of {} values of {} bytes exceeds payload of {} bytes",
                count,
                stride,
                data.len()
            )));
        }

        Ok(Self {
            min,
            count,
            base,
            stride,
            data,
        })
    }

    pub(super) fn len(&self) -> usize {
        self.count
    }

    pub(super) fn key(&self, i: usize) -> DocId {
        self.min + i as DocId
    }

    /// Payload offset of the value at position `i`.
    pub fn offset(&self, i: usize) -> u64 {
        self.base + i as u64 * self.stride
    }

    pub(super) fn value(&self, i: usize) -> Bytes {
        let start = self.offset(i) as usize;
        let end = if i + 1 == self.count {
            self.data.len()
        } else {
            self.offset(i + 1) as usize
        };
        self.data.slice(start..end)
    }

    pub(super) fn lower_bound(&self, from: usize, target: DocId) -> usize {
        contiguous_lower_bound(self.min, self.count, from, target)
    }
}

/// Contiguous keys, no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseMaskBlock {
    min: DocId,
    count: usize,
}

impl DenseMaskBlock {
    /// Block of `count` keys starting at `min`, known without reading it.
    pub fn new(min: DocId, count: usize) -> Self {
        Self { min, count }
    }

    pub(super) fn load(
        count: usize,
        input: &mut dyn IndexInput,
        compression: Compression,
        cipher: Option<&dyn Cipher>,
        buffers: &mut DecodeBuffers,
    ) -> Result<Self> {
        let min = read_dense_keys(count, input)?;
        check_rle(input, 0, 0, "mask block offsets")?;
        read_mask_payload(input, compression, cipher, buffers)?;
        Ok(Self { min, count })
    }

    pub(super) fn len(&self) -> usize {
        self.count
    }

    pub(super) fn key(&self, i: usize) -> DocId {
        self.min + i as DocId
    }

    pub(super) fn lower_bound(&self, from: usize, target: DocId) -> usize {
        contiguous_lower_bound(self.min, self.count, from, target)
    }
}

fn contiguous_lower_bound(min: DocId, count: usize, from: usize, target: DocId) -> usize {
    let pos = (target.saturating_sub(min) as usize).min(count);
    pos.max(from.min(count))
}

/// Read the key run of a dense block and return its first key.
fn read_dense_keys(count: usize, input: &mut dyn IndexInput) -> Result<DocId> {
    let keys = read_rle(input, "dense block keys")?;
    if keys.stride != 1 {
        return Err(Error::corruption(format!(
            "dense block keys with stride {}",
            keys.stride
        )));
    }
    let in_range = keys
        .base
        .checked_add(count as u64 - 1)
        .map_or(false, |last| last < DocId::MAX as u64);
    if !in_range {
        return Err(Error::corruption(format!(
            "dense block of {} keys from {} out of range",
            count, keys.base
        )));
    }
    Ok(keys.base as DocId)
}
