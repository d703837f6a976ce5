//! Blocks with explicitly stored keys.

use bytes::Bytes;

use crate::codec::avg::{check_rle, read_run};
use crate::compression::Compression;
use crate::encryption::Cipher;
use crate::store::IndexInput;
use crate::types::DocId;
use crate::{Error, Result};

use super::{read_mask_payload, read_offsets, read_payload, value_range, DecodeBuffers};

/// Irregular keys, explicit payload offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseBlock {
    keys: Vec<DocId>,
    offsets: Vec<u64>,
    data: Bytes,
}

impl SparseBlock {
    pub(super) fn load(
        count: usize,
        input: &mut dyn IndexInput,
        compression: Compression,
        cipher: Option<&dyn Cipher>,
        buffers: &mut DecodeBuffers,
    ) -> Result<Self> {
        let keys = read_keys(count, input, buffers)?;
        let offsets = read_offsets(count, input, buffers)?;
        let data = read_payload(input, compression, cipher, buffers)?;
        value_range(&offsets, count - 1, data.len())?;
        Ok(Self {
            keys,
            offsets,
            data,
        })
    }

    pub(super) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(super) fn key(&self, i: usize) -> DocId {
        self.keys[i]
    }

    pub(super) fn value(&self, i: usize) -> Bytes {
        let end = self
            .offsets
            .get(i + 1)
            .map_or(self.data.len(), |&o| o as usize);
        self.data.slice(self.offsets[i] as usize..end)
    }

    pub(super) fn lower_bound(&self, from: usize, target: DocId) -> usize {
        lower_bound(&self.keys, from, target)
    }
}

/// Irregular keys, no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseMaskBlock {
    keys: Vec<DocId>,
}

impl SparseMaskBlock {
    pub(super) fn load(
        count: usize,
        input: &mut dyn IndexInput,
        compression: Compression,
        cipher: Option<&dyn Cipher>,
        buffers: &mut DecodeBuffers,
    ) -> Result<Self> {
        let keys = read_keys(count, input, buffers)?;
        check_rle(input, 0, 0, "mask block offsets")?;
        read_mask_payload(input, compression, cipher, buffers)?;
        Ok(Self { keys })
    }

    pub(super) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(super) fn key(&self, i: usize) -> DocId {
        self.keys[i]
    }

    pub(super) fn lower_bound(&self, from: usize, target: DocId) -> usize {
        lower_bound(&self.keys, from, target)
    }
}

fn lower_bound(keys: &[DocId], from: usize, target: DocId) -> usize {
    let from = from.min(keys.len());
    from + keys[from..].partition_point(|&k| k < target)
}

fn read_keys(
    count: usize,
    input: &mut dyn IndexInput,
    buffers: &mut DecodeBuffers,
) -> Result<Vec<DocId>> {
    read_run(input, count, &mut buffers.run, &mut buffers.values)?;

    let mut keys = Vec::with_capacity(count);
    let mut prev: Option<u64> = None;
    for &key in &buffers.values {
        if key >= DocId::MAX as u64 || prev.map_or(false, |p| key <= p) {
            return Err(Error::corruption(format!(
                "block keys not strictly increasing at {}",
                key
            )));
        }
        prev = Some(key);
        keys.push(key as DocId);
    }
    Ok(keys)
}
