//! Writer-side index of the block being accumulated.

use crate::codec::avg::{encode_deltas_with, DeltaRun};
use crate::store::{DataOutput, IndexOutput};
use crate::types::{ColumnProperties, DocId};
use crate::{Error, Result};

/// Keys and payload offsets of the entries of one block.
#[derive(Debug)]
pub struct IndexBlock {
    keys: Vec<u64>,
    offsets: Vec<u64>,
    capacity: usize,
    residuals: Vec<u64>,
    packed: Vec<u64>,
}

/// Summary of a flushed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushedIndex {
    /// Layout flags observed in the block.
    pub props: ColumnProperties,
    /// Number of entries.
    pub count: usize,
    /// First key.
    pub min_key: DocId,
    /// Last key.
    pub max_key: DocId,
    /// Offset increment, meaningful for fixed-offset blocks.
    pub offset_stride: i64,
}

impl IndexBlock {
    /// Create an index for up to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            offsets: Vec::with_capacity(capacity),
            capacity,
            residuals: Vec::with_capacity(capacity),
            packed: Vec::new(),
        }
    }

    /// Append an entry.
    pub fn push(&mut self, key: DocId, offset: u64) {
        debug_assert!(!self.is_full());
        debug_assert!(self.max_key().map_or(true, |max| key > max));
        self.keys.push(key as u64);
        self.offsets.push(offset);
    }

    /// Remove the last entry.
    pub fn pop(&mut self) -> Option<(DocId, u64)> {
        let key = self.keys.pop()?;
        let offset = self.offsets.pop()?;
        Some((key as DocId, offset))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Check if the index reached its capacity.
    pub fn is_full(&self) -> bool {
        self.keys.len() >= self.capacity
    }

    /// First key.
    pub fn min_key(&self) -> Option<DocId> {
        self.keys.first().map(|&k| k as DocId)
    }

    /// Last key.
    pub fn max_key(&self) -> Option<DocId> {
        self.keys.last().map(|&k| k as DocId)
    }

    /// Payload offset of the last entry.
    pub fn max_offset(&self) -> Option<u64> {
        self.offsets.last().copied()
    }

    /// Write the entry count, the key run and the offset run, then clear.
    pub fn flush(&mut self, out: &mut dyn IndexOutput) -> Result<FlushedIndex> {
        debug_assert!(!self.is_empty());
        let (min_key, max_key) = match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => (min, max),
            _ => return Err(Error::internal("flush of an empty index block")),
        };

        out.write_vint(self.keys.len() as u32)?;

        // one key is a contiguous run on its own
        let keys = encode_deltas_with(&self.keys, 1, &mut self.residuals, &mut self.packed);
        keys.write_to(out)?;
        let offsets = encode_deltas_with(&self.offsets, 0, &mut self.residuals, &mut self.packed);
        offsets.write_to(out)?;

        let props = ColumnProperties::SPARSE
            .with(ColumnProperties::DENSE, is_contiguous(&keys))
            .with(ColumnProperties::FIXED, offsets.is_rle());

        let flushed = FlushedIndex {
            props,
            count: self.keys.len(),
            min_key,
            max_key,
            offset_stride: offsets.stride(),
        };
        self.keys.clear();
        self.offsets.clear();
        Ok(flushed)
    }
}

fn is_contiguous(keys: &DeltaRun) -> bool {
    keys.is_rle() && keys.stride() == 1
}
