//! Block Store: on-disk data blocks and their decoded forms.
//!
//! Each data block is laid out as:
//!
//! ```text
//! +-------------------+---------+------------+-----------------+
//! | entry count vint  | key run | offset run | compact payload |
//! +-------------------+---------+------------+-----------------+
//! ```
//!
//! The layout flags of a column decide which decoded variant a reader
//! builds. Dense variants keep only the first key, fixed variants only
//! the offset stride, mask variants no payload at all.

mod compact;
mod cursor;
mod dense;
mod index_block;
mod sparse;

pub use compact::{read_compact, write_compact, CompactKind};
pub use cursor::{BlockCursor, BlockIter};
pub use dense::{DenseBlock, DenseFixedBlock, DenseMaskBlock};
pub use index_block::{FlushedIndex, IndexBlock};
pub use sparse::{SparseBlock, SparseMaskBlock};

use bytes::Bytes;

use crate::codec::avg::{read_run, Scratch};
use crate::compression::Compression;
use crate::encryption::Cipher;
use crate::options::MAX_BLOCK_ENTRIES;
use crate::store::{DataInput, IndexInput};
use crate::types::{BlockKind, DocId};
use crate::{Error, Result};

/// Reusable buffers for block decoding.
#[derive(Debug, Default)]
pub struct DecodeBuffers {
    run: Scratch,
    values: Vec<u64>,
    compressed: Vec<u8>,
}

impl DecodeBuffers {
    /// Create empty buffers.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A decoded data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Irregular keys with payload.
    Sparse(SparseBlock),
    /// Contiguous keys, variable-length payload.
    Dense(DenseBlock),
    /// Contiguous keys, fixed-stride payload.
    DenseFixed(DenseFixedBlock),
    /// Irregular keys without payload.
    SparseMask(SparseMaskBlock),
    /// Contiguous keys without payload.
    DenseMask(DenseMaskBlock),
}

impl Block {
    /// Decode the block at the current position of `input`.
    pub fn load(
        kind: BlockKind,
        input: &mut dyn IndexInput,
        compression: Compression,
        cipher: Option<&dyn Cipher>,
        buffers: &mut DecodeBuffers,
    ) -> Result<Self> {
        let count = input.read_vint()? as usize;
        if count == 0 {
            return Err(Error::corruption("empty data block"));
        }
        if count > MAX_BLOCK_ENTRIES {
            return Err(Error::corruption(format!(
                "data block of {} entries exceeds {}",
                count, MAX_BLOCK_ENTRIES
            )));
        }

        let block = match kind {
            BlockKind::Sparse => {
                Block::Sparse(SparseBlock::load(count, input, compression, cipher, buffers)?)
            }
            BlockKind::Dense => {
                Block::Dense(DenseBlock::load(count, input, compression, cipher, buffers)?)
            }
            BlockKind::DenseFixed => Block::DenseFixed(DenseFixedBlock::load(
                count,
                input,
                compression,
                cipher,
                buffers,
            )?),
            BlockKind::SparseMask => Block::SparseMask(SparseMaskBlock::load(
                count,
                input,
                compression,
                cipher,
                buffers,
            )?),
            BlockKind::DenseMask => Block::DenseMask(DenseMaskBlock::load(
                count,
                input,
                compression,
                cipher,
                buffers,
            )?),
        };
        Ok(block)
    }

    /// Layout of this block.
    pub fn kind(&self) -> BlockKind {
        match self {
            Block::Sparse(_) => BlockKind::Sparse,
            Block::Dense(_) => BlockKind::Dense,
            Block::DenseFixed(_) => BlockKind::DenseFixed,
            Block::SparseMask(_) => BlockKind::SparseMask,
            Block::DenseMask(_) => BlockKind::DenseMask,
        }
    }

    /// Number of entries; never zero.
    pub fn len(&self) -> usize {
        match self {
            Block::Sparse(b) => b.len(),
            Block::Dense(b) => b.len(),
            Block::DenseFixed(b) => b.len(),
            Block::SparseMask(b) => b.len(),
            Block::DenseMask(b) => b.len(),
        }
    }

    /// Always false, blocks are never persisted empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key at position `i`.
    pub fn key(&self, i: usize) -> DocId {
        match self {
            Block::Sparse(b) => b.key(i),
            Block::Dense(b) => b.key(i),
            Block::DenseFixed(b) => b.key(i),
            Block::SparseMask(b) => b.key(i),
            Block::DenseMask(b) => b.key(i),
        }
    }

    /// Payload at position `i`; empty for mask blocks.
    pub fn value(&self, i: usize) -> Bytes {
        match self {
            Block::Sparse(b) => b.value(i),
            Block::Dense(b) => b.value(i),
            Block::DenseFixed(b) => b.value(i),
            Block::SparseMask(_) | Block::DenseMask(_) => Bytes::new(),
        }
    }

    /// First key.
    pub fn min_key(&self) -> DocId {
        self.key(0)
    }

    /// Last key.
    pub fn max_key(&self) -> DocId {
        self.key(self.len() - 1)
    }

    /// Position of the first key `>= target`, searching from `from`.
    ///
    /// Returns `len()` when no such key exists.
    pub fn lower_bound(&self, from: usize, target: DocId) -> usize {
        match self {
            Block::Sparse(b) => b.lower_bound(from, target),
            Block::Dense(b) => b.lower_bound(from, target),
            Block::DenseFixed(b) => b.lower_bound(from, target),
            Block::SparseMask(b) => b.lower_bound(from, target),
            Block::DenseMask(b) => b.lower_bound(from, target),
        }
    }

    /// Position of `doc`, if present.
    pub fn find(&self, doc: DocId) -> Option<usize> {
        let pos = self.lower_bound(0, doc);
        (pos < self.len() && self.key(pos) == doc).then_some(pos)
    }

    /// Iterate over `(doc, payload)` pairs.
    pub fn iter(&self) -> BlockIter<'_> {
        BlockIter::new(self)
    }
}

fn read_offsets(
    count: usize,
    input: &mut dyn IndexInput,
    buffers: &mut DecodeBuffers,
) -> Result<Vec<u64>> {
    read_run(input, count, &mut buffers.run, &mut buffers.values)?;
    if buffers.values.windows(2).any(|w| w[0] > w[1]) {
        return Err(Error::corruption("block offsets decrease"));
    }
    Ok(buffers.values.clone())
}

fn read_payload(
    input: &mut dyn IndexInput,
    compression: Compression,
    cipher: Option<&dyn Cipher>,
    buffers: &mut DecodeBuffers,
) -> Result<Bytes> {
    let (_, raw) = read_compact(input, compression, cipher, &mut buffers.compressed)?;
    Ok(Bytes::from(raw))
}

fn read_mask_payload(
    input: &mut dyn IndexInput,
    compression: Compression,
    cipher: Option<&dyn Cipher>,
    buffers: &mut DecodeBuffers,
) -> Result<()> {
    let (kind, _) = read_compact(input, compression, cipher, &mut buffers.compressed)?;
    if kind != CompactKind::Empty {
        return Err(Error::corruption("unexpected payload in mask block"));
    }
    Ok(())
}

/// Check that the value at position `last` lies within the payload.
fn value_range(offsets: &[u64], last: usize, data_len: usize) -> Result<()> {
    match offsets.get(last) {
        Some(&o) if o <= data_len as u64 => Ok(()),
        _ => Err(Error::corruption(format!(
            "block offsets exceed payload of {} bytes",
            data_len
        ))),
    }
}
