//! A column of an opened columnstore.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;

use crate::block::{Block, DenseMaskBlock};
use crate::encryption::Cipher;
use crate::format::{BlockAddress, ColumnHeader};
use crate::types::{BlockKind, ColumnId, ColumnProperties, ColumnType, DocId};
use crate::Result;

use super::block_ref::{BlockRef, BlockSource};
use super::context::ReadContextPool;
use super::iterator::DocIterator;
use super::stats::ReadStats;

/// Read access to one column.
///
/// Blocks are decoded on demand and published into per-block cache slots
/// shared by every reader of the column.
pub struct Column {
    id: ColumnId,
    header: ColumnHeader,
    kind: BlockKind,
    blocks: Vec<BlockRef>,
    presence: Option<Vec<DocId>>,
    cipher: Option<Arc<dyn Cipher>>,
    pool: Arc<ReadContextPool>,
    stats: ReadStats,
}

impl Column {
    pub(super) fn new(
        id: ColumnId,
        header: ColumnHeader,
        blocks: Vec<BlockAddress>,
        presence: Option<Vec<DocId>>,
        cipher: Option<Arc<dyn Cipher>>,
        pool: Arc<ReadContextPool>,
    ) -> Result<Self> {
        let kind = BlockKind::from_properties(header.props)?;
        Ok(Self {
            id,
            header,
            kind,
            blocks: blocks.into_iter().map(BlockRef::new).collect(),
            presence,
            cipher,
            pool,
            stats: ReadStats::new(),
        })
    }

    /// Column identifier.
    pub fn id(&self) -> ColumnId {
        self.id
    }

    /// Number of documents with a value.
    pub fn size(&self) -> u32 {
        self.header.docs_count
    }

    /// Check if the column has no documents.
    pub fn is_empty(&self) -> bool {
        self.header.docs_count == 0
    }

    /// Addressing strategy.
    pub fn column_type(&self) -> ColumnType {
        self.header.column_type
    }

    /// Layout flags.
    pub fn properties(&self) -> ColumnProperties {
        self.header.props
    }

    /// Persisted column header.
    pub fn header(&self) -> &ColumnHeader {
        &self.header
    }

    /// Smallest and largest document, if any.
    pub fn doc_range(&self) -> Option<(DocId, DocId)> {
        (!self.is_empty()).then_some((self.header.min, self.header.max))
    }

    /// Number of data blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Read counters.
    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    /// Check if every document in `[min, max]` has a value.
    fn is_gapless(&self) -> bool {
        self.header.props.contains(ColumnProperties::COLUMN_DENSE)
            || (self.header.max - self.header.min) as u64 + 1 == self.header.docs_count as u64
    }

    /// Mask column whose blocks are fully described by the index.
    fn is_header_only(&self) -> bool {
        self.header.column_type == ColumnType::Mask
            && self.header.props.contains(ColumnProperties::COLUMN_DENSE)
    }

    /// Index of the block that may hold `doc`.
    pub fn find_block(&self, doc: DocId) -> Option<usize> {
        if self.is_empty() || doc < self.header.min || doc > self.header.max {
            return None;
        }

        if self.header.column_type == ColumnType::DenseFixed {
            let index = ((doc - self.header.min) / self.header.block_stride()) as usize;
            return (index < self.blocks.len()).then_some(index);
        }

        let mut lo = 0;
        let mut hi = self.blocks.len();
        let mut steps = 0u64;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            steps += 1;
            if self.blocks[mid].key() <= doc {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        self.stats
            .block_search_steps
            .fetch_add(steps, Ordering::Relaxed);
        lo.checked_sub(1)
    }

    /// Decoded block at `index`, loaded and published on first use.
    pub fn load_block(&self, index: usize) -> Result<Arc<Block>> {
        if self.is_header_only() {
            return Ok(Arc::new(self.synthesize(index)));
        }
        self.blocks[index].load(&self.source())
    }

    /// First document past block `index`.
    fn block_end(&self, index: usize) -> DocId {
        self.blocks
            .get(index + 1)
            .map_or(self.header.max.saturating_add(1), BlockRef::key)
    }

    fn synthesize(&self, index: usize) -> Block {
        let min = self.blocks[index].key();
        Block::DenseMask(DenseMaskBlock::new(
            min,
            (self.block_end(index) - min) as usize,
        ))
    }

    fn source(&self) -> BlockSource<'_> {
        BlockSource {
            column: self.id,
            kind: self.kind,
            compression: self.header.compression,
            cipher: self.cipher.as_deref(),
            pool: &self.pool,
            stats: &self.stats,
        }
    }

    /// Value of `doc`, if it has one.
    pub fn get(&self, doc: DocId) -> Result<Option<Bytes>> {
        let Some(index) = self.find_block(doc) else {
            return Ok(None);
        };
        let block = self.load_block(index)?;
        Ok(block.find(doc).map(|pos| block.value(pos)))
    }

    /// Check if `doc` has a value.
    pub fn contains(&self, doc: DocId) -> Result<bool> {
        if self.is_empty() || doc < self.header.min || doc > self.header.max {
            return Ok(false);
        }
        if self.is_gapless() {
            return Ok(true);
        }
        if let Some(docs) = &self.presence {
            return Ok(docs.binary_search(&doc).is_ok());
        }
        match self.find_block(doc) {
            Some(index) => Ok(self.load_block(index)?.find(doc).is_some()),
            None => Ok(false),
        }
    }

    /// Call `f` for every document in order until it returns `false`.
    ///
    /// Blocks not yet published are decoded privately and dropped after
    /// use. Returns `false` if `f` stopped the walk.
    pub fn visit<F>(&self, mut f: F) -> Result<bool>
    where
        F: FnMut(DocId, &Bytes) -> bool,
    {
        let source = self.source();
        for (index, block_ref) in self.blocks.iter().enumerate() {
            let block = if self.is_header_only() {
                Arc::new(self.synthesize(index))
            } else {
                match block_ref.cached() {
                    Some(block) => block,
                    None => Arc::new(source.decode(block_ref.offset())?),
                }
            };
            for (doc, value) in block.iter() {
                if !f(doc, &value) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Iterator over the column.
    pub fn iter(&self) -> DocIterator<'_> {
        DocIterator::new(self)
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("id", &self.id)
            .field("header", &self.header)
            .field("blocks", &self.blocks.len())
            .field("presence", &self.presence.is_some())
            .finish()
    }
}
