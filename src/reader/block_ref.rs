//! Block addresses with publish-once cache slots.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::trace;

use crate::block::Block;
use crate::compression::Compression;
use crate::encryption::Cipher;
use crate::format::BlockAddress;
use crate::types::{BlockKind, ColumnId, DocId};
use crate::Result;

use super::context::ReadContextPool;
use super::stats::ReadStats;

/// Everything needed to decode a block of one column.
pub(crate) struct BlockSource<'a> {
    pub column: ColumnId,
    pub kind: BlockKind,
    pub compression: Compression,
    pub cipher: Option<&'a dyn Cipher>,
    pub pool: &'a ReadContextPool,
    pub stats: &'a ReadStats,
}

impl BlockSource<'_> {
    /// Decode the block at `offset` with a pooled context.
    pub fn decode(&self, offset: u64) -> Result<Block> {
        let mut guard = self.pool.acquire()?;
        let ctx = &mut *guard;
        ctx.input.seek(offset)?;
        let block = Block::load(
            self.kind,
            ctx.input.as_mut(),
            self.compression,
            self.cipher,
            &mut ctx.buffers,
        )?;
        ReadStats::inc(&self.stats.block_loads);
        Ok(block)
    }
}

/// A block address and the decoded block, once some reader published it.
pub(crate) struct BlockRef {
    key: DocId,
    offset: u64,
    slot: ArcSwapOption<Block>,
}

impl BlockRef {
    pub fn new(address: BlockAddress) -> Self {
        Self {
            key: address.key,
            offset: address.offset,
            slot: ArcSwapOption::empty(),
        }
    }

    /// First document of the block.
    pub fn key(&self) -> DocId {
        self.key
    }

    /// File offset of the block.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Published block, if any.
    pub fn cached(&self) -> Option<Arc<Block>> {
        self.slot.load_full()
    }

    /// Return the published block, decoding and publishing it on a miss.
    ///
    /// Concurrent misses may decode the block more than once; only the
    /// first decode is published and every caller gets that one.
    pub fn load(&self, source: &BlockSource<'_>) -> Result<Arc<Block>> {
        if let Some(block) = self.cached() {
            ReadStats::inc(&source.stats.cache_hits);
            return Ok(block);
        }

        let block = Arc::new(source.decode(self.offset)?);
        let previous = self
            .slot
            .compare_and_swap(&None::<Arc<Block>>, Some(Arc::clone(&block)));

        match &*previous {
            None => {
                ReadStats::inc(&source.stats.published);
                Ok(block)
            }
            Some(winner) => {
                ReadStats::inc(&source.stats.discarded);
                trace!(
                    column = source.column,
                    offset = self.offset,
                    "Block published concurrently, discarding decode"
                );
                Ok(Arc::clone(winner))
            }
        }
    }
}

impl std::fmt::Debug for BlockRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRef")
            .field("key", &self.key)
            .field("offset", &self.offset)
            .field("cached", &self.slot.load().is_some())
            .finish()
    }
}
