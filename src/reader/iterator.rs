//! Forward-only document iterator over a column.

use std::sync::Arc;

use bytes::Bytes;

use crate::block::{Block, BlockCursor};
use crate::types::{DocId, EOF_DOC, INVALID_DOC};
use crate::Result;

use super::column::Column;

/// Seekable cursor over the `(doc, payload)` pairs of a column.
///
/// The iterator starts before the first document ([`INVALID_DOC`]) and
/// ends on [`EOF_DOC`]. Once exhausted, every call keeps returning the end
/// sentinel.
pub struct DocIterator<'a> {
    column: &'a Column,
    block: Option<Arc<Block>>,
    block_index: usize,
    cursor: BlockCursor,
    doc: DocId,
    payload: Bytes,
}

impl<'a> DocIterator<'a> {
    pub(super) fn new(column: &'a Column) -> Self {
        Self {
            column,
            block: None,
            block_index: 0,
            cursor: BlockCursor::new(),
            doc: INVALID_DOC,
            payload: Bytes::new(),
        }
    }

    /// Current document.
    pub fn value(&self) -> DocId {
        self.doc
    }

    /// Payload of the current document.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Check if the iterator is positioned on a document.
    pub fn valid(&self) -> bool {
        self.doc != INVALID_DOC && self.doc != EOF_DOC
    }

    /// Move to the first document `>= target` and return it.
    ///
    /// Never moves backward: a target at or below the current document
    /// returns the current document.
    pub fn seek(&mut self, target: DocId) -> Result<DocId> {
        if self.doc == EOF_DOC || target <= self.doc {
            return Ok(self.doc);
        }

        let Some((min, max)) = self.column.doc_range() else {
            return Ok(self.seal());
        };
        if target > max {
            return Ok(self.seal());
        }

        let index = if target < min {
            0
        } else {
            self.column.find_block(target).unwrap_or(0)
        };
        if self.block.is_none() || index > self.block_index {
            if !self.load(index)? {
                return Ok(self.seal());
            }
        }

        loop {
            if let Some(block) = &self.block {
                if let Some(pos) = self.cursor.seek(block, target) {
                    self.doc = block.key(pos);
                    self.payload = block.value(pos);
                    return Ok(self.doc);
                }
            }
            if !self.load(self.block_index + 1)? {
                return Ok(self.seal());
            }
        }
    }

    /// Move to the next document.
    ///
    /// Returns `false` once the column is exhausted.
    pub fn next(&mut self) -> Result<bool> {
        if self.doc == EOF_DOC {
            return Ok(false);
        }
        if self.block.is_none() && !self.load(0)? {
            self.seal();
            return Ok(false);
        }

        loop {
            if let Some(block) = &self.block {
                if let Some(pos) = self.cursor.next(block) {
                    self.doc = block.key(pos);
                    self.payload = block.value(pos);
                    return Ok(true);
                }
            }
            if !self.load(self.block_index + 1)? {
                self.seal();
                return Ok(false);
            }
        }
    }

    /// Load block `index`; `false` past the last block.
    fn load(&mut self, index: usize) -> Result<bool> {
        if index >= self.column.block_count() {
            return Ok(false);
        }
        self.block = Some(self.column.load_block(index)?);
        self.block_index = index;
        self.cursor = BlockCursor::new();
        Ok(true)
    }

    fn seal(&mut self) -> DocId {
        self.block = None;
        self.block_index = self.column.block_count();
        self.doc = EOF_DOC;
        self.payload = Bytes::new();
        EOF_DOC
    }
}

impl Iterator for DocIterator<'_> {
    type Item = Result<(DocId, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        match DocIterator::next(self) {
            Ok(true) => Some(Ok((self.doc, self.payload.clone()))),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::fmt::Debug for DocIterator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocIterator")
            .field("column", &self.column.id())
            .field("block_index", &self.block_index)
            .field("doc", &self.doc)
            .finish()
    }
}
