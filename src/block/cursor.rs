//! Forward-only positioning within a decoded block.

use bytes::Bytes;

use crate::types::DocId;

use super::Block;

/// Position within a block, independent of how the block is held.
///
/// The cursor only moves forward: seeking to a key at or below the current
/// one keeps the current entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCursor {
    /// Position of the entry returned last.
    current: Option<usize>,
    /// Position of the next entry to return.
    next: usize,
}

impl BlockCursor {
    /// Cursor before the first entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of the current entry.
    pub fn position(&self) -> Option<usize> {
        self.current
    }

    /// Advance to the next entry.
    pub fn next(&mut self, block: &Block) -> Option<usize> {
        if self.next >= block.len() {
            self.exhaust(block);
            return None;
        }
        self.current = Some(self.next);
        self.next += 1;
        self.current
    }

    /// Advance to the first entry with key `>= target`.
    pub fn seek(&mut self, block: &Block, target: DocId) -> Option<usize> {
        if let Some(pos) = self.current {
            if block.key(pos) >= target {
                return Some(pos);
            }
        }

        let pos = block.lower_bound(self.next, target);
        if pos >= block.len() {
            self.exhaust(block);
            return None;
        }
        self.current = Some(pos);
        self.next = pos + 1;
        self.current
    }

    fn exhaust(&mut self, block: &Block) {
        self.current = None;
        self.next = block.len();
    }
}

/// Iterator over the `(doc, payload)` pairs of a block.
#[derive(Debug, Clone)]
pub struct BlockIter<'a> {
    block: &'a Block,
    cursor: BlockCursor,
}

impl<'a> BlockIter<'a> {
    /// Iterate over `block` from its first entry.
    pub fn new(block: &'a Block) -> Self {
        Self {
            block,
            cursor: BlockCursor::new(),
        }
    }

    /// Current key, if positioned.
    pub fn doc(&self) -> Option<DocId> {
        self.cursor.position().map(|pos| self.block.key(pos))
    }

    /// Move to the first entry with key `>= target`.
    pub fn seek(&mut self, target: DocId) -> Option<(DocId, Bytes)> {
        let pos = self.cursor.seek(self.block, target)?;
        Some((self.block.key(pos), self.block.value(pos)))
    }
}

impl<'a> Iterator for BlockIter<'a> {
    type Item = (DocId, Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.cursor.next(self.block)?;
        Some((self.block.key(pos), self.block.value(pos)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.block.len().saturating_sub(self.cursor.next);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{write_compact, DecodeBuffers, IndexBlock};
    use crate::compression::Compression;
    use crate::store::{Directory, MemoryDirectory};
    use crate::types::BlockKind;

    fn sparse_block(keys: &[DocId]) -> Block {
        let dir = MemoryDirectory::new();
        {
            let mut out = dir.create("b").unwrap();
            let mut index = IndexBlock::new(64);
            let mut payload = Vec::new();
            for &k in keys {
                index.push(k, payload.len() as u64);
                payload.extend_from_slice(k.to_string().as_bytes());
            }
            index.flush(out.as_mut()).unwrap();
            write_compact(out.as_mut(), Compression::None, None, 8, &payload, &mut Vec::new())
                .unwrap();
        }
        let mut input = dir.open("b").unwrap();
        Block::load(
            BlockKind::Sparse,
            input.as_mut(),
            Compression::None,
            None,
            &mut DecodeBuffers::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_seek_forward_only() {
        let block = sparse_block(&[2, 4, 8, 16, 32]);
        let mut iter = block.iter();

        assert_eq!(iter.seek(5).map(|(d, _)| d), Some(8));
        // backwards target keeps the current entry
        assert_eq!(iter.seek(1).map(|(d, _)| d), Some(8));
        assert_eq!(iter.seek(8).map(|(d, v)| (d, v.to_vec())), Some((8, b"8".to_vec())));
        assert_eq!(iter.next().map(|(d, _)| d), Some(16));
        assert_eq!(iter.seek(33), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_next_then_seek() {
        let block = sparse_block(&[1, 3, 5]);
        let mut iter = block.iter();
        assert_eq!(iter.doc(), None);
        assert_eq!(iter.next().map(|(d, _)| d), Some(1));
        assert_eq!(iter.doc(), Some(1));
        assert_eq!(iter.seek(3).map(|(d, _)| d), Some(3));
        assert_eq!(iter.size_hint(), (1, Some(1)));
        assert_eq!(iter.next().map(|(d, _)| d), Some(5));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }
}
