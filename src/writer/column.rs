//! Per-column write state.

use std::io;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use tracing::debug;

use crate::block::{write_compact, CompactKind, IndexBlock};
use crate::compression::Compression;
use crate::encryption::Cipher;
use crate::format::{write_docs, BlockAddress, ColumnHeader};
use crate::store::IndexOutput;
use crate::types::{is_valid_doc, ColumnId, ColumnProperties, DocId};
use crate::Result;

/// Per-column settings chosen when the column is pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColumnInfo {
    /// Payload compression.
    pub compression: Compression,
    /// Encrypt payloads, if the writer has a cipher.
    pub encrypted: bool,
}

impl ColumnInfo {
    /// Column with the given compression, not encrypted.
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            encrypted: false,
        }
    }

    /// Request encryption.
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }
}

/// Shape of a flushed block, compared across blocks of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockShape {
    count: usize,
    size: usize,
}

/// Write state of one column.
///
/// Values are appended for the document passed to the last
/// [`ColumnstoreWriter::prepare_document`] call.
///
/// [`ColumnstoreWriter::prepare_document`]: super::ColumnstoreWriter::prepare_document
pub struct ColumnWriter {
    id: ColumnId,
    compression: Compression,
    cipher: Option<Arc<dyn Cipher>>,
    block_size: usize,
    ratio_divisor: usize,

    /// Entries of the block being accumulated.
    index: IndexBlock,
    /// Payload of the block being accumulated.
    payload: BytesMut,
    /// Addresses of flushed blocks.
    blocks: Vec<BlockAddress>,

    /// Intersection of the flags of every flushed block.
    blocks_props: ColumnProperties,
    /// Blocks are contiguous and share one shape.
    column_dense: bool,
    /// Shape of the first flushed block.
    shape: Option<BlockShape>,
    /// Last document of the last flushed block.
    flushed_max: Option<DocId>,
    /// Entries in flushed blocks.
    flushed_count: u64,
    /// Payload bytes in flushed blocks.
    flushed_size: u64,
    /// Entry and block averages taken before the tail flush.
    averages: Option<(u64, u32)>,

    min: Option<DocId>,
    /// Every prepared document, kept for the presence index.
    docs: Vec<DocId>,
    compact_scratch: Vec<u8>,
}

impl ColumnWriter {
    pub(super) fn new(
        id: ColumnId,
        info: ColumnInfo,
        cipher: Option<Arc<dyn Cipher>>,
        block_size: usize,
        block_entries: usize,
        ratio_divisor: usize,
    ) -> Self {
        Self {
            id,
            compression: info.compression,
            cipher,
            block_size,
            ratio_divisor,
            index: IndexBlock::new(block_entries),
            payload: BytesMut::with_capacity(block_size),
            blocks: Vec::new(),
            blocks_props: ColumnProperties::DENSE | ColumnProperties::FIXED | ColumnProperties::MASK,
            column_dense: true,
            shape: None,
            flushed_max: None,
            flushed_count: 0,
            flushed_size: 0,
            averages: None,
            min: None,
            docs: Vec::new(),
            compact_scratch: Vec::new(),
        }
    }

    /// Column identifier.
    pub fn id(&self) -> ColumnId {
        self.id
    }

    /// Number of documents with a value.
    pub fn docs_count(&self) -> u64 {
        self.flushed_count + self.index.len() as u64
    }

    /// Check if no document was written.
    pub fn is_empty(&self) -> bool {
        self.docs_count() == 0
    }

    /// Check if payloads are encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Last prepared document.
    pub fn last_doc(&self) -> Option<DocId> {
        self.index.max_key().or(self.flushed_max)
    }

    /// Append bytes to the value of the current document.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.payload.put_slice(data);
    }

    /// Append one byte to the value of the current document.
    pub fn write_byte(&mut self, b: u8) {
        self.payload.put_u8(b);
    }

    /// Discard the current document and its value.
    ///
    /// Does nothing if the current block has no entries.
    pub fn reset(&mut self) {
        let Some((doc, offset)) = self.index.pop() else {
            return;
        };
        self.payload.truncate(offset as usize);
        debug_assert_eq!(self.docs.last(), Some(&doc));
        self.docs.pop();
        if self.docs_count() == 0 {
            self.min = None;
        }
    }

    /// Start a new document.
    ///
    /// Flushes the current block first if it reached the size or entry
    /// limit.
    pub(super) fn prepare(&mut self, doc: DocId, out: &mut dyn IndexOutput) -> Result<()> {
        assert!(is_valid_doc(doc), "invalid document id {}", doc);
        if let Some(last) = self.last_doc() {
            assert!(
                doc > last,
                "column {}: document {} is not after {}",
                self.id,
                doc,
                last
            );
        }

        if self.payload.len() >= self.block_size || self.index.is_full() {
            self.flush_block(out)?;
        }

        self.index.push(doc, self.payload.len() as u64);
        if self.min.is_none() {
            self.min = Some(doc);
        }
        self.docs.push(doc);
        Ok(())
    }

    /// Write the current block and start a new one.
    fn flush_block(&mut self, out: &mut dyn IndexOutput) -> Result<()> {
        if self.index.is_empty() {
            return Ok(());
        }

        let offset = out.file_pointer();
        let flushed = self.index.flush(out)?;
        let kind = write_compact(
            out,
            self.compression,
            self.cipher.as_deref(),
            self.ratio_divisor,
            &self.payload,
            &mut self.compact_scratch,
        )?;

        let block_props = flushed
            .props
            .with(ColumnProperties::MASK, kind == CompactKind::Empty);
        self.blocks_props.narrow(block_props);

        let shape = BlockShape {
            count: flushed.count,
            size: self.payload.len(),
        };
        let contiguous = self
            .flushed_max
            .map_or(true, |max| flushed.min_key == max + 1);
        let same_shape = match self.shape {
            None => true,
            // the tail block may be shorter
            Some(first) if self.averages.is_some() => shape.count <= first.count,
            Some(first) => first == shape,
        };
        self.column_dense &=
            contiguous && same_shape && block_props.contains(ColumnProperties::DENSE);
        self.shape.get_or_insert(shape);

        self.blocks.push(BlockAddress {
            key: flushed.min_key,
            offset,
        });
        self.flushed_max = Some(flushed.max_key);
        self.flushed_count += flushed.count as u64;
        self.flushed_size += self.payload.len() as u64;

        debug!(
            column = self.id,
            offset,
            entries = flushed.count,
            size = self.payload.len(),
            ?kind,
            "Flushed column block"
        );

        self.payload.clear();
        Ok(())
    }

    /// Flush the pending tail block.
    ///
    /// Block averages are taken before the flush so the tail does not skew
    /// them.
    pub(super) fn flush_tail(&mut self, out: &mut dyn IndexOutput) -> Result<()> {
        let blocks = self.blocks.len().max(1) as u64;
        self.averages = Some((
            self.flushed_size / blocks,
            (self.flushed_count / blocks) as u32,
        ));
        self.flush_block(out)
    }

    /// Write the presence index if useful and build the column header.
    pub(super) fn finish(
        &mut self,
        out: &mut dyn IndexOutput,
        presence_threshold: u32,
    ) -> Result<(ColumnHeader, Vec<BlockAddress>)> {
        debug_assert!(self.index.is_empty(), "tail block not flushed");

        let mut props = self.blocks_props;
        if self.column_dense {
            props |= ColumnProperties::COLUMN_DENSE;
        }
        if self.cipher.is_some() {
            props |= ColumnProperties::ENCRYPTED;
        }

        let (min, max) = match (self.min, self.flushed_max) {
            (Some(min), Some(max)) => (min, max),
            _ => return Ok((ColumnHeader::empty(props, self.compression), Vec::new())),
        };

        let docs_count = self.flushed_count as u32;
        let span = (max - min) as u64 + 1;
        let docs_index_offset = if docs_count > presence_threshold && span != docs_count as u64 {
            let offset = out.file_pointer();
            write_docs(out, &self.docs)?;
            offset
        } else {
            0
        };
        self.docs = Vec::new();

        let (avg_block_size, avg_block_count) = self.averages.unwrap_or_default();
        let header = ColumnHeader {
            column_type: crate::types::ColumnType::from_properties(props),
            props,
            compression: self.compression,
            docs_count,
            min,
            max,
            avg_block_size,
            avg_block_count,
            docs_index_offset,
        };

        debug!(
            column = self.id,
            docs_count,
            blocks = self.blocks.len(),
            column_type = ?header.column_type,
            props = ?props,
            "Finished column"
        );
        Ok((header, std::mem::take(&mut self.blocks)))
    }
}

impl io::Write for ColumnWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for ColumnWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnWriter")
            .field("id", &self.id)
            .field("compression", &self.compression)
            .field("encrypted", &self.is_encrypted())
            .field("docs_count", &self.docs_count())
            .field("blocks", &self.blocks.len())
            .finish()
    }
}
