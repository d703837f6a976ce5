//! Per-column entry of the index section.
//!
//! ```text
//! type u8 | properties vint | [v1] compression name | docs_count vint
//! | min vint | max vint | avg_block_size vlong | avg_block_count vint
//! | docs_index_offset u64
//! | block count vint | { key run | offset run } per 1024 blocks
//! ```
//!
//! The presence index at `docs_index_offset` lists every document of the
//! column as `{ doc run }` per 1024 documents.

use crate::codec::avg::{encode_deltas, read_run, Scratch};
use crate::compression::Compression;
use crate::store::{DataInput, DataOutput, IndexInput, IndexOutput};
use crate::types::{ColumnProperties, ColumnType, DocId};
use crate::{Error, Result};

use super::{Version, INDEX_BLOCK_SIZE, MAX_STRING_LEN};

/// Persisted description of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHeader {
    /// Addressing strategy.
    pub column_type: ColumnType,
    /// Aggregated layout flags.
    pub props: ColumnProperties,
    /// Payload compression.
    pub compression: Compression,
    /// Number of documents with a value.
    pub docs_count: u32,
    /// Smallest document.
    pub min: DocId,
    /// Largest document.
    pub max: DocId,
    /// Average payload bytes per block, tail block excluded.
    pub avg_block_size: u64,
    /// Average entries per block, tail block excluded; zero if the column
    /// has a single block.
    pub avg_block_count: u32,
    /// File offset of the presence index, zero if there is none.
    pub docs_index_offset: u64,
}

impl ColumnHeader {
    /// Header of a column without documents.
    pub fn empty(props: ColumnProperties, compression: Compression) -> Self {
        Self {
            column_type: ColumnType::from_properties(props),
            props,
            compression,
            docs_count: 0,
            min: 0,
            max: 0,
            avg_block_size: 0,
            avg_block_count: 0,
            docs_index_offset: 0,
        }
    }

    /// Entries per block used to locate blocks arithmetically.
    pub fn block_stride(&self) -> u32 {
        if self.avg_block_count == 0 {
            self.docs_count
        } else {
            self.avg_block_count
        }
    }
}

/// First document and file offset of a data block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAddress {
    /// First document of the block.
    pub key: DocId,
    /// File offset of the block.
    pub offset: u64,
}

/// Write a column entry.
pub fn write_column(
    out: &mut dyn IndexOutput,
    version: Version,
    header: &ColumnHeader,
    blocks: &[BlockAddress],
) -> Result<()> {
    out.write_u8(header.column_type.to_byte())?;
    out.write_vint(header.props.bits())?;
    if version.has_compression_name() {
        out.write_string(header.compression.name().as_bytes())?;
    }
    out.write_vint(header.docs_count)?;
    out.write_vint(header.min)?;
    out.write_vint(header.max)?;
    out.write_vlong(header.avg_block_size)?;
    out.write_vint(header.avg_block_count)?;
    out.write_u64_le(header.docs_index_offset)?;

    out.write_vlong(blocks.len() as u64)?;
    for chunk in blocks.chunks(INDEX_BLOCK_SIZE) {
        let keys: Vec<u64> = chunk.iter().map(|b| b.key as u64).collect();
        let offsets: Vec<u64> = chunk.iter().map(|b| b.offset).collect();
        encode_deltas(&keys, 0).write_to(out)?;
        encode_deltas(&offsets, 0).write_to(out)?;
    }
    Ok(())
}

/// Read a column entry.
pub fn read_column(
    input: &mut dyn IndexInput,
    version: Version,
) -> Result<(ColumnHeader, Vec<BlockAddress>)> {
    let type_byte = input.read_u8()?;
    let column_type = ColumnType::from_byte(type_byte)
        .ok_or_else(|| Error::invalid_format(format!("unknown column type {}", type_byte)))?;
    let props = ColumnProperties::from_bits(input.read_vint()?)?;
    if ColumnType::from_properties(props) != column_type {
        return Err(Error::invalid_format(format!(
            "column type {:?} contradicts {:?}",
            column_type, props
        )));
    }

    let compression = if version.has_compression_name() {
        let name = input.read_string(MAX_STRING_LEN)?;
        Compression::from_name(&String::from_utf8_lossy(&name))?
    } else {
        Compression::Lz4
    };

    let header = ColumnHeader {
        column_type,
        props,
        compression,
        docs_count: input.read_vint()?,
        min: input.read_vint()?,
        max: input.read_vint()?,
        avg_block_size: input.read_vlong()?,
        avg_block_count: input.read_vint()?,
        docs_index_offset: input.read_u64_le()?,
    };
    check_header(&header)?;

    let count = input.read_vlong()? as usize;
    if count > header.docs_count as usize {
        return Err(Error::corruption(format!(
            "{} blocks for {} documents",
            count, header.docs_count
        )));
    }

    let mut blocks = Vec::with_capacity(count);
    let mut scratch = Scratch::new();
    let mut keys = Vec::new();
    let mut offsets = Vec::new();
    while blocks.len() < count {
        let chunk = (count - blocks.len()).min(INDEX_BLOCK_SIZE);
        read_run(input, chunk, &mut scratch, &mut keys)?;
        read_run(input, chunk, &mut scratch, &mut offsets)?;
        for (&key, &offset) in keys.iter().zip(offsets.iter()) {
            let key = DocId::try_from(key)
                .map_err(|_| Error::corruption(format!("block key {} out of range", key)))?;
            if blocks.last().map_or(false, |b: &BlockAddress| key <= b.key) {
                return Err(Error::corruption("block keys not increasing"));
            }
            blocks.push(BlockAddress { key, offset });
        }
    }

    if header.docs_count > 0 && blocks.first().map(|b| b.key) != Some(header.min) {
        return Err(Error::corruption("first block does not start at column min"));
    }
    if header.props.contains(ColumnProperties::COLUMN_DENSE) {
        check_block_stride(&header, &blocks)?;
    }
    Ok((header, blocks))
}

/// Check that blocks of a contiguous column start every `block_stride`
/// documents, so they can be located arithmetically.
fn check_block_stride(header: &ColumnHeader, blocks: &[BlockAddress]) -> Result<()> {
    if header.docs_count == 0 {
        return Ok(());
    }
    let span = header.max as u64 - header.min as u64 + 1;
    if span != header.docs_count as u64 {
        return Err(Error::corruption(format!(
            "contiguous column of {} documents spans {}",
            header.docs_count, span
        )));
    }

    let stride = header.block_stride() as u64;
    let rl = blocks
        .iter()
        .enumerate()
        .all(|(i, b)| b.key as u64 == header.min as u64 + i as u64 * stride);
    let tail_len = blocks
        .last()
        .map_or(0, |b| (header.max as u64 + 1).saturating_sub(b.key as u64));
    if stride == 0 || !rl || tail_len == 0 || tail_len > stride {
        return Err(Error::corruption(format!(
            "invalid block run of stride {} in contiguous column",
            stride
        )));
    }
    Ok(())
}

/// Write the presence index: every document of a column, in order.
pub fn write_docs(out: &mut dyn IndexOutput, docs: &[DocId]) -> Result<()> {
    for chunk in docs.chunks(INDEX_BLOCK_SIZE) {
        let docs: Vec<u64> = chunk.iter().map(|&d| d as u64).collect();
        encode_deltas(&docs, 0).write_to(out)?;
    }
    Ok(())
}

/// Read the presence index of `header`.
///
/// The documents must strictly increase from `min` to `max`.
pub fn read_docs(input: &mut dyn IndexInput, header: &ColumnHeader) -> Result<Vec<DocId>> {
    let count = header.docs_count as usize;
    let mut docs: Vec<DocId> = Vec::with_capacity(count);
    let mut scratch = Scratch::new();
    let mut chunk = Vec::new();
    while docs.len() < count {
        read_run(
            input,
            (count - docs.len()).min(INDEX_BLOCK_SIZE),
            &mut scratch,
            &mut chunk,
        )?;
        for &doc in &chunk {
            let doc = DocId::try_from(doc)
                .ok()
                .filter(|&d| d >= header.min && d <= header.max)
                .ok_or_else(|| Error::corruption(format!("presence entry {} out of range", doc)))?;
            if docs.last().map_or(false, |&last| doc <= last) {
                return Err(Error::corruption("presence entries not increasing"));
            }
            docs.push(doc);
        }
    }
    if docs.first() != Some(&header.min) || docs.last() != Some(&header.max) {
        return Err(Error::corruption("presence index does not cover column range"));
    }
    Ok(docs)
}

fn check_header(header: &ColumnHeader) -> Result<()> {
    if header.docs_count == 0 {
        if header.column_type != ColumnType::Mask {
            return Err(Error::invalid_format(format!(
                "empty {:?} column",
                header.column_type
            )));
        }
        return Ok(());
    }

    let span = (header.max as u64 + 1).saturating_sub(header.min as u64);
    if header.min > header.max || span < header.docs_count as u64 {
        return Err(Error::corruption(format!(
            "{} documents do not fit in [{}, {}]",
            header.docs_count, header.min, header.max
        )));
    }
    if header.docs_index_offset != 0 && span == header.docs_count as u64 {
        return Err(Error::corruption(format!(
            "presence index for contiguous range [{}, {}]",
            header.min, header.max
        )));
    }
    Ok(())
}
