//! Columnstore reader.
//!
//! Opening a columnstore reads its header, trailer and column index. Data
//! blocks are decoded lazily through a bounded [`ReadContextPool`] and
//! published into per-block cache slots, so concurrent readers of a column
//! share one decoded copy of each block.

mod block_ref;
mod column;
mod context;
mod iterator;
mod stats;

pub use column::Column;
pub use context::{PooledContext, ReadContext, ReadContextPool};
pub use iterator::DocIterator;
pub use stats::ReadStats;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error};

use crate::encryption::Cipher;
use crate::format::{
    read_column, read_docs, BlockAddress, ColumnHeader, Header, Trailer, TRAILER_SIZE,
};
use crate::options::Options;
use crate::store::{DataInput, Directory, IndexInput, MemoryInput};
use crate::types::{ColumnId, ColumnProperties, DocId};
use crate::util::filename::columnstore_file_name;
use crate::{Error, Result};

/// Maps column names to identifiers, as kept by segment metadata.
pub trait ColumnNames {
    /// Identifier of the column called `name`.
    fn column_id(&self, name: &str) -> Option<ColumnId>;
}

impl ColumnNames for HashMap<String, ColumnId> {
    fn column_id(&self, name: &str) -> Option<ColumnId> {
        self.get(name).copied()
    }
}

impl<S: AsRef<str>> ColumnNames for [S] {
    fn column_id(&self, name: &str) -> Option<ColumnId> {
        self.iter().position(|n| n.as_ref() == name)
    }
}

/// Read access to the columns of one segment.
pub struct ColumnstoreReader {
    file_name: String,
    header: Header,
    columns: Vec<Column>,
    pool: Arc<ReadContextPool>,
}

impl ColumnstoreReader {
    /// Open the columnstore of `segment`.
    ///
    /// Returns `None` if the segment has no columnstore file.
    pub fn open(dir: &dyn Directory, segment: &str, options: &Options) -> Result<Option<Self>> {
        options.validate()?;

        let file_name = columnstore_file_name(segment);
        if !dir.exists(&file_name)? {
            debug!(file = %file_name, "No columnstore for segment");
            return Ok(None);
        }

        let mut input = dir.open(&file_name)?;
        let header = Header::read_from(input.as_mut())?;
        let data_start = input.file_pointer();
        let trailer = Trailer::read_from(input.as_mut())?;
        if trailer.index_offset < data_start {
            return Err(Error::corruption(format!(
                "index offset {} inside file header",
                trailer.index_offset
            )));
        }

        let index_len = input.length() - TRAILER_SIZE - trailer.index_offset;
        let mut index = vec![0u8; index_len as usize];
        input.seek(trailer.index_offset)?;
        input.read_bytes(&mut index)?;
        trailer.verify(&index)?;

        let cipher = match (&header.encryption, &options.encryption) {
            (Some(enc_header), Some(encryption)) => {
                Some(encryption.open_cipher(&file_name, enc_header)?)
            }
            _ => None,
        };

        let mut index = MemoryInput::new(Bytes::from(index));
        let count = index.read_vlong()?;
        if count > index.length() {
            return Err(Error::corruption(format!("{} columns in index", count)));
        }

        let mut entries = Vec::with_capacity(count as usize);
        for id in 0..count as usize {
            let (column, blocks) = read_column(&mut index, header.version)?;
            check_blocks(&blocks, data_start, trailer.index_offset)?;
            let presence =
                load_presence(input.as_mut(), &column, data_start, trailer.index_offset)
                    .map_err(|e| {
                        error!(file = %file_name, column = id, error = %e, "Failed to load column");
                        e
                    })?;
            entries.push((column, blocks, presence));
        }
        if index.file_pointer() != index.length() {
            return Err(Error::corruption("trailing bytes in column index"));
        }

        let pool = Arc::new(ReadContextPool::new(input, options.read_pool_size));
        let mut columns = Vec::with_capacity(entries.len());
        for (id, (column, blocks, presence)) in entries.into_iter().enumerate() {
            let loaded = column_cipher(id, &column, &header, cipher.as_ref())
                .and_then(|c| Column::new(id, column, blocks, presence, c, Arc::clone(&pool)))
                .map_err(|e| {
                    error!(file = %file_name, column = id, error = %e, "Failed to load column");
                    e
                })?;
            columns.push(loaded);
        }

        debug!(
            file = %file_name,
            version = ?header.version,
            columns = columns.len(),
            encrypted = header.encryption.is_some(),
            "Opened columnstore"
        );

        Ok(Some(Self {
            file_name,
            header,
            columns,
            pool,
        }))
    }

    /// Name of the underlying file.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Parsed file header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Number of columns.
    pub fn size(&self) -> usize {
        self.columns.len()
    }

    /// Column `id`, if present.
    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id)
    }

    /// Column called `name` according to `names`.
    pub fn column_by_name<N>(&self, names: &N, name: &str) -> Option<&Column>
    where
        N: ColumnNames + ?Sized,
    {
        self.column(names.column_id(name)?)
    }

    /// All columns in identifier order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Shared pool of read contexts.
    pub fn pool(&self) -> &ReadContextPool {
        &self.pool
    }
}

impl std::fmt::Debug for ColumnstoreReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnstoreReader")
            .field("file_name", &self.file_name)
            .field("header", &self.header)
            .field("columns", &self.columns.len())
            .field("pool", &self.pool)
            .finish()
    }
}

fn column_cipher(
    id: ColumnId,
    column: &ColumnHeader,
    header: &Header,
    cipher: Option<&Arc<dyn Cipher>>,
) -> Result<Option<Arc<dyn Cipher>>> {
    if !column.props.contains(ColumnProperties::ENCRYPTED) {
        return Ok(None);
    }
    if header.encryption.is_none() {
        return Err(Error::invalid_format(format!(
            "column {} is encrypted but the file has no encryption header",
            id
        )));
    }
    cipher
        .cloned()
        .map(Some)
        .ok_or_else(|| Error::MissingCipher(format!("column {}", id)))
}

fn check_blocks(blocks: &[BlockAddress], data_start: u64, index_offset: u64) -> Result<()> {
    match blocks
        .iter()
        .find(|b| b.offset < data_start || b.offset >= index_offset)
    {
        Some(b) => Err(Error::corruption(format!(
            "block offset {} outside data section",
            b.offset
        ))),
        None => Ok(()),
    }
}

fn load_presence(
    input: &mut dyn IndexInput,
    column: &ColumnHeader,
    data_start: u64,
    index_offset: u64,
) -> Result<Option<Vec<DocId>>> {
    let offset = column.docs_index_offset;
    if offset == 0 {
        return Ok(None);
    }
    if offset < data_start || offset >= index_offset {
        return Err(Error::corruption(format!(
            "presence index offset {} outside data section",
            offset
        )));
    }
    input.seek(offset)?;
    read_docs(input, column).map(Some)
}
