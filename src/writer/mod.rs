//! Columnstore writer.
//!
//! One writer produces one `<segment>.cs` file holding many columns. A
//! flush goes through:
//!
//! 1. [`ColumnstoreWriter::prepare`] creates the file and writes its header
//! 2. [`ColumnstoreWriter::push_column`] registers columns
//! 3. [`ColumnstoreWriter::prepare_document`] starts a document in a column,
//!    the returned [`ColumnWriter`] receives its value
//! 4. [`ColumnstoreWriter::commit`] flushes tail blocks, presence indexes and
//!    the column index, or [`ColumnstoreWriter::rollback`] drops everything

mod column;

pub use column::{ColumnInfo, ColumnWriter};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::compression::Compression;
use crate::encryption::Cipher;
use crate::format::{write_column, Header, Trailer};
use crate::options::Options;
use crate::store::{DataOutput, Directory, IndexOutput};
use crate::types::{ColumnId, DocId};
use crate::util::filename::columnstore_file_name;
use crate::{Error, Result};

/// State of a prepared flush.
struct Flush {
    dir: Arc<dyn Directory>,
    file_name: String,
    out: Box<dyn IndexOutput>,
    cipher: Option<Arc<dyn Cipher>>,
    columns: Vec<ColumnWriter>,
}

/// Writes the columns of one segment.
pub struct ColumnstoreWriter {
    options: Options,
    flush: Option<Flush>,
}

impl ColumnstoreWriter {
    /// Create a writer.
    pub fn new(options: Options) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            flush: None,
        })
    }

    /// Writer options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Check if a flush is in progress.
    pub fn is_prepared(&self) -> bool {
        self.flush.is_some()
    }

    /// Start writing the columnstore of `segment` into `dir`.
    ///
    /// A flush still in progress is rolled back.
    pub fn prepare(&mut self, dir: Arc<dyn Directory>, segment: &str) -> Result<()> {
        if self.flush.is_some() {
            self.rollback();
        }

        let file_name = columnstore_file_name(segment);
        let mut out = dir.create(&file_name)?;

        let (encryption, cipher) = match &self.options.encryption {
            Some(enc) => {
                let (header, cipher) = enc.create_cipher(&file_name)?;
                (Some(header), Some(cipher))
            }
            None => (None, None),
        };
        Header {
            version: self.options.version,
            encryption,
        }
        .write_to(out.as_mut())?;

        debug!(
            file = %file_name,
            version = ?self.options.version,
            encrypted = cipher.is_some(),
            "Prepared columnstore"
        );

        self.flush = Some(Flush {
            dir,
            file_name,
            out,
            cipher,
            columns: Vec::new(),
        });
        Ok(())
    }

    /// Register a new column and return its identifier.
    ///
    /// Identifiers are assigned in push order starting from zero.
    /// Versions without a persisted compressor name always use LZ4.
    pub fn push_column(&mut self, mut info: ColumnInfo) -> Result<ColumnId> {
        let flush = self.flush.as_mut().ok_or(Error::NotPrepared)?;
        if !self.options.version.has_compression_name() {
            info.compression = Compression::Lz4;
        }
        let id = flush.columns.len();
        let cipher = if info.encrypted {
            flush.cipher.clone()
        } else {
            None
        };
        flush.columns.push(ColumnWriter::new(
            id,
            info,
            cipher,
            self.options.block_size,
            self.options.block_entries,
            self.options.compression_ratio_divisor,
        ));
        Ok(id)
    }

    /// Start document `doc` in column `id` and return the column to write
    /// its value to.
    ///
    /// # Panics
    ///
    /// Panics if `doc` is not greater than the last document of the column.
    pub fn prepare_document(&mut self, id: ColumnId, doc: DocId) -> Result<&mut ColumnWriter> {
        let flush = self.flush.as_mut().ok_or(Error::NotPrepared)?;
        let column = flush
            .columns
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("column {}", id)))?;
        column.prepare(doc, flush.out.as_mut())?;
        Ok(column)
    }

    /// Write a whole value for `doc` in column `id`.
    pub fn write(&mut self, id: ColumnId, doc: DocId, value: &[u8]) -> Result<()> {
        self.prepare_document(id, doc)?.write_bytes(value);
        Ok(())
    }

    /// Column being written.
    pub fn column(&mut self, id: ColumnId) -> Option<&mut ColumnWriter> {
        self.flush.as_mut()?.columns.get_mut(id)
    }

    /// Finish the file.
    ///
    /// Trailing empty columns are dropped. Returns `false` and removes the
    /// file if no column has any document.
    pub fn commit(&mut self) -> Result<bool> {
        let Flush {
            dir,
            file_name,
            mut out,
            mut columns,
            ..
        } = self.flush.take().ok_or(Error::NotPrepared)?;

        while columns.last().map_or(false, ColumnWriter::is_empty) {
            columns.pop();
        }

        if columns.is_empty() {
            drop(out);
            remove_output(dir.as_ref(), &file_name);
            debug!(file = %file_name, "Nothing to flush, removed columnstore");
            return Ok(false);
        }

        for column in &mut columns {
            column.flush_tail(out.as_mut())?;
        }

        let mut entries = Vec::with_capacity(columns.len());
        for column in &mut columns {
            entries.push(column.finish(out.as_mut(), self.options.presence_index_threshold)?);
        }

        let index_offset = out.file_pointer();
        let mut index = Vec::new();
        index.write_vlong(entries.len() as u64)?;
        for (header, blocks) in &entries {
            write_column(&mut index, self.options.version, header, blocks)?;
        }
        out.write_bytes(&index)?;
        Trailer::for_index(index_offset, &index).write_to(out.as_mut())?;
        out.flush()?;

        debug!(
            file = %file_name,
            columns = entries.len(),
            size = out.file_pointer(),
            "Committed columnstore"
        );
        Ok(true)
    }

    /// Discard the flush in progress and its file.
    pub fn rollback(&mut self) {
        if let Some(flush) = self.flush.take() {
            let Flush { dir, file_name, out, .. } = flush;
            drop(out);
            remove_output(dir.as_ref(), &file_name);
            debug!(file = %file_name, "Rolled back columnstore");
        }
    }
}

fn remove_output(dir: &dyn Directory, file_name: &str) {
    if let Err(e) = dir.remove(file_name) {
        warn!(file = %file_name, error = %e, "Failed to remove columnstore file");
    }
}

impl std::fmt::Debug for ColumnstoreWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnstoreWriter")
            .field("options", &self.options)
            .field("prepared", &self.is_prepared())
            .finish()
    }
}
