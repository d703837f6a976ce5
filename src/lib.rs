//! # columnstore
//!
//! Per-document columnar value storage for segment-based search indexes.
//!
//! ## Features
//!
//! - **Columnar Layout**: One file per segment, many columns per file
//! - **Adaptive Blocks**: Sparse, dense, fixed-stride and mask blocks chosen per column
//! - **Bit-Packed Indexes**: Document ids and offsets stored as average/delta runs
//! - **Compression**: Optional LZ4/Snappy compression, kept only when it pays off
//! - **Encryption**: Pluggable payload ciphers
//! - **Concurrent Reads**: Shared publish-once block cache over a bounded context pool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use columnstore::{ColumnInfo, ColumnstoreReader, ColumnstoreWriter, FsDirectory, Options};
//!
//! let dir = Arc::new(FsDirectory::open("./segments")?);
//!
//! // Write
//! let mut writer = ColumnstoreWriter::new(Options::default())?;
//! writer.prepare(dir.clone(), "_0")?;
//! let title = writer.push_column(ColumnInfo::default())?;
//! writer.write(title, 1, b"hello")?;
//! writer.write(title, 5, b"world")?;
//! writer.commit()?;
//!
//! // Read
//! let reader = ColumnstoreReader::open(&*dir, "_0", &Options::default())?.unwrap();
//! let column = reader.column(title).unwrap();
//! let mut docs = column.iter();
//! assert_eq!(docs.seek(2)?, 5);
//! assert_eq!(docs.payload().as_ref(), b"world");
//! ```

// Public modules
pub mod error;
pub mod options;
pub mod types;

// Format building blocks
pub mod block;
pub mod codec;
pub mod compression;
pub mod encryption;
pub mod format;
pub mod store;

// Columnstore
pub mod reader;
pub mod writer;

// Internal modules
mod util;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use options::{Options, OptionsBuilder};
pub use types::{
    BlockKind, ColumnId, ColumnProperties, ColumnType, DocId, EOF_DOC, INVALID_DOC, MIN_DOC,
};

// Collaborators
pub use compression::Compression;
pub use encryption::{Cipher, Encryption};
pub use format::Version;
pub use store::{Directory, FsDirectory, IndexInput, IndexOutput, MemoryDirectory};
pub use util::filename::{columnstore_file_name, parse_columnstore_file_name};

// Writer
pub use writer::{ColumnInfo, ColumnWriter, ColumnstoreWriter};

// Reader
pub use reader::{Column, ColumnNames, ColumnstoreReader, DocIterator, ReadStats};
