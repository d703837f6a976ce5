//! File header, trailer and format versions.
//!
//! ```text
//! +--------+-------------+---------+-------------------------------+
//! | magic  | format name | version | [v1] encrypted u8 | enc header|
//! +--------+-------------+---------+-------------------------------+
//! | data blocks ... | presence indexes ... | column index section    |
//! +----------------------------------------------------------------+
//! | index offset u64 | masked crc32(index section) u32 | magic u64  |
//! +----------------------------------------------------------------+
//! ```

mod column;

pub use column::{read_column, read_docs, write_column, write_docs, BlockAddress, ColumnHeader};

use crate::store::{DataInput, DataOutput, IndexInput, IndexOutput};
use crate::util::crc::{crc32, mask_crc, unmask_crc};
use crate::{Error, Result};

/// Magic number opening every columnstore file.
pub const HEADER_MAGIC: u32 = 0x3FD7_6C17;

/// Magic number closing every columnstore file.
pub const TRAILER_MAGIC: u64 = 0xC0_1D_57_0E_CA_FE_F0_0D;

/// Format name written after the header magic.
pub const FORMAT_NAME: &str = "columnstore";

/// Size of the file trailer.
pub const TRAILER_SIZE: u64 = 8 + 4 + 8;

/// Size bias of the raw length stored after a compressed payload.
pub const MAX_DATA_BLOCK_SIZE: u64 = 8192;

/// Block addresses per chunk of the column block index.
pub const INDEX_BLOCK_SIZE: usize = 1024;

/// Upper bound on persisted strings (names, headers).
pub const MAX_STRING_LEN: usize = 4096;

/// Format revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Version {
    /// Fixed LZ4 compression, no encryption.
    Min = 0,
    /// Per-column compressor name and encryption support.
    #[default]
    Max = 1,
}

impl Version {
    /// Create from the persisted number.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Version::Min),
            1 => Some(Version::Max),
            _ => None,
        }
    }

    /// Check if this revision persists per-column compressor names.
    pub fn has_compression_name(self) -> bool {
        self >= Version::Max
    }

    /// Check if this revision may carry an encryption header.
    pub fn supports_encryption(self) -> bool {
        self >= Version::Max
    }
}

/// Parsed file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Format revision.
    pub version: Version,
    /// Encryption header, present when payloads are encrypted.
    pub encryption: Option<Vec<u8>>,
}

impl Header {
    /// Write the header.
    pub fn write_to(&self, out: &mut dyn IndexOutput) -> Result<()> {
        out.write_u32_le(HEADER_MAGIC)?;
        out.write_string(FORMAT_NAME.as_bytes())?;
        out.write_u32_le(self.version as u32)?;

        if self.version.supports_encryption() {
            match &self.encryption {
                Some(header) => {
                    out.write_u8(1)?;
                    out.write_string(header)?;
                }
                None => out.write_u8(0)?,
            }
        } else if self.encryption.is_some() {
            return Err(Error::InvalidConfiguration(format!(
                "format version {:?} does not support encryption",
                self.version
            )));
        }
        Ok(())
    }

    /// Read and check the header.
    pub fn read_from(input: &mut dyn IndexInput) -> Result<Self> {
        let magic = input.read_u32_le()?;
        if magic != HEADER_MAGIC {
            return Err(Error::invalid_format(format!(
                "bad header magic {:#x}",
                magic
            )));
        }

        let name = input.read_string(MAX_STRING_LEN)?;
        if name != FORMAT_NAME.as_bytes() {
            return Err(Error::invalid_format(format!(
                "unexpected format name '{}'",
                String::from_utf8_lossy(&name)
            )));
        }

        let raw = input.read_u32_le()?;
        let version = Version::from_u32(raw)
            .ok_or_else(|| Error::invalid_format(format!("unsupported version {}", raw)))?;

        let encryption = if version.supports_encryption() {
            match input.read_u8()? {
                0 => None,
                1 => Some(input.read_string(MAX_STRING_LEN)?),
                flag => {
                    return Err(Error::invalid_format(format!(
                        "bad encryption flag {}",
                        flag
                    )))
                }
            }
        } else {
            None
        };

        Ok(Self {
            version,
            encryption,
        })
    }
}

/// Parsed file trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Start of the column index section.
    pub index_offset: u64,
    /// CRC32 of the column index section.
    pub index_crc: u32,
}

impl Trailer {
    /// Build a trailer for the given index section.
    pub fn for_index(index_offset: u64, index: &[u8]) -> Self {
        Self {
            index_offset,
            index_crc: crc32(index),
        }
    }

    /// Write the trailer.
    pub fn write_to(&self, out: &mut dyn IndexOutput) -> Result<()> {
        out.write_u64_le(self.index_offset)?;
        out.write_u32_le(mask_crc(self.index_crc))?;
        out.write_u64_le(TRAILER_MAGIC)
    }

    /// Read the trailer from the end of `input`.
    pub fn read_from(input: &mut dyn IndexInput) -> Result<Self> {
        let length = input.length();
        if length < TRAILER_SIZE {
            return Err(Error::invalid_format(format!(
                "file too short: {} bytes",
                length
            )));
        }

        input.seek(length - TRAILER_SIZE)?;
        let index_offset = input.read_u64_le()?;
        let index_crc = unmask_crc(input.read_u32_le()?);
        let magic = input.read_u64_le()?;
        if magic != TRAILER_MAGIC {
            return Err(Error::invalid_format(format!(
                "bad trailer magic {:#x}",
                magic
            )));
        }
        if index_offset > length - TRAILER_SIZE {
            return Err(Error::corruption(format!(
                "index offset {} past end of file",
                index_offset
            )));
        }

        Ok(Self {
            index_offset,
            index_crc,
        })
    }

    /// Check the CRC of the index section.
    pub fn verify(&self, index: &[u8]) -> Result<()> {
        let actual = crc32(index);
        if actual != self.index_crc {
            return Err(Error::CrcMismatch {
                expected: self.index_crc,
                actual,
            });
        }
        Ok(())
    }
}
