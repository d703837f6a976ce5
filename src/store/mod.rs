//! Storage abstraction consumed by the columnstore.
//!
//! The columnstore never touches files directly. It asks a [`Directory`]
//! for named byte streams:
//!
//! - [`IndexOutput`]: append-only output with a file pointer
//! - [`IndexInput`]: seekable input that can be reopened into an
//!   independent handle, one per reader thread
//!
//! Two directories ship with the crate: [`FsDirectory`] over a filesystem
//! path and [`MemoryDirectory`] for tests and in-memory segments.

mod fs;
mod memory;

pub use fs::FsDirectory;
pub use memory::{MemoryDirectory, MemoryInput};

use crate::util::coding::{
    encode_varint64_to_array, zigzag_decode32, zigzag_decode64, zigzag_encode32,
    zigzag_encode64, MAX_VARINT32_LEN, MAX_VARINT64_LEN,
};
use crate::{Error, Result};

/// Append-only output stream.
pub trait IndexOutput: Send {
    /// Append bytes to the stream.
    fn write_bytes(&mut self, data: &[u8]) -> Result<()>;

    /// Number of bytes written so far.
    fn file_pointer(&self) -> u64;

    /// Flush buffered bytes to durable storage.
    fn flush(&mut self) -> Result<()>;
}

/// Seekable input stream.
pub trait IndexInput: Send {
    /// Total length of the stream.
    fn length(&self) -> u64;

    /// Current read position.
    fn file_pointer(&self) -> u64;

    /// Move the read position.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Fill `buf` completely or fail.
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Open an independent handle over the same data.
    ///
    /// Must be safe to call concurrently from many threads.
    fn reopen(&self) -> Result<Box<dyn IndexInput>>;
}

/// Named stream factory.
pub trait Directory: Send + Sync {
    /// Create (or truncate) a file for writing.
    fn create(&self, name: &str) -> Result<Box<dyn IndexOutput>>;

    /// Open an existing file for reading.
    fn open(&self, name: &str) -> Result<Box<dyn IndexInput>>;

    /// Check whether a file exists.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Remove a file, returning whether it existed.
    fn remove(&self, name: &str) -> Result<bool>;
}

/// Typed writes on top of [`IndexOutput`].
pub trait DataOutput: IndexOutput {
    /// Write a single byte.
    fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Write a little-endian u32.
    fn write_u32_le(&mut self, value: u32) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a little-endian u64.
    fn write_u64_le(&mut self, value: u64) -> Result<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Write a 32-bit varint.
    fn write_vint(&mut self, value: u32) -> Result<()> {
        self.write_vlong(value as u64)
    }

    /// Write a 64-bit varint.
    fn write_vlong(&mut self, value: u64) -> Result<()> {
        let (buf, len) = encode_varint64_to_array(value);
        self.write_bytes(&buf[..len])
    }

    /// Write a zig-zag encoded 32-bit varint.
    fn write_zvint(&mut self, value: i32) -> Result<()> {
        self.write_vint(zigzag_encode32(value))
    }

    /// Write a zig-zag encoded 64-bit varint.
    fn write_zvlong(&mut self, value: i64) -> Result<()> {
        self.write_vlong(zigzag_encode64(value))
    }

    /// Write a length-prefixed byte string.
    fn write_string(&mut self, value: &[u8]) -> Result<()> {
        self.write_vlong(value.len() as u64)?;
        self.write_bytes(value)
    }
}

impl<T: IndexOutput + ?Sized> DataOutput for T {}

/// Typed reads on top of [`IndexInput`].
pub trait DataInput: IndexInput {
    /// Read a single byte.
    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a little-endian u32.
    fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a little-endian u64.
    fn read_u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a 32-bit varint.
    fn read_vint(&mut self) -> Result<u32> {
        let mut result = 0u32;
        for i in 0..MAX_VARINT32_LEN {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as u32) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(Error::corruption("varint32 too long"))
    }

    /// Read a 64-bit varint.
    fn read_vlong(&mut self) -> Result<u64> {
        let mut result = 0u64;
        for i in 0..MAX_VARINT64_LEN {
            let byte = self.read_u8()?;
            result |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(Error::corruption("varint64 too long"))
    }

    /// Read a zig-zag encoded 32-bit varint.
    fn read_zvint(&mut self) -> Result<i32> {
        self.read_vint().map(zigzag_decode32)
    }

    /// Read a zig-zag encoded 64-bit varint.
    fn read_zvlong(&mut self) -> Result<i64> {
        self.read_vlong().map(zigzag_decode64)
    }

    /// Read a length-prefixed byte string no longer than `max_len`.
    fn read_string(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let len = self.read_vlong()? as usize;
        if len > max_len {
            return Err(Error::corruption(format!(
                "string of {} bytes exceeds limit {}",
                len, max_len
            )));
        }
        let mut buf = vec![0u8; len];
        self.read_bytes(&mut buf)?;
        Ok(buf)
    }
}

impl<T: IndexInput + ?Sized> DataInput for T {}
