//! In-memory directory.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::{Error, Result};

use super::{Directory, IndexInput, IndexOutput};

type FileMap = Arc<RwLock<HashMap<String, Bytes>>>;

/// Directory keeping every file in memory.
///
/// Outputs publish their contents on `flush` and when dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    files: FileMap,
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all files.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<_> = self.files.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Raw contents of a file.
    pub fn contents(&self, name: &str) -> Option<Bytes> {
        self.files.read().get(name).cloned()
    }

    /// Replace the contents of a file.
    pub fn put(&self, name: &str, data: Bytes) {
        self.files.write().insert(name.to_string(), data);
    }
}

impl Directory for MemoryDirectory {
    fn create(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        self.files.write().insert(name.to_string(), Bytes::new());
        Ok(Box::new(MemoryOutput {
            name: name.to_string(),
            buf: Vec::new(),
            files: Arc::clone(&self.files),
        }))
    }

    fn open(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let data = self
            .files
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::io(format!("file not found: {}", name)))?;
        Ok(Box::new(MemoryInput::new(data)))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.files.read().contains_key(name))
    }

    fn remove(&self, name: &str) -> Result<bool> {
        Ok(self.files.write().remove(name).is_some())
    }
}

struct MemoryOutput {
    name: String,
    buf: Vec<u8>,
    files: FileMap,
}

impl MemoryOutput {
    fn publish(&self) {
        let mut files = self.files.write();
        // a removed file stays removed
        if let Some(slot) = files.get_mut(&self.name) {
            *slot = Bytes::copy_from_slice(&self.buf);
        }
    }
}

impl IndexOutput for MemoryOutput {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn file_pointer(&self) -> u64 {
        self.buf.len() as u64
    }

    fn flush(&mut self) -> Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        self.publish();
    }
}

/// Input over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct MemoryInput {
    data: Bytes,
    position: usize,
}

impl MemoryInput {
    /// Read from the start of `data`.
    pub fn new(data: Bytes) -> Self {
        Self { data, position: 0 }
    }
}

impl IndexOutput for Vec<u8> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }

    fn file_pointer(&self) -> u64 {
        self.len() as u64
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl IndexInput for MemoryInput {
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn file_pointer(&self) -> u64 {
        self.position as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.data.len() as u64 {
            return Err(Error::io(format!(
                "seek to {} past end of file ({} bytes)",
                pos,
                self.data.len()
            )));
        }
        self.position = pos as usize;
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let end = self.position + buf.len();
        if end > self.data.len() {
            return Err(Error::io("read past end of file"));
        }
        buf.copy_from_slice(&self.data[self.position..end]);
        self.position = end;
        Ok(())
    }

    fn reopen(&self) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(MemoryInput {
            data: self.data.clone(),
            position: self.position,
        }))
    }
}
