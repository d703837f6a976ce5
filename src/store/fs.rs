//! Filesystem-backed directory.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::Result;

use super::{Directory, IndexInput, IndexOutput};

/// Read/write buffer size for file streams.
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// Directory rooted at a filesystem path.
#[derive(Debug, Clone)]
pub struct FsDirectory {
    root: PathBuf,
}

impl FsDirectory {
    /// Open a directory, creating it if missing.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root path.
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Directory for FsDirectory {
    fn create(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        let file = File::create(self.file_path(name))?;
        Ok(Box::new(FsOutput {
            writer: BufWriter::with_capacity(STREAM_BUFFER_SIZE, file),
            offset: 0,
        }))
    }

    fn open(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        Ok(Box::new(FsInput::open(self.file_path(name))?))
    }

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.file_path(name).try_exists()?)
    }

    fn remove(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.file_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Buffered file output.
struct FsOutput {
    writer: BufWriter<File>,
    offset: u64,
}

impl IndexOutput for FsOutput {
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.offset += data.len() as u64;
        Ok(())
    }

    fn file_pointer(&self) -> u64 {
        self.offset
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }
}

/// Buffered file input with its own file handle.
struct FsInput {
    path: PathBuf,
    reader: BufReader<File>,
    position: u64,
    length: u64,
}

impl FsInput {
    fn open(path: PathBuf) -> Result<Self> {
        let file = File::open(&path)?;
        let length = file.metadata()?.len();
        Ok(Self {
            path,
            reader: BufReader::with_capacity(STREAM_BUFFER_SIZE, file),
            position: 0,
            length,
        })
    }
}

impl IndexInput for FsInput {
    fn length(&self) -> u64 {
        self.length
    }

    fn file_pointer(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos != self.position {
            let delta = pos as i64 - self.position as i64;
            // keep the read buffer for short hops
            self.reader.seek_relative(delta)?;
            self.position = pos;
        }
        Ok(())
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn reopen(&self) -> Result<Box<dyn IndexInput>> {
        let mut input = FsInput::open(self.path.clone())?;
        input.reader.seek(SeekFrom::Start(self.position))?;
        input.position = self.position;
        Ok(Box::new(input))
    }
}
