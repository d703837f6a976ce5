//! Low-level helpers: integer coding, checksums and file names.

pub mod coding;
pub mod crc;
pub mod filename;
