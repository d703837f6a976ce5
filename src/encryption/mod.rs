//! Encryption collaborator interface.
//!
//! The columnstore does not ship ciphers. An [`Encryption`] provider is
//! plugged in through [`Options`](crate::Options); it negotiates one
//! [`Cipher`] per file and the header bytes needed to reopen it. Payloads
//! are encrypted in place, keyed by their absolute file offset, so two
//! blocks never share a keystream position.

use std::fmt::Debug;
use std::sync::Arc;

use crate::Result;

/// Length-preserving stream cipher addressed by file offset.
pub trait Cipher: Send + Sync + Debug {
    /// Encrypt `data` that will be written at `offset`.
    fn encrypt(&self, offset: u64, data: &mut [u8]) -> Result<()>;

    /// Decrypt `data` that was read from `offset`.
    fn decrypt(&self, offset: u64, data: &mut [u8]) -> Result<()>;
}

/// Cipher factory negotiated once per file.
pub trait Encryption: Send + Sync + Debug {
    /// Create a cipher for a new file.
    ///
    /// Returns the header persisted in the file and the cipher to use.
    fn create_cipher(&self, file_name: &str) -> Result<(Vec<u8>, Arc<dyn Cipher>)>;

    /// Reopen the cipher of an existing file from its persisted header.
    fn open_cipher(&self, file_name: &str, header: &[u8]) -> Result<Arc<dyn Cipher>>;
}
