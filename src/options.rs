//! Configuration options for the columnstore.

use std::sync::Arc;

use crate::encryption::Encryption;
use crate::format::Version;

/// Default payload size that triggers a block flush (8KB).
pub const DEFAULT_BLOCK_SIZE: usize = 8 * 1024;

/// Default and maximum number of entries per block.
pub const MAX_BLOCK_ENTRIES: usize = 1024;

/// Default divisor of the good compression ratio (keep if < 7/8 of raw).
pub const DEFAULT_COMPRESSION_RATIO_DIVISOR: usize = 8;

/// Default minimum document count for writing a presence index.
pub const DEFAULT_PRESENCE_INDEX_THRESHOLD: u32 = 64;

/// Default number of pooled read contexts.
pub const DEFAULT_READ_POOL_SIZE: usize = 16;

/// Columnstore configuration options.
#[derive(Debug, Clone)]
pub struct Options {
    // === Writer ===
    /// Buffered payload size that triggers a block flush.
    pub block_size: usize,

    /// Number of entries that triggers a block flush.
    pub block_entries: usize,

    /// Compressed payloads are kept only if smaller than
    /// `raw - raw / compression_ratio_divisor`.
    pub compression_ratio_divisor: usize,

    /// Minimum document count of a non-contiguous column to get a presence
    /// index.
    pub presence_index_threshold: u32,

    /// Format revision to write.
    pub version: Version,

    // === Reader ===
    /// Maximum number of concurrent read contexts.
    pub read_pool_size: usize,

    // === Encryption ===
    /// Cipher provider, if payloads may be encrypted.
    pub encryption: Option<Arc<dyn Encryption>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_entries: MAX_BLOCK_ENTRIES,
            compression_ratio_divisor: DEFAULT_COMPRESSION_RATIO_DIVISOR,
            presence_index_threshold: DEFAULT_PRESENCE_INDEX_THRESHOLD,
            version: Version::default(),
            read_pool_size: DEFAULT_READ_POOL_SIZE,
            encryption: None,
        }
    }
}

impl Options {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building options from the defaults.
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    /// Validate the options.
    pub fn validate(&self) -> crate::Result<()> {
        if self.block_size == 0 {
            return Err(crate::Error::InvalidConfiguration(
                "block_size must be positive".into(),
            ));
        }

        if self.block_entries == 0 || self.block_entries > MAX_BLOCK_ENTRIES {
            return Err(crate::Error::InvalidConfiguration(format!(
                "block_entries must be in 1..={}",
                MAX_BLOCK_ENTRIES
            )));
        }

        if self.compression_ratio_divisor == 0 {
            return Err(crate::Error::InvalidConfiguration(
                "compression_ratio_divisor must be positive".into(),
            ));
        }

        if self.read_pool_size == 0 {
            return Err(crate::Error::InvalidConfiguration(
                "read_pool_size must be at least 1".into(),
            ));
        }

        if self.encryption.is_some() && !self.version.supports_encryption() {
            return Err(crate::Error::InvalidConfiguration(format!(
                "format version {:?} does not support encryption",
                self.version
            )));
        }

        Ok(())
    }
}

/// Builder for Options.
#[derive(Debug, Clone, Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set block_size.
    pub fn block_size(mut self, size: usize) -> Self {
        self.options.block_size = size;
        self
    }

    /// Set block_entries.
    pub fn block_entries(mut self, entries: usize) -> Self {
        self.options.block_entries = entries;
        self
    }

    /// Set compression_ratio_divisor.
    pub fn compression_ratio_divisor(mut self, divisor: usize) -> Self {
        self.options.compression_ratio_divisor = divisor;
        self
    }

    /// Set presence_index_threshold.
    pub fn presence_index_threshold(mut self, threshold: u32) -> Self {
        self.options.presence_index_threshold = threshold;
        self
    }

    /// Set the format version.
    pub fn version(mut self, version: Version) -> Self {
        self.options.version = version;
        self
    }

    /// Set read_pool_size.
    pub fn read_pool_size(mut self, size: usize) -> Self {
        self.options.read_pool_size = size;
        self
    }

    /// Set the cipher provider.
    pub fn encryption(mut self, encryption: Arc<dyn Encryption>) -> Self {
        self.options.encryption = Some(encryption);
        self
    }

    /// Build the options.
    pub fn build(self) -> crate::Result<Options> {
        self.options.validate()?;
        Ok(self.options)
    }
}
