//! Core types shared by the writer and the reader.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign};

use crate::{Error, Result};

/// Document identifier, strictly increasing within a column.
pub type DocId = u32;

/// Identifier of a column inside one columnstore file.
pub type ColumnId = usize;

/// Reserved document identifier meaning "invalid / unset".
pub const INVALID_DOC: DocId = 0;

/// Reserved document identifier meaning "end of stream".
pub const EOF_DOC: DocId = DocId::MAX;

/// Smallest document identifier a writer accepts.
pub const MIN_DOC: DocId = INVALID_DOC + 1;

/// Check whether a document identifier may be written.
#[inline]
pub fn is_valid_doc(doc: DocId) -> bool {
    doc > INVALID_DOC && doc < EOF_DOC
}

/// Column property flags.
///
/// Flags only ever narrow as more blocks are seen: a column starts with the
/// optimistic set and every flushed block intersects it with its own flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColumnProperties(u32);

impl ColumnProperties {
    /// Variable length, irregular keys.
    pub const SPARSE: Self = Self(0);
    /// Keys form a contiguous run within a block.
    pub const DENSE: Self = Self(1);
    /// All values in a block share one length.
    pub const FIXED: Self = Self(1 << 1);
    /// No payload, only presence.
    pub const MASK: Self = Self(1 << 2);
    /// Blocks are gapless and equally sized across the whole column.
    pub const COLUMN_DENSE: Self = Self(1 << 3);
    /// Payload bytes are encrypted.
    pub const ENCRYPTED: Self = Self(1 << 4);

    const ALL: u32 = 0b1_1111;

    /// Build from raw bits, rejecting unknown flags.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::ALL != 0 {
            return Err(Error::invalid_format(format!(
                "unknown column properties {:#x}",
                bits
            )));
        }
        Ok(Self(bits))
    }

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Check whether every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Narrow to the flags present in both sets.
    pub fn narrow(&mut self, other: Self) {
        self.0 &= other.0;
    }

    /// Return a copy with `other` set or cleared.
    pub fn with(self, other: Self, on: bool) -> Self {
        if on {
            Self(self.0 | other.0)
        } else {
            Self(self.0 & !other.0)
        }
    }

    /// Flags describing block layout only.
    pub fn block_bits(self) -> Self {
        Self(self.0 & (Self::DENSE.0 | Self::FIXED.0 | Self::MASK.0))
    }
}

impl BitAnd for ColumnProperties {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for ColumnProperties {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOr for ColumnProperties {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ColumnProperties {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ColumnProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        for (flag, name) in [
            (Self::DENSE, "DENSE"),
            (Self::FIXED, "FIXED"),
            (Self::MASK, "MASK"),
            (Self::COLUMN_DENSE, "COLUMN_DENSE"),
            (Self::ENCRYPTED, "ENCRYPTED"),
        ] {
            if self.contains(flag) {
                names.push(name);
            }
        }
        if names.is_empty() {
            names.push("SPARSE");
        }
        write!(f, "ColumnProperties({})", names.join(" | "))
    }
}

/// Reader-side addressing strategy of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColumnType {
    /// Presence only, no payload bytes.
    Mask = 0,
    /// Irregular keys or lengths, blocks located by binary search.
    Sparse = 1,
    /// Fixed-stride blocks with gaps between them, located by binary search.
    Fixed = 2,
    /// Gapless fixed-stride column, blocks located arithmetically.
    DenseFixed = 3,
}

impl ColumnType {
    /// Create from byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ColumnType::Mask),
            1 => Some(ColumnType::Sparse),
            2 => Some(ColumnType::Fixed),
            3 => Some(ColumnType::DenseFixed),
            _ => None,
        }
    }

    /// Convert to byte.
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Derive the column type from aggregated properties.
    pub fn from_properties(props: ColumnProperties) -> Self {
        if props.contains(ColumnProperties::MASK) {
            ColumnType::Mask
        } else if props.contains(ColumnProperties::DENSE | ColumnProperties::FIXED) {
            if props.contains(ColumnProperties::COLUMN_DENSE) {
                ColumnType::DenseFixed
            } else {
                ColumnType::Fixed
            }
        } else {
            ColumnType::Sparse
        }
    }
}

/// Decoded layout of every block in a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Explicit keys and offsets.
    Sparse,
    /// Contiguous keys, explicit offsets.
    Dense,
    /// Contiguous keys, one value length.
    DenseFixed,
    /// Explicit keys, no payload.
    SparseMask,
    /// Contiguous keys, no payload.
    DenseMask,
}

impl BlockKind {
    /// Select the block layout for the given block flags.
    ///
    /// A mask without fixed offsets cannot be produced by the writer and is
    /// rejected as corrupt.
    pub fn from_properties(props: ColumnProperties) -> Result<Self> {
        let dense = props.contains(ColumnProperties::DENSE);
        let fixed = props.contains(ColumnProperties::FIXED);
        let mask = props.contains(ColumnProperties::MASK);

        match (mask, fixed, dense) {
            (false, false, false) => Ok(BlockKind::Sparse),
            (false, false, true) => Ok(BlockKind::Dense),
            (false, true, false) => Ok(BlockKind::Sparse),
            (false, true, true) => Ok(BlockKind::DenseFixed),
            (true, false, _) => Err(Error::invalid_format(format!(
                "invalid block properties {:?}",
                props
            ))),
            (true, true, false) => Ok(BlockKind::SparseMask),
            (true, true, true) => Ok(BlockKind::DenseMask),
        }
    }
}
