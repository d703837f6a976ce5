//! Block codec: stateless integer transforms used by every block.
//!
//! - [`bitpack`]: fixed-width packing of residual arrays
//! - [`avg`]: average-stride delta runs with run-length detection

pub mod avg;
pub mod bitpack;

pub use avg::{check_rle, encode_deltas, read_rle, read_run, DeltaRun, RunHeader, Scratch};
pub use bitpack::{pack, unpack};
