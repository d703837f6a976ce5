//! Average-stride delta runs.
//!
//! A run of `n` values is stored as a base (the first value), an average
//! stride and, per value, the zig-zag encoded residual
//! `value[i] - base - i * stride`. When every residual is zero the run is
//! run-length encoded: only base and stride are persisted.
//!
//! ```text
//! +-----------+---------------+---------+---------------------------+
//! | base vlong| stride zvlong | bits u8 | packed residuals (bits>0) |
//! +-----------+---------------+---------+---------------------------+
//! ```

use crate::store::{DataInput, DataOutput, IndexInput, IndexOutput};
use crate::util::coding::{zigzag_decode64, zigzag_encode64};
use crate::{Error, Result};

use super::bitpack::{bits_required_all, pack_into, packed_words, unpack_into};

/// An encoded run of integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRun {
    base: u64,
    stride: i64,
    bits: u32,
    count: usize,
    packed: Vec<u64>,
}

/// Encode `values` as an average-stride run.
///
/// `single_stride` is the stride recorded for a one-element run, where no
/// increment can be observed.
pub fn encode_deltas(values: &[u64], single_stride: i64) -> DeltaRun {
    let mut residuals = Vec::with_capacity(values.len());
    let mut packed = Vec::new();
    encode_deltas_with(values, single_stride, &mut residuals, &mut packed)
}

/// Same as [`encode_deltas`], reusing caller-provided scratch buffers.
pub fn encode_deltas_with(
    values: &[u64],
    single_stride: i64,
    residuals: &mut Vec<u64>,
    packed: &mut Vec<u64>,
) -> DeltaRun {
    let (base, stride) = match values {
        [] => (0, 0),
        [only] => (*only, single_stride),
        [first, .., last] => {
            let steps = (values.len() - 1) as u128;
            let span = last.wrapping_sub(*first) as u128;
            (*first, ((span + steps / 2) / steps) as u64 as i64)
        }
    };

    residuals.clear();
    residuals.extend(values.iter().enumerate().map(|(i, &v)| {
        let expected = base.wrapping_add((stride as u64).wrapping_mul(i as u64));
        zigzag_encode64(v.wrapping_sub(expected) as i64)
    }));

    let bits = bits_required_all(residuals);
    if bits == 0 {
        packed.clear();
    } else {
        pack_into(residuals, bits, packed);
    }

    DeltaRun {
        base,
        stride,
        bits,
        count: values.len(),
        packed: packed.clone(),
    }
}

impl DeltaRun {
    /// First value of the run.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Average increment between consecutive values.
    pub fn stride(&self) -> i64 {
        self.stride
    }

    /// Residual bit width; zero for run-length encoded runs.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Number of encoded values.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Check if the run holds no values.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Check if the run is fully described by base and stride.
    pub fn is_rle(&self) -> bool {
        self.bits == 0
    }

    /// Write the run to `out`.
    pub fn write_to(&self, out: &mut dyn IndexOutput) -> Result<()> {
        out.write_vlong(self.base)?;
        out.write_zvlong(self.stride)?;
        out.write_u8(self.bits as u8)?;
        if self.bits > 0 {
            let mut buf = Vec::with_capacity(self.packed.len() * 8);
            for word in &self.packed {
                buf.extend_from_slice(&word.to_le_bytes());
            }
            out.write_bytes(&buf)?;
        }
        Ok(())
    }

    /// Decode the run back into values.
    pub fn decode(&self) -> Result<Vec<u64>> {
        let header = RunHeader {
            base: self.base,
            stride: self.stride,
            bits: self.bits,
        };
        let mut residuals = Vec::with_capacity(self.count);
        unpack_into(&self.packed, self.bits, self.count, &mut residuals)?;
        let mut out = Vec::with_capacity(self.count);
        header.expand(&residuals, &mut out);
        Ok(out)
    }
}

/// Persisted header of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunHeader {
    /// First value.
    pub base: u64,
    /// Average increment.
    pub stride: i64,
    /// Residual bit width.
    pub bits: u32,
}

impl RunHeader {
    /// Read a run header.
    pub fn read_from(input: &mut dyn IndexInput) -> Result<Self> {
        let base = input.read_vlong()?;
        let stride = input.read_zvlong()?;
        let bits = input.read_u8()? as u32;
        if bits > 64 {
            return Err(Error::corruption(format!("invalid residual width {}", bits)));
        }
        Ok(Self { base, stride, bits })
    }

    /// Check if the run is run-length encoded.
    pub fn is_rle(&self) -> bool {
        self.bits == 0
    }

    /// Value at position `i` of a run-length encoded run.
    #[inline]
    pub fn value_at(&self, i: usize) -> u64 {
        self.base
            .wrapping_add((self.stride as u64).wrapping_mul(i as u64))
    }

    fn expand(&self, residuals: &[u64], out: &mut Vec<u64>) {
        out.clear();
        out.extend(
            residuals
                .iter()
                .enumerate()
                .map(|(i, &r)| self.value_at(i).wrapping_add(zigzag_decode64(r) as u64)),
        );
    }
}

/// Read `count` values of a run into `out`.
///
/// `scratch` is reused for the packed words and residuals.
pub fn read_run(
    input: &mut dyn IndexInput,
    count: usize,
    scratch: &mut Scratch,
    out: &mut Vec<u64>,
) -> Result<RunHeader> {
    let header = RunHeader::read_from(input)?;
    read_residuals(input, &header, count, scratch)?;
    header.expand(&scratch.residuals, out);
    Ok(header)
}

/// Read a run that must be run-length encoded.
///
/// `what` names the run in the error message.
pub fn read_rle(input: &mut dyn IndexInput, what: &str) -> Result<RunHeader> {
    let header = RunHeader::read_from(input)?;
    if !header.is_rle() {
        return Err(Error::corruption(format!(
            "invalid RL encoding in {}, base={}, stride={}",
            what, header.base, header.stride
        )));
    }
    Ok(header)
}

/// Read a run and check it is the constant run `{base, base, ...}` with
/// stride `stride`.
pub fn check_rle(input: &mut dyn IndexInput, base: u64, stride: i64, what: &str) -> Result<()> {
    let header = read_rle(input, what)?;
    if header.base != base || header.stride != stride {
        return Err(Error::corruption(format!(
            "unexpected run in {}: base={} stride={}, expected base={} stride={}",
            what, header.base, header.stride, base, stride
        )));
    }
    Ok(())
}

/// Reusable buffers for run decoding.
#[derive(Debug, Default)]
pub struct Scratch {
    bytes: Vec<u8>,
    words: Vec<u64>,
    residuals: Vec<u64>,
}

impl Scratch {
    /// Create empty scratch buffers.
    pub fn new() -> Self {
        Self::default()
    }
}

fn read_residuals(
    input: &mut dyn IndexInput,
    header: &RunHeader,
    count: usize,
    scratch: &mut Scratch,
) -> Result<()> {
    if header.is_rle() {
        scratch.residuals.clear();
        scratch.residuals.resize(count, 0);
        return Ok(());
    }

    let words = packed_words(count, header.bits);
    scratch.bytes.clear();
    scratch.bytes.resize(words * 8, 0);
    input.read_bytes(&mut scratch.bytes)?;

    scratch.words.clear();
    scratch.words.extend(scratch.bytes.chunks_exact(8).map(|c| {
        u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
    }));
    unpack_into(&scratch.words, header.bits, count, &mut scratch.residuals)
}
