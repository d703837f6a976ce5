//! Variable-length and zig-zag integer encoding.

/// Maximum bytes needed to encode a varint64.
pub const MAX_VARINT64_LEN: usize = 10;

/// Maximum bytes needed to encode a varint32.
pub const MAX_VARINT32_LEN: usize = 5;

/// Encode a varint to a fixed-size array, returning the slice used.
pub fn encode_varint64_to_array(value: u64) -> ([u8; MAX_VARINT64_LEN], usize) {
    let mut buf = [0u8; MAX_VARINT64_LEN];
    let mut v = value;
    let mut i = 0;
    while v >= 0x80 {
        buf[i] = (v as u8) | 0x80;
        v >>= 7;
        i += 1;
    }
    buf[i] = v as u8;
    (buf, i + 1)
}

/// Map a signed 32-bit integer onto an unsigned one, small magnitudes first.
#[inline]
pub fn zigzag_encode32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`zigzag_encode32`].
#[inline]
pub fn zigzag_decode32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Map a signed 64-bit integer onto an unsigned one, small magnitudes first.
#[inline]
pub fn zigzag_encode64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode64`].
#[inline]
pub fn zigzag_decode64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
