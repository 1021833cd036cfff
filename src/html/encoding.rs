//! Internal encoding remap
//!
//! Vintage 8-bit machines keep screen memory in an "internal" character
//! order that differs from ASCII: the visible range 0x20..0x5F sits at
//! 0x00..0x3F and control codes sit at 0x40..0x5F. Writing filtered output
//! straight into screen memory needs this per-byte remap.

/// Map one byte to the internal character order
#[inline]
pub fn to_internal(byte: u8) -> u8 {
    match byte {
        0x60 => 0x07,
        0x00..=0x1F => byte + 0x40,
        0x20..=0x5F => byte - 0x20,
        _ => byte,
    }
}

/// Remap a buffer in place
pub fn convert_to_internal(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        *byte = to_internal(*byte);
    }
}
