//! Integer encodings shared by the block and table formats.
//!
//! Fixed-width integers are little-endian. Varints are LEB128: 7 data bits
//! per byte, high bit set on every byte except the last.

pub fn put_fixed32(dst: &mut Vec<u8>, value: u32) {
    dst.extend_from_slice(&value.to_le_bytes());
}

pub fn put_fixed64(dst: &mut Vec<u8>, value: u64) {
    dst.extend_from_slice(&value.to_le_bytes());
}

/// Caller guarantees `src.len() >= 4`.
pub fn decode_fixed32(src: &[u8]) -> u32 {
    u32::from_le_bytes([src[0], src[1], src[2], src[3]])
}

/// Caller guarantees `src.len() >= 8`.
pub fn decode_fixed64(src: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&src[..8]);
    u64::from_le_bytes(buf)
}

pub fn put_varint32(dst: &mut Vec<u8>, value: u32) {
    put_varint64(dst, value as u64);
}

pub fn put_varint64(dst: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        dst.push((value as u8) | 0x80);
        value >>= 7;
    }
    dst.push(value as u8);
}

/// Decode a varint32 from the front of `src`.
/// Returns (value, bytes consumed), or None if truncated or overlong.
pub fn get_varint32(src: &[u8]) -> Option<(u32, usize)> {
    let mut result = 0u32;
    for (i, &byte) in src.iter().take(5).enumerate() {
        let shift = 7 * i as u32;
        if i == 4 && byte > 0x0F {
            return None;
        }
        result |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }
    }
    None
}

/// Decode a varint64 from the front of `src`.
pub fn get_varint64(src: &[u8]) -> Option<(u64, usize)> {
    let mut result = 0u64;
    for (i, &byte) in src.iter().take(10).enumerate() {
        let shift = 7 * i as u32;
        if i == 9 && byte > 0x01 {
            return None;
        }
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }
    }
    None
}
