//! Raw little-endian and "both-byte-order" integer writes into a byte
//! buffer, for formats (ISO 9660 chief among them) that are most directly
//! expressed as direct offsets into a fixed-layout region rather than a
//! `#[repr(C, packed)]` struct.

/// Writes `v` little-endian at `buf[off..off+4]`.
pub fn put_u32_le(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

/// Writes `v` little-endian at `buf[off..off+2]`.
pub fn put_u16_le(buf: &mut [u8], off: usize, v: u16) {
    buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

/// Writes `v` little-endian at `off` and again big-endian at `off+4`, the
/// ISO 9660 "both-byte-order" encoding used for numeric fields that must
/// be readable regardless of host endianness.
pub fn put_u32_le_with_be_tail(buf: &mut [u8], off: usize, v: u32) {
    put_u32_le(buf, off, v);
    buf[off + 4..off + 8].copy_from_slice(&v.to_be_bytes());
}

/// Writes `v` little-endian at `off` and again big-endian at `off+2`, the
/// 16-bit form of the both-byte-order encoding.
pub fn put_u16_le_with_be_tail(buf: &mut [u8], off: usize, v: u16) {
    put_u16_le(buf, off, v);
    buf[off + 2..off + 4].copy_from_slice(&v.to_be_bytes());
}

/// Reads a little-endian `u32` from `buf[off..off+4]`.
pub fn get_u32_le(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

/// The five-byte signature the stage-2 loader stamps on its own payload:
/// checked by the FAT builder (to decide whether a file needs 2048-byte
/// cluster alignment) and by disk assembly (to locate stage-2 inside an
/// already-built FAT partition). Kept here rather than in `mkimg-fat` so
/// both can depend on it without `mkimg-part` needing a FAT-specific crate.
pub fn is_loader_signature(data: &[u8]) -> bool {
    data.len() >= 16
        && data[0] == 0x55
        && data[1] == 0xAA
        && data[3] == 0xE9
        && data[8] == b'B'
        && data[12] == b'B'
}

/// Byte alignment the loader signature requires within its partition.
pub const LOADER_ALIGNMENT: usize = 2048;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_byte_order_u32_round_trips_each_half() {
        let mut buf = [0u8; 8];
        put_u32_le_with_be_tail(&mut buf, 0, 0x0001_0203);
        assert_eq!(get_u32_le(&buf, 0), 0x0001_0203);
        assert_eq!(u32::from_be_bytes(buf[4..8].try_into().unwrap()), 0x0001_0203);
    }

    #[test]
    fn both_byte_order_u16_round_trips_each_half() {
        let mut buf = [0u8; 4];
        put_u16_le_with_be_tail(&mut buf, 0, 0x0102);
        assert_eq!(u16::from_le_bytes(buf[0..2].try_into().unwrap()), 0x0102);
        assert_eq!(u16::from_be_bytes(buf[2..4].try_into().unwrap()), 0x0102);
    }

    #[test]
    fn recognizes_loader_signature() {
        let mut buf = [0u8; 16];
        buf[0] = 0x55;
        buf[1] = 0xAA;
        buf[3] = 0xE9;
        buf[8] = b'B';
        buf[12] = b'B';
        assert!(is_loader_signature(&buf));
    }

    #[test]
    fn rejects_non_matching_signature() {
        assert!(!is_loader_signature(&[0u8; 16]));
        assert!(!is_loader_signature(&[0x55, 0xAA]));
    }
}
