//! Endianness marker types.
//!
//! These are zero-sized tags used as the generic parameter of [`crate::number::U16`],
//! [`crate::number::U32`] and [`crate::number::U64`], so an on-disk struct field's
//! byte order is part of its type rather than something the reader has to
//! remember.

/// A byte order a fixed-width integer can be stored in.
pub trait Endianness: Copy + Clone + core::fmt::Debug + Default {
    fn read_u16(bytes: [u8; 2]) -> u16;
    fn write_u16(value: u16) -> [u8; 2];
    fn read_u32(bytes: [u8; 4]) -> u32;
    fn write_u32(value: u32) -> [u8; 4];
    fn read_u64(bytes: [u8; 8]) -> u64;
    fn write_u64(value: u64) -> [u8; 8];
}

/// Little-endian byte order. Used for every multi-byte field in this tool's
/// on-disk structures except ISO 9660's "both byte order" fields, which
/// store a [`LittleEndian`] value immediately followed by a [`BigEndian`]
/// one of the same value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LittleEndian;

impl Endianness for LittleEndian {
    fn read_u16(bytes: [u8; 2]) -> u16 {
        u16::from_le_bytes(bytes)
    }
    fn write_u16(value: u16) -> [u8; 2] {
        value.to_le_bytes()
    }
    fn read_u32(bytes: [u8; 4]) -> u32 {
        u32::from_le_bytes(bytes)
    }
    fn write_u32(value: u32) -> [u8; 4] {
        value.to_le_bytes()
    }
    fn read_u64(bytes: [u8; 8]) -> u64 {
        u64::from_le_bytes(bytes)
    }
    fn write_u64(value: u64) -> [u8; 8] {
        value.to_le_bytes()
    }
}

/// Big-endian byte order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BigEndian;

impl Endianness for BigEndian {
    fn read_u16(bytes: [u8; 2]) -> u16 {
        u16::from_be_bytes(bytes)
    }
    fn write_u16(value: u16) -> [u8; 2] {
        value.to_be_bytes()
    }
    fn read_u32(bytes: [u8; 4]) -> u32 {
        u32::from_be_bytes(bytes)
    }
    fn write_u32(value: u32) -> [u8; 4] {
        value.to_be_bytes()
    }
    fn read_u64(bytes: [u8; 8]) -> u64 {
        u64::from_be_bytes(bytes)
    }
    fn write_u64(value: u64) -> [u8; 8] {
        value.to_be_bytes()
    }
}

/// The target's native byte order. Not used by any on-disk structure in
/// this tool (every format here has an explicit wire byte order), kept for
/// parity with the host-endian number APIs the rest of this crate exposes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NativeEndian;

impl Endianness for NativeEndian {
    fn read_u16(bytes: [u8; 2]) -> u16 {
        u16::from_ne_bytes(bytes)
    }
    fn write_u16(value: u16) -> [u8; 2] {
        value.to_ne_bytes()
    }
    fn read_u32(bytes: [u8; 4]) -> u32 {
        u32::from_ne_bytes(bytes)
    }
    fn write_u32(value: u32) -> [u8; 4] {
        value.to_ne_bytes()
    }
    fn read_u64(bytes: [u8; 8]) -> u64 {
        u64::from_ne_bytes(bytes)
    }
    fn write_u64(value: u64) -> [u8; 8] {
        value.to_ne_bytes()
    }
}
