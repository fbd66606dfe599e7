//! Shared primitives for the mkimg image authoring tool.
//!
//! This crate has no knowledge of FAT, ISO 9660, GPT or ELF/PE; it only
//! provides the little building blocks those formats are written in terms
//! of: a table-driven CRC-32, endian-tagged fixed-width integers for use in
//! `#[repr(C, packed)]` on-disk structures, and the three-kind error type
//! shared by every other crate in the workspace.

pub mod crc32;
pub mod endian;
pub mod error;
pub mod host;
pub mod number;
pub mod primitives;

pub use crc32::crc32;
pub use endian::{BigEndian, Endianness, LittleEndian, NativeEndian};
pub use error::{ErrorKind, MkimgError, Result};
pub use host::{iter_dir, read_all, DirEntry, EntryKind};
pub use number::{U16, U32, U64};
pub use primitives::{
    get_u32_le, is_loader_signature, put_u16_le, put_u16_le_with_be_tail, put_u32_le,
    put_u32_le_with_be_tail, LOADER_ALIGNMENT,
};
