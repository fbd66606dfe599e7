//! Byte-exact PE32+ header structs, matching the reference tool's own
//! minimal view of a PE image rather than the full Microsoft PE/COFF
//! specification: just enough fields to locate the one load segment and
//! the COFF symbol table.

use mkimg_common::{LittleEndian, U16, U32};

pub const MZ_MAGIC: u16 = 0x5A4D;
pub const PE_MAGIC: u32 = 0x0000_4550;
pub const PE_OPT_MAGIC_PE32PLUS: u16 = 0x020B;

pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
pub const IMAGE_FILE_MACHINE_ARM64: u16 = 0xAA64;

/// 64-byte MS-DOS stub header: only `magic` and `peaddr` (at the
/// conventional `e_lfanew` offset 0x3C) are ever read.
#[repr(C, packed)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct MzHeader {
    pub magic: U16<LittleEndian>,
    pub reserved: [U16<LittleEndian>; 29],
    pub peaddr: U32<LittleEndian>,
}

impl MzHeader {
    pub const SIZE: usize = 64;
    pub const PEADDR_OFFSET: usize = 60;

    pub fn parse(data: &[u8]) -> Option<&Self> {
        bytemuck::try_from_bytes(data.get(..Self::SIZE)?).ok()
    }
}

/// The reference tool's 48-byte combined COFF-header-plus-optional-header
/// view: `file_type` is the PE32+ optional header magic, immediately
/// followed by the fields `mkimg` actually reads off it.
#[repr(C, packed)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct PeHeader {
    pub magic: U32<LittleEndian>,
    pub machine: U16<LittleEndian>,
    pub sections: U16<LittleEndian>,
    pub timestamp: U32<LittleEndian>,
    pub sym_table: U32<LittleEndian>,
    pub numsym: U32<LittleEndian>,
    pub opt_hdr_size: U16<LittleEndian>,
    pub flags: U16<LittleEndian>,
    pub file_type: U16<LittleEndian>,
    pub ld_major: u8,
    pub ld_minor: u8,
    pub text_size: U32<LittleEndian>,
    pub data_size: U32<LittleEndian>,
    pub bss_size: U32<LittleEndian>,
    pub entry_point: U32<LittleEndian>,
    pub code_base: U32<LittleEndian>,
}

impl PeHeader {
    pub const SIZE: usize = 48;

    pub fn parse(data: &[u8], off: usize) -> Option<&Self> {
        bytemuck::try_from_bytes(data.get(off..off + Self::SIZE)?).ok()
    }

    /// `entry_point`/`code_base` are signed 32-bit RVAs in the reference
    /// struct; sign-extend them the way the reference tool's `int32_t`
    /// cast does before widening to a 64-bit virtual address.
    pub fn entry_point_i64(&self) -> i64 {
        self.entry_point.get() as i32 as i64
    }

    pub fn code_base_i64(&self) -> i64 {
        self.code_base.get() as i32 as i64
    }
}

/// 18-byte COFF symbol table entry. `iszero` non-zero means the name is
/// inlined in `iszero`+`nameoffs` as 8 raw bytes rather than an offset
/// into the string table following the symbol table.
#[repr(C, packed)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct PeSym {
    pub iszero: U32<LittleEndian>,
    pub nameoffs: U32<LittleEndian>,
    pub value: U32<LittleEndian>,
    pub section: U16<LittleEndian>,
    pub sym_type: U16<LittleEndian>,
    pub storclass: u8,
    pub auxsyms: u8,
}

impl PeSym {
    pub const SIZE: usize = 18;

    pub fn parse(data: &[u8], off: usize) -> Option<&Self> {
        bytemuck::try_from_bytes(data.get(off..off + Self::SIZE)?).ok()
    }

    pub fn value_i64(&self) -> i64 {
        self.value.get() as i32 as i64
    }
}
