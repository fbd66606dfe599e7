//! Byte-exact ELF64 header structs, read-only: this crate never writes an
//! ELF file, only parses one a kernel author already produced.

use mkimg_common::{LittleEndian, U16, U32, U64};

/// The two byte sequences accepted as an ELF64 discriminant. `"OS/Z"` is
/// the reference toolchain's own kernel format; the validator treats it
/// identically to the standard `\x7fELF` magic (see `SPEC_FULL.md` §9).
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
pub const OSZ_MAGIC: [u8; 4] = *b"OS/Z";

pub const ELFCLASS64: u8 = 2;
pub const ELFDATA2LSB: u8 = 1;

pub const PT_LOAD: u32 = 1;

pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;

/// 64-byte ELF file header.
#[repr(C, packed)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct Elf64Ehdr {
    pub e_ident: [u8; 16],
    pub e_type: U16<LittleEndian>,
    pub e_machine: U16<LittleEndian>,
    pub e_version: U32<LittleEndian>,
    pub e_entry: U64<LittleEndian>,
    pub e_phoff: U64<LittleEndian>,
    pub e_shoff: U64<LittleEndian>,
    pub e_flags: U32<LittleEndian>,
    pub e_ehsize: U16<LittleEndian>,
    pub e_phentsize: U16<LittleEndian>,
    pub e_phnum: U16<LittleEndian>,
    pub e_shentsize: U16<LittleEndian>,
    pub e_shnum: U16<LittleEndian>,
    pub e_shstrndx: U16<LittleEndian>,
}

impl Elf64Ehdr {
    pub const SIZE: usize = 64;

    pub fn parse(data: &[u8]) -> Option<&Self> {
        bytemuck::try_from_bytes(data.get(..Self::SIZE)?).ok()
    }

    pub fn is_elf_magic(&self) -> bool {
        self.e_ident[0..4] == ELF_MAGIC[..] || self.e_ident[0..4] == OSZ_MAGIC[..]
    }

    pub fn is_64bit_le(&self) -> bool {
        self.e_ident[4] == ELFCLASS64 && self.e_ident[5] == ELFDATA2LSB
    }
}

/// 56-byte ELF program header table entry.
#[repr(C, packed)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct Elf64Phdr {
    pub p_type: U32<LittleEndian>,
    pub p_flags: U32<LittleEndian>,
    pub p_offset: U64<LittleEndian>,
    pub p_vaddr: U64<LittleEndian>,
    pub p_paddr: U64<LittleEndian>,
    pub p_filesz: U64<LittleEndian>,
    pub p_memsz: U64<LittleEndian>,
    pub p_align: U64<LittleEndian>,
}

impl Elf64Phdr {
    pub const SIZE: usize = 56;

    pub fn parse(data: &[u8], off: usize) -> Option<&Self> {
        bytemuck::try_from_bytes(data.get(off..off + Self::SIZE)?).ok()
    }
}

/// 64-byte ELF section header table entry.
#[repr(C, packed)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct Elf64Shdr {
    pub sh_name: U32<LittleEndian>,
    pub sh_type: U32<LittleEndian>,
    pub sh_flags: U64<LittleEndian>,
    pub sh_addr: U64<LittleEndian>,
    pub sh_offset: U64<LittleEndian>,
    pub sh_size: U64<LittleEndian>,
    pub sh_link: U32<LittleEndian>,
    pub sh_info: U32<LittleEndian>,
    pub sh_addralign: U64<LittleEndian>,
    pub sh_entsize: U64<LittleEndian>,
}

impl Elf64Shdr {
    pub const SIZE: usize = 64;

    pub fn parse(data: &[u8], off: usize) -> Option<&Self> {
        bytemuck::try_from_bytes(data.get(off..off + Self::SIZE)?).ok()
    }
}

/// 24-byte ELF symbol table entry.
#[repr(C, packed)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct Elf64Sym {
    pub st_name: U32<LittleEndian>,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: U16<LittleEndian>,
    pub st_value: U64<LittleEndian>,
    pub st_size: U64<LittleEndian>,
}

impl Elf64Sym {
    pub const SIZE: usize = 24;

    pub fn parse(data: &[u8], off: usize) -> Option<&Self> {
        bytemuck::try_from_bytes(data.get(off..off + Self::SIZE)?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_eq_size!(Elf64Ehdr, [u8; 64]);
    static_assertions::assert_eq_size!(Elf64Phdr, [u8; 56]);
    static_assertions::assert_eq_size!(Elf64Shdr, [u8; 64]);
    static_assertions::assert_eq_size!(Elf64Sym, [u8; 24]);
}
