//! Parses an ELF64 or PE32+ kernel image and classifies it against the
//! protocol's two conformance levels. Read-only: nothing here ever
//! mutates the kernel.

use tracing::trace;

use crate::arch::{in_higher_half_top_1g, is_page_aligned, Arch};
use crate::raw::elf::{Elf64Ehdr, Elf64Phdr, Elf64Shdr, Elf64Sym, EM_AARCH64, EM_X86_64, PT_LOAD};
use crate::raw::pe::{
    MzHeader, PeHeader, PeSym, IMAGE_FILE_MACHINE_AMD64, IMAGE_FILE_MACHINE_ARM64, MZ_MAGIC,
    PE_MAGIC, PE_OPT_MAGIC_PE32PLUS,
};
use crate::report::{Conformance, Format, Report};

const SIXTEEN_MIB: u64 = 16 * 1024 * 1024;
/// `2 MiB − 256 KiB − 8 KiB`, the core-plus-bss ceiling for a kernel to be
/// simultaneously Level 1 and Level 2 compliant.
const LEVEL1_COMPAT_SIZE_CEILING: u64 = 2 * 1024 * 1024 - 256 * 1024 - 2 * 4096;

const LEVEL1_MMIO: u64 = 0xFFFF_FFFF_F800_0000;
const LEVEL1_FB: u64 = 0xFFFF_FFFF_FC00_0000;
const LEVEL1_BOOTBOOT: u64 = 0xFFFF_FFFF_FFE0_0000;
const LEVEL1_ENVIRONMENT: u64 = 0xFFFF_FFFF_FFE0_1000;
const LEVEL1_CORE: u64 = 0xFFFF_FFFF_FFE0_2000;

/// The one load segment the protocol allows: where it sits in the file,
/// where it loads in memory, and the kernel's entry point.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub core_addr: u64,
    pub core_size: u64,
    pub bss: u64,
    pub entry: u64,
}

/// The four named symbols the protocol recognizes, each an address if the
/// kernel's symbol table defines it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Symbols {
    pub bootboot: Option<u64>,
    pub environment: Option<u64>,
    pub mmio: Option<u64>,
    pub fb: Option<u64>,
}

impl Symbols {
    fn any_present(&self) -> bool {
        self.bootboot.is_some() || self.environment.is_some() || self.mmio.is_some() || self.fb.is_some()
    }
}

/// Parses `data` and produces a full conformance [`Report`].
pub fn check(data: &[u8]) -> Report {
    let mut lines = Vec::new();

    if let Some(ehdr) = Elf64Ehdr::parse(data) {
        if ehdr.is_elf_magic() && ehdr.is_64bit_le() {
            return check_elf(data, ehdr, lines);
        }
    }
    if let Some(mz) = MzHeader::parse(data) {
        if mz.magic.get() == MZ_MAGIC {
            let peaddr = mz.peaddr.get() as usize;
            if peaddr < 65536 {
                if let Some(pehdr) = PeHeader::parse(data, peaddr) {
                    if pehdr.magic.get() == PE_MAGIC
                        && pehdr.file_type.get() == PE_OPT_MAGIC_PE32PLUS
                    {
                        return check_pe(data, pehdr, peaddr, lines);
                    }
                }
            }
        }
    }

    lines.push("File format: invalid".to_string());
    Report {
        format: None,
        lines,
        conformance: None,
    }
}

fn reject(format: Format, lines: Vec<String>) -> Report {
    Report {
        format: Some(format),
        lines,
        conformance: None,
    }
}

fn elf_arch(machine: u16) -> Option<Arch> {
    match machine {
        EM_AARCH64 => Some(Arch::Aarch64),
        EM_X86_64 => Some(Arch::X86_64),
        _ => None,
    }
}

fn check_elf(data: &[u8], ehdr: &Elf64Ehdr, mut lines: Vec<String>) -> Report {
    lines.push("File format: ELF64".to_string());
    let Some(arch) = elf_arch(ehdr.e_machine.get()) else {
        lines.push("Architecture: invalid".to_string());
        return reject(Format::Elf64, lines);
    };
    lines.push(format!("Architecture: {}", arch.name()));

    let Some(segment) = find_elf_load_segment(data, ehdr, &mut lines) else {
        return reject(Format::Elf64, lines);
    };

    lines.push(format!(
        "Load segment: {:#018x} size {}K",
        segment.core_addr,
        (segment.core_size + segment.bss + 1024) / 1024
    ));
    if !validate_segment(&segment, &mut lines) {
        return reject(Format::Elf64, lines);
    }

    lines.push(format!("Entry point: {:#018x}", segment.entry));
    if segment.entry < segment.core_addr || segment.entry > segment.core_addr + segment.core_size {
        lines.push("Entry point is not in text segment".to_string());
        return reject(Format::Elf64, lines);
    }

    let symbols = read_elf_symbols(data, ehdr, &mut lines);
    finalize(Format::Elf64, &segment, &symbols, arch, lines)
}

fn find_elf_load_segment(data: &[u8], ehdr: &Elf64Ehdr, lines: &mut Vec<String>) -> Option<Segment> {
    let phoff = ehdr.e_phoff.get() as usize;
    let phentsize = ehdr.e_phentsize.get() as usize;
    let phnum = ehdr.e_phnum.get() as usize;

    let mut load_count = 0u32;
    let mut found: Option<Segment> = None;
    for i in 0..phnum {
        let off = phoff.checked_add(i * phentsize)?;
        let phdr = Elf64Phdr::parse(data, off)?;
        if phdr.p_type.get() != PT_LOAD {
            continue;
        }
        load_count += 1;
        if found.is_none() {
            // e_type 3 (ET_DYN) kernels carry an extra 0x4000 of core
            // image ahead of the mapped segment, matching the reference
            // tool's treatment of position-independent kernels.
            let core_size = phdr.p_filesz.get() + if ehdr.e_type.get() == 3 { 0x4000 } else { 0 };
            let bss = phdr.p_memsz.get().saturating_sub(core_size);
            found = Some(Segment {
                core_addr: phdr.p_vaddr.get(),
                core_size,
                bss,
                entry: ehdr.e_entry.get(),
            });
        }
    }

    if load_count != 1 {
        lines.push(format!(
            "found {load_count} PT_LOAD segments, expected exactly one"
        ));
        return None;
    }
    found
}

fn section_name_at<'a>(data: &'a [u8], strtab_off: usize, name_off: u32) -> Option<&'a [u8]> {
    let start = strtab_off.checked_add(name_off as usize)?;
    let end = data[start..].iter().position(|&b| b == 0)? + start;
    Some(&data[start..end])
}

fn read_elf_symbols(data: &[u8], ehdr: &Elf64Ehdr, lines: &mut Vec<String>) -> Symbols {
    let mut symbols = Symbols::default();
    let shoff = ehdr.e_shoff.get();
    if shoff == 0 {
        lines.push("No section table found".to_string());
        return symbols;
    }

    let shoff = shoff as usize;
    let shentsize = ehdr.e_shentsize.get() as usize;
    let shnum = ehdr.e_shnum.get() as usize;
    let shstrndx = ehdr.e_shstrndx.get() as usize;

    let Some(strt) = Elf64Shdr::parse(data, shoff.wrapping_add(shstrndx * shentsize)) else {
        lines.push("No section table found".to_string());
        return symbols;
    };
    let shstrtab_off = strt.sh_offset.get() as usize;

    let mut sym_sh: Option<Elf64Shdr> = None;
    let mut str_sh: Option<Elf64Shdr> = None;
    for i in 0..shnum {
        let off = shoff + i * shentsize;
        let Some(shdr) = Elf64Shdr::parse(data, off) else {
            break;
        };
        match section_name_at(data, shstrtab_off, shdr.sh_name.get()) {
            Some(b".symtab") => sym_sh = Some(*shdr),
            Some(b".strtab") => str_sh = Some(*shdr),
            _ => {}
        }
    }

    let (Some(sym_sh), Some(str_sh)) = (sym_sh, str_sh) else {
        lines.push("No symbols found".to_string());
        return symbols;
    };

    let strtab_off = str_sh.sh_offset.get() as usize;
    let strsz = str_sh.sh_size.get() as usize;
    let sym_off = sym_sh.sh_offset.get() as usize;
    let syment = sym_sh.sh_entsize.get() as usize;
    if strtab_off == 0 || strsz == 0 || sym_off == 0 || syment == 0 {
        lines.push("No symbols found".to_string());
        return symbols;
    }

    // Only symbols before the string table's own offset are real entries
    // (mirrors the reference tool's `(strtable - sym) / syment` bound).
    let sym_count = strtab_off.saturating_sub(sym_off) / syment;
    for i in 0..sym_count {
        let Some(sym) = Elf64Sym::parse(data, sym_off + i * syment) else {
            break;
        };
        let name_off = sym.st_name.get() as usize;
        if name_off >= strsz {
            break;
        }
        let Some(name) = section_name_at(data, strtab_off, sym.st_name.get()) else {
            continue;
        };
        record_symbol(&mut symbols, name, sym.st_value.get());
    }
    trace!(?symbols, "parsed ELF symbol table");
    symbols
}

fn record_symbol(symbols: &mut Symbols, name: &[u8], value: u64) {
    match name {
        b"bootboot" => symbols.bootboot.get_or_insert(value),
        b"environment" => symbols.environment.get_or_insert(value),
        b"mmio" => symbols.mmio.get_or_insert(value),
        b"fb" => symbols.fb.get_or_insert(value),
        _ => return,
    };
}

fn pe_arch(machine: u16) -> Option<Arch> {
    match machine {
        IMAGE_FILE_MACHINE_ARM64 => Some(Arch::Aarch64),
        IMAGE_FILE_MACHINE_AMD64 => Some(Arch::X86_64),
        _ => None,
    }
}

fn check_pe(data: &[u8], pehdr: &PeHeader, base_off: usize, mut lines: Vec<String>) -> Report {
    lines.push("File format: PE32+".to_string());
    let Some(arch) = pe_arch(pehdr.machine.get()) else {
        lines.push("Architecture: invalid".to_string());
        return reject(Format::Pe32Plus, lines);
    };
    lines.push(format!("Architecture: {}", arch.name()));

    let code_base = pehdr.code_base_i64() as u64;
    let entry_point = pehdr.entry_point_i64() as u64;
    let text_size = pehdr.text_size.get() as u64;
    let core_size = entry_point
        .wrapping_sub(code_base)
        .wrapping_add(text_size)
        .wrapping_add(pehdr.data_size.get() as u64);
    let segment = Segment {
        core_addr: code_base,
        core_size,
        bss: pehdr.bss_size.get() as u64,
        entry: entry_point,
    };

    lines.push(format!(
        "Load segment: {:#018x} size {}K",
        segment.core_addr,
        (segment.core_size + segment.bss + 1024) / 1024
    ));
    if !validate_segment(&segment, &mut lines) {
        return reject(Format::Pe32Plus, lines);
    }

    lines.push(format!("Entry point: {:#018x}", segment.entry));
    if segment.entry < segment.core_addr || segment.entry > segment.core_addr + text_size {
        lines.push("Entry point is not in text segment".to_string());
        return reject(Format::Pe32Plus, lines);
    }

    let symbols = read_pe_symbols(data, pehdr, base_off, &mut lines);
    finalize(Format::Pe32Plus, &segment, &symbols, arch, lines)
}

fn read_pe_symbols(data: &[u8], pehdr: &PeHeader, base_off: usize, lines: &mut Vec<String>) -> Symbols {
    let mut symbols = Symbols::default();
    let sym_table = pehdr.sym_table.get();
    let numsym = pehdr.numsym.get();
    if sym_table == 0 || numsym == 0 {
        lines.push("No symbols found".to_string());
        return symbols;
    }

    let sym_table_off = base_off + sym_table as usize;
    // The string table immediately follows the symbol table, prefixed by
    // its own 4-byte length field.
    let strtable_off = sym_table_off + numsym as usize * PeSym::SIZE + 4;

    let mut i: u32 = 0;
    while i < numsym {
        let off = sym_table_off + i as usize * PeSym::SIZE;
        let Some(sym) = PeSym::parse(data, off) else {
            break;
        };
        if sym.iszero.get() != 0 {
            let mut inline = [0u8; 8];
            inline[0..4].copy_from_slice(&sym.iszero.to_bytes());
            inline[4..8].copy_from_slice(&sym.nameoffs.to_bytes());
            record_inline_symbol(&mut symbols, &inline, sym.value_i64() as u64);
        } else if let Some(name) =
            section_name_at(data, strtable_off, sym.nameoffs.get())
        {
            record_symbol(&mut symbols, name, sym.value_i64() as u64);
        }
        i += 1 + sym.auxsyms as u32;
    }
    symbols
}

fn record_inline_symbol(symbols: &mut Symbols, name8: &[u8; 8], value: u64) {
    if inline_name_is(name8, b"bootboot") {
        symbols.bootboot.get_or_insert(value);
    }
    if inline_name_is(name8, b"environment") {
        symbols.environment.get_or_insert(value);
    }
    if inline_name_is(name8, b"mmio") {
        symbols.mmio.get_or_insert(value);
    }
    if inline_name_is(name8, b"fb") {
        symbols.fb.get_or_insert(value);
    }
}

fn inline_name_is(name8: &[u8; 8], target: &[u8]) -> bool {
    if target.len() > 8 || &name8[..target.len()] != target {
        return false;
    }
    target.len() == 8 || name8[target.len()] == 0
}

fn validate_segment(segment: &Segment, lines: &mut Vec<String>) -> bool {
    if !in_higher_half_top_1g(segment.core_addr) {
        lines.push("Load segment is not in the higher half top -1G".to_string());
        return false;
    }
    if !is_page_aligned(segment.core_addr) {
        lines.push("Load segment is not page aligned".to_string());
        return false;
    }
    if segment.core_size + segment.bss > SIXTEEN_MIB {
        lines.push("Load segment is bigger than 16M".to_string());
        return false;
    }
    true
}

fn validate_symbol(name: &str, addr: u64, mask: u64, lines: &mut Vec<String>) -> bool {
    lines.push(format!("{name}: {addr:#018x}"));
    if !in_higher_half_top_1g(addr) {
        lines.push(format!("{name} is not in the higher half top -1G"));
        return false;
    }
    if addr & mask != 0 {
        lines.push(format!("{name} is not properly aligned"));
        return false;
    }
    true
}

fn finalize(
    _format: Format,
    segment: &Segment,
    symbols: &Symbols,
    arch: Arch,
    mut lines: Vec<String>,
) -> Report {
    let format = _format;
    if !symbols.any_present() {
        lines.push(
            "Complies with BOOTBOOT Protocol Level 1, must use valid static addresses".to_string(),
        );
        return Report {
            format: Some(format),
            lines,
            conformance: Some(Conformance::Level1),
        };
    }

    if let Some(addr) = symbols.mmio {
        if !validate_symbol("mmio", addr, arch.mmio_align_mask(), &mut lines) {
            return reject(format, lines);
        }
    }
    if let Some(addr) = symbols.fb {
        if !validate_symbol("fb", addr, arch.fb_align_mask(), &mut lines) {
            return reject(format, lines);
        }
    }
    if let Some(addr) = symbols.bootboot {
        if !validate_symbol("bootboot", addr, 4095, &mut lines) {
            return reject(format, lines);
        }
    }
    if let Some(addr) = symbols.environment {
        if !validate_symbol("environment", addr, 4095, &mut lines) {
            return reject(format, lines);
        }
    }

    let level1_compatible = symbols.mmio.is_none_or(|a| a == LEVEL1_MMIO)
        && symbols.fb.is_none_or(|a| a == LEVEL1_FB)
        && symbols.bootboot.is_none_or(|a| a == LEVEL1_BOOTBOOT)
        && symbols.environment.is_none_or(|a| a == LEVEL1_ENVIRONMENT)
        && segment.core_addr == LEVEL1_CORE
        && segment.core_size + segment.bss < LEVEL1_COMPAT_SIZE_CEILING;

    if level1_compatible {
        lines.push("Complies with BOOTBOOT Protocol Level 1 and 2, valid dynamic addresses".to_string());
    } else {
        lines.push("Complies with BOOTBOOT Protocol Level 2, valid dynamic addresses".to_string());
    }

    Report {
        format: Some(format),
        lines,
        conformance: Some(Conformance::Level2 { level1_compatible }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_elf64(
        machine: u16,
        vaddr: u64,
        filesz: u64,
        memsz: u64,
        entry: u64,
        symbols: &[(&str, u64)],
    ) -> Vec<u8> {
        let phoff = Elf64Ehdr::SIZE;
        let mut data = vec![0u8; phoff + Elf64Phdr::SIZE];
        data[0..4].copy_from_slice(&[0x7F, b'E', b'L', b'F']);
        data[4] = 2; // ELFCLASS64
        data[5] = 1; // ELFDATA2LSB
        write_ehdr(&mut data, machine, entry, phoff as u64, 0);

        let phdr_off = phoff;
        data[phdr_off..phdr_off + 4].copy_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        data[phdr_off + 8..phdr_off + 16].copy_from_slice(&0u64.to_le_bytes()); // p_offset
        data[phdr_off + 16..phdr_off + 24].copy_from_slice(&vaddr.to_le_bytes());
        data[phdr_off + 32..phdr_off + 40].copy_from_slice(&filesz.to_le_bytes());
        data[phdr_off + 40..phdr_off + 48].copy_from_slice(&memsz.to_le_bytes());

        if !symbols.is_empty() {
            append_elf_symtab(&mut data, symbols);
        }
        data
    }

    fn write_ehdr(data: &mut [u8], machine: u16, entry: u64, phoff: u64, shoff: u64) {
        data[16..18].copy_from_slice(&0u16.to_le_bytes()); // e_type
        data[18..20].copy_from_slice(&machine.to_le_bytes());
        data[24..32].copy_from_slice(&entry.to_le_bytes());
        data[32..40].copy_from_slice(&phoff.to_le_bytes());
        data[40..48].copy_from_slice(&shoff.to_le_bytes());
        data[54..56].copy_from_slice(&(Elf64Phdr::SIZE as u16).to_le_bytes()); // e_phentsize
        data[56..58].copy_from_slice(&1u16.to_le_bytes()); // e_phnum
        data[58..60].copy_from_slice(&(Elf64Shdr::SIZE as u16).to_le_bytes()); // e_shentsize
    }

    /// Appends a minimal section header table + `.symtab`/`.strtab`/
    /// `.shstrtab` content to `data`, and patches the ehdr's `e_shoff`,
    /// `e_shnum` and `e_shstrndx` fields to point at it.
    fn append_elf_symtab(data: &mut Vec<u8>, symbols: &[(&str, u64)]) {
        let shstrtab: &[u8] = b"\0.symtab\0.strtab\0.shstrtab\0";
        let symtab_name_off = 1u32;
        let strtab_name_off = 9u32;
        let shstrtab_name_off = 17u32;

        let mut strtab: Vec<u8> = vec![0u8];
        let mut syms: Vec<u8> = Vec::new();
        for (name, value) in symbols {
            let name_off = strtab.len() as u32;
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
            syms.extend_from_slice(&name_off.to_le_bytes());
            syms.push(0); // st_info
            syms.push(0); // st_other
            syms.extend_from_slice(&0u16.to_le_bytes()); // st_shndx
            syms.extend_from_slice(&value.to_le_bytes());
            syms.extend_from_slice(&0u64.to_le_bytes()); // st_size
        }

        let symtab_off = data.len() as u64;
        data.extend_from_slice(&syms);
        let strtab_off = data.len() as u64;
        data.extend_from_slice(&strtab);
        let shstrtab_off = data.len() as u64;
        data.extend_from_slice(shstrtab);

        let shoff = data.len() as u64;
        // Section 0: null.
        data.extend(vec![0u8; Elf64Shdr::SIZE]);
        // Section 1: .symtab
        push_shdr(data, symtab_name_off, symtab_off, syms.len() as u64, Elf64Sym::SIZE as u64);
        // Section 2: .strtab
        push_shdr(data, strtab_name_off, strtab_off, strtab.len() as u64, 0);
        // Section 3: .shstrtab
        push_shdr(data, shstrtab_name_off, shstrtab_off, shstrtab.len() as u64, 0);

        data[40..48].copy_from_slice(&shoff.to_le_bytes());
        data[60..62].copy_from_slice(&4u16.to_le_bytes()); // e_shnum
        data[62..64].copy_from_slice(&3u16.to_le_bytes()); // e_shstrndx
    }

    fn push_shdr(data: &mut Vec<u8>, name_off: u32, offset: u64, size: u64, entsize: u64) {
        let mut shdr = vec![0u8; Elf64Shdr::SIZE];
        shdr[0..4].copy_from_slice(&name_off.to_le_bytes());
        shdr[24..32].copy_from_slice(&offset.to_le_bytes());
        shdr[32..40].copy_from_slice(&size.to_le_bytes());
        shdr[56..64].copy_from_slice(&entsize.to_le_bytes());
        data.extend_from_slice(&shdr);
    }

    #[test]
    fn level1_kernel_with_no_symbols() {
        let data = build_elf64(
            EM_X86_64,
            0xFFFF_FFFF_FFE0_2000,
            0x10000,
            0x10000,
            0xFFFF_FFFF_FFE0_2000,
            &[],
        );
        let report = check(&data);
        assert_eq!(report.format, Some(Format::Elf64));
        assert_eq!(report.conformance, Some(Conformance::Level1));
        assert!(report.text().contains("Complies with BOOTBOOT Protocol Level 1"));
    }

    #[test]
    fn level2_kernel_with_fb_symbol() {
        let data = build_elf64(
            EM_X86_64,
            0xFFFF_FFFF_FFE0_2000,
            0x10000,
            0x10000,
            0xFFFF_FFFF_FFE0_2000,
            &[("fb", 0xFFFF_FFFF_FC00_0000)],
        );
        let report = check(&data);
        match report.conformance {
            Some(Conformance::Level2 { level1_compatible }) => assert!(level1_compatible),
            other => panic!("expected Level2, got {other:?}"),
        }
        assert!(report
            .text()
            .contains("Complies with BOOTBOOT Protocol Level 1 and 2"));
    }

    #[test]
    fn rejects_unrecognized_architecture() {
        let data = build_elf64(0xFFFF, 0x1000, 0x1000, 0x1000, 0x1000, &[]);
        let report = check(&data);
        assert!(report.conformance.is_none());
        assert!(report.text().contains("Architecture: invalid"));
    }

    #[test]
    fn rejects_segment_outside_higher_half() {
        let data = build_elf64(EM_X86_64, 0x1000, 0x1000, 0x1000, 0x1000, &[]);
        let report = check(&data);
        assert!(report.conformance.is_none());
    }

    #[test]
    fn rejects_unknown_file_format() {
        let report = check(b"not an executable at all");
        assert!(report.conformance.is_none());
        assert_eq!(report.format, None);
    }
}
