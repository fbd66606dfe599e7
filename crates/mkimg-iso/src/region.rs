//! The 32 KiB ISO 9660/El Torito region of a hybrid disk image: sector 16
//! (Primary Volume Descriptor), 17 (Boot Record Descriptor), 18 (Volume
//! Descriptor Set Terminator), 19 (El Torito boot catalog), 20 (root
//! directory) and 21 (README contents).
//!
//! Every offset below is a literal ISO 9660/El Torito field position, not
//! derived — this region is small, fixed, and has exactly one directory,
//! so there is no general-purpose path/directory table machinery here.

use chrono::{DateTime, Datelike, Timelike, Utc};
use mkimg_common::{put_u16_le_with_be_tail, put_u32_le_with_be_tail};

pub const REGION_SIZE: usize = 32 * 1024;
const SECTOR_SIZE: usize = 2048;

const README_TEXT: &str = "BOOTBOOT Live Image\r\n\r\nBootable as\r\n - CDROM (El Torito, UEFI)\r\n - USB stick (BIOS, Multiboot, UEFI)\r\n - SD card (Raspberry Pi 3+)";

/// Builds the full 32 KiB ISO region for a disk whose FAT partition is
/// `fat_partition_bytes` long, stamped with `now`.
pub fn build_iso_region(fat_partition_bytes: u64, now: DateTime<Utc>) -> Vec<u8> {
    let mut iso = vec![0u8; REGION_SIZE];
    write_primary_volume_descriptor(&mut iso, fat_partition_bytes, now);
    write_boot_record_descriptor(&mut iso);
    write_set_terminator(&mut iso);
    write_boot_catalog(&mut iso);
    write_root_directory(&mut iso, now);
    write_readme(&mut iso);
    iso
}

fn write_date_time_bytes(buf: &mut [u8], off: usize, now: DateTime<Utc>) {
    buf[off] = (now.year() - 1900) as u8;
    buf[off + 1] = now.month() as u8;
    buf[off + 2] = now.day() as u8;
    buf[off + 3] = now.hour() as u8;
    buf[off + 4] = now.minute() as u8;
    buf[off + 5] = now.second() as u8;
    buf[off + 6] = 0; // GMT
}

/// Sector 16: Primary Volume Descriptor.
fn write_primary_volume_descriptor(iso: &mut [u8], fat_partition_bytes: u64, now: DateTime<Utc>) {
    iso[0] = 1; // Volume Descriptor Type: Primary
    iso[1..6].copy_from_slice(b"CD001");
    iso[6] = 1; // version

    for b in &mut iso[8..72] {
        *b = b' ';
    }
    iso[40..40 + 11].copy_from_slice(b"BOOTBOOT_CD"); // Volume Identifier

    let volume_space_size = ((0x10000 + fat_partition_bytes as u64 + 2047) / 2048) as u32;
    put_u32_le_with_be_tail(iso, 80, volume_space_size);

    put_u16_le_with_be_tail(iso, 120, 1); // Volume Set Size
    put_u16_le_with_be_tail(iso, 124, 1); // Volume Sequence Number
    put_u16_le_with_be_tail(iso, 128, 2048); // Logical Block Size

    // Root directory record embedded in the PVD, offset 156, 34 bytes.
    iso[156] = 0x22;
    put_u32_le_with_be_tail(iso, 158, 20); // extent LBA
    put_u32_le_with_be_tail(iso, 166, 2048); // data length
    write_date_time_bytes(iso, 174, now);
    iso[181] = 2; // flags: directory
    iso[184] = 1; // volume sequence number
    iso[188] = 1; // file identifier length
    // iso[189] (file identifier) stays 0x00: the root self-reference.

    for b in &mut iso[190..813] {
        *b = b' ';
    }
    iso[318..318 + 45].copy_from_slice(b"BOOTBOOT <HTTPS://GITLAB.COM/BZTSRC/BOOTBOOT>");
    iso[446..446 + 14].copy_from_slice(b"BOOTBOOT MKIMG");
    iso[574..574 + 11].copy_from_slice(b"BOOTBOOT CD");
    for b in &mut iso[702..813] {
        *b = b' ';
    }

    let date_digits = format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}00",
        now.year(),
        now.month(),
        now.day(),
        now.hour(),
        now.minute(),
        now.second()
    );
    iso[813..813 + 16].copy_from_slice(date_digits.as_bytes()); // creation
    iso[830..830 + 16].copy_from_slice(date_digits.as_bytes()); // modification
    for b in &mut iso[847..863] {
        *b = b'0'; // expiration: unspecified
    }
    for b in &mut iso[864..880] {
        *b = b'0'; // effective: unspecified
    }
    iso[881] = 1; // file structure version
    for b in &mut iso[883..1395] {
        *b = b' '; // application use
    }
}

/// Sector 17: Boot Record Descriptor, pointing at the El Torito catalog.
fn write_boot_record_descriptor(iso: &mut [u8]) {
    let off = SECTOR_SIZE;
    iso[off] = 0; // Boot Record
    iso[off + 1..off + 6].copy_from_slice(b"CD001");
    iso[off + 6] = 1;
    iso[off + 7..off + 7 + 23].copy_from_slice(b"EL TORITO SPECIFICATION");
    put_u32_le_with_be_tail(iso, off + 71, 19); // boot catalog LBA
}

/// Sector 18: Volume Descriptor Set Terminator.
fn write_set_terminator(iso: &mut [u8]) {
    let off = 2 * SECTOR_SIZE;
    iso[off] = 0xFF;
    iso[off + 1..off + 6].copy_from_slice(b"CD001");
    iso[off + 6] = 1;
}

/// Sector 19: El Torito boot catalog — a validation entry, a BIOS initial
/// entry, a final section header, and an EFI section entry pointing at
/// the FAT partition.
fn write_boot_catalog(iso: &mut [u8]) {
    let off = 3 * SECTOR_SIZE;

    // Validation entry.
    iso[off] = 1; // Header ID
    iso[off + 1] = 0; // Platform: 80x86
    iso[off + 28] = 0xAA; // checksum, little-endian low byte
    iso[off + 29] = 0x55;
    iso[off + 30] = 0x55; // key bytes (literal, not endian-dependent)
    iso[off + 31] = 0xAA;

    // BIOS initial/default entry (no-emulation).
    iso[off + 32] = 0x88; // bootable
    iso[off + 38] = 4; // sector count (512-byte sectors)
    iso[off + 40..off + 44].copy_from_slice(&32u32.to_le_bytes()); // load RBA

    // Final section header entry, platform EFI.
    iso[off + 64] = 0x91;
    iso[off + 65] = 0xEF;
    iso[off + 66] = 1; // one section entry follows

    // EFI section entry pointing at the ESP.
    iso[off + 96] = 0x88; // bootable
    iso[off + 104..off + 108].copy_from_slice(&32u32.to_le_bytes()); // load RBA
}

/// Sector 20: root directory with ".", ".." and "README.TXT;1".
fn write_root_directory(iso: &mut [u8], now: DateTime<Utc>) {
    let off = 4 * SECTOR_SIZE;

    // "."
    iso[off] = 0x22;
    put_u32_le_with_be_tail(iso, off + 2, 20);
    put_u32_le_with_be_tail(iso, off + 10, 2048);
    write_date_time_bytes(iso, off + 18, now);
    iso[off + 25] = 2;
    iso[off + 28] = 1;
    iso[off + 32] = 1; // file id length

    // ".."
    let off2 = off + 34;
    iso[off2] = 0x22;
    put_u32_le_with_be_tail(iso, off2 + 2, 20);
    put_u32_le_with_be_tail(iso, off2 + 10, 2048);
    write_date_time_bytes(iso, off2 + 18, now);
    iso[off2 + 25] = 2;
    iso[off2 + 28] = 1;
    iso[off2 + 32] = 2; // file id length (matches the reference tool)

    // "README.TXT;1"
    let off3 = off2 + 34;
    iso[off3] = 0x22 + 12;
    put_u32_le_with_be_tail(iso, off3 + 2, 21);
    put_u32_le_with_be_tail(iso, off3 + 10, 130);
    write_date_time_bytes(iso, off3 + 18, now);
    iso[off3 + 25] = 0; // flags: regular file
    iso[off3 + 28] = 1;
    iso[off3 + 32] = 12;
    iso[off3 + 33..off3 + 33 + 12].copy_from_slice(b"README.TXT;1");
}

/// Sector 21: README contents.
fn write_readme(iso: &mut [u8]) {
    let off = 5 * SECTOR_SIZE;
    iso[off..off + README_TEXT.len()].copy_from_slice(README_TEXT.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn region_has_expected_size() {
        let region = build_iso_region(16 * 1024 * 1024, fixed_time());
        assert_eq!(region.len(), REGION_SIZE);
    }

    #[test]
    fn pvd_identifies_as_bootboot_cd() {
        let region = build_iso_region(16 * 1024 * 1024, fixed_time());
        assert_eq!(&region[0..6], &[0x01, b'C', b'D', b'0', b'0', b'1']);
        assert_eq!(&region[40..51], b"BOOTBOOT_CD");
    }

    #[test]
    fn boot_catalog_validation_entry_has_signature_bytes() {
        let region = build_iso_region(16 * 1024 * 1024, fixed_time());
        let off = 3 * SECTOR_SIZE;
        assert_eq!(region[off + 30], 0x55);
        assert_eq!(region[off + 31], 0xAA);
    }

    #[test]
    fn readme_sector_contains_expected_text() {
        let region = build_iso_region(16 * 1024 * 1024, fixed_time());
        let off = 5 * SECTOR_SIZE;
        assert_eq!(&region[off..off + README_TEXT.len()], README_TEXT.as_bytes());
    }

    #[test]
    fn volume_space_size_accounts_for_partition_bytes() {
        let region = build_iso_region(16 * 1024 * 1024, fixed_time());
        let value = u32::from_le_bytes(region[80..84].try_into().unwrap());
        assert_eq!(value, ((0x10000u64 + 16 * 1024 * 1024 + 2047) / 2048) as u32);
    }
}
