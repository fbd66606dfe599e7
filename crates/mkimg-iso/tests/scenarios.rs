//! Assembles a full hybrid disk from a real FAT partition and checks the
//! cross-format invariants `SPEC_FULL.md` §8 scenario 4 calls out: a valid
//! protective MBR, a primary/secondary GPT pair that both verify their own
//! CRC, and an ISO 9660 region that identifies itself correctly — all from
//! outside the crate, through the public API only.

use chrono::{TimeZone, Utc};

use mkimg_fat::{build_fat_image, FatVariant};
use mkimg_iso::assemble_disk;
use mkimg_part::GptHeader;

const MIB: u64 = 1024 * 1024;

#[test]
fn disk_assembled_from_a_real_fat_partition_validates_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("KERNEL.ELF"), vec![0xAB; 4096]).unwrap();
    let fat = build_fat_image(FatVariant::Fat16, 16 * MIB, dir.path()).unwrap();

    let now = Utc.with_ymd_and_hms(2026, 7, 29, 0, 0, 0).unwrap();
    let disk = assemble_disk(64 * MIB, Some(&fat), None, None, now).unwrap();

    // Protective MBR.
    assert_eq!(&disk[0x1FE..0x200], &[0x55, 0xAA]);

    // Primary GPT header at LBA 1, self-describing CRC.
    let primary_bytes: [u8; GptHeader::SIZE] =
        disk[512..512 + GptHeader::SIZE].try_into().unwrap();
    let primary: GptHeader = bytemuck::cast(primary_bytes);
    assert_eq!(&primary.signature, b"EFI PART");
    assert!(primary.verify_crc());

    // Secondary GPT header mirrored at the last LBA, also self-describing.
    let secondary_bytes: [u8; GptHeader::SIZE] = disk[disk.len() - GptHeader::SIZE..]
        .try_into()
        .unwrap();
    let secondary: GptHeader = bytemuck::cast(secondary_bytes);
    assert_eq!(&secondary.signature, b"EFI PART");
    assert!(secondary.verify_crc());
    assert_eq!(secondary.current_lba.get(), disk.len() as u64 / 512 - 1);
    assert_eq!(secondary.backup_lba.get(), 1);

    // ISO 9660 region at its fixed 32 KiB offset.
    let pvd = &disk[32768..];
    assert_eq!(&pvd[40..51], b"BOOTBOOT_CD");

    // The FAT partition itself lands at LBA 128 untouched in size.
    let esp_off = 128 * 512;
    assert_eq!(&disk[esp_off..esp_off + fat.len()], fat.as_slice());
}

#[test]
fn disk_without_any_inputs_is_still_a_valid_empty_shell() {
    let now = Utc.with_ymd_and_hms(2026, 7, 29, 0, 0, 0).unwrap();
    let disk = assemble_disk(64 * MIB, None, None, None, now).unwrap();
    assert_eq!(disk.len() as u64, 64 * MIB);
    assert_eq!(&disk[0x1FE..0x200], &[0x55, 0xAA]);

    let primary_bytes: [u8; GptHeader::SIZE] =
        disk[512..512 + GptHeader::SIZE].try_into().unwrap();
    let primary: GptHeader = bytemuck::cast(primary_bytes);
    assert!(primary.verify_crc());
    assert_eq!(primary.num_partition_entries.get(), 0);
}

#[test]
fn requested_size_below_the_minimum_is_clamped_up() {
    let now = Utc.with_ymd_and_hms(2026, 7, 29, 0, 0, 0).unwrap();
    let disk = assemble_disk(1, None, None, None, now).unwrap();
    assert_eq!(disk.len() as u64, 64 * MIB);
}
