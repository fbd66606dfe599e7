//! Assembles the hybrid MBR+GPT+ISO9660+FAT disk image: a protective MBR
//! with a VBR fix-up, a primary and secondary GPT, the 32 KiB ISO 9660
//! region, and the already-built FAT partition, laid out back to back in
//! one output buffer.

use chrono::{DateTime, Utc};
use mkimg_common::{is_loader_signature, put_u32_le, MkimgError, Result};
use mkimg_part::{
    entry_array_crc32, GptHeader, GptPartitionEntry, Guid, MbrPartition, MbrPartitionTable,
    MbrPartitionType,
};
use tracing::warn;

use crate::region::build_iso_region;

const SECTOR: usize = 512;
const GPT_SECTORS: usize = 63;
const GPT_BYTES: usize = GPT_SECTORS * SECTOR;
const ISO_REGION_OFFSET: usize = SECTOR + GPT_BYTES; // 32768
const ESP_START_LBA: u64 = 128;
const ESP_START_BYTE: usize = ESP_START_LBA as usize * SECTOR; // 65536
const STAGE2_FALLBACK_OFFSET: usize = 16384;
const MIN_DISK_BYTES: u64 = 64 * 1024 * 1024;

/// Builds a full hybrid disk image.
///
/// `fat_partition` is the already-built `bootpart.bin` contents (or
/// `None` if it hasn't been built yet — the disk is still emitted, just
/// non-bootable). `stage1_loader` is `boot.bin`; `stage2_fallback` is the
/// optional `bootboot.bin` copied into the GPT padding region when no
/// stage-2 loader is found inside the FAT partition.
pub fn assemble_disk(
    disk_size_bytes: u64,
    fat_partition: Option<&[u8]>,
    stage1_loader: Option<&[u8]>,
    stage2_fallback: Option<&[u8]>,
    now: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let disk_size_bytes = disk_size_bytes.max(MIN_DISK_BYTES);
    if disk_size_bytes > usize::MAX as u64 {
        return Err(MkimgError::config("requested disk size is too large"));
    }
    let disk_size = disk_size_bytes as usize;
    let fat_bytes = fat_partition.map(|b| b.len()).unwrap_or(0);

    let stage2_lba = locate_stage2(fat_partition, stage2_fallback.is_some());
    if stage2_lba % 4 != 0 {
        return Err(MkimgError::Io(std::io::Error::other(
            "stage-2 loader LBA is not a multiple of 4",
        )));
    }

    let disk_signature = now.timestamp() as u32;
    let mbr_sector = build_mbr_sector(stage1_loader, stage2_lba, disk_signature, fat_partition);
    let fat_partition_fixed = fat_partition.map(|fat| apply_vbr_fixup(fat, stage1_loader));

    let mut disk = vec![0u8; disk_size];
    disk[0..SECTOR].copy_from_slice(&mbr_sector);

    let esp_entry = fat_partition.is_some().then(|| {
        GptPartitionEntry::new(
            Guid::EFI_SYSTEM_PARTITION,
            Guid::from_timestamp(disk_signature, 1),
            ESP_START_LBA,
            ESP_START_LBA + (fat_bytes / SECTOR) as u64 - 1,
            "EFI System Partition",
        )
    });
    let entries = build_gpt_entries(esp_entry.as_ref());
    let last_lba = (disk_size / SECTOR) as u64 - 1;
    let mut primary_header =
        build_gpt_header(1, last_lba, esp_entry.as_ref(), disk_signature);
    primary_header.finalize_crc();
    disk[SECTOR..SECTOR + GptHeader::SIZE].copy_from_slice(&primary_header.as_bytes());
    disk[SECTOR + SECTOR..SECTOR + SECTOR + entries.len()].copy_from_slice(&entries);

    let iso_region = build_iso_region(fat_bytes as u64, now);
    disk[ISO_REGION_OFFSET..ISO_REGION_OFFSET + iso_region.len()].copy_from_slice(&iso_region);

    if let (Some(s2), true) = (stage2_fallback, stage2_lba * SECTOR as u64 == STAGE2_FALLBACK_OFFSET as u64) {
        let end = (STAGE2_FALLBACK_OFFSET + s2.len()).min(ISO_REGION_OFFSET);
        disk[STAGE2_FALLBACK_OFFSET..end]
            .copy_from_slice(&s2[..end - STAGE2_FALLBACK_OFFSET]);
    }

    if let Some(fat) = fat_partition_fixed.as_ref() {
        disk[ESP_START_BYTE..ESP_START_BYTE + fat.len()].copy_from_slice(fat);
    }

    let tail_start = disk_size - GPT_BYTES;
    let entries_tail_len = GPT_BYTES - GptHeader::SIZE;
    disk[tail_start..tail_start + entries_tail_len].copy_from_slice(&entries);

    let mut secondary_header = primary_header;
    secondary_header.current_lba = mkimg_common::U64::new(last_lba);
    secondary_header.backup_lba = mkimg_common::U64::new(1);
    secondary_header.partition_entry_lba = mkimg_common::U64::new(last_lba - GPT_SECTORS as u64 + 1);
    secondary_header.finalize_crc();
    disk[disk_size - GptHeader::SIZE..disk_size].copy_from_slice(&secondary_header.as_bytes());

    if stage1_loader.is_none() {
        warn!("no stage-1 loader supplied; disk will not be bootable from BIOS");
    }

    Ok(disk)
}

/// Scans `fat_partition` in 512-byte strides for the loader signature and
/// returns its LBA, assuming the partition starts at LBA 128. Falls back
/// to LBA 32 (the GPT padding region) if `have_stage2_fallback`, else 0.
fn locate_stage2(fat_partition: Option<&[u8]>, have_stage2_fallback: bool) -> u64 {
    if let Some(fat) = fat_partition {
        let mut offset = 0usize;
        while offset + 512 <= fat.len() {
            if is_loader_signature(&fat[offset..]) {
                return (offset as u64 + ESP_START_BYTE as u64) / SECTOR as u64;
            }
            offset += SECTOR;
        }
    }
    if have_stage2_fallback {
        (STAGE2_FALLBACK_OFFSET / SECTOR) as u64
    } else {
        warn!("stage-2 loader not found in FAT partition and no fallback supplied");
        0
    }
}

fn build_mbr_sector(
    stage1_loader: Option<&[u8]>,
    stage2_lba: u64,
    disk_signature: u32,
    fat_partition: Option<&[u8]>,
) -> [u8; SECTOR] {
    let mut mbr = [0u8; SECTOR];
    if let Some(s1) = stage1_loader {
        let n = s1.len().min(SECTOR);
        mbr[..n].copy_from_slice(&s1[..n]);
        for b in &mut mbr[0x1B8..0x1FE] {
            *b = 0;
        }
    }
    put_u32_le(&mut mbr, 0x1B0, stage2_lba as u32);
    put_u32_le(&mut mbr, 0x1B8, disk_signature);
    mbr[0x1FE] = 0x55;
    mbr[0x1FF] = 0xAA;

    let mut table = MbrPartitionTable::new([MbrPartition::default(); 4]);
    let mut slot = 0;
    if let Some(fat) = fat_partition {
        let is_fat16 = fat.len() > 0x39 && fat[0x39] == b'1';
        let partition_type = if is_fat16 {
            MbrPartitionType::Fat16
        } else {
            MbrPartitionType::Fat32Lba
        };
        table[slot] = MbrPartition::new(
            true,
            partition_type,
            ESP_START_LBA as u32,
            (fat.len() / SECTOR) as u32,
        );
        slot += 1;
    }
    table[slot] = MbrPartition::new(false, MbrPartitionType::ProtectiveGpt, 1, GPT_SECTORS as u32);
    mbr[MbrPartitionTable::OFFSET..MbrPartitionTable::OFFSET + MbrPartitionTable::SIZE]
        .copy_from_slice(table.as_bytes());

    mbr
}

/// Copies the jump+OEM and loader body of stage-1 over the FAT
/// partition's first sector, leaving the BPB itself untouched.
fn apply_vbr_fixup(fat: &[u8], stage1_loader: Option<&[u8]>) -> Vec<u8> {
    let mut fat = fat.to_vec();
    if let Some(s1) = stage1_loader {
        let n = 10.min(s1.len()).min(fat.len());
        fat[..n].copy_from_slice(&s1[..n]);
        if s1.len() >= 0x1B8 && fat.len() >= 0x1B8 {
            fat[0x5A..0x1B8].copy_from_slice(&s1[0x5A..0x1B8]);
        }
    }
    if fat.len() >= 0x200 {
        fat[0x1FE] = 0x55;
        fat[0x1FF] = 0xAA;
    }
    fat
}

fn build_gpt_entries(esp_entry: Option<&GptPartitionEntry>) -> Vec<u8> {
    let mut buf = vec![0u8; GPT_BYTES - GptHeader::SIZE];
    if let Some(entry) = esp_entry {
        buf[0..GptPartitionEntry::SIZE].copy_from_slice(&entry.as_bytes());
    }
    buf
}

fn build_gpt_header(
    current_lba: u64,
    backup_lba: u64,
    esp_entry: Option<&GptPartitionEntry>,
    disk_signature: u32,
) -> GptHeader {
    let last_lba = backup_lba.max(current_lba);
    let first_usable = GPT_SECTORS as u64 + 1;
    let last_usable = last_lba - GPT_SECTORS as u64;
    let disk_guid = Guid::from_timestamp(disk_signature, 0);
    let entry_slice = esp_entry.map(std::slice::from_ref).unwrap_or(&[]);
    let mut header = GptHeader::new(
        current_lba,
        backup_lba,
        first_usable,
        last_usable,
        disk_guid,
        2,
        entry_slice.len() as u32,
    );
    header.partition_entry_array_crc32 = mkimg_common::U32::new(entry_array_crc32(entry_slice));
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn disk_has_mbr_signature() {
        let disk = assemble_disk(64 * 1024 * 1024, None, None, None, fixed_time()).unwrap();
        assert_eq!(&disk[0x1FE..0x200], &[0x55, 0xAA]);
    }

    #[test]
    fn primary_and_secondary_gpt_headers_validate() {
        let disk = assemble_disk(64 * 1024 * 1024, None, None, None, fixed_time()).unwrap();
        assert_eq!(&disk[SECTOR..SECTOR + 8], b"EFI PART");
        let last_lba_off = disk.len() - GptHeader::SIZE;
        assert_eq!(&disk[last_lba_off..last_lba_off + 8], b"EFI PART");
    }

    #[test]
    fn iso_region_identifies_as_bootboot_cd() {
        let disk = assemble_disk(64 * 1024 * 1024, None, None, None, fixed_time()).unwrap();
        let pvd = &disk[ISO_REGION_OFFSET..];
        assert_eq!(&pvd[40..51], b"BOOTBOOT_CD");
    }

    #[test]
    fn disk_is_at_least_64_mib() {
        let disk = assemble_disk(1, None, None, None, fixed_time()).unwrap();
        assert_eq!(disk.len() as u64, MIN_DISK_BYTES);
    }

    #[test]
    fn stub_loader_produces_bootable_mbr_partition_entry() {
        let fat = vec![0u8; 16 * 1024 * 1024];
        let stage1 = vec![0u8; 440];
        let disk = assemble_disk(
            64 * 1024 * 1024,
            Some(&fat),
            Some(&stage1),
            None,
            fixed_time(),
        )
        .unwrap();
        let entry_off = SECTOR + MbrPartitionTable::OFFSET;
        assert_eq!(disk[entry_off], 0x80); // bootable
    }
}
