//! Builds a FAT16 or FAT32 partition image from a host directory.
//!
//! This walks the source tree with an explicit stack of pending frames
//! instead of native recursion (see the module-level design note in
//! `SPEC_FULL.md` §9), so a deep host tree never grows the Rust call
//! stack. Cluster allocation, FAT table maintenance and directory-entry
//! writing are all done in one forward pass; nothing is ever rewritten.

use std::path::Path;

use mkimg_common::{iter_dir, read_all, DirEntry, EntryKind, MkimgError, Result};
use tracing::{debug, trace};

use crate::raw::{
    attributes, fat16, fat32, is_loader_signature, short_name, Bpb16, Bpb32, BpbCommon,
    FatDateTime, RawFileEntry, RawFsInfo, BOOT_SECTOR_SIGNATURE, BOOT_SECTOR_SIGNATURE_OFFSET,
    FAT16_RESERVED_SECTORS, FAT16_ROOT_ENTRY_COUNT, FAT16_SECTORS_PER_CLUSTER,
    FAT32_BACKUP_BOOT_SECTOR, FAT32_FS_INFO_SECTOR, FAT32_RESERVED_SECTORS,
    FAT32_SECTORS_PER_CLUSTER, HIDDEN_SECTORS, LOADER_ALIGNMENT, MEDIA_DESCRIPTOR, NUM_FATS,
    SECTOR_SIZE,
};

const MIB: u64 = 1024 * 1024;

/// Fixed volume serial number this tool stamps on every partition it
/// builds (`0xB0 0x07 0xB0 0x07` as the on-disk little-endian bytes),
/// taken verbatim from the reference `mkimg` tool rather than derived
/// from any entropy source.
const VOLUME_SERIAL: u32 = 0x07B0_07B0;
const VOLUME_LABEL: [u8; 11] = *b"EFI System ";

/// Which FAT variant a partition image is built as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatVariant {
    Fat16,
    Fat32,
}

impl FatVariant {
    fn sectors_per_cluster(self) -> u8 {
        match self {
            FatVariant::Fat16 => FAT16_SECTORS_PER_CLUSTER,
            FatVariant::Fat32 => FAT32_SECTORS_PER_CLUSTER,
        }
    }

    fn reserved_sectors(self) -> u16 {
        match self {
            FatVariant::Fat16 => FAT16_RESERVED_SECTORS,
            FatVariant::Fat32 => FAT32_RESERVED_SECTORS,
        }
    }
}

/// Clamps `(variant, size_bytes)` to the protocol's minimum partition
/// sizes, upgrading FAT16 to FAT32 once the requested size reaches 32
/// MiB. Mirrors the reference tool's clamps exactly, including their
/// evaluation order.
fn clamp(mut variant: FatVariant, mut size_bytes: u64) -> (FatVariant, u64) {
    if variant == FatVariant::Fat16 && size_bytes < 16 * MIB {
        size_bytes = 16 * MIB;
    }
    if variant == FatVariant::Fat16 && size_bytes >= 32 * MIB {
        variant = FatVariant::Fat32;
    }
    if variant == FatVariant::Fat32 && size_bytes < 33 * MIB {
        size_bytes = 33 * MIB;
    }
    (variant, size_bytes)
}

/// The on-disk geometry derived from a partition size and variant. Every
/// field here is computed, never configured directly.
struct Geometry {
    variant: FatVariant,
    partition_bytes: u64,
    bytes_per_cluster: u32,
    reserved_sectors: u16,
    sectors_per_fat: u32,
    fat1_offset: usize,
    fat2_offset: usize,
    fat_bytes: usize,
    /// Start of the root directory region (FAT16) or cluster 2 (FAT32).
    root_dir_offset: usize,
    /// Byte offset of cluster 2 — the first heap cluster.
    heap_offset: usize,
    total_data_clusters: u32,
}

impl Geometry {
    fn compute(variant: FatVariant, partition_bytes: u64) -> Self {
        let sectors_per_cluster = variant.sectors_per_cluster();
        let bytes_per_cluster = sectors_per_cluster as u32 * SECTOR_SIZE as u32;
        let reserved_sectors = variant.reserved_sectors();
        let fat1_offset = reserved_sectors as usize * SECTOR_SIZE;

        let cluster_estimate = partition_bytes / bytes_per_cluster as u64;
        let sectors_per_fat: u32 = match variant {
            FatVariant::Fat16 => (((cluster_estimate * 2) + 511) / 512) as u32,
            FatVariant::Fat32 => ((cluster_estimate * 4) / 512).saturating_sub(8) as u32,
        };
        let fat_bytes = sectors_per_fat as usize * SECTOR_SIZE;
        let fat2_offset = fat1_offset + fat_bytes;

        let (root_dir_offset, heap_offset) = match variant {
            FatVariant::Fat16 => {
                let root_dir_offset = fat2_offset + fat_bytes;
                let root_dir_region_bytes = FAT16_ROOT_ENTRY_COUNT as usize * RawFileEntry::SIZE;
                (root_dir_offset, root_dir_offset + root_dir_region_bytes)
            }
            FatVariant::Fat32 => {
                let heap_offset = fat2_offset + fat_bytes;
                (heap_offset, heap_offset)
            }
        };

        let total_data_clusters =
            ((partition_bytes as usize - heap_offset) / bytes_per_cluster as usize) as u32;

        Self {
            variant,
            partition_bytes,
            bytes_per_cluster,
            reserved_sectors,
            sectors_per_fat,
            fat1_offset,
            fat2_offset,
            fat_bytes,
            root_dir_offset,
            heap_offset,
            total_data_clusters,
        }
    }

    /// The byte offset of `cluster`'s first byte within the partition.
    fn cluster_offset(&self, cluster: u32) -> usize {
        self.heap_offset + (cluster as usize - 2) * self.bytes_per_cluster as usize
    }
}

/// Builds a FAT16/FAT32 partition image of (at least) `size_bytes`,
/// populated from `source_dir`.
pub fn build_fat_image(variant: FatVariant, size_bytes: u64, source_dir: &Path) -> Result<Vec<u8>> {
    let (variant, partition_bytes) = clamp(variant, size_bytes);
    debug!(?variant, partition_bytes, "building FAT partition image");

    if partition_bytes > usize::MAX as u64 {
        return Err(MkimgError::config("requested partition size is too large"));
    }
    let geometry = Geometry::compute(variant, partition_bytes);
    let mut image = vec![0u8; partition_bytes as usize];

    write_boot_sector(&mut image, &geometry);
    init_reserved_fat_entries(&mut image, &geometry);

    let now = chrono::Utc::now();
    let timestamp = FatDateTime::new(
        now.format("%Y").to_string().parse().unwrap_or(1980),
        now.format("%m").to_string().parse().unwrap_or(1),
        now.format("%d").to_string().parse().unwrap_or(1),
        now.format("%H").to_string().parse().unwrap_or(0),
        now.format("%M").to_string().parse().unwrap_or(0),
        now.format("%S").to_string().parse().unwrap_or(0),
    );

    // Volume label entry, first record of the root directory.
    write_dir_entry(
        &mut image,
        geometry.root_dir_offset,
        VOLUME_LABEL,
        attributes::VOLUME_ID,
        0,
        0,
        timestamp,
    );

    let mut next_cluster: u32 = 3;
    populate(&mut image, &geometry, source_dir, &mut next_cluster, timestamp)?;

    if variant == FatVariant::Fat32 {
        finalize_fs_info(&mut image, &geometry, next_cluster);
    }

    Ok(image)
}

fn write_boot_sector(image: &mut [u8], geo: &Geometry) {
    let total_sectors = (geo.partition_bytes + SECTOR_SIZE as u64 - 1) / SECTOR_SIZE as u64;

    let jmp_boot = match geo.variant {
        FatVariant::Fat16 => [0xEB, 0x3C, 0x90],
        FatVariant::Fat32 => [0xEB, 0x58, 0x90],
    };
    let common = BpbCommon {
        jmp_boot,
        oem_name: *b"MSWIN4.1",
        bytes_per_sector: mkimg_common::U16::new(SECTOR_SIZE as u16),
        sectors_per_cluster: geo.variant.sectors_per_cluster(),
        reserved_sector_count: mkimg_common::U16::new(geo.reserved_sectors),
        num_fats: NUM_FATS,
        root_entry_count: mkimg_common::U16::new(match geo.variant {
            FatVariant::Fat16 => FAT16_ROOT_ENTRY_COUNT,
            FatVariant::Fat32 => 0,
        }),
        total_sectors_16: mkimg_common::U16::new(if geo.variant == FatVariant::Fat16 {
            total_sectors as u16
        } else {
            0
        }),
        media: MEDIA_DESCRIPTOR,
        fat_size_16: mkimg_common::U16::new(if geo.variant == FatVariant::Fat16 {
            geo.sectors_per_fat as u16
        } else {
            0
        }),
        sectors_per_track: mkimg_common::U16::new(0x20),
        num_heads: mkimg_common::U16::new(0x40),
        hidden_sectors: mkimg_common::U32::new(HIDDEN_SECTORS),
        total_sectors_32: mkimg_common::U32::new(if geo.variant == FatVariant::Fat32 {
            total_sectors as u32
        } else {
            0
        }),
    };
    image[0..BpbCommon::SIZE].copy_from_slice(bytemuck::bytes_of(&common));

    match geo.variant {
        FatVariant::Fat16 => {
            let bpb16 = Bpb16 {
                drive_number: 0x80,
                reserved1: 0,
                boot_signature: Bpb16::BOOT_SIGNATURE,
                volume_id: mkimg_common::U32::new(VOLUME_SERIAL),
                volume_label: VOLUME_LABEL,
                fs_type: *b"FAT16   ",
            };
            let off = BpbCommon::SIZE;
            image[off..off + Bpb16::SIZE].copy_from_slice(bytemuck::bytes_of(&bpb16));
        }
        FatVariant::Fat32 => {
            let bpb32 = Bpb32 {
                fat_size_32: mkimg_common::U32::new(geo.sectors_per_fat),
                ext_flags: mkimg_common::U16::ZERO,
                fs_version: mkimg_common::U16::ZERO,
                root_cluster: mkimg_common::U32::new(2),
                fs_info: mkimg_common::U16::new(FAT32_FS_INFO_SECTOR),
                backup_boot_sector: mkimg_common::U16::new(FAT32_BACKUP_BOOT_SECTOR),
                reserved: [0; 12],
                drive_number: 0x80,
                reserved1: 0,
                boot_signature: Bpb32::BOOT_SIGNATURE,
                volume_id: mkimg_common::U32::new(VOLUME_SERIAL),
                volume_label: VOLUME_LABEL,
                fs_type: *b"FAT32   ",
            };
            let off = BpbCommon::SIZE;
            image[off..off + Bpb32::SIZE].copy_from_slice(bytemuck::bytes_of(&bpb32));
        }
    }

    image[BOOT_SECTOR_SIGNATURE_OFFSET..BOOT_SECTOR_SIGNATURE_OFFSET + 2]
        .copy_from_slice(&BOOT_SECTOR_SIGNATURE);

    if geo.variant == FatVariant::Fat32 {
        let fs_info = RawFsInfo::new(0xFFFF_FFFF, 0xFFFF_FFFF);
        let fs_info_offset = FAT32_FS_INFO_SECTOR as usize * SECTOR_SIZE;
        image[fs_info_offset..fs_info_offset + RawFsInfo::SIZE]
            .copy_from_slice(&fs_info.as_bytes());

        let backup_offset = FAT32_BACKUP_BOOT_SECTOR as usize * SECTOR_SIZE;
        let (head, tail) = image.split_at_mut(backup_offset);
        tail[0..SECTOR_SIZE].copy_from_slice(&head[0..SECTOR_SIZE]);
    }
}

/// Sets clusters 0 and 1 (and 2, for FAT32) in both FAT copies to the
/// media-descriptor / reserved / end markers specified for this variant.
fn init_reserved_fat_entries(image: &mut [u8], geo: &Geometry) {
    match geo.variant {
        FatVariant::Fat16 => {
            set_fat16_entry(image, geo, 0, fat16::CLUSTER_RESERVED);
            set_fat16_entry(image, geo, 1, fat16::CLUSTER_END);
        }
        FatVariant::Fat32 => {
            set_fat32_entry(image, geo, 0, fat32::CLUSTER_RESERVED);
            set_fat32_entry(image, geo, 1, fat32::CLUSTER_END);
            set_fat32_entry(image, geo, 2, fat32::CLUSTER_RESERVED);
        }
    }
}

fn set_fat16_entry(image: &mut [u8], geo: &Geometry, cluster: u32, value: u16) {
    let rel = cluster as usize * 2;
    image[geo.fat1_offset + rel..geo.fat1_offset + rel + 2].copy_from_slice(&value.to_le_bytes());
    image[geo.fat2_offset + rel..geo.fat2_offset + rel + 2].copy_from_slice(&value.to_le_bytes());
}

fn set_fat32_entry(image: &mut [u8], geo: &Geometry, cluster: u32, value: u32) {
    let rel = cluster as usize * 4;
    image[geo.fat1_offset + rel..geo.fat1_offset + rel + 4].copy_from_slice(&value.to_le_bytes());
    image[geo.fat2_offset + rel..geo.fat2_offset + rel + 4].copy_from_slice(&value.to_le_bytes());
}

fn set_fat_entry(image: &mut [u8], geo: &Geometry, cluster: u32, value: u32) {
    match geo.variant {
        FatVariant::Fat16 => set_fat16_entry(image, geo, cluster, value as u16),
        FatVariant::Fat32 => set_fat32_entry(image, geo, cluster, value),
    }
}

fn chain_terminator(variant: FatVariant) -> u32 {
    match variant {
        FatVariant::Fat16 => fat16::CLUSTER_END as u32,
        FatVariant::Fat32 => fat32::CLUSTER_END,
    }
}

fn write_dir_entry(
    image: &mut [u8],
    offset: usize,
    name: [u8; 11],
    attrs: u8,
    cluster: u32,
    size: u32,
    timestamp: FatDateTime,
) {
    let entry = RawFileEntry::new(name, attrs, cluster, size, timestamp);
    image[offset..offset + RawFileEntry::SIZE].copy_from_slice(bytemuck::bytes_of(&entry));
}

/// One level of the explicit directory-walk stack: the cursor where the
/// next entry of this directory gets written, the cluster its ".." entry
/// should point at, and the host entries not yet processed.
struct DirFrame {
    cursor: usize,
    parent_cluster: u32,
    pending: Vec<DirEntry>,
}

fn populate(
    image: &mut Vec<u8>,
    geo: &Geometry,
    source_dir: &Path,
    next_cluster: &mut u32,
    timestamp: FatDateTime,
) -> Result<()> {
    let root_pending = iter_dir(source_dir)?;
    let mut stack = vec![DirFrame {
        cursor: geo.root_dir_offset + RawFileEntry::SIZE,
        parent_cluster: 0,
        pending: root_pending,
    }];

    while let Some(mut frame) = stack.pop() {
        let Some(entry) = frame.pending.pop() else {
            continue;
        };
        let write_cursor = frame.cursor;
        frame.cursor += RawFileEntry::SIZE;

        match entry.kind {
            EntryKind::Dir => {
                let dir_cluster = *next_cluster;
                *next_cluster += 1;
                set_fat_entry(image, geo, dir_cluster, chain_terminator(geo.variant));

                write_dir_entry(
                    image,
                    write_cursor,
                    short_name(&entry.name),
                    attributes::DIRECTORY,
                    dir_cluster,
                    0,
                    timestamp,
                );

                let child_offset = geo.cluster_offset(dir_cluster);
                write_dir_entry(
                    image,
                    child_offset,
                    short_name("."),
                    attributes::DIRECTORY,
                    dir_cluster,
                    0,
                    timestamp,
                );
                write_dir_entry(
                    image,
                    child_offset + RawFileEntry::SIZE,
                    short_name(".."),
                    attributes::DIRECTORY,
                    frame.parent_cluster,
                    0,
                    timestamp,
                );

                let child_pending = iter_dir(&entry.path)?;
                stack.push(frame);
                stack.push(DirFrame {
                    cursor: child_offset + 2 * RawFileEntry::SIZE,
                    parent_cluster: dir_cluster,
                    pending: child_pending,
                });
            }
            EntryKind::File => {
                let contents = read_all(&entry.path)?;
                let start_cluster =
                    align_loader_if_needed(geo, next_cluster, &contents);

                write_dir_entry(
                    image,
                    write_cursor,
                    short_name(&entry.name),
                    0,
                    start_cluster,
                    contents.len() as u32,
                    timestamp,
                );

                write_file_chain(image, geo, next_cluster, start_cluster, &contents);
                stack.push(frame);
            }
        }
    }
    Ok(())
}

/// If `contents` begins with the loader signature and the cluster the
/// next allocation would land on is not yet 2048-byte aligned within the
/// partition, advances `next_cluster` past the gap. The skipped clusters
/// are left free in the FAT — this is a documented open question in
/// `SPEC_FULL.md` §9, not an oversight.
fn align_loader_if_needed(geo: &Geometry, next_cluster: &mut u32, contents: &[u8]) -> u32 {
    if is_loader_signature(contents) {
        let offset = geo.cluster_offset(*next_cluster);
        if offset % LOADER_ALIGNMENT != 0 {
            let pad = LOADER_ALIGNMENT - (offset % LOADER_ALIGNMENT);
            let skip_clusters = pad / geo.bytes_per_cluster as usize;
            trace!(skip_clusters, "aligning loader file to 2048-byte boundary");
            *next_cluster += skip_clusters as u32;
        }
    }
    *next_cluster
}

fn write_file_chain(
    image: &mut Vec<u8>,
    geo: &Geometry,
    next_cluster: &mut u32,
    start_cluster: u32,
    contents: &[u8],
) {
    if contents.is_empty() {
        // A zero-byte file still gets a starting cluster pointing at an
        // (empty) chain terminator, matching the source's unconditional
        // cluster allocation for every regular file it encounters.
        set_fat_entry(image, geo, start_cluster, chain_terminator(geo.variant));
        *next_cluster = start_cluster + 1;
        return;
    }

    let bpc = geo.bytes_per_cluster as usize;
    let mut cluster = start_cluster;
    let mut remaining = contents;
    loop {
        let offset = geo.cluster_offset(cluster);
        let chunk_len = remaining.len().min(bpc);
        image[offset..offset + chunk_len].copy_from_slice(&remaining[..chunk_len]);
        remaining = &remaining[chunk_len..];
        if remaining.is_empty() {
            set_fat_entry(image, geo, cluster, chain_terminator(geo.variant));
            cluster += 1;
            break;
        }
        set_fat_entry(image, geo, cluster, cluster + 1);
        cluster += 1;
    }
    *next_cluster = cluster;
}

fn finalize_fs_info(image: &mut [u8], geo: &Geometry, next_cluster: u32) {
    let used_clusters = next_cluster.saturating_sub(2);
    let free_count = geo.total_data_clusters.saturating_sub(used_clusters);
    let next_free = next_cluster.saturating_sub(1);
    let fs_info = RawFsInfo::new(free_count, next_free);
    let fs_info_offset = FAT32_FS_INFO_SECTOR as usize * SECTOR_SIZE;
    image[fs_info_offset..fs_info_offset + RawFsInfo::SIZE].copy_from_slice(&fs_info.as_bytes());
}
