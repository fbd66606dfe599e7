//! On-disk FAT structures: BIOS Parameter Block, FSInfo sector and 8.3
//! directory entries.

pub mod boot_sector;
pub mod constants;
pub mod directory;
pub mod fs_info;

pub use boot_sector::{Bpb16, Bpb32, BpbCommon, BOOT_SECTOR_SIGNATURE, BOOT_SECTOR_SIGNATURE_OFFSET, SECTOR_SIZE};
pub use constants::*;
pub use directory::{attributes, short_name, FatDateTime, RawFileEntry};
pub use fs_info::RawFsInfo;
