//! The FAT32 FS Information Sector (reserved sector 1, mirrored nowhere).

use mkimg_common::{LittleEndian, U32};

#[repr(C, packed)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct RawFsInfo {
    /// FSI_LeadSig: must be "RRaA".
    pub signature: [u8; 4],
    pub reserved1: [u8; 480],
    /// FSI_StrucSig: must be "rrAa".
    pub structure_signature: [u8; 4],
    /// FSI_Free_Count: last-known count of free clusters, or 0xFFFFFFFF if
    /// unknown. This tool always fills in an exact count.
    pub free_count: U32<LittleEndian>,
    /// FSI_Nxt_Free: hint for the next cluster to search from.
    pub next_free: U32<LittleEndian>,
    pub reserved2: [u8; 12],
    /// FSI_TrailSig: must be 0xAA550000.
    pub trail_signature: [u8; 4],
}

impl RawFsInfo {
    pub const SIZE: usize = 512;
    pub const LEAD_SIGNATURE: [u8; 4] = *b"RRaA";
    pub const STRUCT_SIGNATURE: [u8; 4] = *b"rrAa";
    pub const TRAIL_SIGNATURE: [u8; 4] = [0x00, 0x00, 0x55, 0xAA];

    pub fn new(free_count: u32, next_free: u32) -> Self {
        Self {
            signature: Self::LEAD_SIGNATURE,
            reserved1: [0; 480],
            structure_signature: Self::STRUCT_SIGNATURE,
            free_count: U32::new(free_count),
            next_free: U32::new(next_free),
            reserved2: [0; 12],
            trail_signature: Self::TRAIL_SIGNATURE,
        }
    }

    pub fn as_bytes(&self) -> [u8; Self::SIZE] {
        bytemuck::cast(*self)
    }
}
