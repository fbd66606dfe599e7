//! The GUID Partition Table: header at LBA 1 (and a mirror at the last
//! LBA of the disk) plus a 128-byte-per-entry partition array.

use mkimg_common::{crc32, LittleEndian, U32, U64};

/// A GUID in its conventional mixed-endian wire encoding: the first three
/// fields are little-endian, the last two are stored byte-for-byte as
/// given (big-endian order).
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, bytemuck::Zeroable, bytemuck::Pod)]
pub struct Guid([u8; 16]);

impl Guid {
    pub const fn from_fields(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        let d1 = d1.to_le_bytes();
        let d2 = d2.to_le_bytes();
        let d3 = d3.to_le_bytes();
        Self([
            d1[0], d1[1], d1[2], d1[3], d2[0], d2[1], d3[0], d3[1], d4[0], d4[1], d4[2], d4[3],
            d4[4], d4[5], d4[6], d4[7],
        ])
    }

    pub const ZERO: Guid = Guid([0; 16]);

    /// `C12A7328-F81F-11D2-BA4B-00A0C93EC93B`, the EFI System Partition type.
    pub const EFI_SYSTEM_PARTITION: Guid = Guid::from_fields(
        0xC12A_7328,
        0xF81F,
        0x11D2,
        [0xBA, 0x4B, 0x00, 0xA0, 0xC9, 0x3E, 0xC9, 0x3B],
    );

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> [u8; 16] {
        self.0
    }

    /// A disk/partition GUID derived from the build timestamp. Not a real
    /// random UUID (this tool has no entropy source requirement, mirroring
    /// the original `mkimg` which derives disk signatures from `time()`),
    /// but unique per build and structurally a valid GUID.
    pub fn from_timestamp(seed: u32, variant: u8) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&seed.to_le_bytes());
        bytes[4..6].copy_from_slice(&(seed as u16).to_le_bytes());
        bytes[6] = 0x40 | ((seed >> 16) as u8 & 0x0F); // version 4-shaped
        bytes[7] = (seed >> 24) as u8;
        bytes[8] = 0x80 | (variant & 0x3F); // RFC4122 variant
        bytes[9] = variant;
        bytes[10..16].copy_from_slice(&[variant; 6]);
        Self(bytes)
    }
}

impl core::fmt::Debug for Guid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Guid(")?;
        for b in self.0 {
            write!(f, "{b:02X}")?;
        }
        write!(f, ")")
    }
}

/// The 92-byte GPT header.
#[repr(C, packed)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct GptHeader {
    pub signature: [u8; 8],
    pub revision: U32<LittleEndian>,
    pub header_size: U32<LittleEndian>,
    pub header_crc32: U32<LittleEndian>,
    pub reserved: U32<LittleEndian>,
    pub current_lba: U64<LittleEndian>,
    pub backup_lba: U64<LittleEndian>,
    pub first_usable_lba: U64<LittleEndian>,
    pub last_usable_lba: U64<LittleEndian>,
    pub disk_guid: Guid,
    pub partition_entry_lba: U64<LittleEndian>,
    pub num_partition_entries: U32<LittleEndian>,
    pub size_of_partition_entry: U32<LittleEndian>,
    pub partition_entry_array_crc32: U32<LittleEndian>,
}

impl GptHeader {
    pub const SIGNATURE: [u8; 8] = *b"EFI PART";
    pub const SIZE: usize = 92;

    /// Offset of `header_crc32` within the on-disk structure. Used to zero
    /// that field out before recomputing the header's own CRC.
    const CRC32_OFFSET: usize = 16;

    pub fn new(
        current_lba: u64,
        backup_lba: u64,
        first_usable_lba: u64,
        last_usable_lba: u64,
        disk_guid: Guid,
        partition_entry_lba: u64,
        num_partition_entries: u32,
    ) -> Self {
        Self {
            signature: Self::SIGNATURE,
            revision: U32::new(0x0001_0000),
            header_size: U32::new(Self::SIZE as u32),
            header_crc32: U32::ZERO,
            reserved: U32::ZERO,
            current_lba: U64::new(current_lba),
            backup_lba: U64::new(backup_lba),
            first_usable_lba: U64::new(first_usable_lba),
            last_usable_lba: U64::new(last_usable_lba),
            disk_guid,
            partition_entry_lba: U64::new(partition_entry_lba),
            num_partition_entries: U32::new(num_partition_entries),
            size_of_partition_entry: U32::new(GptPartitionEntry::SIZE as u32),
            partition_entry_array_crc32: U32::ZERO,
        }
    }

    /// Recomputes and fills in `header_crc32`, treating the field itself as
    /// zero for the purpose of the computation (the standard GPT rule).
    pub fn finalize_crc(&mut self) {
        self.header_crc32 = U32::ZERO;
        let bytes: [u8; Self::SIZE] = bytemuck::cast(*self);
        let crc = crc32(&bytes);
        self.header_crc32 = U32::new(crc);
    }

    /// Verifies `header_crc32` against a recomputation with the field
    /// zeroed, without mutating `self`.
    pub fn verify_crc(&self) -> bool {
        let mut bytes: [u8; Self::SIZE] = bytemuck::cast(*self);
        let stored = u32::from_le_bytes(
            bytes[Self::CRC32_OFFSET..Self::CRC32_OFFSET + 4]
                .try_into()
                .unwrap(),
        );
        bytes[Self::CRC32_OFFSET..Self::CRC32_OFFSET + 4].copy_from_slice(&[0; 4]);
        crc32(&bytes) == stored
    }

    pub fn as_bytes(&self) -> [u8; Self::SIZE] {
        bytemuck::cast(*self)
    }
}

/// One 128-byte GPT partition entry.
#[repr(C, packed)]
#[derive(Clone, Copy, bytemuck::Zeroable, bytemuck::Pod)]
pub struct GptPartitionEntry {
    pub type_guid: Guid,
    pub unique_partition_guid: Guid,
    pub starting_lba: U64<LittleEndian>,
    pub ending_lba: U64<LittleEndian>,
    pub attributes: U64<LittleEndian>,
    pub partition_name: [U16<LittleEndian>; 36],
}

impl GptPartitionEntry {
    pub const SIZE: usize = 128;

    pub fn new(
        type_guid: Guid,
        unique_partition_guid: Guid,
        starting_lba: u64,
        ending_lba: u64,
        name: &str,
    ) -> Self {
        let mut partition_name = [U16::ZERO; 36];
        for (slot, ch) in partition_name.iter_mut().zip(name.encode_utf16()) {
            *slot = U16::new(ch);
        }
        Self {
            type_guid,
            unique_partition_guid,
            starting_lba: U64::new(starting_lba),
            ending_lba: U64::new(ending_lba),
            attributes: U64::ZERO,
            partition_name,
        }
    }

    pub fn as_bytes(&self) -> [u8; Self::SIZE] {
        bytemuck::cast(*self)
    }
}

/// Computes the CRC-32 of a partition entry array, as stored in
/// [`GptHeader::partition_entry_array_crc32`].
pub fn entry_array_crc32(entries: &[GptPartitionEntry]) -> u32 {
    let mut buf = Vec::with_capacity(entries.len() * GptPartitionEntry::SIZE);
    for entry in entries {
        buf.extend_from_slice(&entry.as_bytes());
    }
    crc32(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_eq_size!(GptHeader, [u8; 92]);
    static_assertions::assert_eq_size!(GptPartitionEntry, [u8; 128]);

    #[test]
    fn header_crc_round_trips() {
        let mut header = GptHeader::new(1, 100, 34, 66, Guid::ZERO, 2, 128);
        header.finalize_crc();
        assert!(header.verify_crc());
    }

    #[test]
    fn entry_array_crc_is_deterministic() {
        let entry = GptPartitionEntry::new(
            Guid::EFI_SYSTEM_PARTITION,
            Guid::from_timestamp(1, 0),
            128,
            128 + 2047,
            "EFI System Partition",
        );
        let a = entry_array_crc32(&[entry]);
        let b = entry_array_crc32(&[entry]);
        assert_eq!(a, b);
    }

    #[test]
    fn efi_system_partition_guid_bytes() {
        // C12A7328-F81F-11D2-BA4B-00A0C93EC93B, mixed-endian wire form.
        assert_eq!(
            Guid::EFI_SYSTEM_PARTITION.as_bytes(),
            [
                0x28, 0x73, 0x2A, 0xC1, 0x1F, 0xF8, 0xD2, 0x11, 0xBA, 0x4B, 0x00, 0xA0, 0xC9,
                0x3E, 0xC9, 0x3B
            ]
        );
    }
}
