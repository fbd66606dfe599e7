//! Wraps an initial-ramdisk payload as a legacy PC option ROM: a
//! signature, an 8-bit checksum trailer, an identifier tag, and
//! 512-byte padding.

const BLOCK_SIZE: usize = 512;
const HEADER_SIZE: usize = 32;

/// Far-return stub (`xor ax, ax; retf`) option ROM firmware jumps to and
/// immediately returns from — this ROM carries data, not executable init
/// code.
const FAR_RETURN_STUB: [u8; 3] = [0x31, 0xC0, 0xCB];

/// Wraps `payload` as a PC option ROM of size `ceil((len + 32) / 512) *
/// 512`, with the payload itself starting at byte 32.
pub fn wrap_rom(payload: &[u8]) -> Vec<u8> {
    let total_len = payload.len() + HEADER_SIZE;
    let padded_len = total_len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    let block_count = (padded_len / BLOCK_SIZE) as u8;

    let mut rom = vec![0u8; padded_len];
    rom[0] = 0x55;
    rom[1] = 0xAA;
    rom[2] = block_count;
    rom[3..6].copy_from_slice(&FAR_RETURN_STUB);
    rom[8..14].copy_from_slice(b"INITRD");
    rom[16..20].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    rom[HEADER_SIZE..HEADER_SIZE + payload.len()].copy_from_slice(payload);

    let sum: u32 = rom.iter().map(|&b| b as u32).sum();
    rom[6] = (256 - (sum % 256)) as u8;
    rom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_hello_initrd() {
        let payload = b"HELLO-INITRD\0\0\0\0";
        let rom = wrap_rom(payload);
        assert_eq!(rom.len(), 512);
        assert_eq!(rom[2], 1);
        assert_eq!(&rom[8..14], b"INITRD");
        let sum: u32 = rom.iter().map(|&b| b as u32).sum();
        assert_eq!(sum % 256, 0);
    }

    #[test]
    fn pads_to_next_512_byte_boundary() {
        let rom = wrap_rom(&[0u8; 1000]);
        assert_eq!(rom.len(), 1536); // ceil((1000+32)/512) * 512
        assert_eq!(rom[2], 3);
    }

    #[test]
    fn empty_payload_still_has_header_block() {
        let rom = wrap_rom(&[]);
        assert_eq!(rom.len(), 512);
        let len_field = u32::from_le_bytes(rom[16..20].try_into().unwrap());
        assert_eq!(len_field, 0);
    }
}
