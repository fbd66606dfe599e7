//! One handler per verb. Each opens its inputs, runs the matching builder
//! crate, and writes its output file within its own scope — nothing here
//! outlives a single call.

use std::path::Path;

use mkimg_common::{MkimgError, Result};
use mkimg_fat::FatVariant;
use tracing::warn;

use crate::rom::wrap_rom;

/// Reads `path` if it exists, returning `None` rather than erroring when
/// it doesn't — several of the disk verb's inputs are optional.
fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(MkimgError::Io(e)),
    }
}

pub fn fat(variant: FatVariant, size_mib: u64, src_dir: &Path) -> Result<()> {
    let size_bytes = size_mib.saturating_mul(1024 * 1024);
    let image = mkimg_fat::build_fat_image(variant, size_bytes, src_dir)?;
    std::fs::write("bootpart.bin", &image)?;
    Ok(())
}

pub fn disk(size_mib: u64, out_path: &Path) -> Result<()> {
    let disk_size = size_mib.saturating_mul(1024 * 1024);

    let fat_partition = read_optional(Path::new("bootpart.bin"))?;
    let stage1 = read_optional(Path::new("../others/bootboot/boot.bin"))?;
    let stage2_fallback = read_optional(Path::new("../bootboot.bin"))?;

    if fat_partition.is_none() {
        warn!("bootpart.bin not found, creating disk without a FAT partition");
    }
    if stage1.is_none() {
        warn!("../others/bootboot/boot.bin not found, creating non-bootable disk");
    }

    let now = chrono::Utc::now();
    let disk = mkimg_iso::assemble_disk(
        disk_size,
        fat_partition.as_deref(),
        stage1.as_deref(),
        stage2_fallback.as_deref(),
        now,
    )?;
    std::fs::write(out_path, &disk)?;
    Ok(())
}

pub fn rom() -> Result<()> {
    let payload = match std::fs::read("initrd.bin") {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MkimgError::resource("initrd.bin not found"));
        }
        Err(e) => return Err(MkimgError::Io(e)),
    };
    let rom = wrap_rom(&payload);
    std::fs::write("initrd.rom", &rom)?;
    Ok(())
}

pub fn check(kernel_path: &Path) -> Result<()> {
    let report = mkimg_kernel::check_kernel(kernel_path)?;
    println!("{}", report.text());
    Ok(())
}
