//! ISO 9660/El Torito region construction and hybrid disk assembly.
//!
//! This crate owns the 32 KiB CD-ROM region of a BOOTBOOT hybrid image (the
//! primary volume descriptor, boot record, El Torito catalog, root
//! directory and README) and the top-level assembly that stitches it
//! together with a protective MBR, a GPT, and an already-built FAT
//! partition into one disk image.

pub mod disk;
pub mod region;

pub use disk::assemble_disk;
pub use region::build_iso_region;
