//! A FAT16/FAT32 partition image builder.
//!
//! This is not a general-purpose FAT filesystem: it builds one partition
//! image in one pass from a host directory tree and never mounts or
//! rewrites it afterwards. Long filenames are not supported; every name is
//! mangled down to 8.3.

pub mod builder;
pub mod raw;

pub use builder::{build_fat_image, FatVariant};
