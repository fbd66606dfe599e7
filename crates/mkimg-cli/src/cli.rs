//! The four-verb command surface: argument shapes only, no domain logic.
//! Each variant borrows straight from `SPEC_FULL.md` §6.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "mkimg",
    about = "Creates hybrid disk/CD-ROM images and FAT partitions for the BOOTBOOT-compatible boot protocol"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Raise the log level from WARN to TRACE.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Assemble a hybrid MBR+GPT+ISO9660+FAT disk image.
    Disk {
        size_mib: u64,
        out_path: PathBuf,
    },
    /// Build a FAT16 boot partition image from a host directory.
    Fat16 { size_mib: u64, src_dir: PathBuf },
    /// Build a FAT32 boot partition image from a host directory.
    Fat32 { size_mib: u64, src_dir: PathBuf },
    /// Wrap initrd.bin as a PC option ROM.
    Rom,
    /// Print a BOOTBOOT conformance report for a kernel executable.
    Check { kernel_path: PathBuf },
}
