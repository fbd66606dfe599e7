//! MBR and GPT on-disk structures.
//!
//! These cover only the shapes `mkimg` itself needs to write: a protective
//! MBR with a bootable FAT entry and a protective GPT entry, and a GPT
//! header/entry pair with exactly one partition (the EFI System
//! Partition). Parsing is included for the tests and for recomputing CRCs,
//! not as a general partition-table reader.

pub mod gpt;
pub mod mbr;

pub use gpt::{entry_array_crc32, GptHeader, GptPartitionEntry, Guid};
pub use mbr::{Chs, MbrPartition, MbrPartitionTable, MbrPartitionType};
