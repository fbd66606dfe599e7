//! Host filesystem access: reading a whole file into memory, and listing a
//! directory's immediate entries.
//!
//! This is not a general-purpose filesystem abstraction — just the two
//! operations every verb in this tool needs, with no buffering or streaming
//! since every format this tool writes is built from a fully materialized
//! input buffer.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{MkimgError, Result};

/// Reads `path` entirely into memory.
pub fn read_all(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        MkimgError::Io(std::io::Error::new(
            e.kind(),
            format!("unable to read {}: {e}", path.display()),
        ))
    })
}

/// One entry of a directory listing: its full path and whether it is
/// itself a directory or a regular file.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub path: PathBuf,
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// Lists the immediate entries of `path`, excluding names beginning with
/// `.`. Order is whatever the host filesystem returns — callers must not
/// depend on it.
pub fn iter_dir(path: &Path) -> Result<Vec<DirEntry>> {
    let read_dir = fs::read_dir(path).map_err(|e| {
        MkimgError::Io(std::io::Error::new(
            e.kind(),
            format!("unable to read directory {}: {e}", path.display()),
        ))
    })?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry.file_type()?;
        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };
        entries.push(DirEntry {
            path: entry.path(),
            name,
            kind,
        });
    }
    Ok(entries)
}
