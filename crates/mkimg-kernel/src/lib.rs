//! Parses an ELF64 or PE32+ kernel executable and classifies it against
//! the two conformance levels of the protocol this tool builds images
//! for. Advisory only: nothing in this crate mutates the kernel it reads.

pub mod arch;
pub mod raw;
mod report;
mod validate;

use std::path::Path;

use mkimg_common::{read_all, Result};

pub use arch::Arch;
pub use report::{Conformance, Format, Report};
pub use validate::{Segment, Symbols};

/// Reads `path` and produces a full conformance report. The only failure
/// mode is the file being unreadable; a malformed or non-conforming
/// kernel still produces a `Report` (with `conformance: None`) rather
/// than an error, matching the advisory nature of the `check` verb.
pub fn check_kernel(path: &Path) -> Result<Report> {
    let data = read_all(path)?;
    Ok(validate::check(&data))
}
