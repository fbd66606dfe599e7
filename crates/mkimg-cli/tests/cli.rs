//! End-to-end verb tests that invoke the built `mkimg` binary against a
//! scratch working directory, the way a user actually runs it.

use std::io::Write;
use std::process::Command;

fn mkimg_bin() -> &'static str {
    env!("CARGO_BIN_EXE_mkimg")
}

#[test]
fn rom_verb_wraps_initrd() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::File::create(dir.path().join("initrd.bin"))
        .unwrap()
        .write_all(b"HELLO-INITRD\0\0\0\0")
        .unwrap();

    let status = Command::new(mkimg_bin())
        .arg("rom")
        .current_dir(dir.path())
        .status()
        .unwrap();
    assert!(status.success());

    let rom = std::fs::read(dir.path().join("initrd.rom")).unwrap();
    assert_eq!(rom.len(), 512);
    assert_eq!(rom[2], 1);
    assert_eq!(&rom[8..14], b"INITRD");
    let sum: u32 = rom.iter().map(|&b| b as u32).sum();
    assert_eq!(sum % 256, 0);
}

#[test]
fn fat16_verb_populates_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir(&src).unwrap();
    std::fs::File::create(src.join("A.TXT"))
        .unwrap()
        .write_all(b"HELLO")
        .unwrap();

    let status = Command::new(mkimg_bin())
        .args(["fat16", "16", "src"])
        .current_dir(dir.path())
        .status()
        .unwrap();
    assert!(status.success());

    let image = std::fs::read(dir.path().join("bootpart.bin")).unwrap();
    assert_eq!(image.len(), 16 * 1024 * 1024);
}

#[test]
fn check_verb_exits_zero_on_nonconforming_kernel() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = dir.path().join("k.bin");
    std::fs::write(&kernel, b"not an executable").unwrap();

    let output = Command::new(mkimg_bin())
        .arg("check")
        .arg(&kernel)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("invalid"));
}

#[test]
fn help_exits_zero() {
    let status = Command::new(mkimg_bin()).arg("help").status().unwrap();
    assert!(status.success());
}

#[test]
fn missing_fat_input_directory_exits_with_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let status = Command::new(mkimg_bin())
        .args(["fat16", "16", "does-not-exist"])
        .current_dir(dir.path())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(3));
}
