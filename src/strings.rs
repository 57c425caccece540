//! Printable-string extraction matching the conventional `strings` tool: maximal runs of
//! printable ASCII (plus tab) of a minimum length, emitted in file order.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use memmap2::Mmap;

use crate::Result;

/// Default minimum run length, the same default the Unix `strings` tool uses.
pub const DEFAULT_MIN_LEN: usize = 4;

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte) || byte == b'\t'
}

/// Scans an in-memory slice for printable runs of at least `min_len` bytes.
pub fn scan_bytes(bytes: &[u8], min_len: usize) -> Vec<String> {
    let mut strings = Vec::new();
    let mut run = Vec::new();
    for &byte in bytes {
        if is_printable(byte) {
            run.push(byte);
        } else {
            flush_run(&mut run, min_len, &mut strings);
        }
    }
    flush_run(&mut run, min_len, &mut strings);
    strings
}

/// Scans a file for printable runs. The file is memory-mapped when it is non-empty and the
/// mapping succeeds; otherwise it is read through a buffered reader with runs carried across
/// buffer boundaries.
pub fn scan_path(path: &Path, min_len: usize) -> Result<Vec<String>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }

    // SAFETY: the mapping is read-only and dropped before this function returns; concurrent
    // truncation of an input under analysis is outside the supported contract.
    match unsafe { Mmap::map(&file) } {
        Ok(map) => Ok(scan_bytes(&map, min_len)),
        Err(_) => scan_reader(BufReader::new(file), min_len),
    }
}

/// Sequential fallback for inputs that cannot be mapped.
pub fn scan_reader<R: Read>(mut reader: R, min_len: usize) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut run = Vec::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        for &byte in &buffer[..count] {
            if is_printable(byte) {
                run.push(byte);
            } else {
                flush_run(&mut run, min_len, &mut strings);
            }
        }
    }
    flush_run(&mut run, min_len, &mut strings);
    Ok(strings)
}

fn flush_run(run: &mut Vec<u8>, min_len: usize, strings: &mut Vec<String>) {
    if run.len() >= min_len {
        // The run contains printable ASCII only, so this conversion cannot fail.
        strings.push(String::from_utf8_lossy(run).into_owned());
    }
    run.clear();
}
