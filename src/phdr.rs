//! The program-header summary vector. Segments arrive either from the in-process ELF reader or
//! from the external `readelf -lW` command; both sources are reduced to the same schema before
//! the nine summary features are computed.

use std::ffi::OsStr;
use std::path::Path;

use crate::elf::ProgramHeader;
use crate::process::run_capturing;
use crate::{Error, Result};

/// Source-agnostic view of one program-header row. Flags are kept in the textual form `readelf`
/// prints (`R`, `W`, `E` subset) so both sources agree on the executable/writable tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub ty: String,
    pub offset: u64,
    pub virtual_address: u64,
    pub physical_address: u64,
    pub file_size: u64,
    pub memory_size: u64,
    pub flags: String,
    pub alignment: u64,
}

impl From<&ProgramHeader> for Segment {
    fn from(header: &ProgramHeader) -> Self {
        Self {
            ty: format!("{:?}", header.ty),
            offset: header.offset,
            virtual_address: header.virtual_address,
            physical_address: header.physical_address,
            file_size: header.file_size,
            memory_size: header.memory_size,
            flags: header.flags.render(),
            alignment: header.alignment,
        }
    }
}

/// Builds the 9-dimensional summary vector over a segment list, in order: segment count, mean,
/// population standard deviation and 25th/50th/75th percentile of the memory sizes, the fraction
/// of executable segments, the fraction of writable segments, and the ratio of total file size to
/// total memory size. An empty list yields an empty vector.
pub fn feature_vector(segments: &[Segment]) -> Vec<f64> {
    if segments.is_empty() {
        return Vec::new();
    }

    let count = segments.len() as f64;
    let mut mem_sizes: Vec<f64> = segments.iter().map(|s| s.memory_size as f64).collect();
    mem_sizes.sort_by(|a, b| a.total_cmp(b));

    let mean = mem_sizes.iter().sum::<f64>() / count;
    let variance = mem_sizes.iter().map(|size| (size - mean).powi(2)).sum::<f64>() / count;

    let executable = segments.iter().filter(|s| s.flags.contains('E')).count() as f64;
    let writable = segments.iter().filter(|s| s.flags.contains('W')).count() as f64;

    let total_file_size: u64 = segments.iter().map(|s| s.file_size).sum();
    let total_memory_size: u64 = segments.iter().map(|s| s.memory_size).sum();
    let size_ratio = if total_memory_size > 0 {
        total_file_size as f64 / total_memory_size as f64
    } else {
        0.0
    };

    vec![
        count,
        mean,
        variance.sqrt(),
        nearest_rank(&mem_sizes, 0.25),
        nearest_rank(&mem_sizes, 0.50),
        nearest_rank(&mem_sizes, 0.75),
        executable / count,
        writable / count,
        size_ratio,
    ]
}

/// Nearest-rank percentile over an ascending slice: the element at `round(q * (n - 1))`.
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let index = (q * (sorted.len() - 1) as f64).round() as usize;
    sorted[index]
}

/// Extracts the segment list by invoking `readelf -lW` on the file and parsing its columnar
/// output. Used when the in-process parser could not read the file.
///
/// Here is a list with all errors, which can occur while this operation:
/// - [Error::ExternalToolFailure] - `readelf` exited non-zero or printed no parsable table
/// - [Error::Io] - The subprocess could not be spawned
pub fn from_readelf(path: &Path) -> Result<Vec<Segment>> {
    let stdout = run_capturing(
        OsStr::new("readelf"),
        &[OsStr::new("-lW"), path.as_os_str()],
        path,
    )?;
    let text = String::from_utf8_lossy(&stdout);
    if text.trim().is_empty() {
        return Err(Error::ExternalToolFailure(path.to_path_buf()));
    }
    Ok(parse_readelf_output(&text))
}

/// Parses the `Program Headers:` table of `readelf -lW`. Each row is `Type Offset VirtAddr
/// PhysAddr FileSiz MemSiz Flg Align`; the flags column may itself contain spaces (`R E`), so it
/// is taken as everything between the sizes and the trailing alignment.
pub fn parse_readelf_output(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        // A data row has a type, five numbers, optional flag letters and an alignment.
        if tokens.len() < 7 || !tokens[1].starts_with("0x") {
            continue;
        }
        let Some(alignment) = parse_number(tokens[tokens.len() - 1]) else {
            continue;
        };
        let numbers: Option<Vec<u64>> = tokens[1..6].iter().copied().map(parse_number).collect();
        let Some(numbers) = numbers else { continue };

        segments.push(Segment {
            ty: tokens[0].to_string(),
            offset: numbers[0],
            virtual_address: numbers[1],
            physical_address: numbers[2],
            file_size: numbers[3],
            memory_size: numbers[4],
            flags: tokens[6..tokens.len() - 1].join(" "),
            alignment,
        });
    }
    segments
}

fn parse_number(token: &str) -> Option<u64> {
    if let Some(hex) = token.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        token.parse().ok()
    }
}
