//! The representation extractor: one pass over `(filename, raw bytes)` that produces the file
//! record with its packed representation blobs. An ELF parse failure is recovered here: the
//! record is still produced from the raw bytes, it just lacks the header-derived vectors.

use std::path::Path;

use tracing::debug;

use crate::codec::{pack_doubles, pack_i32s, sha256_hex};
use crate::config::Config;
use crate::elf::{Elf, FileHeader};
use crate::minhash::MinHashEngine;
use crate::phdr::{self, Segment};
use crate::record::{FileRecord, RepresentationType};
use crate::regions::CodeRegion;
use crate::{strings, Error, Result};

/// The section names tracked by the section-size vector, in vector order.
pub const TRACKED_SECTIONS: [&str; 6] =
    [".text", ".rodata", ".data", ".bss", ".symtab", ".shstrtab"];

/// Projects the parsed file header onto the 18-dimensional feature vector. Every integer field
/// fits a double losslessly within its declared ELF width; class and data encoding are
/// normalized to 0/1 indicators.
pub fn header_vector(header: &FileHeader) -> Vec<f64> {
    vec![
        header.ident.class_indicator(),
        header.ident.data_indicator(),
        header.ident.version as u8 as f64,
        header.ident.os_abi.value() as f64,
        header.ident.abi_version as f64,
        header.ty.value() as f64,
        header.machine.value() as f64,
        header.version as f64,
        header.entry_address.unwrap_or(0) as f64,
        header.program_header_offset as f64,
        header.section_header_offset as f64,
        header.flags as f64,
        header.file_header_size as f64,
        header.program_header_size as f64,
        header.program_header_count as f64,
        header.section_header_size as f64,
        header.section_header_count as f64,
        header.string_table_index as f64,
    ]
}

/// Builds the 6-dimensional section-size vector: the sizes of the tracked sections divided by
/// the size of the original upload. Missing sections contribute zero; a section header table
/// that extends past the end of the file degrades the whole vector to zeros.
pub fn section_size_vector(elf: &Elf, file_size: u64) -> Vec<f64> {
    if !elf.section_table_in_bounds() || file_size == 0 {
        return vec![0.0; TRACKED_SECTIONS.len()];
    }
    TRACKED_SECTIONS
        .iter()
        .map(|name| {
            elf.section_by_name(name)
                .map(|section| section.header.size as f64 / file_size as f64)
                .unwrap_or(0.0)
        })
        .collect()
}

/// Runs the full extraction pipeline and assembles the file record. The classified region list
/// is supplied by the caller because classification happens in batches during bulk ingest.
///
/// `requested` restricts which representations are attached; an empty slice means all of them.
/// The mandatory representations (string MinHash, region list, program-header vector) are always
/// attached so every record satisfies the catalog invariants.
///
/// Here is a list with all errors, which can occur while this operation:
/// - [Error::MissingFilename] - The filename is empty
/// - [Error::InvalidEncoding] - The region list could not be serialized
pub fn extract(
    filename: &str,
    bytes: &[u8],
    regions: Vec<CodeRegion>,
    source_path: Option<&Path>,
    config: &Config,
    requested: &[RepresentationType],
) -> Result<FileRecord> {
    if filename.is_empty() {
        return Err(Error::MissingFilename);
    }

    let sha256 = sha256_hex(bytes);
    let elf = match Elf::from_bytes(bytes) {
        Ok(elf) => Some(elf),
        Err(Error::ParseFailure(reason)) => {
            debug!(filename, %reason, "ELF parse failed, continuing without header vectors");
            None
        }
        Err(error) => return Err(error),
    };

    let mut record = FileRecord::new(filename, sha256, elf.is_some());
    let wanted = |rep_type: RepresentationType| {
        rep_type.is_persisted() && (requested.is_empty() || requested.contains(&rep_type))
    };

    // Strings are tokenized into a duplicate-free set before signing.
    let engine = MinHashEngine::global();
    let scanned = strings::scan_bytes(bytes, config.effective_min_string_len());
    let tokens = engine.tokens(scanned.iter().map(String::as_str));
    record.put(
        RepresentationType::StringMinhash,
        pack_i32s(&engine.signature(&tokens)),
    );

    let encoded_regions = serde_json::to_vec(&regions)
        .map_err(|error| Error::InvalidEncoding(format!("unencodable region list: {error}")))?;
    record.put(RepresentationType::CodeRegionList, encoded_regions);

    record.put(
        RepresentationType::ProgramHeaderVector,
        pack_doubles(&phdr::feature_vector(&segments(elf.as_ref(), source_path))),
    );

    if let Some(elf) = &elf {
        if wanted(RepresentationType::ElfHeaderVector) {
            record.put(
                RepresentationType::ElfHeaderVector,
                pack_doubles(&header_vector(elf.file_header())),
            );
        }
        if wanted(RepresentationType::SectionSizeVector) {
            record.put(
                RepresentationType::SectionSizeVector,
                pack_doubles(&section_size_vector(elf, bytes.len() as u64)),
            );
        }
    }

    Ok(record)
}

/// Chooses the program-header source: the in-process table when the parse succeeded, otherwise
/// `readelf` against the on-disk path when one is known. Both failures leave an empty segment
/// list, which turns into an empty vector.
fn segments(elf: Option<&Elf>, source_path: Option<&Path>) -> Vec<Segment> {
    if let Some(elf) = elf {
        return elf.program_headers().iter().map(Segment::from).collect();
    }
    if let Some(path) = source_path {
        match phdr::from_readelf(path) {
            Ok(segments) => return segments,
            Err(error) => {
                debug!(path = %path.display(), %error, "readelf fallback failed");
            }
        }
    }
    Vec::new()
}
