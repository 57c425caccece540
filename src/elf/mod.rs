//! In-process ELF parsing: identification bytes, the file header, both header tables and resolved
//! section names. Parsing is strict about truncation but deliberately tolerant about unresolvable
//! section names, so a damaged string table never fails an otherwise well-formed file.

use crate::{Error, Result};

pub mod endian;
pub mod header;
pub mod ident;

pub use header::{FileHeader, ProgramHeader, SectionHeader};
pub use ident::ElfIdent;

/// A section header paired with its name as resolved through the section-name string table. The
/// name is none when the string table is absent or damaged.
#[derive(Clone, Debug)]
pub struct Section {
    pub name: Option<String>,
    pub header: SectionHeader,
}

/// This struct represents a parsed ELF file: the file header, the program header table and the
/// section table with resolved names.
#[derive(Clone, Debug)]
pub struct Elf {
    header: FileHeader,
    program_headers: Vec<ProgramHeader>,
    sections: Vec<Section>,
    section_table_in_bounds: bool,
}

impl Elf {
    /// This function accepts a byte slice and parses it into the content of the ELF file. The
    /// program header table is required to fit inside the file; a section header table that
    /// extends past the end of the file is recorded as out of bounds and yields an empty section
    /// list instead of failing the parse.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::ParseFailure] - The identification bytes or the file header are malformed, or
    ///   the program header table is truncated
    pub fn from_bytes(bytes: &[u8]) -> Result<Elf> {
        let header = FileHeader::read(bytes)?;
        let ident = header.ident;

        let mut program_headers = Vec::with_capacity(header.program_header_count as usize);
        if header.program_header_offset > 0 {
            let table_end = header.program_header_offset
                + header.program_header_count as u64 * header.program_header_size as u64;
            if table_end > bytes.len() as u64 {
                return Err(Error::ParseFailure(format!(
                    "program header table ends at {} but the file has {} bytes",
                    table_end,
                    bytes.len()
                )));
            }
            for index in 0..header.program_header_count {
                let offset = header.program_header_offset as usize
                    + index as usize * header.program_header_size as usize;
                program_headers.push(ProgramHeader::read(&ident, bytes, offset)?);
            }
        }

        let section_table_end = header.section_header_offset
            + header.section_header_count as u64 * header.section_header_size as u64;
        let section_table_in_bounds = section_table_end <= bytes.len() as u64;

        let mut sections = Vec::new();
        if header.section_header_offset > 0 && section_table_in_bounds {
            let mut headers = Vec::with_capacity(header.section_header_count as usize);
            for index in 0..header.section_header_count {
                let offset = header.section_header_offset as usize
                    + index as usize * header.section_header_size as usize;
                headers.push(SectionHeader::read(&ident, bytes, offset)?);
            }

            let names = resolve_section_names(bytes, &headers, header.string_table_index);
            sections = headers
                .into_iter()
                .zip(names)
                .map(|(header, name)| Section { name, header })
                .collect();
        }

        Ok(Self {
            header,
            program_headers,
            sections,
            section_table_in_bounds,
        })
    }

    /// The parsed file header.
    pub fn file_header(&self) -> &FileHeader {
        &self.header
    }

    /// This function returns the program header table in file order.
    pub fn program_headers(&self) -> &[ProgramHeader] {
        &self.program_headers
    }

    /// This function returns the section table in file order, including the leading null section.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// This function returns the section at the given table index.
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)
    }

    /// This function returns the first section carrying the given resolved name.
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections
            .iter()
            .find(|section| section.name.as_deref() == Some(name))
    }

    /// Whether the section header table as declared by the file header fits inside the file. The
    /// section-size representation must degrade to all zeros when it does not.
    pub fn section_table_in_bounds(&self) -> bool {
        self.section_table_in_bounds
    }
}

/// Reads the section-name string table raw and resolves every section's name from it. Any failure
/// (bad index, out-of-range offsets, non-UTF-8 names) degrades to an unresolved name.
fn resolve_section_names(
    bytes: &[u8],
    headers: &[SectionHeader],
    string_table_index: u16,
) -> Vec<Option<String>> {
    let table = headers.get(string_table_index as usize).and_then(|header| {
        let start = header.offset as usize;
        let end = start.checked_add(header.size as usize)?;
        bytes.get(start..end)
    });

    headers
        .iter()
        .map(|header| {
            let table = table?;
            let start = header.name as usize;
            let terminator = table.get(start..)?.iter().position(|byte| *byte == 0)?;
            String::from_utf8(table[start..start + terminator].to_vec()).ok()
        })
        .collect()
}
