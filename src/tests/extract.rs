use crate::codec::{unpack_doubles, unpack_i32s};
use crate::config::Config;
use crate::elf::Elf;
use crate::extract::{extract, header_vector, section_size_vector, TRACKED_SECTIONS};
use crate::record::RepresentationType;
use crate::regions::CodeRegion;
use crate::tests::fixtures::{minimal_elf, not_elf};
use crate::Error;

#[test]
fn test_header_vector_projection() {
    let bytes = minimal_elf();
    let elf = Elf::from_bytes(&bytes).unwrap();
    let vector = header_vector(elf.file_header());

    assert_eq!(vector.len(), 18);
    assert_eq!(vector[0], 1.0); // 64-bit
    assert_eq!(vector[1], 0.0); // little-endian
    assert_eq!(vector[2], 1.0); // current version
    assert_eq!(vector[3], 0.0); // unspecified OS ABI
    assert_eq!(vector[5], 2.0); // executable
    assert_eq!(vector[6], 62.0); // x86_64
    assert_eq!(vector[8], 0x401000 as f64); // entry
    assert_eq!(vector[9], 64.0); // phoff
    assert_eq!(vector[12], 64.0); // ehsize
    assert_eq!(vector[14], 2.0); // phnum
    assert_eq!(vector[16], 4.0); // shnum
    assert_eq!(vector[17], 3.0); // shstrndx
}

#[test]
fn test_section_size_vector_normalizes_by_file_size() {
    let bytes = minimal_elf();
    let elf = Elf::from_bytes(&bytes).unwrap();
    let vector = section_size_vector(&elf, bytes.len() as u64);

    assert_eq!(vector.len(), TRACKED_SECTIONS.len());
    let text_size = elf.section_by_name(".text").unwrap().header.size as f64;
    assert_eq!(vector[0], text_size / bytes.len() as f64);
    assert!(vector[1] > 0.0); // .rodata present
    assert_eq!(vector[2], 0.0); // no .data
    assert_eq!(vector[3], 0.0); // no .bss
    assert_eq!(vector[4], 0.0); // no .symtab
    assert!(vector[5] > 0.0); // .shstrtab present
}

#[test]
fn test_section_size_vector_degrades_when_table_is_out_of_bounds() {
    let mut bytes = minimal_elf();
    let length = bytes.len() as u64;
    bytes[40..48].copy_from_slice(&length.to_le_bytes());

    let elf = Elf::from_bytes(&bytes).unwrap();
    let vector = section_size_vector(&elf, bytes.len() as u64);
    assert_eq!(vector, vec![0.0; 6]);
}

#[test]
fn test_parsed_record_carries_all_representations() {
    let bytes = minimal_elf();
    let record = extract("busybox", &bytes, Vec::new(), None, &Config::default(), &[]).unwrap();

    assert!(record.parsing_successful);
    assert_eq!(record.sha256.len(), 64);
    for rep_type in [
        RepresentationType::ElfHeaderVector,
        RepresentationType::StringMinhash,
        RepresentationType::SectionSizeVector,
        RepresentationType::CodeRegionList,
        RepresentationType::ProgramHeaderVector,
    ] {
        assert!(record.representation(rep_type).is_some(), "{rep_type:?} missing");
    }

    let header = unpack_doubles(record.representation_data(RepresentationType::ElfHeaderVector).unwrap()).unwrap();
    assert_eq!(header.len(), 18);
    let sections = unpack_doubles(record.representation_data(RepresentationType::SectionSizeVector).unwrap()).unwrap();
    assert_eq!(sections.len(), 6);
    let phdr = unpack_doubles(record.representation_data(RepresentationType::ProgramHeaderVector).unwrap()).unwrap();
    assert_eq!(phdr.len(), 9);
    let signature = unpack_i32s(record.representation_data(RepresentationType::StringMinhash).unwrap()).unwrap();
    assert_eq!(signature.len(), 128);
}

#[test]
fn test_unparsed_record_skips_header_vectors() {
    let bytes = not_elf();
    let record = extract("raw.bin", &bytes, Vec::new(), None, &Config::default(), &[]).unwrap();

    assert!(!record.parsing_successful);
    assert!(record.representation(RepresentationType::ElfHeaderVector).is_none());
    assert!(record.representation(RepresentationType::SectionSizeVector).is_none());
    assert!(record.representation(RepresentationType::StringMinhash).is_some());
    assert!(record.representation(RepresentationType::CodeRegionList).is_some());
    assert!(record.representation(RepresentationType::ProgramHeaderVector).is_some());

    // No program-header source exists for unparsable bytes without a path, so the vector is
    // empty rather than zero-filled.
    let phdr = unpack_doubles(record.representation_data(RepresentationType::ProgramHeaderVector).unwrap()).unwrap();
    assert!(phdr.is_empty());
}

#[test]
fn test_zeroed_header_is_not_parsed() {
    let record = extract("zeroes", &[0u8; 128], Vec::new(), None, &Config::default(), &[]).unwrap();
    assert!(!record.parsing_successful);
    assert!(record.representation(RepresentationType::ElfHeaderVector).is_none());
}

#[test]
fn test_requested_representations_filter() {
    let bytes = minimal_elf();
    let requested = [
        RepresentationType::StringMinhash,
        RepresentationType::CodeRegionList,
        RepresentationType::ProgramHeaderVector,
    ];
    let record = extract("busybox", &bytes, Vec::new(), None, &Config::default(), &requested).unwrap();

    assert!(record.parsing_successful);
    assert!(record.representation(RepresentationType::ElfHeaderVector).is_none());
    assert!(record.representation(RepresentationType::SectionSizeVector).is_none());
    assert!(record.representation(RepresentationType::StringMinhash).is_some());
}

#[test]
fn test_missing_filename_is_rejected() {
    assert!(matches!(
        extract("", &minimal_elf(), Vec::new(), None, &Config::default(), &[]),
        Err(Error::MissingFilename)
    ));
}

#[test]
fn test_region_list_blob_round_trips() {
    let regions = vec![CodeRegion { start: 0, end: 100, length: 100, tag: "code".into() }];
    let record = extract("a.bin", &minimal_elf(), regions.clone(), None, &Config::default(), &[]).unwrap();
    let decoded: Vec<CodeRegion> = serde_json::from_slice(
        record.representation_data(RepresentationType::CodeRegionList).unwrap(),
    )
    .unwrap();
    assert_eq!(decoded, regions);
}
