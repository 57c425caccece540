use crate::catalog::{Catalog, MemoryCatalog};
use crate::config::Config;
use crate::extract::extract;
use crate::record::{FileRecord, RepresentationType};
use crate::tests::fixtures::{minimal_elf, variant_elf};

fn record(filename: &str, bytes: &[u8]) -> FileRecord {
    extract(filename, bytes, Vec::new(), None, &Config::default(), &[]).unwrap()
}

#[test]
fn test_save_assigns_ids_and_back_references() {
    let catalog = MemoryCatalog::new();
    let mut row = record("a.bin", &minimal_elf());
    assert!(row.id.is_none());

    catalog.save(&mut row).unwrap();
    let id = row.id.unwrap();
    for representation in row.representations() {
        assert!(representation.id.is_some());
        assert_eq!(representation.file_id, Some(id));
    }
}

#[test]
fn test_find_by_hash_returns_all_filenames() {
    let catalog = MemoryCatalog::new();
    let bytes = minimal_elf();
    catalog.save(&mut record("a.bin", &bytes)).unwrap();
    catalog.save(&mut record("b.bin", &bytes)).unwrap();
    catalog.save(&mut record("c.bin", &variant_elf())).unwrap();

    let sha256 = record("x", &bytes).sha256;
    let rows = catalog.find_by_hash(&sha256).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(catalog.find_all().unwrap().len(), 3);
}

#[test]
fn test_find_by_hash_and_filename() {
    let catalog = MemoryCatalog::new();
    let bytes = minimal_elf();
    catalog.save(&mut record("a.bin", &bytes)).unwrap();

    let sha256 = record("x", &bytes).sha256;
    assert!(catalog.find_by_hash_and_filename(&sha256, "a.bin").unwrap().is_some());
    assert!(catalog.find_by_hash_and_filename(&sha256, "b.bin").unwrap().is_none());
    assert!(catalog.find_by_hash_and_filename("0".repeat(64).as_str(), "a.bin").unwrap().is_none());
}

#[test]
fn test_persisted_blobs_match_a_fresh_extraction_byte_for_byte() {
    let catalog = MemoryCatalog::new();
    let bytes = minimal_elf();
    catalog.save(&mut record("a.bin", &bytes)).unwrap();

    let loaded = &catalog.find_all().unwrap()[0];
    let fresh = record("a.bin", &bytes);
    for representation in fresh.representations() {
        assert_eq!(
            loaded.representation_data(representation.rep_type).unwrap(),
            representation.data.as_slice(),
            "{:?} blob drifted across persist/load",
            representation.rep_type
        );
    }
}

#[test]
fn test_saving_a_record_with_an_id_replaces_it() {
    let catalog = MemoryCatalog::new();
    let mut row = record("a.bin", &minimal_elf());
    catalog.save(&mut row).unwrap();

    // A reanalysis recomputes a representation in place and saves the same row again.
    row.put(RepresentationType::CodeRegionList, b"[]".to_vec());
    catalog.save(&mut row).unwrap();

    let rows = catalog.find_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].representation_data(RepresentationType::CodeRegionList).unwrap(),
        b"[]"
    );
}
