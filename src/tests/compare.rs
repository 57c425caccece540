use crate::compare::{
    average_length_similarity, cosine, decode_regions, interval_jaccard, merged_intervals,
    program_header_cosine, region_count_similarity, Comparator,
};
use crate::config::Config;
use crate::extract::extract;
use crate::record::{FileRecord, RepresentationType, SimilarityRating};
use crate::regions::CodeRegion;
use crate::tests::fixtures::{minimal_elf, not_elf, variant_elf};
use crate::Error;

fn region(start: u64, end: u64) -> CodeRegion {
    CodeRegion {
        start,
        end,
        length: end - start,
        tag: "code".into(),
    }
}

fn record(filename: &str, bytes: &[u8], regions: Vec<CodeRegion>) -> FileRecord {
    extract(filename, bytes, regions, None, &Config::default(), &[]).unwrap()
}

#[test]
fn test_cosine_rejects_length_mismatch() {
    assert!(matches!(
        cosine(&[1.0, 0.0, 0.0], &[1.0, 0.0]),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_cosine_zero_norm_is_zero() {
    assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 0.0);
}

#[test]
fn test_cosine_bounds() {
    assert!((cosine(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap() - 1.0).abs() < 1e-12);
    assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0);

    let similarity = cosine(&[0.3, 0.1, 0.0], &[0.2, 0.4, 0.1]).unwrap();
    assert!((0.0..=1.0).contains(&similarity));
}

#[test]
fn test_merge_joins_overlapping_and_adjacent_intervals() {
    let merged = merged_intervals(&[region(5, 20), region(0, 10), region(20, 25), region(40, 50)]);
    assert_eq!(merged, vec![(0, 25), (40, 50)]);
}

#[test]
fn test_interval_jaccard_overlapping_lists() {
    // A merges to [0, 20); against [10, 30) the intersection is 10 of a union of 30.
    let a = vec![region(0, 10), region(5, 20)];
    let b = vec![region(10, 30)];
    assert!((interval_jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_interval_jaccard_identity_and_empty() {
    let a = vec![region(0, 100), region(200, 300)];
    assert_eq!(interval_jaccard(&a, &a), 1.0);
    assert_eq!(interval_jaccard(&a, &[]), 0.0);
    assert_eq!(interval_jaccard(&[], &[]), 1.0);
}

#[test]
fn test_region_count_similarity_rules() {
    assert_eq!(region_count_similarity(0, 0), 1.0);
    assert_eq!(region_count_similarity(0, 5), 0.0);
    assert_eq!(region_count_similarity(5, 0), 0.0);
    assert_eq!(region_count_similarity(4, 8), 0.5);
    assert_eq!(region_count_similarity(3, 3), 1.0);
}

#[test]
fn test_average_length_similarity_rules() {
    let short = vec![region(0, 10)];
    let long = vec![region(0, 40)];
    assert_eq!(average_length_similarity(&short, &long), 0.25);
    assert_eq!(average_length_similarity(&short, &short), 1.0);

    let zero = vec![CodeRegion { start: 0, end: 0, length: 0, tag: "pad".into() }];
    assert_eq!(average_length_similarity(&zero, &zero), 1.0);
    assert_eq!(average_length_similarity(&zero, &short), 0.0);
}

#[test]
fn test_program_header_cosine_empty_input() {
    assert_eq!(program_header_cosine(&[], &[1.0; 9]).unwrap(), 0.0);
    assert_eq!(program_header_cosine(&[], &[]).unwrap(), 0.0);
}

#[test]
fn test_program_header_cosine_normalizes_leading_axes() {
    let a = [2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0];
    let b = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0];
    // After scaling axis 0 by its pairwise max the vectors are [1, .., 1, 1] and [0.5, .., 1, 1].
    let expected = 2.5 / (1.5 * 3.0_f64.sqrt());
    assert!((program_header_cosine(&a, &b).unwrap() - expected).abs() < 1e-12);
}

#[test]
fn test_identity_short_circuit_on_equal_hash() {
    let config = Config::default();
    let bytes = minimal_elf();
    let a = record("a.bin", &bytes, Vec::new());
    let b = record("b.bin", &bytes, Vec::new());

    let comparison = Comparator::new(&config).compare(&a, &b).unwrap();
    assert_eq!(comparison.similarity_score, 1.0);
    assert_eq!(comparison.similarity_rating, SimilarityRating::High);
    assert!(comparison.comparison_details.is_empty());
    assert_eq!(comparison.file_name, "b.bin");
    assert_eq!(comparison.second_file_name, "a.bin");
}

#[test]
fn test_full_weights_and_all_axes_for_parsed_pair() {
    let config = Config::default();
    let a = record("a.bin", &minimal_elf(), vec![region(0, 100), region(150, 200)]);
    let b = record("b.bin", &variant_elf(), vec![region(0, 120), region(150, 210)]);

    let comparison = Comparator::new(&config).compare(&a, &b).unwrap();
    assert_eq!(comparison.weights, config.weights.full);

    let details = &comparison.comparison_details;
    assert!(details.contains_key(&RepresentationType::ElfHeaderVector));
    assert!(details.contains_key(&RepresentationType::SectionSizeVector));
    assert!(details.contains_key(&RepresentationType::StringMinhash));
    assert!(details.contains_key(&RepresentationType::CodeRegionList));
    assert!(details.contains_key(&RepresentationType::RegionCountSim));
    assert!(details.contains_key(&RepresentationType::AvgRegionLengthSim));
    assert!(details.contains_key(&RepresentationType::ProgramHeaderVector));
    assert!(!details.contains_key(&RepresentationType::None));

    let expected: f64 = details
        .iter()
        .map(|(axis, value)| config.weights.full.get(axis).copied().unwrap_or(0.0) * value)
        .sum();
    assert!((comparison.similarity_score - expected).abs() < 1e-12);
    assert!((0.0..=1.0).contains(&comparison.similarity_score));
}

#[test]
fn test_region_axes_are_omitted_when_either_list_is_empty() {
    let config = Config::default();
    let a = record("a.bin", &minimal_elf(), vec![region(0, 100)]);
    let b = record("b.bin", &variant_elf(), Vec::new());

    let comparison = Comparator::new(&config).compare(&a, &b).unwrap();
    let details = &comparison.comparison_details;
    assert!(!details.contains_key(&RepresentationType::CodeRegionList));
    assert!(!details.contains_key(&RepresentationType::RegionCountSim));
    assert!(!details.contains_key(&RepresentationType::AvgRegionLengthSim));
    assert!(details.contains_key(&RepresentationType::StringMinhash));
}

#[test]
fn test_unparsed_file_falls_back() {
    let config = Config::default();
    let parsed = record("parsed.bin", &minimal_elf(), Vec::new());
    let unparsed = record("raw.bin", &not_elf(), Vec::new());
    assert!(!unparsed.parsing_successful);

    let comparison = Comparator::new(&config).compare(&parsed, &unparsed).unwrap();
    assert_eq!(comparison.weights, config.weights.fallback);

    let details = &comparison.comparison_details;
    assert!(!details.contains_key(&RepresentationType::ElfHeaderVector));
    assert!(!details.contains_key(&RepresentationType::SectionSizeVector));
    assert!(details.contains_key(&RepresentationType::StringMinhash));
    assert!(details.contains_key(&RepresentationType::ProgramHeaderVector));
    assert!((0.0..=1.0).contains(&comparison.similarity_score));
}

#[test]
fn test_missing_required_representation_is_not_found() {
    let config = Config::default();
    let a = record("a.bin", &minimal_elf(), Vec::new());
    let mut b = record("b.bin", &variant_elf(), Vec::new());
    b = FileRecord::new(b.filename.clone(), b.sha256.clone(), b.parsing_successful);

    assert!(matches!(
        Comparator::new(&config).compare(&a, &b),
        Err(Error::NotFound(_, _))
    ));
}

#[test]
fn test_decoded_regions_round_trip_through_the_record() {
    let regions = vec![region(0, 64), region(64, 96)];
    let record = record("a.bin", &minimal_elf(), regions.clone());
    assert_eq!(decode_regions(&record).unwrap(), regions);
}
