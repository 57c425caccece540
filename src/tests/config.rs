use std::fs;

use crate::config::{Config, Thresholds, WeightsConfig};
use crate::record::{RepresentationType, SimilarityRating};

#[test]
fn test_default_weight_maps_sum_to_one() {
    let weights = WeightsConfig::default();
    weights.validate().unwrap();

    let full: f64 = weights.full.values().sum();
    let fallback: f64 = weights.fallback.values().sum();
    assert!((full - 1.0).abs() < 1e-9);
    assert!((fallback - 1.0).abs() < 1e-9);
}

#[test]
fn test_full_map_carries_the_placeholder_weight() {
    let weights = WeightsConfig::default();
    assert!(weights.full.contains_key(&RepresentationType::None));
    assert!(!weights.fallback.contains_key(&RepresentationType::None));
    assert!(weights.select(true).contains_key(&RepresentationType::ElfHeaderVector));
    assert!(!weights.select(false).contains_key(&RepresentationType::ElfHeaderVector));
}

#[test]
fn test_weight_ordering_survives_normalization() {
    let weights = WeightsConfig::default();
    // Section sizes dominate the full map; the program-header axis dominates the fallback map.
    let full_max = weights.full.iter().max_by(|a, b| a.1.total_cmp(b.1)).unwrap();
    assert_eq!(*full_max.0, RepresentationType::SectionSizeVector);
    let fallback_max = weights.fallback.iter().max_by(|a, b| a.1.total_cmp(b.1)).unwrap();
    assert_eq!(*fallback_max.0, RepresentationType::ProgramHeaderVector);
}

#[test]
fn test_normalize_rejects_empty_and_non_positive_maps() {
    let mut weights = WeightsConfig::default();
    weights.full.clear();
    assert!(weights.normalize().is_err());

    let mut weights = WeightsConfig::default();
    for value in weights.fallback.values_mut() {
        *value = 0.0;
    }
    assert!(weights.normalize().is_err());
}

#[test]
fn test_rating_thresholds() {
    let thresholds = Thresholds::default();
    assert_eq!(SimilarityRating::from_score(1.0, &thresholds), SimilarityRating::High);
    assert_eq!(SimilarityRating::from_score(0.6094, &thresholds), SimilarityRating::High);
    assert_eq!(SimilarityRating::from_score(0.6093, &thresholds), SimilarityRating::Medium);
    assert_eq!(SimilarityRating::from_score(0.31, &thresholds), SimilarityRating::Medium);
    assert_eq!(SimilarityRating::from_score(0.30, &thresholds), SimilarityRating::Low);
    assert_eq!(SimilarityRating::from_score(0.0, &thresholds), SimilarityRating::Low);
}

#[test]
fn test_rating_is_monotone_in_score() {
    let thresholds = Thresholds::default();
    let scores = [0.0, 0.1, 0.3, 0.300001, 0.45, 0.6093, 0.6094, 0.8, 1.0];
    let ratings: Vec<SimilarityRating> = scores
        .iter()
        .map(|score| SimilarityRating::from_score(*score, &thresholds))
        .collect();
    assert!(ratings.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(ratings[0], SimilarityRating::Low);
    assert_eq!(*ratings.last().unwrap(), SimilarityRating::High);
}

#[test]
fn test_rating_query_parsing_tolerates_unknown_values() {
    assert_eq!(SimilarityRating::from_query("high"), Some(SimilarityRating::High));
    assert_eq!(SimilarityRating::from_query("medium"), Some(SimilarityRating::Medium));
    assert_eq!(SimilarityRating::from_query("low"), Some(SimilarityRating::Low));
    assert_eq!(SimilarityRating::from_query("HIGH"), None);
    assert_eq!(SimilarityRating::from_query("bogus"), None);
}

#[test]
fn test_config_round_trips_through_json() {
    let workspace = tempfile::TempDir::new().unwrap();
    let path = workspace.path().join("elfkin.json");
    fs::write(
        &path,
        r#"{
            "coderec": { "enabled": true, "location": "/opt/coderec/coderec" },
            "minhash": { "signature_len": 512, "dict_size": 16777216 },
            "thresholds": { "high": 0.7 },
            "min_string_len": 6
        }"#,
    )
    .unwrap();

    let config = Config::from_path(&path).unwrap();
    assert!(config.coderec.enabled);
    assert_eq!(config.minhash.signature_len, 512);
    assert_eq!(config.minhash.dict_size, 16_777_216);
    assert_eq!(config.minhash.seed, 123_456_789); // default survives partial overrides
    assert_eq!(config.thresholds.high, 0.7);
    assert_eq!(config.thresholds.low, 0.30);
    assert_eq!(config.min_string_len, 6);
    config.weights.validate().unwrap();
}

#[test]
fn test_malformed_config_is_invalid_encoding() {
    let workspace = tempfile::TempDir::new().unwrap();
    let path = workspace.path().join("broken.json");
    fs::write(&path, b"{ not json").unwrap();
    assert!(matches!(
        Config::from_path(&path),
        Err(crate::Error::InvalidEncoding(_))
    ));
}

#[test]
fn test_comparison_record_wire_format() {
    use crate::record::Comparison;

    let mut comparison = Comparison::new("a.bin", "b.bin");
    comparison.comparison_details.insert(RepresentationType::StringMinhash, 0.5);
    comparison.weights.insert(RepresentationType::StringMinhash, 1.0);
    comparison.set_score(0.5, &Thresholds::default());

    let json = serde_json::to_value(&comparison).unwrap();
    assert_eq!(json["fileName"], "a.bin");
    assert_eq!(json["secondFileName"], "b.bin");
    assert_eq!(json["similarityRating"], "medium");
    assert_eq!(json["comparisonDetails"]["STRING_MINHASH"], 0.5);
    assert_eq!(json["weights"]["STRING_MINHASH"], 1.0);
}
