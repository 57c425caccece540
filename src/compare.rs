//! Pairwise comparison: the per-axis similarity kernels and the weighted scoring that combines
//! them into one comparison record.

use std::collections::BTreeMap;

use crate::codec::{unpack_doubles, unpack_i32s};
use crate::config::Config;
use crate::minhash::MinHashEngine;
use crate::record::{Comparison, FileRecord, RepresentationType, SimilarityRating};
use crate::regions::CodeRegion;
use crate::{Error, Result};

/// Cosine similarity of two equal-length vectors. All vectors compared here are non-negative,
/// so the result lies in `[0, 1]`; a zero-norm input yields 0.
///
/// Here is a list with all errors, which can occur while this operation:
/// - [Error::InvalidArgument] - The vectors have different lengths
pub fn cosine(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::InvalidArgument(format!(
            "cosine over vectors of length {} and {}",
            a.len(),
            b.len()
        )));
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|y| y * y).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}

/// Sorts regions by start and merges overlapping or adjacent ones into disjoint intervals.
/// Adjacency merges: an interval ending where the next begins becomes one interval.
pub fn merged_intervals(regions: &[CodeRegion]) -> Vec<(u64, u64)> {
    let mut spans: Vec<(u64, u64)> = regions.iter().map(|r| (r.start, r.end)).collect();
    spans.sort_unstable();

    let mut merged: Vec<(u64, u64)> = Vec::with_capacity(spans.len());
    for (start, end) in spans {
        match merged.last_mut() {
            Some(current) if current.1 >= start => current.1 = current.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Jaccard similarity over the merged byte intervals of two region lists. The intersection is
/// computed with a two-pointer sweep that always advances the interval with the smaller end.
/// Two empty lists are identical (`1`); an empty list against a non-empty one shares nothing
/// (`0`).
pub fn interval_jaccard(a: &[CodeRegion], b: &[CodeRegion]) -> f64 {
    let merged_a = merged_intervals(a);
    let merged_b = merged_intervals(b);

    let sum_a: u64 = merged_a.iter().map(|(start, end)| end - start).sum();
    let sum_b: u64 = merged_b.iter().map(|(start, end)| end - start).sum();

    let mut intersection = 0u64;
    let (mut i, mut j) = (0, 0);
    while i < merged_a.len() && j < merged_b.len() {
        let (start_a, end_a) = merged_a[i];
        let (start_b, end_b) = merged_b[j];
        let low = start_a.max(start_b);
        let high = end_a.min(end_b);
        if high > low {
            intersection += high - low;
        }
        if end_a <= end_b {
            i += 1;
        } else {
            j += 1;
        }
    }

    let union = sum_a + sum_b - intersection;
    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}

/// Similarity of region counts: `1 - |n_a - n_b| / max(n_a, n_b)`. Two empty lists count as
/// identical; exactly one empty list shares nothing.
pub fn region_count_similarity(count_a: usize, count_b: usize) -> f64 {
    match (count_a, count_b) {
        (0, 0) => 1.0,
        (0, _) | (_, 0) => 0.0,
        (a, b) => 1.0 - (a.abs_diff(b) as f64 / a.max(b) as f64),
    }
}

/// Similarity of average region lengths: `min(avg_a, avg_b) / max(avg_a, avg_b)`, with the same
/// zero handling as the count similarity.
pub fn average_length_similarity(a: &[CodeRegion], b: &[CodeRegion]) -> f64 {
    let average = |regions: &[CodeRegion]| {
        if regions.is_empty() {
            0.0
        } else {
            regions.iter().map(|r| r.length as f64).sum::<f64>() / regions.len() as f64
        }
    };
    let (avg_a, avg_b) = (average(a), average(b));
    if avg_a == 0.0 && avg_b == 0.0 {
        return 1.0;
    }
    if avg_a == 0.0 || avg_b == 0.0 {
        return 0.0;
    }
    avg_a.min(avg_b) / avg_a.max(avg_b)
}

/// Cosine of two program-header vectors after per-axis max normalization. The first seven axes
/// are raw counts and sizes and are divided by the pairwise maximum when it is positive; the
/// last two are already fractions and stay untouched. Either vector being empty yields 0.
pub fn program_header_cosine(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.is_empty() || b.is_empty() {
        return Ok(0.0);
    }
    let mut scaled_a = a.to_vec();
    let mut scaled_b = b.to_vec();
    let normalized = scaled_a.len().min(scaled_b.len()).min(7);
    for index in 0..normalized {
        let max = scaled_a[index].max(scaled_b[index]);
        if max > 0.0 {
            scaled_a[index] /= max;
            scaled_b[index] /= max;
        }
    }
    cosine(&scaled_a, &scaled_b)
}

/// This struct computes comparison records against the configured weights and thresholds. It
/// borrows the deployment configuration so the weight maps are never baked into call sites.
pub struct Comparator<'a> {
    config: &'a Config,
}

impl<'a> Comparator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Compares a target record against a reference record and produces the comparison record.
    /// Two records sharing a content hash short-circuit to a perfect score with no per-axis
    /// details.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::NotFound] - A required representation is missing from either record
    /// - [Error::InvalidEncoding] - A persisted blob could not be decoded
    /// - [Error::InvalidArgument] - Persisted vectors have incompatible shapes
    pub fn compare(&self, reference: &FileRecord, target: &FileRecord) -> Result<Comparison> {
        let mut comparison = Comparison::new(target.filename.clone(), reference.filename.clone());

        if reference.sha256 == target.sha256 {
            comparison.set_score(1.0, &self.config.thresholds);
            return Ok(comparison);
        }

        let both_parsed = reference.parsing_successful && target.parsing_successful;
        let mut details: BTreeMap<RepresentationType, f64> = BTreeMap::new();

        if both_parsed {
            details.insert(
                RepresentationType::ElfHeaderVector,
                self.vector_cosine(reference, target, RepresentationType::ElfHeaderVector)?,
            );
            details.insert(
                RepresentationType::SectionSizeVector,
                self.vector_cosine(reference, target, RepresentationType::SectionSizeVector)?,
            );
        }

        let signature_a =
            unpack_i32s(reference.representation_data(RepresentationType::StringMinhash)?)?;
        let signature_b =
            unpack_i32s(target.representation_data(RepresentationType::StringMinhash)?)?;
        details.insert(
            RepresentationType::StringMinhash,
            MinHashEngine::global().similarity(&signature_a, &signature_b)?,
        );

        let regions_a = decode_regions(reference)?;
        let regions_b = decode_regions(target)?;
        if !regions_a.is_empty() && !regions_b.is_empty() {
            details.insert(
                RepresentationType::CodeRegionList,
                interval_jaccard(&regions_a, &regions_b),
            );
            details.insert(
                RepresentationType::RegionCountSim,
                region_count_similarity(regions_a.len(), regions_b.len()),
            );
            details.insert(
                RepresentationType::AvgRegionLengthSim,
                average_length_similarity(&regions_a, &regions_b),
            );
        }

        let phdr_a =
            unpack_doubles(reference.representation_data(RepresentationType::ProgramHeaderVector)?)?;
        let phdr_b =
            unpack_doubles(target.representation_data(RepresentationType::ProgramHeaderVector)?)?;
        details.insert(
            RepresentationType::ProgramHeaderVector,
            program_header_cosine(&phdr_a, &phdr_b)?,
        );

        let weights = self.config.weights.select(both_parsed);
        let score: f64 = details
            .iter()
            .map(|(axis, similarity)| weights.get(axis).copied().unwrap_or(0.0) * similarity)
            .sum();

        comparison.comparison_details = details;
        comparison.weights = weights.clone();
        comparison.set_score(score, &self.config.thresholds);
        Ok(comparison)
    }

    /// Derives the rating the configured thresholds assign to a score.
    pub fn rating_of(&self, score: f64) -> SimilarityRating {
        SimilarityRating::from_score(score, &self.config.thresholds)
    }

    fn vector_cosine(
        &self,
        reference: &FileRecord,
        target: &FileRecord,
        rep_type: RepresentationType,
    ) -> Result<f64> {
        let a = unpack_doubles(reference.representation_data(rep_type)?)?;
        let b = unpack_doubles(target.representation_data(rep_type)?)?;
        cosine(&a, &b)
    }
}

/// Decodes a record's persisted region list.
pub fn decode_regions(record: &FileRecord) -> Result<Vec<CodeRegion>> {
    let data = record.representation_data(RepresentationType::CodeRegionList)?;
    serde_json::from_slice(data)
        .map_err(|error| Error::InvalidEncoding(format!("malformed region list blob: {error}")))
}
