//! The catalog data model: file records, their typed representations, and the comparison record
//! returned to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::{Error, Result};

/// This enum is the closed set of representation types. The first five are persisted blobs; the
/// remaining markers exist only as axes in the comparator's intermediate maps and are never
/// extracted or stored.
#[derive(
    Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepresentationType {
    /// 18 doubles over the ELF file header, little-endian packed.
    ElfHeaderVector,

    /// MinHash signature over extracted strings, packed int32 values.
    StringMinhash,

    /// 6 doubles of well-known section sizes normalized by file size.
    SectionSizeVector,

    /// Ordered list of machine-classified code regions, JSON encoded.
    CodeRegionList,

    /// 9 doubles summarizing the program header table.
    ProgramHeaderVector,

    /// Comparator-only axis: similarity of region counts.
    RegionCountSim,

    /// Comparator-only axis: similarity of average region lengths.
    AvgRegionLengthSim,

    /// Placeholder carried in one weight map. No axis of this type is ever computed.
    None,
}

impl RepresentationType {
    /// Whether records in the catalog may carry a blob of this type.
    pub fn is_persisted(&self) -> bool {
        matches!(
            self,
            Self::ElfHeaderVector
                | Self::StringMinhash
                | Self::SectionSizeVector
                | Self::CodeRegionList
                | Self::ProgramHeaderVector
        )
    }
}

/// One typed byte blob belonging to a file record. The id and the back-reference are assigned by
/// the catalog on save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Representation {
    pub id: Option<i64>,
    pub rep_type: RepresentationType,
    pub data: Vec<u8>,
    pub file_id: Option<i64>,
}

/// This struct represents one analyzed file: its display name, content hash, whether the ELF
/// parse succeeded, and at most one representation per type. Records are immutable after ingest
/// apart from representation recomputation.
#[derive(Clone, Debug)]
pub struct FileRecord {
    pub id: Option<i64>,
    pub filename: String,
    pub sha256: String,
    pub parsing_successful: bool,
    representations: BTreeMap<RepresentationType, Representation>,
}

impl FileRecord {
    pub fn new(filename: impl Into<String>, sha256: impl Into<String>, parsing_successful: bool) -> Self {
        Self {
            id: None,
            filename: filename.into(),
            sha256: sha256.into(),
            parsing_successful,
            representations: BTreeMap::new(),
        }
    }

    /// Attaches a representation blob, replacing any previous blob of the same type. Replacement
    /// in place is what a reanalysis request uses.
    pub fn put(&mut self, rep_type: RepresentationType, data: Vec<u8>) {
        self.representations.insert(
            rep_type,
            Representation {
                id: None,
                rep_type,
                data,
                file_id: self.id,
            },
        );
    }

    pub fn representation(&self, rep_type: RepresentationType) -> Option<&Representation> {
        self.representations.get(&rep_type)
    }

    /// Returns the blob of the given type, or [Error::NotFound] when the record does not carry
    /// one. The comparator relies on this for its required axes.
    pub fn representation_data(&self, rep_type: RepresentationType) -> Result<&[u8]> {
        self.representations
            .get(&rep_type)
            .map(|representation| representation.data.as_slice())
            .ok_or_else(|| Error::NotFound(self.filename.clone(), rep_type))
    }

    pub fn representations(&self) -> impl Iterator<Item = &Representation> {
        self.representations.values()
    }

    pub fn representations_mut(&mut self) -> impl Iterator<Item = &mut Representation> {
        self.representations.values_mut()
    }
}

/// This enum is the three-way classification derived from a similarity score. The ordering is
/// `Low < Medium < High`.
#[derive(
    Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityRating {
    Low,
    Medium,
    High,
}

impl SimilarityRating {
    /// Derives the rating from a score. This is a pure function of the score and the configured
    /// thresholds.
    pub fn from_score(score: f64, thresholds: &Thresholds) -> Self {
        if score >= thresholds.high {
            Self::High
        } else if score <= thresholds.low {
            Self::Low
        } else {
            Self::Medium
        }
    }

    /// Parses the lowercase query-parameter form. Unknown strings yield none, which callers
    /// treat as "no rating filter".
    pub fn from_query(value: &str) -> Option<Self> {
        match value {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// The result of comparing a target file against one reference record. Not persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    /// The target file under analysis.
    pub file_name: String,

    /// The catalog record it was compared against.
    pub second_file_name: String,

    pub similarity_score: f64,
    pub similarity_rating: SimilarityRating,

    /// Per-axis similarity for every axis that was computable for this pair.
    pub comparison_details: BTreeMap<RepresentationType, f64>,

    /// The weight map that produced the score.
    pub weights: BTreeMap<RepresentationType, f64>,
}

impl Comparison {
    pub fn new(file_name: impl Into<String>, second_file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            second_file_name: second_file_name.into(),
            similarity_score: 0.0,
            similarity_rating: SimilarityRating::Low,
            comparison_details: BTreeMap::new(),
            weights: BTreeMap::new(),
        }
    }

    /// Sets the score and re-derives the rating in the same step, so the two can never disagree.
    pub fn set_score(&mut self, score: f64, thresholds: &Thresholds) {
        self.similarity_score = score;
        self.similarity_rating = SimilarityRating::from_score(score, thresholds);
    }
}
