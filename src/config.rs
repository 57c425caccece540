//! Deployment configuration: classifier wiring, MinHash parameters, axis weights and rating
//! thresholds. Weights are configuration rather than constants because the operator workflow
//! includes a randomized search that rewrites them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::minhash::MinHashParams;
use crate::record::RepresentationType;
use crate::{Error, Result};

/// Wiring of the external code-region classifier.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoderecConfig {
    /// When false, every input classifies to an empty region list and the region axes drop out
    /// of all comparisons.
    pub enabled: bool,

    /// Path of the classifier executable. Required when enabled.
    pub location: Option<PathBuf>,
}

/// Rating thresholds. The rating is `High` at or above the high threshold, `Low` at or below the
/// low threshold, `Medium` in between.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub high: f64,
    pub low: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { high: 0.6094, low: 0.30 }
    }
}

/// The two axis-weight maps. The full map applies when both files parsed as ELF; the fallback
/// map applies when either did not and the header-derived axes are unavailable.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub full: BTreeMap<RepresentationType, f64>,
    pub fallback: BTreeMap<RepresentationType, f64>,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        let mut config = Self {
            full: BTreeMap::from([
                (RepresentationType::ElfHeaderVector, 0.032),
                (RepresentationType::StringMinhash, 0.125),
                (RepresentationType::SectionSizeVector, 0.338),
                (RepresentationType::CodeRegionList, 0.190),
                (RepresentationType::RegionCountSim, 0.021),
                (RepresentationType::AvgRegionLengthSim, 0.007),
                (RepresentationType::ProgramHeaderVector, 0.277),
                (RepresentationType::None, 0.009),
            ]),
            fallback: BTreeMap::from([
                (RepresentationType::StringMinhash, 0.100),
                (RepresentationType::CodeRegionList, 0.154),
                (RepresentationType::RegionCountSim, 0.048),
                (RepresentationType::AvgRegionLengthSim, 0.009),
                (RepresentationType::ProgramHeaderVector, 0.688),
            ]),
        };
        // The published reference weights carry three decimals of precision; normalization makes
        // each map sum to exactly one while preserving the ratios. The built-in table is always
        // positive, so this cannot fail.
        let _ = config.normalize();
        config
    }
}

impl WeightsConfig {
    /// Rescales both maps so each sums to one. Operator-supplied weights may arrive in any
    /// positive scale.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::InvalidArgument] - A map is empty or its weights do not sum to a positive value
    pub fn normalize(&mut self) -> Result<()> {
        for map in [&mut self.full, &mut self.fallback] {
            let sum: f64 = map.values().sum();
            if !(sum > 0.0) {
                return Err(Error::InvalidArgument(
                    "weight map must contain positive weights".into(),
                ));
            }
            for weight in map.values_mut() {
                *weight /= sum;
            }
        }
        Ok(())
    }

    /// Asserts both maps sum to one within 1e-9. Run after loading operator-supplied weights.
    pub fn validate(&self) -> Result<()> {
        for (name, map) in [("full", &self.full), ("fallback", &self.fallback)] {
            let sum: f64 = map.values().sum();
            if (sum - 1.0).abs() > 1e-9 {
                return Err(Error::InvalidArgument(format!(
                    "{name} weight map sums to {sum}, expected 1"
                )));
            }
        }
        Ok(())
    }

    /// Selects the weight map for a pair of records.
    pub fn select(&self, both_parsed: bool) -> &BTreeMap<RepresentationType, f64> {
        if both_parsed {
            &self.full
        } else {
            &self.fallback
        }
    }
}

/// This struct bundles every recognized deployment option.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub coderec: CoderecConfig,
    pub minhash: MinHashParams,
    pub weights: WeightsConfig,
    pub thresholds: Thresholds,

    /// Minimum printable-run length for the string scanner.
    pub min_string_len: usize,

    /// Optional upper bound on upload sizes, in bytes.
    pub max_upload_bytes: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            coderec: CoderecConfig::default(),
            minhash: MinHashParams::default(),
            weights: WeightsConfig::default(),
            thresholds: Thresholds::default(),
            min_string_len: crate::strings::DEFAULT_MIN_LEN,
            max_upload_bytes: None,
        }
    }
}

impl Config {
    /// Loads the configuration from a JSON file, normalizes the weight maps and validates them.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Io] - The file could not be read
    /// - [Error::InvalidEncoding] - The file is not valid JSON
    /// - [Error::InvalidArgument] - A weight map is empty or non-positive
    pub fn from_path(path: &Path) -> Result<Config> {
        let bytes = fs::read(path)?;
        let mut config: Config = serde_json::from_slice(&bytes)
            .map_err(|error| Error::InvalidEncoding(format!("malformed configuration: {error}")))?;
        if config.min_string_len == 0 {
            config.min_string_len = crate::strings::DEFAULT_MIN_LEN;
        }
        config.weights.normalize()?;
        config.weights.validate()?;
        Ok(config)
    }

    /// The effective minimum string length; a zeroed field falls back to the scanner default.
    pub fn effective_min_string_len(&self) -> usize {
        if self.min_string_len == 0 {
            crate::strings::DEFAULT_MIN_LEN
        } else {
            self.min_string_len
        }
    }
}
