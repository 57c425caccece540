//! Bulk ingestion and ranking: archive expansion into scoped temporary directories, batched
//! classification, parallel extraction, and the analyze/compare entry points an HTTP surface
//! would call. Fan-out runs on a dedicated work-stealing pool sized to the machine.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::catalog::Catalog;
use crate::compare::Comparator;
use crate::config::Config;
use crate::extract::extract;
use crate::minhash::MinHashEngine;
use crate::record::{Comparison, FileRecord, RepresentationType, SimilarityRating};
use crate::regions::RegionClassifier;
use crate::{Error, Result};

/// A per-request deadline. Work is cancelled at task boundaries (between catalog rows, between
/// archive entries), never inside the math kernels.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn within(duration: Duration) -> Self {
        Self {
            expires_at: Instant::now() + duration,
        }
    }

    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::DeadlineExceeded] - The deadline has already elapsed
    pub fn check(&self) -> Result<()> {
        if Instant::now() >= self.expires_at {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }
}

fn check_deadline(deadline: Option<&Deadline>) -> Result<()> {
    deadline.map(Deadline::check).unwrap_or(Ok(()))
}

/// The three optional result predicates of the analyze surface. An unrecognized rating string
/// degrades to "no rating filter".
#[derive(Clone, Copy, Debug, Default)]
pub struct ResultFilter {
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub rating: Option<SimilarityRating>,
}

impl ResultFilter {
    pub fn from_query(
        min_score: Option<f64>,
        max_score: Option<f64>,
        rating: Option<&str>,
    ) -> Self {
        Self {
            min_score,
            max_score,
            rating: rating.and_then(SimilarityRating::from_query),
        }
    }

    pub fn matches(&self, comparison: &Comparison) -> bool {
        if let Some(min_score) = self.min_score {
            if comparison.similarity_score < min_score {
                return false;
            }
        }
        if let Some(max_score) = self.max_score {
            if comparison.similarity_score > max_score {
                return false;
            }
        }
        if let Some(rating) = self.rating {
            if comparison.similarity_rating != rating {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, mut comparisons: Vec<Comparison>) -> Vec<Comparison> {
        comparisons.retain(|comparison| self.matches(comparison));
        comparisons
    }
}

/// Outcome counters of one archive ingestion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Entries persisted as new catalog rows.
    pub persisted: usize,

    /// Entries skipped because a row with the same content hash already exists.
    pub duplicates: usize,

    /// Entries skipped because extraction or classification failed.
    pub failed: usize,
}

/// This struct is the service facade: it owns the deployment configuration, the catalog handle,
/// the classifier bridge and the worker pool, and exposes the ingest, analyze and compare
/// operations.
pub struct Analyzer<C: Catalog> {
    config: Config,
    catalog: C,
    classifier: RegionClassifier,
    pool: rayon::ThreadPool,
}

impl<C: Catalog> Analyzer<C> {
    /// Builds the facade and fixes the process-wide MinHash parameters from the configuration.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::InvalidArgument] - The MinHash engine was already initialized with different
    ///   parameters, or the worker pool could not be built
    pub fn new(config: Config, catalog: C) -> Result<Self> {
        MinHashEngine::initialize(config.minhash)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count())
            .build()
            .map_err(|error| Error::InvalidArgument(format!("worker pool: {error}")))?;
        let classifier = RegionClassifier::new(config.coderec.clone());
        Ok(Self {
            config,
            catalog,
            classifier,
            pool,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Expands a zip archive, classifies the entries in batches, and persists a record for every
    /// entry whose content hash is not in the catalog yet. A failing entry is logged and skipped;
    /// it never aborts the rest of the archive.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::Io] - The archive is unreadable or a temporary file could not be written
    /// - [Error::DeadlineExceeded] - The deadline elapsed between entries
    pub fn ingest_zip(
        &self,
        archive: &[u8],
        requested: &[RepresentationType],
        deadline: Option<&Deadline>,
    ) -> Result<IngestSummary> {
        self.check_size(archive.len())?;
        let workspace = TempDir::new()?;
        let entries = expand_archive(archive, workspace.path())?;
        info!(entries = entries.len(), "expanded archive");

        let paths: Vec<PathBuf> = entries.iter().map(|entry| entry.path.clone()).collect();
        let batched = match self.classifier.classify_batch(&paths) {
            Ok(batched) => batched,
            Err(error) => {
                warn!(%error, "batch classification failed, falling back to per-entry calls");
                HashMap::new()
            }
        };

        // Extraction fans out; logging and persistence stay in archive-entry order.
        let prepared: Vec<Result<FileRecord>> = self.pool.install(|| {
            entries
                .par_iter()
                .map(|entry| {
                    check_deadline(deadline)?;
                    let regions = match batched.get(&entry.key) {
                        Some(regions) => regions.clone(),
                        None => self.classifier.classify(&entry.path)?,
                    };
                    let bytes = fs::read(&entry.path)?;
                    extract(
                        &entry.name,
                        &bytes,
                        regions,
                        Some(&entry.path),
                        &self.config,
                        requested,
                    )
                })
                .collect()
        });

        let mut summary = IngestSummary::default();
        for (entry, prepared) in entries.iter().zip(prepared) {
            check_deadline(deadline)?;
            let mut record = match prepared {
                Ok(record) => record,
                Err(Error::DeadlineExceeded) => return Err(Error::DeadlineExceeded),
                Err(error) => {
                    warn!(entry = %entry.name, %error, "skipping archive entry");
                    summary.failed += 1;
                    continue;
                }
            };
            if self.catalog.find_by_hash(&record.sha256)?.is_empty() {
                self.catalog.save(&mut record)?;
                debug!(entry = %entry.name, sha256 = %record.sha256, "persisted");
                summary.persisted += 1;
            } else {
                summary.duplicates += 1;
            }
        }
        info!(?summary, "archive ingested");
        Ok(summary)
    }

    /// Ranks one upload against the whole catalog. The upload is persisted unless a row with the
    /// same `(hash, filename)` pair already exists; the returned list mirrors the catalog
    /// snapshot order and is unfiltered; callers apply a [ResultFilter].
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::MissingFilename] - The filename is empty
    /// - [Error::InvalidArgument] - The upload exceeds the configured size limit
    /// - [Error::DeadlineExceeded] - The deadline elapsed between catalog rows
    pub fn analyze(
        &self,
        filename: &str,
        bytes: &[u8],
        deadline: Option<&Deadline>,
    ) -> Result<Vec<Comparison>> {
        if filename.is_empty() {
            return Err(Error::MissingFilename);
        }
        self.check_size(bytes.len())?;

        let snapshot = self.catalog.find_all()?;
        let mut record = self.build_record(filename, bytes)?;
        if self
            .catalog
            .find_by_hash_and_filename(&record.sha256, filename)?
            .is_none()
        {
            self.catalog.save(&mut record)?;
        }

        let comparator = Comparator::new(&self.config);
        self.pool.install(|| {
            snapshot
                .par_iter()
                .map(|row| {
                    check_deadline(deadline)?;
                    comparator.compare(row, &record)
                })
                .collect()
        })
    }

    /// Compares two uploads directly, without touching the catalog. Identical content
    /// short-circuits to a perfect score.
    pub fn compare(&self, file1: (&str, &[u8]), file2: (&str, &[u8])) -> Result<Comparison> {
        let (name1, bytes1) = file1;
        let (name2, bytes2) = file2;
        self.check_size(bytes1.len())?;
        self.check_size(bytes2.len())?;

        let target = self.build_record(name1, bytes1)?;
        let reference = self.build_record(name2, bytes2)?;
        Comparator::new(&self.config).compare(&reference, &target)
    }

    /// Builds a record for in-memory bytes. The bytes are spilled to a scoped temporary file so
    /// the classifier and the `readelf` fallback have a path to work on.
    fn build_record(&self, filename: &str, bytes: &[u8]) -> Result<FileRecord> {
        if filename.is_empty() {
            return Err(Error::MissingFilename);
        }
        let workspace = TempDir::new()?;
        let path = workspace.path().join("upload.bin");
        fs::write(&path, bytes)?;
        let regions = self.classifier.classify(&path)?;
        extract(filename, bytes, regions, Some(&path), &self.config, &[])
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if let Some(limit) = self.config.max_upload_bytes {
            if len as u64 > limit {
                return Err(Error::InvalidArgument(format!(
                    "upload of {len} bytes exceeds the {limit} byte limit"
                )));
            }
        }
        Ok(())
    }
}

struct ArchiveEntry {
    /// Entry name as recorded in the archive, used for logging and as the record filename.
    name: String,

    /// Extraction path inside the scoped workspace.
    path: PathBuf,

    /// Lookup key matching the `file` field of classifier documents.
    key: String,
}

/// Expands every non-directory entry into the workspace, preserving archive order. Entries whose
/// names would escape the workspace are skipped.
fn expand_archive(archive: &[u8], workspace: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(archive)).map_err(zip_error)?;
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(zip_error)?;
        if entry.is_dir() {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = %entry.name(), "skipping entry with unsafe path");
            continue;
        };
        let destination = workspace.join(relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        io::copy(&mut entry, &mut File::create(&destination)?)?;
        entries.push(ArchiveEntry {
            name: entry.name().to_string(),
            key: destination.to_string_lossy().into_owned(),
            path: destination,
        });
    }
    Ok(entries)
}

fn zip_error(error: zip::result::ZipError) -> Error {
    Error::Io(io::Error::from(error))
}

/// Worker pool width: the number of logical CPUs with a floor of two.
fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(2)
        .max(2)
}
