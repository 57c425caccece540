//! ElfKin extracts structural fingerprints from ELF binaries and scores how likely two files are
//! variant builds of the same software family. Five representations are computed per file (header
//! features, section sizes, a MinHash over printable strings, machine-classified code regions and
//! a program-header summary), packed into byte blobs and compared axis-by-axis with a weighted
//! similarity score.

#[cfg(test)]
pub mod tests;

pub mod catalog;
pub mod codec;
pub mod compare;
pub mod config;
pub mod elf;
pub mod extract;
pub mod ingest;
pub mod minhash;
pub mod phdr;
mod process;
pub mod record;
pub mod regions;
pub mod strings;

use std::path::PathBuf;
use thiserror::Error;

pub use crate::config::Config;
pub use crate::record::{
    Comparison, FileRecord, Representation, RepresentationType, SimilarityRating,
};

/// This enum represents every recoverable error condition in this library; all fallible
/// operations report one of these kinds.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller passed values whose shape is invalid for the requested operation, for example two
    /// vectors of different lengths handed to the cosine kernel.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A persisted blob or a document produced by an external tool could not be decoded.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// An upload arrived without an original filename.
    #[error("upload is missing its original filename")]
    MissingFilename,

    /// The ELF file could not be parsed. The extractor recovers from this error by flipping the
    /// record's `parsing_successful` flag and skipping the header-derived representations.
    #[error("unable to parse ELF: {0}")]
    ParseFailure(String),

    /// The native code-region classifier or the external `readelf` binary exited non-zero or
    /// produced no output for the given path.
    #[error("external tool failed for {0}")]
    ExternalToolFailure(PathBuf),

    /// Some std I/O operation failed (filesystem access, archive expansion or subprocess
    /// plumbing).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A representation required at comparison time is not present on the record.
    #[error("record {0} is missing its {1:?} representation")]
    NotFound(String, RepresentationType),

    /// The per-request deadline elapsed before the work completed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

pub type Result<T> = std::result::Result<T, Error>;
