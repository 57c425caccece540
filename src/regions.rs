//! Bridge to the external code-region classifier. The classifier is handed file paths and emits
//! one JSON document per file with a `range_results` array of classified byte ranges; the bridge
//! turns those into [CodeRegion] lists. Batch invocations return the documents concatenated with
//! no separator, so the stream is split on the `}{` boundary before decoding.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::CoderecConfig;
use crate::process::run_capturing;
use crate::{Error, Result};

/// Maximum number of paths handed to the classifier in one invocation.
pub const BATCH_SIZE: usize = 200;

/// One machine-classified byte range. `end` is exclusive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeRegion {
    pub start: u64,
    pub end: u64,
    pub length: u64,
    pub tag: String,
}

#[derive(Deserialize)]
struct RangeBounds {
    start: u64,
    end: u64,
}

/// Wire form of one `range_results` element: `[{start, end}, length, tag]`.
#[derive(Deserialize)]
struct RawRange(RangeBounds, u64, String);

#[derive(Deserialize)]
struct ClassifierDocument {
    #[serde(default)]
    file: String,
    range_results: Vec<RawRange>,
}

/// This struct owns the classifier wiring. The underlying tool is not assumed to be re-entrant,
/// so invocations are serialized behind a mutex.
pub struct RegionClassifier {
    config: CoderecConfig,
    invocation: Mutex<()>,
}

impl RegionClassifier {
    pub fn new(config: CoderecConfig) -> Self {
        Self {
            config,
            invocation: Mutex::new(()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Classifies a single file. A disabled classifier yields an empty region list.
    ///
    /// Here is a list with all errors, which can occur while this operation:
    /// - [Error::ExternalToolFailure] - The tool exited non-zero or produced no output
    /// - [Error::InvalidEncoding] - The tool's JSON lacks `range_results` or is malformed
    /// - [Error::InvalidArgument] - The classifier is enabled without a configured location
    pub fn classify(&self, path: &Path) -> Result<Vec<CodeRegion>> {
        if !self.config.enabled {
            return Ok(Vec::new());
        }
        let stdout = self.invoke(&[path.as_os_str().to_os_string()], path)?;
        if stdout.trim().is_empty() {
            return Err(Error::ExternalToolFailure(path.to_path_buf()));
        }
        parse_document(&stdout).map(regions_of)
    }

    /// Classifies up to [BATCH_SIZE] files per invocation and keys the results by the `file`
    /// field of each returned document. Inputs the classifier stayed silent about are absent
    /// from the map.
    pub fn classify_batch(&self, paths: &[PathBuf]) -> Result<HashMap<String, Vec<CodeRegion>>> {
        let mut results = HashMap::new();
        if !self.config.enabled || paths.is_empty() {
            return Ok(results);
        }

        for chunk in paths.chunks(BATCH_SIZE) {
            let args: Vec<OsString> =
                chunk.iter().map(|path| path.as_os_str().to_os_string()).collect();
            let stdout = self.invoke(&args, &chunk[0])?;
            if stdout.trim().is_empty() {
                return Err(Error::ExternalToolFailure(chunk[0].clone()));
            }
            for text in split_documents(&stdout) {
                let document = parse_document(&text)?;
                let file = document.file.clone();
                results.insert(file, regions_of(document));
            }
        }
        Ok(results)
    }

    fn invoke(&self, args: &[OsString], subject: &Path) -> Result<String> {
        let location = self.config.location.as_ref().ok_or_else(|| {
            Error::InvalidArgument("coderec is enabled but coderec.location is not set".into())
        })?;

        let arg_refs: Vec<&std::ffi::OsStr> = args.iter().map(OsString::as_os_str).collect();
        let _serialized = self
            .invocation
            .lock()
            .map_err(|_| Error::InvalidArgument("classifier mutex poisoned".into()))?;
        debug!(tool = %location.display(), inputs = args.len(), "invoking code-region classifier");
        let stdout = run_capturing(location.as_os_str(), &arg_refs, subject)?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

fn parse_document(text: &str) -> Result<ClassifierDocument> {
    serde_json::from_str(text)
        .map_err(|error| Error::InvalidEncoding(format!("malformed classifier document: {error}")))
}

fn regions_of(document: ClassifierDocument) -> Vec<CodeRegion> {
    document
        .range_results
        .into_iter()
        .map(|RawRange(bounds, length, tag)| CodeRegion {
            start: bounds.start,
            end: bounds.end,
            length,
            tag,
        })
        .collect()
}

/// Splits a concatenated stream of JSON objects on every `}{` boundary. The classifier emits its
/// documents back to back with no separator.
pub fn split_documents(stream: &str) -> Vec<String> {
    let mut documents = Vec::new();
    let mut rest = stream;
    while let Some(position) = rest.find("}{") {
        documents.push(format!("{}}}", &rest[..position]));
        rest = &rest[position + 1..];
    }
    if !rest.trim().is_empty() {
        documents.push(rest.to_string());
    }
    documents
}
