//! The catalog boundary. The persistent store itself is an external collaborator; this module
//! defines the narrow repository interface the engine talks through, plus an in-memory
//! implementation used by tests and embedded callers.

use std::sync::Mutex;

use crate::record::FileRecord;
use crate::{Error, Result};

/// Narrow repository interface over the content-addressed catalog. After [Catalog::save] returns,
/// the record carries an id and every representation carries a back-reference to it.
pub trait Catalog: Send + Sync {
    /// All records sharing the content hash. Multiple rows may share a hash under distinct
    /// filenames.
    fn find_by_hash(&self, sha256: &str) -> Result<Vec<FileRecord>>;

    /// The record for an exact `(hash, filename)` pair.
    fn find_by_hash_and_filename(&self, sha256: &str, filename: &str)
        -> Result<Option<FileRecord>>;

    /// A snapshot of every record in the catalog.
    fn find_all(&self) -> Result<Vec<FileRecord>>;

    /// Persists the record and all its representations atomically, assigning ids. A record that
    /// already has an id is replaced in place, which is how reanalysis updates representations.
    fn save(&self, record: &mut FileRecord) -> Result<()>;
}

#[derive(Default)]
struct MemoryCatalogInner {
    rows: Vec<FileRecord>,
    next_file_id: i64,
    next_representation_id: i64,
}

/// In-process catalog: a mutex over a row vector with monotonic id assignment.
#[derive(Default)]
pub struct MemoryCatalog {
    inner: Mutex<MemoryCatalogInner>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, MemoryCatalogInner>> {
        self.inner
            .lock()
            .map_err(|_| Error::InvalidArgument("catalog mutex poisoned".into()))
    }
}

impl Catalog for MemoryCatalog {
    fn find_by_hash(&self, sha256: &str) -> Result<Vec<FileRecord>> {
        let inner = self.locked()?;
        Ok(inner
            .rows
            .iter()
            .filter(|row| row.sha256 == sha256)
            .cloned()
            .collect())
    }

    fn find_by_hash_and_filename(
        &self,
        sha256: &str,
        filename: &str,
    ) -> Result<Option<FileRecord>> {
        let inner = self.locked()?;
        Ok(inner
            .rows
            .iter()
            .find(|row| row.sha256 == sha256 && row.filename == filename)
            .cloned())
    }

    fn find_all(&self) -> Result<Vec<FileRecord>> {
        Ok(self.locked()?.rows.clone())
    }

    fn save(&self, record: &mut FileRecord) -> Result<()> {
        let mut inner = self.locked()?;

        let file_id = match record.id {
            Some(id) => id,
            None => {
                inner.next_file_id += 1;
                inner.next_file_id
            }
        };
        record.id = Some(file_id);
        for representation in record.representations_mut() {
            if representation.id.is_none() {
                inner.next_representation_id += 1;
                representation.id = Some(inner.next_representation_id);
            }
            representation.file_id = Some(file_id);
        }

        match inner.rows.iter_mut().find(|row| row.id == Some(file_id)) {
            Some(row) => *row = record.clone(),
            None => inner.rows.push(record.clone()),
        }
        Ok(())
    }
}
