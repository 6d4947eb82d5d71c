//! SeenSet — identities of documents already committed or rejected.
//!
//! Persisted as a small JSON sidecar next to the table and rewritten
//! atomically after every change. The ledger is written first, so a crash
//! between the two writes reprocesses at most one document.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::pipeline::types::DocumentId;
use crate::store::write_atomic;

const SIDECAR_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SeenFile {
    version: u32,
    committed: BTreeSet<DocumentId>,
    rejected: BTreeSet<DocumentId>,
}

#[derive(Debug)]
pub struct SeenSet {
    path: Option<PathBuf>,
    committed: BTreeSet<DocumentId>,
    rejected: BTreeSet<DocumentId>,
}

impl SeenSet {
    /// Sidecar path for a table: `valid.xlsx` → `valid.seen.json`.
    pub fn sidecar_path(table_path: &Path) -> PathBuf {
        table_path.with_extension("seen.json")
    }

    /// A set that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            committed: BTreeSet::new(),
            rejected: BTreeSet::new(),
        }
    }

    /// Load the sidecar at `path`, or start empty if it does not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let file = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<SeenFile>(&bytes)
                .map_err(|e| StoreError::load(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SeenFile::default(),
            Err(e) => return Err(StoreError::load(&path, e)),
        };

        info!(
            path = %path.display(),
            committed = file.committed.len(),
            rejected = file.rejected.len(),
            "Seen set loaded"
        );

        Ok(Self {
            path: Some(path),
            committed: file.committed,
            rejected: file.rejected,
        })
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.committed.contains(id) || self.rejected.contains(id)
    }

    pub fn is_rejected(&self, id: &DocumentId) -> bool {
        self.rejected.contains(id)
    }

    pub fn mark_committed(&mut self, id: DocumentId) -> Result<(), StoreError> {
        self.committed.insert(id);
        self.save()
    }

    pub fn mark_rejected(&mut self, id: DocumentId) -> Result<(), StoreError> {
        self.rejected.insert(id);
        self.save()
    }

    pub fn len(&self) -> usize {
        self.committed.len() + self.rejected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.rejected.is_empty()
    }

    fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = SeenFile {
            version: SIDECAR_VERSION,
            committed: self.committed.clone(),
            rejected: self.rejected.clone(),
        };
        let bytes =
            serde_json::to_vec_pretty(&file).map_err(|e| StoreError::persistence(path, e))?;
        write_atomic(path, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_sits_next_to_table() {
        assert_eq!(
            SeenSet::sidecar_path(Path::new("/data/valid.xlsx")),
            PathBuf::from("/data/valid.seen.json")
        );
    }

    #[test]
    fn missing_sidecar_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let seen = SeenSet::load(dir.path().join("valid.seen.json")).unwrap();
        assert!(seen.is_empty());
    }

    #[test]
    fn marks_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valid.seen.json");

        let mut seen = SeenSet::load(&path).unwrap();
        seen.mark_committed(DocumentId::new("a.eml")).unwrap();
        seen.mark_rejected(DocumentId::new("b.eml")).unwrap();

        let reloaded = SeenSet::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains(&DocumentId::new("a.eml")));
        assert!(reloaded.is_rejected(&DocumentId::new("b.eml")));
        assert!(!reloaded.contains(&DocumentId::new("c.eml")));
    }

    #[test]
    fn in_memory_set_writes_nothing() {
        let mut seen = SeenSet::in_memory();
        seen.mark_committed(DocumentId::new("a.eml")).unwrap();
        assert!(seen.contains(&DocumentId::new("a.eml")));
    }

    #[test]
    fn corrupt_sidecar_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valid.seen.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(SeenSet::load(&path), Err(StoreError::Load { .. })));
    }
}
