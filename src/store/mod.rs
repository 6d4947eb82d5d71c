//! Persistence layer — the xlsx ledger, its seen-set sidecar and the
//! rejection sink.

pub mod layout;
pub mod ledger;
pub mod rejects;
pub mod seen;

pub use ledger::Ledger;
pub use rejects::RejectionSink;
pub use seen::SeenSet;

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::StoreError;

/// Replace `path` with `bytes` via a temp file in the same directory and a
/// rename, so readers see either the old or the new contents.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)
        .map_err(|e| StoreError::persistence(path, format!("create temp file: {e}")))?;
    temp.write_all(bytes)
        .map_err(|e| StoreError::persistence(path, format!("write temp file: {e}")))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::persistence(path, format!("fsync temp file: {e}")))?;
    temp.persist(path)
        .map_err(|e| StoreError::persistence(path, format!("rename temp file: {}", e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_creates_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        write_atomic(&path, b"first").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");

        // No temp files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_atomic_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.bin");
        let err = write_atomic(&path, b"x").unwrap_err();
        assert!(matches!(err, StoreError::Persistence { .. }));
    }
}
