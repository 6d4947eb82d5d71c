//! Rejection sink — one text file per document that never reached the table.

use std::path::PathBuf;

use tracing::warn;

use crate::error::StoreError;
use crate::pipeline::types::RejectionRecord;
use crate::store::write_atomic;

pub struct RejectionSink {
    dir: PathBuf,
}

impl RejectionSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the rejection file for a document: `<stem>.reject.txt`.
    pub fn path_for(&self, record: &RejectionRecord) -> PathBuf {
        self.dir.join(format!("{}.reject.txt", record.id.stem()))
    }

    /// Write `<kind>: <message>` to the document's rejection file,
    /// replacing any earlier one.
    pub fn write(&self, record: &RejectionRecord) -> Result<PathBuf, StoreError> {
        let path = self.path_for(record);
        let body = format!("{}: {}\n", record.kind, record.message);
        write_atomic(&path, body.as_bytes())?;
        warn!(document = %record.id, kind = %record.kind, "Document rejected");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{DocumentId, FailureKind};

    #[test]
    fn writes_kind_and_message() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RejectionSink::new(dir.path());
        let record = RejectionRecord {
            id: DocumentId::new("broken report.eml"),
            kind: FailureKind::ExtractionExhausted,
            message: "no valid JSON after 3 attempt(s)".into(),
        };

        let path = sink.write(&record).unwrap();
        assert_eq!(path, dir.path().join("broken report.reject.txt"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "ExtractionExhausted: no valid JSON after 3 attempt(s)\n"
        );
    }

    #[test]
    fn missing_directory_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RejectionSink::new(dir.path().join("nope"));
        let record = RejectionRecord {
            id: DocumentId::new("a.eml"),
            kind: FailureKind::MalformedDocument,
            message: "empty".into(),
        };
        assert!(matches!(sink.write(&record), Err(StoreError::Persistence { .. })));
    }
}
