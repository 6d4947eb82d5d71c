//! Error types for the incident ledger.

use std::path::PathBuf;

use crate::pipeline::types::FailureKind;

/// Top-level error type for the process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Reading or parsing a source document failed.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("not a mail message: {reason}")]
    Malformed { reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The model never produced a schema-valid record.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no valid JSON after {attempts} attempt(s); last error: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Ledger, seen-set and rejection sink errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{field}: {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },
}

impl StoreError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Why a single document did not make it into the table.
///
/// Closed set: the watcher matches on [`DocumentError::kind`] exhaustively.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("{0}")]
    MalformedDocument(#[from] IngestError),

    #[error("{0}")]
    ExtractionExhausted(#[from] ExtractError),

    #[error("{0}")]
    SchemaViolation(StoreError),

    #[error("{0}")]
    PersistenceFailure(StoreError),
}

impl DocumentError {
    pub fn kind(&self) -> FailureKind {
        match self {
            DocumentError::MalformedDocument(_) => FailureKind::MalformedDocument,
            DocumentError::ExtractionExhausted(_) => FailureKind::ExtractionExhausted,
            DocumentError::SchemaViolation(_) => FailureKind::SchemaViolation,
            DocumentError::PersistenceFailure(_) => FailureKind::PersistenceFailure,
        }
    }
}

impl From<StoreError> for DocumentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SchemaViolation { .. } => DocumentError::SchemaViolation(err),
            StoreError::Persistence { .. } | StoreError::Load { .. } => {
                DocumentError::PersistenceFailure(err)
            }
        }
    }
}

/// Result type alias for the process.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_violation_maps_to_its_kind() {
        let err: DocumentError = StoreError::SchemaViolation {
            field: "Location".into(),
            reason: "not in picklist".into(),
        }
        .into();
        assert_eq!(err.kind(), FailureKind::SchemaViolation);
        assert_eq!(err.to_string(), "Location: not in picklist");
    }

    #[test]
    fn persistence_maps_to_failure_kind() {
        let err: DocumentError = StoreError::persistence("/tmp/valid.xlsx", "disk full").into();
        assert_eq!(err.kind(), FailureKind::PersistenceFailure);
    }

    #[test]
    fn exhausted_message_names_attempts() {
        let err: DocumentError = ExtractError::Exhausted {
            attempts: 3,
            last_error: "expected a JSON object".into(),
        }
        .into();
        assert_eq!(err.kind(), FailureKind::ExtractionExhausted);
        assert!(err.to_string().contains("3 attempt(s)"));
    }
}
