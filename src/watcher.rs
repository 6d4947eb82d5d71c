//! Watcher — the control loop.
//!
//! Sits **Idle** until the poll timer fires, then **Scans** the watch
//! directory: every `*.eml` file not yet in the seen set is driven through
//! the pipeline in file-name order. Per-document failures become rejection
//! files; a persistence failure stops the loop.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::context::PipelineContext;
use crate::error::{DocumentError, Error};
use crate::pipeline::normalize::read_document;
use crate::pipeline::types::{DocumentId, FailureKind, LedgerRow, RawDocument, RejectionRecord};
use crate::store::{Ledger, RejectionSink, SeenSet};

/// Extension of the mail files picked up from the watch directory.
pub const DOCUMENT_EXTENSION: &str = "eml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Scanning,
}

/// What one scan did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub committed: Vec<DocumentId>,
    pub rejected: Vec<DocumentId>,
    /// Files that could not be read this time; retried on the next scan.
    pub deferred: Vec<DocumentId>,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty() && self.rejected.is_empty() && self.deferred.is_empty()
    }
}

pub struct Watcher {
    watch_dir: PathBuf,
    poll_interval: Duration,
    context: PipelineContext,
    ledger: Ledger,
    seen: SeenSet,
    rejects: RejectionSink,
    state: WatchState,
}

impl Watcher {
    pub fn new(config: &PipelineConfig, context: PipelineContext, ledger: Ledger, seen: SeenSet) -> Self {
        Self {
            watch_dir: config.watch_dir.clone(),
            poll_interval: config.poll_interval,
            context,
            ledger,
            seen,
            rejects: RejectionSink::new(&config.rejects_dir),
            state: WatchState::Idle,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    /// Poll until Ctrl+C.
    pub async fn run(&mut self) -> Result<(), Error> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Poll until `shutdown` resolves. A scan in progress always finishes
    /// before shutdown is observed.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> Result<(), Error> {
        info!(
            dir = %self.watch_dir.display(),
            every_secs = self.poll_interval.as_secs(),
            "Watcher started"
        );

        let mut tick = tokio::time::interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Watcher shutting down");
                    return Ok(());
                }
                _ = tick.tick() => {}
            }

            let report = self.scan_once().await?;
            if !report.is_empty() {
                debug!(
                    committed = report.committed.len(),
                    rejected = report.rejected.len(),
                    deferred = report.deferred.len(),
                    "Scan finished"
                );
            }
        }
    }

    /// Walk the current listing once.
    pub async fn scan_once(&mut self) -> Result<ScanReport, Error> {
        self.state = WatchState::Scanning;
        let result = self.scan_listing().await;
        self.state = WatchState::Idle;
        result
    }

    async fn scan_listing(&mut self) -> Result<ScanReport, Error> {
        let mut report = ScanReport::default();

        for path in list_documents(&self.watch_dir) {
            if self.seen.contains(&file_id(&path)) {
                continue;
            }

            let document = match read_document(&path) {
                Ok(document) => document,
                Err(e) => {
                    warn!("Skipping unreadable document: {e}");
                    report.deferred.push(file_id(&path));
                    continue;
                }
            };

            let id = document.id.clone();
            let outcome = self.commit(&document).await;
            match outcome {
                Ok(row) => {
                    self.seen.mark_committed(id.clone())?;
                    info!(document = %id, row = row.position, "Committed");
                    eprintln!("✔ processed {id}");
                    report.committed.push(id);
                }
                Err(err) => match err.kind() {
                    FailureKind::MalformedDocument
                    | FailureKind::ExtractionExhausted
                    | FailureKind::SchemaViolation => {
                        self.reject(id.clone(), &err)?;
                        eprintln!("✘ rejected {id}: {err}");
                        report.rejected.push(id);
                    }
                    FailureKind::PersistenceFailure => {
                        error!(document = %id, "Ledger write failed: {err}");
                        return Err(err.into());
                    }
                },
            }
        }

        Ok(report)
    }

    async fn commit(&mut self, document: &RawDocument) -> Result<LedgerRow, DocumentError> {
        let record = self.context.prepare(document).await?;
        Ok(self.ledger.append(&record)?)
    }

    fn reject(&mut self, id: DocumentId, err: &DocumentError) -> Result<(), Error> {
        let record = RejectionRecord {
            id,
            kind: err.kind(),
            message: err.to_string(),
        };
        self.rejects.write(&record)?;
        self.seen.mark_rejected(record.id)?;
        Ok(())
    }
}

/// `*.eml` files in `dir`, sorted by file name. A listing failure is logged
/// and yields nothing, so the next poll tries again.
fn list_documents(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), "Cannot list watch directory: {e}");
            return Vec::new();
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
        })
        .collect();
    paths.sort_by_key(|path| file_id(path));
    paths
}

fn file_id(path: &Path) -> DocumentId {
    DocumentId::new(
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    )
}
