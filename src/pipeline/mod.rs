//! Per-document ingestion pipeline.
//!
//! Every new mail file flows through:
//! 1. `normalize::normalize()` — MIME → one canonical text block
//! 2. `Extractor::extract()` — model call with schema validation and retry
//! 3. `Reconciler::reconcile()` — deterministic date/operation/notes repairs
//! 4. `Ledger::append()` — validated, styled row persisted to the workbook
//!
//! Failures at any step become a rejection; only persistence failures stop
//! the watcher.

pub mod dates;
pub mod extractor;
pub mod keywords;
pub mod normalize;
pub mod reconcile;
pub mod types;

pub use extractor::{Extraction, Extractor, RetryPolicy};
pub use reconcile::Reconciler;
