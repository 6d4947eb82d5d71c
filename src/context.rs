//! Pipeline context — everything a document needs on its way to the ledger,
//! built once at startup and borrowed by the watcher.

use std::sync::Arc;

use tracing::debug;

use crate::error::DocumentError;
use crate::llm::LlmProvider;
use crate::pipeline::normalize::normalize;
use crate::pipeline::types::{ExtractedRecord, RawDocument};
use crate::pipeline::{Extractor, Reconciler, RetryPolicy};

pub struct PipelineContext {
    pub extractor: Extractor,
    pub reconciler: Reconciler,
    pub system_prompt: String,
}

impl PipelineContext {
    pub fn new(llm: Arc<dyn LlmProvider>, retry: RetryPolicy, system_prompt: impl Into<String>) -> Self {
        Self {
            extractor: Extractor::new(llm, retry),
            reconciler: Reconciler::default(),
            system_prompt: system_prompt.into(),
        }
    }

    /// Normalize → extract → reconcile. The result is ready for
    /// `Ledger::append`.
    pub async fn prepare(&self, document: &RawDocument) -> Result<ExtractedRecord, DocumentError> {
        let text = normalize(document)?;
        debug!(document = %document.id, chars = text.as_str().len(), "Normalized");

        let extraction = self.extractor.extract(&text, &self.system_prompt).await?;
        Ok(self.reconciler.reconcile(extraction.record, &text))
    }
}
