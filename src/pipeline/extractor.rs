//! Extractor — asks the model for a JSON incident record, retrying with a
//! corrective prompt until the reply has the record's exact shape.
//!
//! Retry flow is an explicit state machine:
//! `Attempting → (Succeeded | Retrying → Attempting | Exhausted)`.
//! The sleep between attempts comes from [`RetryPolicy::backoff`], a pure
//! function of the attempt number.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::llm::provider::{CompletionRequest, LlmProvider};
use crate::pipeline::types::{ExtractedRecord, FieldSchema, NormalizedText};

/// Default number of model calls per document.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default linear backoff step.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(500);

/// Low temperature keeps field extraction close to deterministic.
const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// How many times to call the model and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step: DEFAULT_BACKOFF_STEP,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `step × attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }

    pub fn has_attempts_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

/// A successful extraction and how many model calls it took.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: ExtractedRecord,
    pub attempts: u32,
}

enum AttemptState {
    Attempting { attempt: u32, prompt: String },
    Retrying { attempt: u32, reason: String },
    Succeeded { record: ExtractedRecord, attempts: u32 },
    Exhausted { attempts: u32, reason: String },
}

/// Calls the model and enforces the record shape on its reply.
pub struct Extractor {
    llm: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl Extractor {
    pub fn new(llm: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { llm, policy }
    }

    /// Extract a record from `text`, using `system_prompt` on the first
    /// attempt and the corrective prompt on every retry.
    pub async fn extract(
        &self,
        text: &NormalizedText,
        system_prompt: &str,
    ) -> Result<Extraction, ExtractError> {
        let mut state = AttemptState::Attempting {
            attempt: 1,
            prompt: build_initial_prompt(system_prompt, text.as_str()),
        };

        loop {
            state = match state {
                AttemptState::Attempting { attempt, prompt } => {
                    match self.attempt_once(prompt).await {
                        Ok(record) => AttemptState::Succeeded {
                            record,
                            attempts: attempt,
                        },
                        Err(reason) if self.policy.has_attempts_after(attempt) => {
                            AttemptState::Retrying { attempt, reason }
                        }
                        Err(reason) => AttemptState::Exhausted {
                            attempts: attempt,
                            reason,
                        },
                    }
                }
                AttemptState::Retrying { attempt, reason } => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        attempt,
                        error = %reason,
                        delay_ms = delay.as_millis() as u64,
                        "Model reply rejected, retrying with corrective prompt"
                    );
                    tokio::time::sleep(delay).await;
                    AttemptState::Attempting {
                        attempt: attempt + 1,
                        prompt: build_corrective_prompt(text.as_str()),
                    }
                }
                AttemptState::Succeeded { record, attempts } => {
                    info!(attempts, model = self.llm.model_name(), "Extracted record");
                    return Ok(Extraction { record, attempts });
                }
                AttemptState::Exhausted { attempts, reason } => {
                    return Err(ExtractError::Exhausted {
                        attempts,
                        last_error: reason,
                    });
                }
            };
        }
    }

    /// One model call plus shape validation. The error string feeds the
    /// retry log and, on exhaustion, the rejection message.
    async fn attempt_once(&self, prompt: String) -> Result<ExtractedRecord, String> {
        let request = CompletionRequest::new(prompt).with_temperature(EXTRACTION_TEMPERATURE);
        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|e| format!("model call failed: {e}"))?;

        debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Model replied"
        );

        parse_record(&response.content)
    }
}

/// Parse a model reply into a record: fence stripping, JSON parsing, shape
/// validation.
pub fn parse_record(raw: &str) -> Result<ExtractedRecord, String> {
    let body = strip_code_fence(raw);
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("JSON parse error: {e}"))?;
    ExtractedRecord::from_json(&value).map_err(|e| format!("schema mismatch: {e}"))
}

/// Strip a Markdown code fence and an optional `json` tag. Text that does not
/// open with three backticks is only trimmed.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = match inner.get(..4) {
        Some(tag) if tag.eq_ignore_ascii_case("json") => &inner[4..],
        _ => inner,
    };
    inner.trim()
}

/// Built-in prompt used when no prompt file is configured.
pub fn default_system_prompt() -> String {
    format!(
        "Extract JSON with keys: {}. Use dropdown values or \"TBD\".",
        FieldSchema::field_names().join(", ")
    )
}

fn build_initial_prompt(system_prompt: &str, email_text: &str) -> String {
    format!("{system_prompt}\n\nEMAIL TEXT:\n{email_text}\n")
}

fn build_corrective_prompt(email_text: &str) -> String {
    format!(
        "Your previous response was not valid JSON. \
         Return only valid JSON that conforms to the schema, nothing else.\n\n\
         EMAIL TEXT:\n{email_text}"
    )
}
