//! Prioritized model candidates and sequential invocation.
//!
//! Candidates are tried one at a time in priority order. The first candidate
//! that returns non-blank text wins; a failed candidate is never retried
//! within the same invocation.

use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use docverify_core::{defaults, GenerationRequest};

use crate::session::BackendSession;

/// Error recorded when the session was never prepared.
pub const NOT_INITIALIZED: &str = "Backend client not initialized";

/// Error recorded when there is nothing to try.
pub const NO_CANDIDATES: &str = "No model candidates configured";

/// Ordered, de-duplicated list of model ids, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidates {
    models: Vec<String>,
}

impl ModelCandidates {
    /// Build from any list, dropping blanks and later duplicates.
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut deduped: Vec<String> = Vec::new();
        for model in models {
            let model = model.into().trim().to_string();
            if !model.is_empty() && !deduped.contains(&model) {
                deduped.push(model);
            }
        }
        Self { models: deduped }
    }

    /// `GEMINI_MODEL_NAME` followed by `GEMINI_FALLBACK_MODELS` (comma-separated).
    pub fn from_env() -> Self {
        let primary = std::env::var(defaults::ENV_PRIMARY_MODEL)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| defaults::PRIMARY_MODEL.to_string());
        let fallbacks: Vec<String> = match std::env::var(defaults::ENV_FALLBACK_MODELS) {
            Ok(list) => list.split(',').map(str::to_string).collect(),
            Err(_) => defaults::FALLBACK_MODELS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        };
        Self::new(std::iter::once(primary).chain(fallbacks))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.models
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelCandidates {
    fn default() -> Self {
        Self::new(
            std::iter::once(defaults::PRIMARY_MODEL).chain(defaults::FALLBACK_MODELS.iter().copied()),
        )
    }
}

/// Result of calling one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success {
        model_id: String,
        raw_text: String,
        elapsed: Duration,
    },
    Failure {
        model_id: String,
        error: String,
        elapsed: Duration,
    },
}

impl AttemptOutcome {
    pub fn model_id(&self) -> &str {
        match self {
            AttemptOutcome::Success { model_id, .. } | AttemptOutcome::Failure { model_id, .. } => {
                model_id
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success { .. })
    }
}

/// Result of one full invocation across the candidate list.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationOutcome {
    /// A candidate produced non-blank text.
    Success {
        model_id: String,
        raw_text: String,
        attempts: Vec<AttemptOutcome>,
    },
    /// Every candidate failed, or none could be tried.
    Exhausted {
        last_error: String,
        /// Unusable text seen before giving up, kept for audit.
        last_raw_text: Option<String>,
        attempts: Vec<AttemptOutcome>,
    },
}

impl InvocationOutcome {
    /// Raw text of the winning candidate, or unusable text seen on failure.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            InvocationOutcome::Success { raw_text, .. } => Some(raw_text),
            InvocationOutcome::Exhausted { last_raw_text, .. } => last_raw_text.as_deref(),
        }
    }

    pub fn attempts(&self) -> &[AttemptOutcome] {
        match self {
            InvocationOutcome::Success { attempts, .. }
            | InvocationOutcome::Exhausted { attempts, .. } => attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Success { .. })
    }
}

/// Drives a backend through a prioritized list of candidate models.
#[derive(Debug, Clone, Default)]
pub struct ModelInvocationOrchestrator {
    candidates: ModelCandidates,
}

impl ModelInvocationOrchestrator {
    pub fn new(candidates: ModelCandidates) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &ModelCandidates {
        &self.candidates
    }

    /// Try each candidate in order until one answers with non-blank text.
    ///
    /// Never fails: transport errors and blank responses become
    /// [`AttemptOutcome::Failure`] entries and the last one is reported in
    /// [`InvocationOutcome::Exhausted`].
    pub async fn invoke(
        &self,
        session: &BackendSession,
        request: &GenerationRequest,
    ) -> InvocationOutcome {
        if !session.is_ready() {
            error!(backend = session.backend_name(), "{}", NOT_INITIALIZED);
            return InvocationOutcome::Exhausted {
                last_error: NOT_INITIALIZED.to_string(),
                last_raw_text: None,
                attempts: Vec::new(),
            };
        }

        let total = self.candidates.len();
        let mut attempts = Vec::with_capacity(total);
        let mut last_error = NO_CANDIDATES.to_string();
        let mut last_raw_text = None;

        for (index, model) in self.candidates.iter().enumerate() {
            let attempt = index + 1;
            let start = Instant::now();
            let result = session.backend().generate(model, request).await;
            let elapsed = start.elapsed();
            let duration_ms = elapsed.as_millis() as u64;

            match result {
                Ok(text) if !text.trim().is_empty() => {
                    info!(
                        model,
                        attempt,
                        duration_ms,
                        response_len = text.len(),
                        success = true,
                        "Model attempt succeeded"
                    );
                    attempts.push(AttemptOutcome::Success {
                        model_id: model.to_string(),
                        raw_text: text.clone(),
                        elapsed,
                    });
                    return InvocationOutcome::Success {
                        model_id: model.to_string(),
                        raw_text: text,
                        attempts,
                    };
                }
                Ok(text) => {
                    let message = format!("Model {} returned an empty response", model);
                    warn!(
                        model,
                        attempt,
                        duration_ms,
                        success = false,
                        error = %message,
                        "Model attempt failed"
                    );
                    if !text.is_empty() {
                        last_raw_text = Some(text);
                    }
                    attempts.push(AttemptOutcome::Failure {
                        model_id: model.to_string(),
                        error: message.clone(),
                        elapsed,
                    });
                    last_error = message;
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(
                        model,
                        attempt,
                        duration_ms,
                        success = false,
                        error = %message,
                        "Model attempt failed"
                    );
                    attempts.push(AttemptOutcome::Failure {
                        model_id: model.to_string(),
                        error: message.clone(),
                        elapsed,
                    });
                    last_error = message;
                }
            }
        }

        error!(
            candidates = total,
            error = %last_error,
            "All model candidates failed"
        );
        InvocationOutcome::Exhausted {
            last_error,
            last_raw_text,
            attempts,
        }
    }
}
