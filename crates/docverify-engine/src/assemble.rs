//! Final record assembly.

use docverify_core::{FinalRecord, NormalizedRecord};

use crate::extract::RawExtraction;
use crate::validate::ValidationOutcome;

/// Builds the one [`FinalRecord`] returned per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAssembler;

impl ResultAssembler {
    /// Record for a response that reached extraction.
    ///
    /// A rejected validation sets the error message but keeps every recovered
    /// field.
    pub fn recovered(
        model_id: &str,
        raw_text: String,
        extraction: &RawExtraction,
        record: NormalizedRecord,
        validation: ValidationOutcome,
    ) -> FinalRecord {
        FinalRecord {
            record,
            model_id: Some(model_id.to_string()),
            extraction_tier: Some(extraction.tier),
            raw_llm_response: Some(raw_text),
            error_message: validation.message().map(str::to_string),
        }
    }

    /// Record for a request where no candidate produced usable text.
    ///
    /// `attempts` is the number of candidates actually called. With none
    /// (session not ready, empty candidate list) the error is reported as is.
    pub fn total_failure(
        last_error: &str,
        attempts: usize,
        last_raw_text: Option<String>,
    ) -> FinalRecord {
        let message = if attempts == 0 {
            last_error.to_string()
        } else {
            format!("All models failed. Last error: {}", last_error)
        };
        FinalRecord::failure(message, last_raw_text)
    }
}
