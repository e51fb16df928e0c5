//! Backend abstraction for remote multimodal generation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::models::CredentialStatus;
use crate::Result;

/// A binary media blob inlined into a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl MediaBlob {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }
}

/// Sampling parameters sent with a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

impl GenerationParams {
    pub fn new(temperature: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            max_output_tokens,
            top_p: None,
            top_k: None,
        }
    }

    /// Adds nucleus and top-k sampling.
    pub fn with_sampling(mut self, top_p: f32, top_k: u32) -> Self {
        self.top_p = Some(top_p);
        self.top_k = Some(top_k);
        self
    }

    /// Parameters as they should be sent to `model`.
    ///
    /// Only the `gemini-2.0` family receives nucleus/top-k values; other
    /// models get temperature and output length alone.
    pub fn for_model(&self, model: &str) -> Self {
        if model.contains(defaults::SAMPLING_MODEL_FAMILY) {
            *self
        } else {
            Self::new(self.temperature, self.max_output_tokens)
        }
    }
}

/// A prepared request: prompt text, inlined media and sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub media: Vec<MediaBlob>,
    pub params: GenerationParams,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, media: Vec<MediaBlob>, params: GenerationParams) -> Self {
        Self {
            prompt: prompt.into(),
            media,
            params,
        }
    }
}

/// Remote model endpoint that answers a multimodal prompt with free text.
///
/// The returned text carries no structural guarantee.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run one generation call against `model`.
    async fn generate(&self, model: &str, request: &GenerationRequest) -> Result<String>;

    /// Validate credentials and configuration before the first request.
    async fn prepare(&self) -> Result<()>;

    /// Report how credentials are supplied, for health reporting.
    fn credential_status(&self) -> CredentialStatus;

    /// Get the backend name.
    fn backend_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_for_sampling_family() {
        let params = GenerationParams::new(0.2, 1024).with_sampling(0.95, 40);
        let sent = params.for_model("gemini-2.0-flash-001");
        assert_eq!(sent.top_p, Some(0.95));
        assert_eq!(sent.top_k, Some(40));
    }

    #[test]
    fn test_params_for_other_models_drop_sampling() {
        let params = GenerationParams::new(0.1, 4096).with_sampling(0.95, 40);
        let sent = params.for_model("gemini-1.5-pro");
        assert_eq!(sent.top_p, None);
        assert_eq!(sent.top_k, None);
        assert_eq!(sent.max_output_tokens, 4096);
    }
}
