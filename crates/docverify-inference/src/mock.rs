//! Scripted mock backend for deterministic testing.
//!
//! Each model id is scripted with a fixed reply, either text or an error.
//! Unscripted models fail, so a test only reaches the models it names.
//!
//! ## Usage
//!
//! ```rust
//! use docverify_inference::mock::MockGenerationBackend;
//!
//! let backend = MockGenerationBackend::new()
//!     .with_failure("gemini-2.0-flash-001", "quota exhausted")
//!     .with_response("gemini-2.0-flash-lite-001", r#"{"documentType": "SalesQuote"}"#);
//! assert_eq!(backend.call_count(), 0);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docverify_core::{
    CredentialStatus, Error, GenerationBackend, GenerationParams, GenerationRequest, Result,
};

/// Scripted reply for one model id.
#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Failure(String),
}

#[derive(Debug, Clone, Default)]
struct MockConfig {
    replies: HashMap<String, MockReply>,
    prepare_failure: Option<String>,
}

/// One recorded `generate` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub model: String,
    pub prompt: String,
    pub media_count: usize,
    pub params: GenerationParams,
}

/// Mock generation backend for testing.
#[derive(Clone, Default)]
pub struct MockGenerationBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
    prepare_calls: Arc<Mutex<usize>>,
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `model` to answer with `text`.
    pub fn with_response(mut self, model: impl Into<String>, text: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .replies
            .insert(model.into(), MockReply::Text(text.into()));
        self
    }

    /// Script `model` to fail with `message`.
    pub fn with_failure(mut self, model: impl Into<String>, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .replies
            .insert(model.into(), MockReply::Failure(message.into()));
        self
    }

    /// Make `prepare` fail with `message`.
    pub fn with_prepare_failure(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).prepare_failure = Some(message.into());
        self
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Model ids in the order they were called.
    pub fn called_models(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    pub fn prepare_count(&self) -> usize {
        self.prepare_calls.lock().map(|n| *n).unwrap_or_default()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, model: &str, request: &GenerationRequest) -> Result<String> {
        if let Ok(mut log) = self.call_log.lock() {
            log.push(MockCall {
                model: model.to_string(),
                prompt: request.prompt.clone(),
                media_count: request.media.len(),
                params: request.params.for_model(model),
            });
        }

        match self.config.replies.get(model) {
            Some(MockReply::Text(text)) => Ok(text.clone()),
            Some(MockReply::Failure(message)) => Err(Error::Inference(message.clone())),
            None => Err(Error::Inference(format!(
                "No scripted response for model {}",
                model
            ))),
        }
    }

    async fn prepare(&self) -> Result<()> {
        if let Ok(mut n) = self.prepare_calls.lock() {
            *n += 1;
        }
        match self.config.prepare_failure {
            Some(ref message) => Err(Error::Config(message.clone())),
            None => Ok(()),
        }
    }

    fn credential_status(&self) -> CredentialStatus {
        CredentialStatus {
            status: "available".to_string(),
            kind: "mock".to_string(),
        }
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}
