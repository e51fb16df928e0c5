//! # docverify-inference
//!
//! Remote model plumbing for docverify.
//!
//! This crate provides:
//! - Gemini `generateContent` backend (API key or Vertex AI bearer token)
//! - [`BackendSession`], the readiness handle owned by the composition root
//! - [`ModelInvocationOrchestrator`], which walks a prioritized candidate list
//!   strictly in sequence until one model answers
//! - A scripted mock backend (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docverify_core::{GenerationParams, GenerationRequest};
//! use docverify_inference::{BackendSession, GeminiBackend, ModelCandidates, ModelInvocationOrchestrator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = GeminiBackend::from_env().unwrap();
//!     let session = BackendSession::new(Arc::new(backend));
//!     session.initialize().await;
//!
//!     let orchestrator = ModelInvocationOrchestrator::new(ModelCandidates::from_env());
//!     let request = GenerationRequest::new("Describe this page", vec![], GenerationParams::new(0.1, 1024));
//!     let outcome = orchestrator.invoke(&session, &request).await;
//!     println!("{:?}", outcome.raw_text());
//! }
//! ```

pub mod gemini;
pub mod orchestrator;
pub mod session;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use gemini::{GeminiBackend, GeminiConfig, GeminiErrorCode};
pub use orchestrator::{
    AttemptOutcome, InvocationOutcome, ModelCandidates, ModelInvocationOrchestrator,
};
pub use session::BackendSession;
