//! # docverify-engine
//!
//! Structured-output recovery for document classification and verification.
//!
//! A model answers a multimodal prompt with free text. This crate turns that
//! text into a validated [`FinalRecord`](docverify_core::FinalRecord):
//!
//! - [`ResponseExtractor`] recovers a structured mapping through a cascade of
//!   strategies, strictest first
//! - [`FieldNormalizer`] coerces the mapping into canonical types
//! - [`IdentifierValidator`] enforces the per-document-type identifier rule
//! - [`ResultAssembler`] builds the single record returned per request
//! - [`VerificationService`] exposes the four inbound operations
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docverify_core::ClassificationRequest;
//! use docverify_engine::VerificationService;
//! use docverify_inference::{BackendSession, GeminiBackend, ModelCandidates, ModelInvocationOrchestrator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = BackendSession::new(Arc::new(GeminiBackend::from_env().unwrap()));
//!     session.initialize().await;
//!     let service = VerificationService::new(
//!         session,
//!         ModelInvocationOrchestrator::new(ModelCandidates::from_env()),
//!     );
//!
//!     let response = service
//!         .classify(&ClassificationRequest {
//!             job_no: "J-1001".to_string(),
//!             document_images: vec![],
//!         })
//!         .await;
//!     println!("{} ({})", response.document_type, response.confidence);
//! }
//! ```

pub mod assemble;
pub mod extract;
pub mod normalize;
pub mod operation;
pub mod prompt;
pub mod service;
pub mod validate;

pub use assemble::ResultAssembler;
pub use extract::{ExtractionPlan, IdentifierScope, RawExtraction, ResponseExtractor};
pub use normalize::{coerce_confidence, normalize_document_type, FieldNormalizer, RecordBuilder};
pub use operation::Operation;
pub use service::{decode_images, HealthReport, VerificationService};
pub use validate::{IdentifierRule, IdentifierValidator, ValidationOutcome};
