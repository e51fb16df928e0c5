//! Gemini `generateContent` backend.
//!
//! Works against both endpoints that serve Gemini models:
//!
//! - Gemini API (`/v1beta/models/{model}:generateContent`, `x-goog-api-key`)
//! - Vertex AI (`/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent`,
//!   bearer access token)
//!
//! # Example
//!
//! ```rust,no_run
//! use docverify_core::{GenerationBackend, GenerationParams, GenerationRequest};
//! use docverify_inference::gemini::{GeminiBackend, GeminiConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = GeminiConfig {
//!         api_key: Some("test-key".to_string()),
//!         ..Default::default()
//!     };
//!     let backend = GeminiBackend::new(config).unwrap();
//!
//!     let request = GenerationRequest::new("Hello", vec![], GenerationParams::new(0.1, 256));
//!     let text = backend.generate("gemini-2.0-flash-001", &request).await.unwrap();
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{GeminiBackend, GeminiConfig};
pub use error::{to_docverify_error, GeminiErrorCode};
pub use types::*;
