//! Centralized default constants for docverify.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates and the CLI reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// MODELS
// =============================================================================

/// Preferred generation model, tried first.
pub const PRIMARY_MODEL: &str = "gemini-2.0-flash-001";

/// Fallback generation models, tried in order after the primary one.
pub const FALLBACK_MODELS: &[&str] = &["gemini-2.0-flash-lite-001"];

/// Env var naming the preferred model.
pub const ENV_PRIMARY_MODEL: &str = "GEMINI_MODEL_NAME";

/// Env var holding a comma-separated list of fallback models.
pub const ENV_FALLBACK_MODELS: &str = "GEMINI_FALLBACK_MODELS";

/// Model id family that accepts nucleus/top-k sampling parameters.
pub const SAMPLING_MODEL_FAMILY: &str = "gemini-2.0";

// =============================================================================
// GEMINI ENDPOINT
// =============================================================================

/// Default Gemini API endpoint.
pub const GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Default Vertex AI location when a project id is configured.
pub const GCP_LOCATION: &str = "us-central1";

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// GENERATION PARAMETERS
// =============================================================================

/// Nucleus sampling value for models that accept it.
pub const TOP_P: f32 = 0.95;

/// Top-k sampling value for models that accept it.
pub const TOP_K: u32 = 40;

/// Temperature for identifier extraction.
pub const IDENTIFIER_TEMPERATURE: f32 = 0.2;

/// Temperature for classification and verification.
pub const VERIFY_TEMPERATURE: f32 = 0.1;

/// Max output tokens for identifier extraction and classification.
pub const SHORT_MAX_OUTPUT_TOKENS: u32 = 1024;

/// Max output tokens for combined classification with identifier extraction.
pub const COMBINED_MAX_OUTPUT_TOKENS: u32 = 2048;

/// Max output tokens for verification.
pub const VERIFY_MAX_OUTPUT_TOKENS: u32 = 4096;

// =============================================================================
// RECOVERY
// =============================================================================

/// Confidence assigned when a document type is only found by keyword scan.
pub const KEYWORD_CONFIDENCE: f64 = 0.7;

/// Placeholder for missing classification reasoning.
pub const NO_REASONING: &str = "No reasoning provided";

/// Placeholder for missing discrepancy descriptions.
pub const NO_DESCRIPTION: &str = "No description provided";

/// Reasoning recorded when the keyword scan finds a type.
pub const KEYWORD_REASONING: &str = "Extracted from text response";

/// Reasoning recorded when the keyword scan finds nothing.
pub const KEYWORD_MISS_REASONING: &str = "Could not determine document type";

/// MIME type assumed for images whose type cannot be sniffed.
pub const DEFAULT_MIME_TYPE: &str = "image/png";
