//! Inbound operations and their generation parameters.

use std::fmt;

use docverify_core::{defaults, GenerationParams};

/// One of the four inbound operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ExtractIdentifiers,
    Verify,
    Classify,
    /// `identifier_mode` is selected by the shape of the reference data.
    ClassifyAndVerify { identifier_mode: bool },
}

impl Operation {
    /// Name used for the `op` log field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ExtractIdentifiers => "extract_identifiers",
            Operation::Verify => "verify",
            Operation::Classify => "classify",
            Operation::ClassifyAndVerify { .. } => "classify_and_verify",
        }
    }

    /// Sampling parameters sent with this operation's prompt.
    ///
    /// Nucleus/top-k values are attached here and later dropped per model by
    /// [`GenerationParams::for_model`].
    pub fn generation_params(&self) -> GenerationParams {
        match self {
            Operation::ExtractIdentifiers => GenerationParams::new(
                defaults::IDENTIFIER_TEMPERATURE,
                defaults::SHORT_MAX_OUTPUT_TOKENS,
            )
            .with_sampling(defaults::TOP_P, defaults::TOP_K),
            Operation::Classify => GenerationParams::new(
                defaults::VERIFY_TEMPERATURE,
                defaults::SHORT_MAX_OUTPUT_TOKENS,
            ),
            Operation::Verify
            | Operation::ClassifyAndVerify {
                identifier_mode: false,
            } => GenerationParams::new(
                defaults::VERIFY_TEMPERATURE,
                defaults::VERIFY_MAX_OUTPUT_TOKENS,
            )
            .with_sampling(defaults::TOP_P, defaults::TOP_K),
            Operation::ClassifyAndVerify {
                identifier_mode: true,
            } => GenerationParams::new(
                defaults::VERIFY_TEMPERATURE,
                defaults::COMBINED_MAX_OUTPUT_TOKENS,
            )
            .with_sampling(defaults::TOP_P, defaults::TOP_K),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
