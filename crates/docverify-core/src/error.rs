//! Error types for docverify.

use thiserror::Error;

/// Result type alias using docverify's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for docverify operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Remote model call failed or returned an unusable response
    #[error("Inference error: {0}")]
    Inference(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_carries_model_message() {
        let err = Error::Inference("No scripted response for model gemini-x".to_string());
        assert_eq!(
            err.to_string(),
            "Inference error: No scripted response for model gemini-x"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::Config("GEMINI_API_KEY or GEMINI_ACCESS_TOKEN must be set".to_string());
        assert!(err.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_reference_file_io_error() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "erp.json").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("erp.json"));
    }

    #[test]
    fn test_malformed_model_json_is_serialization_error() {
        let parse = serde_json::from_str::<serde_json::Value>("{\"documentType\": SalesQuote}");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(msg) if !msg.is_empty()));
    }

    #[test]
    fn test_every_variant_has_a_distinct_prefix() {
        let errors = [
            Error::Inference("x".to_string()),
            Error::Request("x".to_string()),
            Error::Serialization("x".to_string()),
            Error::Config("x".to_string()),
            Error::InvalidInput("x".to_string()),
            Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "x")),
        ];
        let prefixes: std::collections::HashSet<String> = errors
            .iter()
            .map(|e| match e {
                Error::Inference(_)
                | Error::Request(_)
                | Error::Serialization(_)
                | Error::Config(_)
                | Error::InvalidInput(_)
                | Error::Io(_) => e.to_string().split(':').next().unwrap_or("").to_string(),
            })
            .collect();
        assert_eq!(prefixes.len(), errors.len());
    }

    #[test]
    fn test_error_crosses_task_boundaries() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
