//! Gemini-specific error handling.

use docverify_core::Error;

/// Gemini-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeminiErrorCode {
    /// Missing or rejected credentials.
    AuthenticationError,
    /// Quota or rate limit exceeded.
    RateLimitExceeded,
    /// Model not found or not available in this location.
    ModelNotFound,
    /// Malformed request (bad media, bad parameters).
    InvalidArgument,
    /// Prompt or response blocked by safety filters.
    Blocked,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl GeminiErrorCode {
    /// Determine error code from HTTP status and the error envelope `status`.
    pub fn from_response(status: u16, error_status: &str) -> Self {
        match (status, error_status) {
            (401, _) | (403, _) | (_, "UNAUTHENTICATED") | (_, "PERMISSION_DENIED") => {
                Self::AuthenticationError
            }
            (429, _) | (_, "RESOURCE_EXHAUSTED") => Self::RateLimitExceeded,
            (404, _) | (_, "NOT_FOUND") => Self::ModelNotFound,
            (400, _) | (_, "INVALID_ARGUMENT") | (_, "FAILED_PRECONDITION") => {
                Self::InvalidArgument
            }
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }
}

/// Convert a Gemini error to a docverify Error.
pub fn to_docverify_error(code: GeminiErrorCode, message: &str) -> Error {
    match code {
        GeminiErrorCode::AuthenticationError => {
            Error::Config(format!("Authentication failed: {}", message))
        }
        GeminiErrorCode::RateLimitExceeded => {
            Error::Inference(format!("Rate limit exceeded: {}", message))
        }
        GeminiErrorCode::ModelNotFound => Error::Config(format!("Model not found: {}", message)),
        GeminiErrorCode::InvalidArgument => {
            Error::InvalidInput(format!("Request rejected: {}", message))
        }
        GeminiErrorCode::Blocked => Error::Inference(format!("Response blocked: {}", message)),
        GeminiErrorCode::ServerError => Error::Inference(format!("Server error: {}", message)),
        GeminiErrorCode::Unknown => Error::Inference(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_401() {
        let code = GeminiErrorCode::from_response(401, "UNAUTHENTICATED");
        assert_eq!(code, GeminiErrorCode::AuthenticationError);
    }

    #[test]
    fn test_error_code_from_429() {
        let code = GeminiErrorCode::from_response(429, "RESOURCE_EXHAUSTED");
        assert_eq!(code, GeminiErrorCode::RateLimitExceeded);
    }

    #[test]
    fn test_error_code_from_404() {
        let code = GeminiErrorCode::from_response(404, "NOT_FOUND");
        assert_eq!(code, GeminiErrorCode::ModelNotFound);
    }

    #[test]
    fn test_error_code_from_400() {
        let code = GeminiErrorCode::from_response(400, "INVALID_ARGUMENT");
        assert_eq!(code, GeminiErrorCode::InvalidArgument);
    }

    #[test]
    fn test_error_code_from_503() {
        let code = GeminiErrorCode::from_response(503, "UNAVAILABLE");
        assert_eq!(code, GeminiErrorCode::ServerError);
    }

    #[test]
    fn test_error_code_from_unknown() {
        let code = GeminiErrorCode::from_response(418, "");
        assert_eq!(code, GeminiErrorCode::Unknown);
    }

    #[test]
    fn test_to_docverify_error_auth() {
        let err = to_docverify_error(GeminiErrorCode::AuthenticationError, "API key not valid");
        assert!(err.to_string().contains("Authentication failed"));
    }

    #[test]
    fn test_to_docverify_error_blocked() {
        let err = to_docverify_error(GeminiErrorCode::Blocked, "SAFETY");
        assert_eq!(err.to_string(), "Inference error: Response blocked: SAFETY");
    }
}
