//! Gemini `generateContent` backend implementation.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use docverify_core::{
    defaults, CredentialStatus, Error, GenerationBackend, GenerationRequest, Result,
};

use super::error::{to_docverify_error, GeminiErrorCode};
use super::types::*;

/// Configuration for the Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key, sent as `x-goog-api-key`.
    pub api_key: Option<String>,
    /// OAuth access token for Vertex AI, sent as a bearer token.
    pub access_token: Option<String>,
    /// Google Cloud project. Selects the Vertex AI path when set.
    pub project_id: Option<String>,
    /// Vertex AI location.
    pub location: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::GEMINI_URL.to_string(),
            api_key: None,
            access_token: None,
            project_id: None,
            location: defaults::GCP_LOCATION.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
        }
    }
}

impl GeminiConfig {
    /// Read configuration from environment variables.
    ///
    /// Without `GEMINI_BASE_URL`, a configured project targets the regional
    /// Vertex AI host instead of the Gemini API host.
    pub fn from_env() -> Self {
        let project_id = non_blank_env("GCP_PROJECT_ID");
        let location =
            non_blank_env("GCP_LOCATION").unwrap_or_else(|| defaults::GCP_LOCATION.to_string());
        let base_url = non_blank_env("GEMINI_BASE_URL").unwrap_or_else(|| {
            if project_id.is_some() {
                format!("https://{}-aiplatform.googleapis.com", location)
            } else {
                defaults::GEMINI_URL.to_string()
            }
        });

        Self {
            base_url,
            api_key: non_blank_env("GEMINI_API_KEY"),
            access_token: non_blank_env("GEMINI_ACCESS_TOKEN"),
            project_id,
            location,
            timeout_seconds: std::env::var("GEMINI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::GEN_TIMEOUT_SECS),
        }
    }
}

fn non_blank_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Gemini backend speaking the REST `generateContent` API.
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Create a new Gemini backend with the given configuration.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            vertex = config.project_id.is_some(),
            timeout_secs = config.timeout_seconds,
            "Initializing Gemini backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Full `generateContent` URL for `model`.
    pub fn endpoint_url(&self, model: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.project_id {
            Some(ref project) => format!(
                "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
                base, project, self.config.location, model
            ),
            None => format!("{}/v1beta/models/{}:generateContent", base, model),
        }
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, model: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.post(self.endpoint_url(model));

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("x-goog-api-key", api_key);
        }

        if let Some(ref token) = self.config.access_token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }

        req.header("Content-Type", "application/json")
    }

    fn build_body(request: &GenerationRequest, model: &str) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(request.media.len() + 1);
        parts.push(Part::text(request.prompt.clone()));
        for blob in &request.media {
            parts.push(Part::inline(blob.mime_type.clone(), STANDARD.encode(&blob.data)));
        }

        let params = request.params.for_model(model);
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
                top_p: params.top_p,
                top_k: params.top_k,
            },
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    async fn generate(&self, model: &str, request: &GenerationRequest) -> Result<String> {
        debug!(
            model,
            prompt_len = request.prompt.len(),
            media_count = request.media.len(),
            "Calling Gemini generateContent"
        );

        let body = Self::build_body(request, model);
        let response = self
            .build_request(model)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let (error_status, message) = match serde_json::from_str::<GeminiErrorResponse>(&text)
            {
                Ok(envelope) => (envelope.error.status, envelope.error.message),
                Err(_) if text.trim().is_empty() => (String::new(), status.to_string()),
                Err(_) => (String::new(), text),
            };
            let code = GeminiErrorCode::from_response(status.as_u16(), &error_status);
            return Err(to_docverify_error(
                code,
                &format!("Gemini returned {}: {}", status.as_u16(), message),
            ));
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        if let Some(reason) = result.block_reason() {
            return Err(to_docverify_error(GeminiErrorCode::Blocked, reason));
        }

        let text = result
            .text()
            .ok_or_else(|| Error::Inference("Response contained no text".to_string()))?;

        debug!(
            model,
            response_len = text.len(),
            "Gemini generation complete"
        );
        Ok(text)
    }

    async fn prepare(&self) -> Result<()> {
        if self.config.api_key.is_none() && self.config.access_token.is_none() {
            return Err(Error::Config(
                "No Gemini credentials configured (set GEMINI_API_KEY or GEMINI_ACCESS_TOKEN)"
                    .to_string(),
            ));
        }
        if self.config.project_id.is_some() && self.config.location.trim().is_empty() {
            return Err(Error::Config(
                "GCP_LOCATION must be set when GCP_PROJECT_ID is configured".to_string(),
            ));
        }
        info!(
            project = self.config.project_id.as_deref().unwrap_or("-"),
            location = %self.config.location,
            "Gemini backend ready"
        );
        Ok(())
    }

    fn credential_status(&self) -> CredentialStatus {
        let (status, kind) = if self.config.access_token.is_some() {
            ("available", "access_token")
        } else if self.config.api_key.is_some() {
            ("available", "api_key")
        } else if self.config.project_id.is_some() {
            ("missing", "access_token")
        } else {
            ("not_configured", "none")
        };
        CredentialStatus {
            status: status.to_string(),
            kind: kind.to_string(),
        }
    }

    fn backend_name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docverify_core::{GenerationParams, MediaBlob};

    #[test]
    fn test_default_config() {
        let config = GeminiConfig::default();
        assert_eq!(config.base_url, defaults::GEMINI_URL);
        assert_eq!(config.location, defaults::GCP_LOCATION);
        assert_eq!(config.timeout_seconds, defaults::GEN_TIMEOUT_SECS);
        assert!(config.api_key.is_none());
        assert!(config.project_id.is_none());
    }

    #[test]
    fn test_endpoint_url_gemini_api() {
        let backend = GeminiBackend::new(GeminiConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            backend.endpoint_url("gemini-2.0-flash-001"),
            "http://localhost:9000/v1beta/models/gemini-2.0-flash-001:generateContent"
        );
    }

    #[test]
    fn test_endpoint_url_vertex() {
        let backend = GeminiBackend::new(GeminiConfig {
            base_url: "https://europe-west4-aiplatform.googleapis.com".to_string(),
            project_id: Some("acme".to_string()),
            location: "europe-west4".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            backend.endpoint_url("gemini-2.0-flash-001"),
            "https://europe-west4-aiplatform.googleapis.com/v1/projects/acme/locations/europe-west4/publishers/google/models/gemini-2.0-flash-001:generateContent"
        );
    }

    #[test]
    fn test_build_body_inlines_media() {
        let request = GenerationRequest::new(
            "classify",
            vec![MediaBlob::new("image/jpeg", vec![1, 2, 3])],
            GenerationParams::new(0.1, 1024).with_sampling(0.95, 40),
        );
        let body = GeminiBackend::build_body(&request, "gemini-2.0-flash-001");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "classify");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(json["contents"][0]["parts"][1]["inlineData"]["data"], "AQID");
        assert_eq!(json["generationConfig"]["topK"], 40);
    }

    #[test]
    fn test_build_body_drops_sampling_outside_family() {
        let request = GenerationRequest::new(
            "verify",
            vec![],
            GenerationParams::new(0.1, 4096).with_sampling(0.95, 40),
        );
        let body = GeminiBackend::build_body(&request, "gemini-1.5-pro-002");
        assert!(body.generation_config.top_p.is_none());
        assert!(body.generation_config.top_k.is_none());
        assert_eq!(body.generation_config.max_output_tokens, 4096);
    }

    #[tokio::test]
    async fn test_prepare_requires_credentials() {
        let backend = GeminiBackend::new(GeminiConfig::default()).unwrap();
        let err = backend.prepare().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(backend.credential_status().status, "not_configured");
    }

    #[tokio::test]
    async fn test_prepare_with_api_key() {
        let backend = GeminiBackend::new(GeminiConfig {
            api_key: Some("k".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(backend.prepare().await.is_ok());
        let status = backend.credential_status();
        assert_eq!(status.status, "available");
        assert_eq!(status.kind, "api_key");
    }

    #[test]
    fn test_credential_status_vertex_without_token() {
        let backend = GeminiBackend::new(GeminiConfig {
            project_id: Some("acme".to_string()),
            ..Default::default()
        })
        .unwrap();
        let status = backend.credential_status();
        assert_eq!(status.status, "missing");
        assert_eq!(status.kind, "access_token");
    }
}
