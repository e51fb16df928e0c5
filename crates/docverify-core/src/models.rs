//! Canonical records exchanged between the recovery engine and its callers.
//!
//! Every record here is created and dropped within a single request.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::defaults;

// =============================================================================
// DOCUMENT TYPES
// =============================================================================

/// Canonical business document category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DocumentType {
    SalesQuote,
    ProformaInvoice,
    JobConsumption,
    #[default]
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl DocumentType {
    /// The three known types, in keyword-scan priority order.
    pub const KNOWN: [DocumentType; 3] = [
        DocumentType::SalesQuote,
        DocumentType::ProformaInvoice,
        DocumentType::JobConsumption,
    ];

    /// Wire identifier (`SalesQuote`, ..., `UNKNOWN`).
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::SalesQuote => "SalesQuote",
            DocumentType::ProformaInvoice => "ProformaInvoice",
            DocumentType::JobConsumption => "JobConsumption",
            DocumentType::Unknown => "UNKNOWN",
        }
    }

    /// Human-readable name used in messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentType::SalesQuote => "Sales Quote",
            DocumentType::ProformaInvoice => "Proforma Invoice",
            DocumentType::JobConsumption => "Job Consumption",
            DocumentType::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, DocumentType::Unknown)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Discrepancy severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

/// Recovery strategy that produced a structured mapping, strictest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionTier {
    /// The whole text decoded as one object.
    Direct,
    /// A fenced block or the outermost brace span decoded as one object.
    BraceExtracted,
    /// `name: value` pairs scanned for a known set of field names.
    FieldRegex,
    /// Document type keywords found in free prose.
    KeywordHeuristic,
}

impl ExtractionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionTier::Direct => "direct",
            ExtractionTier::BraceExtracted => "brace_extracted",
            ExtractionTier::FieldRegex => "field_regex",
            ExtractionTier::KeywordHeuristic => "keyword_heuristic",
        }
    }
}

impl fmt::Display for ExtractionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// NORMALIZED RECORDS
// =============================================================================

/// A mismatch between the document and the reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub field_name: String,
    #[serde(default)]
    pub document_value: Option<String>,
    #[serde(default, alias = "erp_value")]
    pub reference_value: Option<String>,
    #[serde(default)]
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discrepancy_type: Option<String>,
}

/// Per-field extraction and match confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfidence {
    pub field_name: String,
    #[serde(default)]
    pub extracted_value: Option<String>,
    #[serde(default)]
    pub extraction_confidence: f64,
    #[serde(default)]
    pub match_assessment_confidence: Option<f64>,
    #[serde(default)]
    pub verified: bool,
}

/// Canonical fields recovered from one model response.
///
/// Every confidence lies in `[0.0, 1.0]` and `classification_reasoning` is
/// never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub document_type: DocumentType,
    pub classification_confidence: f64,
    pub classification_reasoning: String,
    pub discrepancies: Vec<Discrepancy>,
    pub field_confidences: Vec<FieldConfidence>,
    pub overall_verification_confidence: f64,
    /// Identifier fields recovered for extraction-style requests.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub identifiers: BTreeMap<String, String>,
}

impl Default for NormalizedRecord {
    fn default() -> Self {
        Self {
            document_type: DocumentType::Unknown,
            classification_confidence: 0.0,
            classification_reasoning: defaults::NO_REASONING.to_string(),
            discrepancies: Vec::new(),
            field_confidences: Vec::new(),
            overall_verification_confidence: 0.0,
            identifiers: BTreeMap::new(),
        }
    }
}

/// The single record produced per inbound request.
///
/// `error_message` is set only when every model candidate failed or when the
/// extracted identifiers were rejected; partial data is kept in both cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FinalRecord {
    #[serde(flatten)]
    pub record: NormalizedRecord,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub extraction_tier: Option<ExtractionTier>,
    #[serde(default)]
    pub raw_llm_response: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl FinalRecord {
    /// Record for a request that never reached a usable model response.
    pub fn failure(error_message: impl Into<String>, raw_text: Option<String>) -> Self {
        Self {
            record: NormalizedRecord::default(),
            model_id: None,
            extraction_tier: None,
            raw_llm_response: raw_text,
            error_message: Some(error_message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}

// =============================================================================
// INBOUND REQUESTS
// =============================================================================

fn default_mime_type() -> String {
    defaults::DEFAULT_MIME_TYPE.to_string()
}

/// A document page image as received on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentImage {
    /// Base64 encoded image bytes.
    pub image_base64: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifierExtractionRequest {
    #[serde(alias = "job_id")]
    pub job_no: String,
    pub document_type: String,
    #[serde(default)]
    pub document_images: Vec<DocumentImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    #[serde(alias = "job_id")]
    pub job_no: String,
    pub document_type: String,
    #[serde(default)]
    pub document_images: Vec<DocumentImage>,
    #[serde(default, alias = "erp_data")]
    pub reference_data: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRequest {
    #[serde(alias = "job_id")]
    pub job_no: String,
    #[serde(default)]
    pub document_images: Vec<DocumentImage>,
}

/// Combined request. The shape of `reference_data` selects the mode: exactly
/// one key means identifier extraction, anything richer means verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyAndVerifyRequest {
    #[serde(alias = "job_id")]
    pub job_no: String,
    #[serde(default)]
    pub document_images: Vec<DocumentImage>,
    #[serde(default, alias = "erp_data")]
    pub reference_data: Map<String, Value>,
}

impl ClassifyAndVerifyRequest {
    pub fn is_identifier_mode(&self) -> bool {
        self.reference_data.len() == 1
    }
}

// =============================================================================
// OUTBOUND RESPONSES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierExtractionResponse {
    pub extracted_identifiers: BTreeMap<String, String>,
    pub error_message: Option<String>,
}

impl From<FinalRecord> for IdentifierExtractionResponse {
    fn from(record: FinalRecord) -> Self {
        Self {
            extracted_identifiers: record.record.identifiers,
            error_message: record.error_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub discrepancies: Vec<Discrepancy>,
    pub field_confidences: Vec<FieldConfidence>,
    pub overall_verification_confidence: f64,
    pub raw_llm_response: Option<String>,
    pub error_message: Option<String>,
}

impl From<FinalRecord> for VerificationResponse {
    fn from(record: FinalRecord) -> Self {
        Self {
            discrepancies: record.record.discrepancies,
            field_confidences: record.record.field_confidences,
            overall_verification_confidence: record.record.overall_verification_confidence,
            raw_llm_response: record.raw_llm_response,
            error_message: record.error_message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub document_type: DocumentType,
    pub confidence: f64,
    pub reasoning: String,
    pub error_message: Option<String>,
}

impl From<FinalRecord> for ClassificationResponse {
    fn from(record: FinalRecord) -> Self {
        Self {
            document_type: record.record.document_type,
            confidence: record.record.classification_confidence,
            reasoning: record.record.classification_reasoning,
            error_message: record.error_message,
        }
    }
}

/// Credential availability as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStatus {
    /// `available`, `missing` or `not_configured`.
    pub status: String,
    /// How credentials are supplied, e.g. `api_key` or `access_token`.
    #[serde(rename = "type")]
    pub kind: String,
}
