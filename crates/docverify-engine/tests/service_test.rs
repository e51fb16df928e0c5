//! End-to-end tests of the four operations over a scripted backend.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use docverify_core::{
    ClassificationRequest, ClassifyAndVerifyRequest, DocumentImage, DocumentType, ExtractionTier,
    IdentifierExtractionRequest, Severity, VerificationRequest,
};
use docverify_engine::VerificationService;
use docverify_inference::mock::MockGenerationBackend;
use docverify_inference::{BackendSession, ModelCandidates, ModelInvocationOrchestrator};

const PRIMARY: &str = "model-a";
const FALLBACK: &str = "model-b";

fn image() -> DocumentImage {
    DocumentImage {
        image_base64: "iVBORw==".to_string(),
        mime_type: "image/png".to_string(),
    }
}

fn candidates() -> ModelCandidates {
    ModelCandidates::new([PRIMARY, FALLBACK])
}

async fn service(mock: &MockGenerationBackend) -> VerificationService {
    let session = BackendSession::new(Arc::new(mock.clone()));
    session.initialize().await;
    VerificationService::new(session, ModelInvocationOrchestrator::new(candidates()))
}

fn reference(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn classify_request() -> ClassificationRequest {
    ClassificationRequest {
        job_no: "J-1001".to_string(),
        document_images: vec![image()],
    }
}

fn combined_request(reference_data: Map<String, Value>) -> ClassifyAndVerifyRequest {
    ClassifyAndVerifyRequest {
        job_no: "J-1001".to_string(),
        document_images: vec![image()],
        reference_data,
    }
}

#[tokio::test]
async fn test_classify_direct_json() {
    let mock = MockGenerationBackend::new().with_response(
        PRIMARY,
        r#"{"documentType": "ProformaInvoice", "confidence": 0.93, "reasoning": "Header reads PRO FORMA INVOICE"}"#,
    );
    let response = service(&mock).await.classify(&classify_request()).await;

    assert_eq!(response.document_type, DocumentType::ProformaInvoice);
    assert_eq!(response.confidence, 0.93);
    assert_eq!(response.reasoning, "Header reads PRO FORMA INVOICE");
    assert!(response.error_message.is_none());
    assert_eq!(mock.called_models(), vec![PRIMARY]);
    assert_eq!(mock.calls()[0].media_count, 1);
}

#[tokio::test]
async fn test_classify_keyword_fallback() {
    let mock = MockGenerationBackend::new().with_response(
        PRIMARY,
        "This page is clearly a Job Shipment note with a dispatch section.",
    );
    let response = service(&mock).await.classify(&classify_request()).await;

    assert_eq!(response.document_type, DocumentType::JobConsumption);
    assert_eq!(response.confidence, 0.7);
    assert!(response.error_message.is_none());
}

#[tokio::test]
async fn test_classify_keyword_fallback_with_labelled_prose() {
    let mock = MockGenerationBackend::new().with_response(
        PRIMARY,
        "This is a job shipment note.\nReasoning: dispatch table and JS header present.",
    );
    let response = service(&mock).await.classify(&classify_request()).await;

    assert_eq!(response.document_type, DocumentType::JobConsumption);
    assert_eq!(response.confidence, 0.7);
    assert!(response.error_message.is_none());
}

#[tokio::test]
async fn test_classify_keyword_miss_is_unknown() {
    let mock =
        MockGenerationBackend::new().with_response(PRIMARY, "I am not able to read this page.");
    let response = service(&mock).await.classify(&classify_request()).await;

    assert_eq!(response.document_type, DocumentType::Unknown);
    assert_eq!(response.confidence, 0.0);
    assert!(response.error_message.is_none());
}

#[tokio::test]
async fn test_confidence_is_clamped() {
    let mock = MockGenerationBackend::new().with_response(
        PRIMARY,
        r#"{"documentType": "sales quote", "confidence": "1.7"}"#,
    );
    let response = service(&mock).await.classify(&classify_request()).await;

    assert_eq!(response.document_type, DocumentType::SalesQuote);
    assert_eq!(response.confidence, 1.0);
    assert_eq!(response.reasoning, "No reasoning provided");
}

#[tokio::test]
async fn test_fallback_model_answers_after_primary_fails() {
    let mock = MockGenerationBackend::new()
        .with_failure(PRIMARY, "quota exhausted")
        .with_response(
            FALLBACK,
            r#"{"documentType": "SalesQuote", "confidence": 0.8, "reasoning": "SQ number"}"#,
        );
    let response = service(&mock).await.classify(&classify_request()).await;

    assert_eq!(response.document_type, DocumentType::SalesQuote);
    assert!(response.error_message.is_none());
    assert_eq!(mock.called_models(), vec![PRIMARY, FALLBACK]);
}

#[tokio::test]
async fn test_all_models_failed() {
    let mock = MockGenerationBackend::new()
        .with_failure(PRIMARY, "quota exhausted")
        .with_failure(FALLBACK, "model overloaded");
    let response = service(&mock).await.classify(&classify_request()).await;

    let message = response.error_message.unwrap();
    assert!(message.starts_with("All models failed. Last error:"));
    assert!(message.contains("model overloaded"));
    assert_eq!(response.document_type, DocumentType::Unknown);
    assert_eq!(response.confidence, 0.0);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_uninitialized_session_makes_no_calls() {
    let mock = MockGenerationBackend::new().with_response(PRIMARY, "{}");
    let session = BackendSession::new(Arc::new(mock.clone()));
    let service = VerificationService::new(session, ModelInvocationOrchestrator::new(candidates()));

    let response = service.classify(&classify_request()).await;

    assert_eq!(
        response.error_message.as_deref(),
        Some("Backend client not initialized")
    );
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_extract_identifiers_for_sales_quote() {
    let mock = MockGenerationBackend::new().with_response(
        PRIMARY,
        r#"{"salesQuoteNo": "SQ-0042", "customerName": "Acme Ltd"}"#,
    );
    let response = service(&mock)
        .await
        .extract_identifiers(&IdentifierExtractionRequest {
            job_no: "J-1001".to_string(),
            document_type: "SalesQuote".to_string(),
            document_images: vec![image()],
        })
        .await;

    assert_eq!(response.extracted_identifiers["salesQuoteNo"], "SQ-0042");
    assert_eq!(response.extracted_identifiers["customerName"], "Acme Ltd");
    assert!(response.error_message.is_none());

    let call = &mock.calls()[0];
    assert_eq!(call.params.temperature, 0.2);
    assert_eq!(call.params.max_output_tokens, 1024);
    assert!(call.prompt.contains("salesQuoteNo"));
}

#[tokio::test]
async fn test_extract_identifiers_rejects_missing_quote_number() {
    let mock =
        MockGenerationBackend::new().with_response(PRIMARY, r#"{"customerName": "Acme Ltd"}"#);
    let response = service(&mock)
        .await
        .extract_identifiers(&IdentifierExtractionRequest {
            job_no: "J-1001".to_string(),
            document_type: "SalesQuote".to_string(),
            document_images: vec![image()],
        })
        .await;

    assert!(response.error_message.unwrap().contains("Sales Quote"));
    assert_eq!(response.extracted_identifiers["customerName"], "Acme Ltd");
}

#[tokio::test]
async fn test_verify_recovers_fenced_json() {
    let raw = r#"Here is the comparison:
```json
{
  "discrepancies": [
    {"field_name": "header.No", "expected_value": "SQ-1", "actual_value": "SQ-7", "severity": "HIGH", "description": "Quote number differs"},
    {"severity": "critical"}
  ],
  "field_confidences": [
    {"field_name": "header.No", "extracted_value": "SQ-7", "extraction_confidence": 0.9, "verification_confidence": 0.4}
  ],
  "overall_verification_confidence": 0.55
}
```
Let me know if you need anything else."#;
    let mock = MockGenerationBackend::new().with_response(PRIMARY, raw);
    let response = service(&mock)
        .await
        .verify(&VerificationRequest {
            job_no: "J-1001".to_string(),
            document_type: "SalesQuote".to_string(),
            document_images: vec![image()],
            reference_data: reference(&[("salesQuoteHeader", json!({"No": "SQ-1"}))]),
        })
        .await;

    assert!(response.error_message.is_none());
    assert_eq!(response.overall_verification_confidence, 0.55);
    assert_eq!(response.discrepancies.len(), 2);

    let first = &response.discrepancies[0];
    assert_eq!(first.field_name, "header.No");
    assert_eq!(first.reference_value.as_deref(), Some("SQ-1"));
    assert_eq!(first.document_value.as_deref(), Some("SQ-7"));
    assert_eq!(first.severity, Severity::High);

    let second = &response.discrepancies[1];
    assert_eq!(second.field_name, "unknown");
    assert_eq!(second.severity, Severity::Medium);
    assert_eq!(second.description, "No description provided");

    assert_eq!(response.field_confidences[0].extraction_confidence, 0.9);
    assert_eq!(response.raw_llm_response.as_deref(), Some(raw));

    let call = &mock.calls()[0];
    assert_eq!(call.params.max_output_tokens, 4096);
    assert!(call.prompt.contains("SQ-1"));
}

#[tokio::test]
async fn test_combined_single_key_selects_identifier_mode() {
    let mock = MockGenerationBackend::new().with_response(
        PRIMARY,
        r#"{"documentType": "SalesQuote", "confidence": 0.9, "reasoning": "SQ header", "identifiers": {"salesQuoteNo": "SQ-0042"}}"#,
    );
    let record = service(&mock)
        .await
        .classify_and_verify(&combined_request(reference(&[(
            "salesQuoteNo",
            json!("SQ-0042"),
        )])))
        .await;

    assert!(!record.is_error());
    assert_eq!(record.record.document_type, DocumentType::SalesQuote);
    assert_eq!(record.record.identifiers["salesQuoteNo"], "SQ-0042");
    assert_eq!(record.extraction_tier, Some(ExtractionTier::Direct));
    assert_eq!(record.model_id.as_deref(), Some(PRIMARY));
    assert_eq!(mock.calls()[0].params.max_output_tokens, 2048);
}

#[tokio::test]
async fn test_combined_identifier_mode_missing_identifier() {
    let mock = MockGenerationBackend::new().with_response(
        PRIMARY,
        r#"{"documentType": "SalesQuote", "confidence": 0.85, "reasoning": "SQ header", "identifiers": {}}"#,
    );
    let record = service(&mock)
        .await
        .classify_and_verify(&combined_request(reference(&[("jobNo", json!("J-1001"))])))
        .await;

    assert!(record.error_message.as_deref().unwrap().contains("Sales Quote"));
    assert_eq!(record.record.document_type, DocumentType::SalesQuote);
    assert_eq!(record.record.classification_confidence, 0.85);
}

#[tokio::test]
async fn test_combined_richer_reference_selects_verification_mode() {
    let raw = "```json\n{\"documentType\": \"JobConsumption\", \"confidence\": 0.88, \"discrepancies\": [], \"overall_verification_confidence\": 0.97}\n```";
    let mock = MockGenerationBackend::new().with_response(PRIMARY, raw);
    let record = service(&mock)
        .await
        .classify_and_verify(&combined_request(reference(&[
            ("jobNo", json!("J-1001")),
            ("lines", json!([{"Description": "Cable", "Quantity": 3}])),
        ])))
        .await;

    assert!(!record.is_error());
    assert_eq!(record.extraction_tier, Some(ExtractionTier::BraceExtracted));
    assert_eq!(record.record.document_type, DocumentType::JobConsumption);
    assert_eq!(record.record.overall_verification_confidence, 0.97);
    assert_eq!(mock.calls()[0].params.max_output_tokens, 4096);
}

#[tokio::test]
async fn test_combined_without_images() {
    let mock = MockGenerationBackend::new().with_response(PRIMARY, "{}");
    let mut request = combined_request(Map::new());
    request.document_images.clear();

    let record = service(&mock).await.classify_and_verify(&request).await;

    assert_eq!(
        record.error_message.as_deref(),
        Some("No document images provided")
    );
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_final_record_serialization_is_stable() {
    let raw = r#"{"overall_verification_confidence": 0.6, "documentType": "ProformaInvoice", "confidence": 0.7, "discrepancies": [{"field_name": "total", "severity": "low", "description": "rounding"}], "reasoning": "header"}"#;
    let request = combined_request(reference(&[
        ("salesInvoiceHeader", json!({"No": "PI-9", "Amount": 10.5})),
        ("jobNo", json!("J-1001")),
    ]));

    let mut outputs = Vec::new();
    for _ in 0..3 {
        let mock = MockGenerationBackend::new().with_response(PRIMARY, raw);
        let record = service(&mock).await.classify_and_verify(&request).await;
        outputs.push(serde_json::to_string(&record).unwrap());
    }

    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[1], outputs[2]);
}

#[tokio::test]
async fn test_health_reports_readiness() {
    let ready = service(&MockGenerationBackend::new()).await.health();
    assert_eq!(ready.status, "ok");
    assert!(ready.ready);
    assert_eq!(ready.backend, "mock");
    assert_eq!(ready.models, vec![PRIMARY, FALLBACK]);

    let failing = MockGenerationBackend::new().with_prepare_failure("no credentials");
    let degraded = service(&failing).await.health();
    assert_eq!(degraded.status, "degraded");
    assert!(!degraded.ready);
}
