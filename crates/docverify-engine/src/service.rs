//! The four inbound operations.
//!
//! Each operation builds a prompt, runs the candidate models through the
//! orchestrator and recovers a record from whatever text comes back. None of
//! them fails: every path ends in a record, with failures carried in its
//! error message.

use std::time::Instant;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use docverify_core::{
    defaults, ClassificationRequest, ClassificationResponse, ClassifyAndVerifyRequest,
    CredentialStatus, DocumentImage, DocumentType, FinalRecord, GenerationRequest,
    IdentifierExtractionRequest, IdentifierExtractionResponse, MediaBlob, VerificationRequest,
    VerificationResponse,
};
use docverify_inference::{BackendSession, InvocationOutcome, ModelInvocationOrchestrator};

use crate::assemble::ResultAssembler;
use crate::extract::{ExtractionPlan, ResponseExtractor};
use crate::normalize::{normalize_document_type, FieldNormalizer};
use crate::operation::Operation;
use crate::prompt;
use crate::validate::{IdentifierValidator, ValidationOutcome};

/// Error returned by the combined operation when called without images.
pub const NO_IMAGES: &str = "No document images provided";

/// Health summary for external reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// `ok` when the session is ready, otherwise `degraded`.
    pub status: String,
    pub ready: bool,
    pub backend: String,
    pub models: Vec<String>,
    pub credentials: CredentialStatus,
}

/// Which document type, if any, the extracted identifiers are checked for.
#[derive(Debug, Clone, Copy)]
enum Validation {
    Skip,
    Against(DocumentType),
    /// The type the model classified the document as.
    Classified,
}

/// Decode wire images into media blobs.
///
/// Accepts bare base64 or `data:` URLs. Undecodable images are skipped with
/// a warning.
pub fn decode_images(images: &[DocumentImage]) -> Vec<MediaBlob> {
    images
        .iter()
        .enumerate()
        .filter_map(|(index, image)| {
            let payload = image.image_base64.trim();
            let payload = match payload.split_once("base64,") {
                Some((prefix, data)) if prefix.starts_with("data:") => data,
                _ => payload,
            };
            let mime_type = if image.mime_type.trim().is_empty() {
                defaults::DEFAULT_MIME_TYPE.to_string()
            } else {
                image.mime_type.trim().to_string()
            };
            match STANDARD.decode(payload) {
                Ok(data) => Some(MediaBlob::new(mime_type, data)),
                Err(e) => {
                    warn!(image = index, error = %e, "Skipping undecodable document image");
                    None
                }
            }
        })
        .collect()
}

/// Runs the recovery pipeline for each inbound operation.
pub struct VerificationService {
    session: BackendSession,
    orchestrator: ModelInvocationOrchestrator,
    extractor: ResponseExtractor,
    normalizer: FieldNormalizer,
    validator: IdentifierValidator,
}

impl VerificationService {
    pub fn new(session: BackendSession, orchestrator: ModelInvocationOrchestrator) -> Self {
        Self {
            session,
            orchestrator,
            extractor: ResponseExtractor::new(),
            normalizer: FieldNormalizer::default(),
            validator: IdentifierValidator::default(),
        }
    }

    /// Replace the identifier catalog.
    pub fn with_validator(mut self, validator: IdentifierValidator) -> Self {
        self.normalizer = FieldNormalizer::new(validator.clone());
        self.validator = validator;
        self
    }

    pub fn session(&self) -> &BackendSession {
        &self.session
    }

    /// Extract identifier fields from a document of a caller-named type.
    pub async fn extract_identifiers(
        &self,
        request: &IdentifierExtractionRequest,
    ) -> IdentifierExtractionResponse {
        let op = Operation::ExtractIdentifiers;
        let span = info_span!(
            "extract_identifiers",
            request_id = %Uuid::now_v7(),
            job_id = %request.job_no,
            op = op.as_str(),
            document_type = %request.document_type
        );

        async {
            let plan = ExtractionPlan::identifiers(&request.document_type);
            let prompt = prompt::identifier_prompt(
                &request.job_no,
                &request.document_type,
                plan.expected_fields(),
            );
            let expected = normalize_document_type(&request.document_type);
            let mut record = self
                .run(
                    op,
                    prompt,
                    &request.document_images,
                    &plan,
                    Validation::Against(expected),
                )
                .await;
            if !record.record.document_type.is_known() {
                record.record.document_type = expected;
            }
            IdentifierExtractionResponse::from(record)
        }
        .instrument(span)
        .await
    }

    /// Verify a document against reference data.
    pub async fn verify(&self, request: &VerificationRequest) -> VerificationResponse {
        let op = Operation::Verify;
        let span = info_span!(
            "verify",
            request_id = %Uuid::now_v7(),
            job_id = %request.job_no,
            op = op.as_str(),
            document_type = %request.document_type
        );

        async {
            let document_type = normalize_document_type(&request.document_type);
            if !document_type.is_known() {
                warn!(
                    document_type = %request.document_type,
                    "Unrecognized document type, using generic verification prompt"
                );
            }
            let prompt =
                prompt::verification_prompt(&request.job_no, document_type, &request.reference_data);
            let record = self
                .run(
                    op,
                    prompt,
                    &request.document_images,
                    &ExtractionPlan::verification(),
                    Validation::Skip,
                )
                .await;
            VerificationResponse::from(record)
        }
        .instrument(span)
        .await
    }

    /// Classify a document.
    pub async fn classify(&self, request: &ClassificationRequest) -> ClassificationResponse {
        let op = Operation::Classify;
        let span = info_span!(
            "classify",
            request_id = %Uuid::now_v7(),
            job_id = %request.job_no,
            op = op.as_str()
        );

        async {
            let record = self
                .run(
                    op,
                    prompt::classification_prompt(),
                    &request.document_images,
                    &ExtractionPlan::classification(),
                    Validation::Skip,
                )
                .await;
            ClassificationResponse::from(record)
        }
        .instrument(span)
        .await
    }

    /// Classify a document, then extract identifiers or verify it.
    ///
    /// Reference data with exactly one key selects identifier extraction;
    /// anything richer selects full verification.
    pub async fn classify_and_verify(&self, request: &ClassifyAndVerifyRequest) -> FinalRecord {
        let identifier_mode = request.is_identifier_mode();
        let op = Operation::ClassifyAndVerify { identifier_mode };
        let span = info_span!(
            "classify_and_verify",
            request_id = %Uuid::now_v7(),
            job_id = %request.job_no,
            op = op.as_str(),
            identifier_mode
        );

        async {
            if request.document_images.is_empty() {
                warn!("{}", NO_IMAGES);
                return FinalRecord::failure(NO_IMAGES, None);
            }

            let prompt = prompt::classify_and_verify_prompt(
                &request.job_no,
                &request.reference_data,
                identifier_mode,
                &self.validator,
            );
            let validation = if identifier_mode {
                Validation::Classified
            } else {
                Validation::Skip
            };
            self.run(
                op,
                prompt,
                &request.document_images,
                &ExtractionPlan::classify_and_verify(&self.validator),
                validation,
            )
            .await
        }
        .instrument(span)
        .await
    }

    pub fn health(&self) -> HealthReport {
        let ready = self.session.is_ready();
        HealthReport {
            status: if ready { "ok" } else { "degraded" }.to_string(),
            ready,
            backend: self.session.backend_name().to_string(),
            models: self.orchestrator.candidates().as_slice().to_vec(),
            credentials: self.session.credential_status(),
        }
    }

    async fn run(
        &self,
        op: Operation,
        prompt: String,
        images: &[DocumentImage],
        plan: &ExtractionPlan,
        validation: Validation,
    ) -> FinalRecord {
        let start = Instant::now();
        let media = decode_images(images);
        if media.is_empty() {
            warn!(
                provided = images.len(),
                "No usable document images, sending prompt only"
            );
        }

        let request = GenerationRequest::new(prompt, media, op.generation_params());
        debug!(
            prompt_len = request.prompt.len(),
            media_count = request.media.len(),
            "Invoking model candidates"
        );

        let (model_id, raw_text) = match self.orchestrator.invoke(&self.session, &request).await {
            InvocationOutcome::Success {
                model_id, raw_text, ..
            } => (model_id, raw_text),
            InvocationOutcome::Exhausted {
                last_error,
                last_raw_text,
                attempts,
            } => {
                return ResultAssembler::total_failure(&last_error, attempts.len(), last_raw_text);
            }
        };
        trace!(model = %model_id, raw = %raw_text, "Raw model response");

        let extraction = self.extractor.extract(&raw_text, plan);
        let record = self.normalizer.normalize(&extraction, plan.identifier_scope());

        let outcome = match validation {
            Validation::Skip => ValidationOutcome::Passed,
            Validation::Against(document_type) => {
                self.validator.validate(document_type, &record.identifiers)
            }
            Validation::Classified => self
                .validator
                .validate(record.document_type, &record.identifiers),
        };
        if let Some(message) = outcome.message() {
            warn!(
                document_type = %record.document_type,
                error = message,
                "Identifier validation failed"
            );
        }

        info!(
            model = %model_id,
            tier = %extraction.tier,
            document_type = %record.document_type,
            duration_ms = start.elapsed().as_millis() as u64,
            success = outcome.is_passed(),
            "Operation completed"
        );
        ResultAssembler::recovered(&model_id, raw_text, &extraction, record, outcome)
    }
}
