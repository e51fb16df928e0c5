//! Prompt builders.
//!
//! Every prompt is a compact JSON document describing the task, the context
//! and the expected output shape. Wording is kept short; the recovery engine
//! does not depend on the model honoring the requested format.

use serde_json::{json, Map, Value};

use docverify_core::DocumentType;

use crate::validate::IdentifierValidator;

fn type_profiles() -> Value {
    json!([
        {
            "type": "SalesQuote",
            "characteristics": [
                "'SALES QUOTE' in the header",
                "Quote number, usually 'SQ' followed by digits",
                "Customer details and priced line items",
                "Payment options such as Mpesa or card links"
            ]
        },
        {
            "type": "ProformaInvoice",
            "characteristics": [
                "'PRO FORMA INVOICE' in the header",
                "States that it is not a Tax Invoice",
                "Number labeled 'Tax Invoice No'",
                "Customer details and priced line items"
            ]
        },
        {
            "type": "JobConsumption",
            "characteristics": [
                "'JOB SHIPMENT' in the header",
                "Number labeled 'Job Shipment No'",
                "'INSTRUCTED BY', 'DISPATCHED BY' and 'RECEIVED BY' sections"
            ]
        }
    ])
}

fn classification_output() -> Value {
    json!({
        "documentType": "SalesQuote | ProformaInvoice | JobConsumption | UNKNOWN",
        "confidence": "float 0.0-1.0",
        "reasoning": "short explanation"
    })
}

fn verification_output() -> Value {
    json!({
        "discrepancies": [{
            "discrepancy_type": "VALUE_MISMATCH | MISSING_IN_DOCUMENT | UNEXPECTED_IN_DOCUMENT | FORMAT_ERROR",
            "field_name": "string, e.g. 'header.No' or 'lines.0.Quantity'",
            "expected_value": "value from reference data",
            "actual_value": "value found in the document",
            "severity": "high | medium | low",
            "description": "string"
        }],
        "field_confidences": [{
            "field_name": "string",
            "extracted_value": "any",
            "extraction_confidence": "float 0.0-1.0",
            "verification_confidence": "float 0.0-1.0"
        }],
        "overall_verification_confidence": "float 0.0-1.0"
    })
}

/// Header fields to compare, as (label, reference path, comparison).
fn header_checks(document_type: DocumentType) -> Value {
    match document_type {
        DocumentType::SalesQuote => json!([
            ["Sales Quote Number", "salesQuoteHeader.No", "exact_alphanumeric"],
            ["Customer Account Number", "salesQuoteHeader.Sell_to_Customer_No", "exact_alphanumeric"],
            ["Customer Name", "salesQuoteHeader.Sell_to_Customer_Name", "fuzzy_ignore_case"],
            ["Total Amount Including VAT", "salesQuoteHeader.Amount_Including_VAT", "numeric_2_decimals"]
        ]),
        DocumentType::ProformaInvoice => json!([
            ["Proforma Invoice Number", "salesInvoiceHeader.No", "exact_alphanumeric"],
            ["Customer Account Number", "salesInvoiceHeader.Sell_to_Customer_No", "exact_alphanumeric"],
            ["Customer Name", "salesInvoiceHeader.Sell_to_Customer_Name", "fuzzy_ignore_case"]
        ]),
        DocumentType::JobConsumption => json!([
            ["Job Number", "requestContext.jobId", "exact_alphanumeric"]
        ]),
        DocumentType::Unknown => json!([]),
    }
}

/// Extract named identifier fields from a document of a caller-named type.
pub fn identifier_prompt(job_no: &str, document_type: &str, fields: &[String]) -> String {
    let example: Map<String, Value> = fields
        .iter()
        .map(|f| (f.clone(), Value::from("extracted_value")))
        .collect();
    json!({
        "task": "Extract key identifiers from the provided document.",
        "documentType": document_type,
        "jobId": job_no,
        "instructions": format!(
            "Extract these fields: {}. Return a flat JSON object keyed by field name with string values. Omit fields that are not found.",
            fields.join(", ")
        ),
        "outputFormat": example
    })
    .to_string()
}

/// Classify the document into one of the known types.
pub fn classification_prompt() -> String {
    json!({
        "task": "document_classification",
        "possibleDocumentTypes": type_profiles(),
        "instructions": [
            "Analyze the provided document images.",
            "Pick the document type whose characteristics match.",
            "Return UNKNOWN if no type matches with confidence."
        ],
        "outputFormat": classification_output()
    })
    .to_string()
}

/// Verify the document against caller-supplied reference data.
pub fn verification_prompt(
    job_no: &str,
    document_type: DocumentType,
    reference_data: &Map<String, Value>,
) -> String {
    let mut instructions = vec![
        format!(
            "Analyze the provided images of a {} document.",
            document_type.display_name()
        ),
        "Extract the header fields in 'headerFieldsToVerify' and every line item.".to_string(),
        "Match line items to the reference lines by description.".to_string(),
        "Compare each extracted value with 'expectedReferenceData' using the given comparison."
            .to_string(),
        "Report every mismatch as a discrepancy and give confidences between 0.0 and 1.0."
            .to_string(),
    ];
    if document_type == DocumentType::JobConsumption {
        instructions.push(
            "Report a discrepancy if the 'Received By' section has no signature or name."
                .to_string(),
        );
    }

    json!({
        "requestContext": {
            "jobId": job_no,
            "documentType": document_type.as_str()
        },
        "expectedReferenceData": reference_data,
        "headerFieldsToVerify": header_checks(document_type),
        "lineItemFieldsToVerify": ["Description", "Quantity"],
        "instructions": instructions,
        "outputFormat": verification_output()
    })
    .to_string()
}

/// Classify the document and then either extract identifiers or verify.
pub fn classify_and_verify_prompt(
    job_no: &str,
    reference_data: &Map<String, Value>,
    identifier_mode: bool,
    validator: &IdentifierValidator,
) -> String {
    if identifier_mode {
        let identifiers: Map<String, Value> = DocumentType::KNOWN
            .iter()
            .map(|t| {
                (
                    t.as_str().to_string(),
                    Value::from(validator.accepted_fields(*t).to_vec()),
                )
            })
            .collect();
        let mut output = classification_output();
        if let Some(map) = output.as_object_mut() {
            map.insert(
                "identifiers".to_string(),
                json!({"<identifierField>": "extracted value"}),
            );
        }
        return json!({
            "task": "classify_and_extract_identifiers",
            "jobId": job_no,
            "possibleDocumentTypes": type_profiles(),
            "identifierFieldsByType": identifiers,
            "instructions": [
                "Classify the document.",
                "Extract the identifier fields listed for the chosen type under 'identifiers'.",
                "Omit identifiers that are not visible."
            ],
            "outputFormat": output
        })
        .to_string();
    }

    let mut output = classification_output();
    if let (Some(map), Value::Object(verify)) = (output.as_object_mut(), verification_output()) {
        map.extend(verify);
    }
    json!({
        "task": "classify_and_verify",
        "requestContext": {"jobId": job_no},
        "possibleDocumentTypes": type_profiles(),
        "expectedReferenceData": reference_data,
        "instructions": [
            "Classify the document.",
            "Verify the document against 'expectedReferenceData' for the chosen type.",
            "Report every mismatch as a discrepancy and give confidences between 0.0 and 1.0."
        ],
        "outputFormat": output
    })
    .to_string()
}
