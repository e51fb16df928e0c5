//! Coercion of recovered mappings into canonical records.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use docverify_core::{
    defaults, Discrepancy, DocumentType, FieldConfidence, NormalizedRecord, Severity,
};

use crate::extract::{IdentifierScope, RawExtraction, OVERALL_CONFIDENCE_FIELD};
use crate::validate::IdentifierValidator;

/// Synonyms accepted for each document type, compared lowercase and trimmed.
const TYPE_SYNONYMS: &[(DocumentType, &[&str])] = &[
    (
        DocumentType::SalesQuote,
        &["salesquote", "sales quote", "sales_quote", "sq"],
    ),
    (
        DocumentType::ProformaInvoice,
        &[
            "proformainvoice",
            "proforma invoice",
            "pro forma invoice",
            "proforma_invoice",
            "proforma",
            "pi",
        ],
    ),
    (
        DocumentType::JobConsumption,
        &[
            "jobconsumption",
            "job consumption",
            "job_consumption",
            "job shipment",
            "jobshipment",
            "jc",
        ],
    ),
];

/// Map a free-form document type label to the canonical enum.
pub fn normalize_document_type(label: &str) -> DocumentType {
    let label = label.trim().to_lowercase();
    TYPE_SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&label.as_str()))
        .map(|(document_type, _)| *document_type)
        .unwrap_or(DocumentType::Unknown)
}

/// Numeric value of `value` clamped into `[0.0, 1.0]`.
///
/// Numbers and numeric strings convert; anything else, including NaN, is 0.0.
pub fn coerce_confidence(value: Option<&Value>) -> f64 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() => n.clamp(0.0, 1.0),
        Some(n) if n == f64::INFINITY => 1.0,
        _ => 0.0,
    }
}

/// Text of a scalar value. Strings are taken as-is, `null` is absent and any
/// other value is rendered as JSON text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// First present value among `keys`.
fn first<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| map.get(*k).filter(|v| !v.is_null()))
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
        Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        _ => false,
    }
}

fn coerce_severity(value: Option<&Value>) -> Severity {
    match value.and_then(Value::as_str).map(|s| s.trim().to_lowercase()) {
        Some(s) if s == "high" => Severity::High,
        Some(s) if s == "low" => Severity::Low,
        _ => Severity::Medium,
    }
}

/// Partial record with field-by-field defaults applied at [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    document_type: Option<DocumentType>,
    classification_confidence: Option<f64>,
    classification_reasoning: Option<String>,
    discrepancies: Vec<Discrepancy>,
    field_confidences: Vec<FieldConfidence>,
    overall_verification_confidence: Option<f64>,
    identifiers: BTreeMap<String, String>,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_type(mut self, document_type: DocumentType) -> Self {
        self.document_type = Some(document_type);
        self
    }

    pub fn classification_confidence(mut self, value: Option<&Value>) -> Self {
        self.classification_confidence = Some(coerce_confidence(value));
        self
    }

    pub fn classification_reasoning(mut self, reasoning: Option<String>) -> Self {
        self.classification_reasoning = non_blank(reasoning);
        self
    }

    pub fn discrepancy(mut self, discrepancy: Discrepancy) -> Self {
        self.discrepancies.push(discrepancy);
        self
    }

    pub fn field_confidences(mut self, field_confidences: Vec<FieldConfidence>) -> Self {
        self.field_confidences.extend(field_confidences);
        self
    }

    pub fn overall_verification_confidence(mut self, value: Option<&Value>) -> Self {
        self.overall_verification_confidence = Some(coerce_confidence(value));
        self
    }

    /// Add an identifier. Blank values and keys already present are ignored.
    pub fn identifier(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.trim().is_empty() {
            self.identifiers
                .entry(key.into())
                .or_insert_with(|| value.trim().to_string());
        }
        self
    }

    pub fn build(self) -> NormalizedRecord {
        NormalizedRecord {
            document_type: self.document_type.unwrap_or_default(),
            classification_confidence: self.classification_confidence.unwrap_or(0.0),
            classification_reasoning: self
                .classification_reasoning
                .unwrap_or_else(|| defaults::NO_REASONING.to_string()),
            discrepancies: self.discrepancies,
            field_confidences: self.field_confidences,
            overall_verification_confidence: self.overall_verification_confidence.unwrap_or(0.0),
            identifiers: self.identifiers,
        }
    }
}

/// Turns a [`RawExtraction`] into a [`NormalizedRecord`].
#[derive(Debug, Clone, Default)]
pub struct FieldNormalizer {
    validator: IdentifierValidator,
}

impl FieldNormalizer {
    pub fn new(validator: IdentifierValidator) -> Self {
        Self { validator }
    }

    pub fn normalize(&self, raw: &RawExtraction, scope: IdentifierScope) -> NormalizedRecord {
        let fields = &raw.fields;
        let mut builder = RecordBuilder::new()
            .document_type(
                first(fields, &["documentType", "document_type"])
                    .and_then(Value::as_str)
                    .map(normalize_document_type)
                    .unwrap_or_default(),
            )
            .classification_confidence(first(
                fields,
                &["confidence", "classification_confidence"],
            ))
            .classification_reasoning(
                first(fields, &["reasoning", "classification_reasoning"]).and_then(scalar_text),
            )
            .overall_verification_confidence(fields.get(OVERALL_CONFIDENCE_FIELD));

        if let Some(Value::Array(entries)) = fields.get("discrepancies") {
            for entry in entries.iter().filter_map(Value::as_object) {
                builder = builder.discrepancy(Self::discrepancy(entry));
            }
        }

        let field_confidences: Vec<FieldConfidence> = match fields.get("field_confidences") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(Value::as_object)
                .map(Self::field_confidence)
                .collect(),
            _ => Vec::new(),
        };

        builder = match scope {
            IdentifierScope::None => builder,
            IdentifierScope::AllScalars => Self::scalar_identifiers(builder, fields),
            IdentifierScope::Declared => {
                self.declared_identifiers(builder, fields, &field_confidences)
            }
        };

        builder.field_confidences(field_confidences).build()
    }

    fn discrepancy(entry: &Map<String, Value>) -> Discrepancy {
        Discrepancy {
            field_name: first(entry, &["field_name", "field"])
                .and_then(scalar_text)
                .unwrap_or_else(|| "unknown".to_string()),
            document_value: first(entry, &["document_value", "actual_value"]).and_then(scalar_text),
            reference_value: first(entry, &["reference_value", "erp_value", "expected_value"])
                .and_then(scalar_text),
            severity: coerce_severity(entry.get("severity")),
            description: non_blank(entry.get("description").and_then(scalar_text))
                .unwrap_or_else(|| defaults::NO_DESCRIPTION.to_string()),
            discrepancy_type: non_blank(entry.get("discrepancy_type").and_then(scalar_text)),
        }
    }

    fn field_confidence(entry: &Map<String, Value>) -> FieldConfidence {
        FieldConfidence {
            field_name: first(entry, &["field_name", "field"])
                .and_then(scalar_text)
                .unwrap_or_else(|| "unknown".to_string()),
            extracted_value: entry.get("extracted_value").and_then(scalar_text),
            extraction_confidence: coerce_confidence(first(
                entry,
                &["extraction_confidence", "confidence"],
            )),
            match_assessment_confidence: first(
                entry,
                &["match_assessment_confidence", "verification_confidence"],
            )
            .map(|v| coerce_confidence(Some(v))),
            verified: coerce_bool(entry.get("verified")),
        }
    }

    fn scalar_identifiers(mut builder: RecordBuilder, fields: &Map<String, Value>) -> RecordBuilder {
        for (key, value) in fields {
            if value.is_object() || value.is_array() {
                continue;
            }
            if let Some(text) = scalar_text(value) {
                builder = builder.identifier(key.clone(), text);
            }
        }
        builder
    }

    /// Catalog identifier fields from a nested identifier object, then from
    /// field confidences, then from top-level keys.
    fn declared_identifiers(
        &self,
        mut builder: RecordBuilder,
        fields: &Map<String, Value>,
        field_confidences: &[FieldConfidence],
    ) -> RecordBuilder {
        if let Some(Value::Object(nested)) = first(fields, &["identifiers", "extracted_identifiers"])
        {
            for (key, value) in nested {
                if let Some(text) = scalar_text(value) {
                    builder = builder.identifier(key.clone(), text);
                }
            }
        }

        for confidence in field_confidences {
            if !self.validator.is_identifier_field(&confidence.field_name) {
                continue;
            }
            if let Some(ref value) = confidence.extracted_value {
                builder = builder.identifier(confidence.field_name.clone(), value.clone());
            }
        }

        for (key, value) in fields {
            if value.is_object() || value.is_array() || !self.validator.is_identifier_field(key) {
                continue;
            }
            if let Some(text) = scalar_text(value) {
                builder = builder.identifier(key.clone(), text);
            }
        }
        builder
    }
}
