//! Tiered recovery of a structured mapping from free model text.
//!
//! Strategies run strictest first and the first one that yields a mapping
//! wins. None of them fails: a strategy either produces a mapping or steps
//! aside. The field-regex tier always produces something, possibly empty,
//! so a [`RawExtraction`] is never absent.

use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use docverify_core::{defaults, DocumentType, ExtractionTier};

use crate::normalize::normalize_document_type;
use crate::validate::IdentifierValidator;

/// Keyword table for the heuristic tier, scanned in order.
const TYPE_KEYWORDS: &[(DocumentType, &[&str])] = &[
    (DocumentType::SalesQuote, &["salesquote", "sales quote"]),
    (
        DocumentType::ProformaInvoice,
        &["proformainvoice", "proforma invoice", "pro forma invoice"],
    ),
    (
        DocumentType::JobConsumption,
        &["jobconsumption", "job consumption", "job shipment"],
    ),
];

/// Field names for the classification part of a response.
pub const CLASSIFICATION_FIELDS: &[&str] = &["documentType", "confidence", "reasoning"];

/// Field name for the overall verification score.
pub const OVERALL_CONFIDENCE_FIELD: &str = "overall_verification_confidence";

/// A mapping recovered from raw text, tagged with the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExtraction {
    pub tier: ExtractionTier,
    pub fields: Map<String, Value>,
}

impl RawExtraction {
    pub fn new(tier: ExtractionTier, fields: Map<String, Value>) -> Self {
        Self { tier, fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Which entries of a recovered mapping count as extracted identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierScope {
    /// Identifiers are not collected.
    None,
    /// Every top-level scalar entry is an identifier.
    AllScalars,
    /// Only catalog identifier fields, wherever they appear.
    Declared,
}

/// What to look for in one response.
///
/// Field patterns for the field-regex tier are compiled when the plan is
/// built.
#[derive(Debug, Clone)]
pub struct ExtractionPlan {
    expected_fields: Vec<String>,
    patterns: Vec<(String, Regex)>,
    keyword_fallback: bool,
    identifier_scope: IdentifierScope,
}

impl ExtractionPlan {
    fn with_fields<I, S>(fields: I, keyword_fallback: bool, identifier_scope: IdentifierScope) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut expected_fields: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !expected_fields.contains(&field) {
                expected_fields.push(field);
            }
        }
        let patterns = expected_fields
            .iter()
            .filter_map(|field| match FieldRegexScan::pattern(field) {
                Ok(pattern) => Some((field.clone(), pattern)),
                Err(e) => {
                    warn!(field = %field, error = %e, "Field pattern failed to compile");
                    None
                }
            })
            .collect();
        Self {
            expected_fields,
            patterns,
            keyword_fallback,
            identifier_scope,
        }
    }

    /// Field names scanned by the field-regex tier.
    pub fn expected_fields(&self) -> &[String] {
        &self.expected_fields
    }

    /// Whether the keyword tier may replace a field-regex scan that found no
    /// document type.
    pub fn keyword_fallback(&self) -> bool {
        self.keyword_fallback
    }

    pub fn identifier_scope(&self) -> IdentifierScope {
        self.identifier_scope
    }

    /// Identifier extraction for a caller-named document type.
    pub fn identifiers(document_type: &str) -> Self {
        let fields: &[&str] = match normalize_document_type(document_type) {
            DocumentType::SalesQuote => &["salesQuoteNo", "customerName"],
            DocumentType::ProformaInvoice => &["proformaInvoiceNo"],
            DocumentType::JobConsumption => &["jobConsumptionNo"],
            DocumentType::Unknown => &["documentId"],
        };
        Self::with_fields(fields.iter().copied(), false, IdentifierScope::AllScalars)
    }

    pub fn classification() -> Self {
        Self::with_fields(
            CLASSIFICATION_FIELDS.iter().copied(),
            true,
            IdentifierScope::None,
        )
    }

    pub fn verification() -> Self {
        Self::with_fields([OVERALL_CONFIDENCE_FIELD], false, IdentifierScope::None)
    }

    /// Classification plus verification and every declared identifier field.
    pub fn classify_and_verify(validator: &IdentifierValidator) -> Self {
        let fields = CLASSIFICATION_FIELDS
            .iter()
            .map(|f| f.to_string())
            .chain(std::iter::once(OVERALL_CONFIDENCE_FIELD.to_string()))
            .chain(validator.all_fields());
        Self::with_fields(fields, true, IdentifierScope::Declared)
    }
}

// =============================================================================
// STRATEGIES
// =============================================================================

/// One recovery strategy.
pub trait ExtractionStrategy: Send + Sync + fmt::Debug {
    fn tier(&self) -> ExtractionTier;

    /// A mapping, or `None` when this strategy does not apply to `raw`.
    fn attempt(&self, raw: &str, plan: &ExtractionPlan) -> Option<Map<String, Value>>;
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Whole text decodes as one object.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDecode;

impl ExtractionStrategy for DirectDecode {
    fn tier(&self) -> ExtractionTier {
        ExtractionTier::Direct
    }

    fn attempt(&self, raw: &str, _plan: &ExtractionPlan) -> Option<Map<String, Value>> {
        parse_object(raw)
    }
}

/// A fenced code block, else the span from the first `{` to the last `}`.
#[derive(Debug, Clone)]
pub struct BraceExtraction {
    fence: Regex,
}

impl Default for BraceExtraction {
    fn default() -> Self {
        Self {
            fence: Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```")
                .expect("fence pattern is valid"),
        }
    }
}

impl BraceExtraction {
    fn outer_braces(raw: &str) -> Option<&str> {
        let start = raw.find('{')?;
        let end = raw.rfind('}')?;
        (end > start).then(|| &raw[start..=end])
    }
}

impl ExtractionStrategy for BraceExtraction {
    fn tier(&self) -> ExtractionTier {
        ExtractionTier::BraceExtracted
    }

    fn attempt(&self, raw: &str, _plan: &ExtractionPlan) -> Option<Map<String, Value>> {
        let fenced = self
            .fence
            .captures_iter(raw)
            .filter_map(|c| c.get(1))
            .find_map(|m| parse_object(m.as_str()));
        fenced.or_else(|| Self::outer_braces(raw).and_then(parse_object))
    }
}

/// Scan for `name: value` pairs of the plan's expected fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldRegexScan;

impl FieldRegexScan {
    fn pattern(field: &str) -> Result<Regex, regex::Error> {
        Regex::new(&format!(
            r#"(?i)["']?\b{}\b["']?\s*:\s*["']?(.*?)["']?\s*(?:,|\}}|\n|$)"#,
            regex::escape(field)
        ))
    }

    fn clean(value: &str) -> Option<String> {
        let value = value.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if value.is_empty() || value.eq_ignore_ascii_case("null") {
            None
        } else {
            Some(value.to_string())
        }
    }
}

impl ExtractionStrategy for FieldRegexScan {
    fn tier(&self) -> ExtractionTier {
        ExtractionTier::FieldRegex
    }

    fn attempt(&self, raw: &str, plan: &ExtractionPlan) -> Option<Map<String, Value>> {
        let mut fields = Map::new();
        for (field, pattern) in &plan.patterns {
            let value = pattern
                .captures(raw)
                .and_then(|c| c.get(1))
                .and_then(|m| Self::clean(m.as_str()));
            if let Some(value) = value {
                fields.insert(field.clone(), Value::String(value));
            }
        }
        Some(fields)
    }
}

/// Canonical document type keywords found in prose.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordHeuristic;

impl KeywordHeuristic {
    pub fn detect(raw: &str) -> Option<DocumentType> {
        let lowered = raw.to_lowercase();
        TYPE_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(document_type, _)| *document_type)
    }
}

impl ExtractionStrategy for KeywordHeuristic {
    fn tier(&self) -> ExtractionTier {
        ExtractionTier::KeywordHeuristic
    }

    fn attempt(&self, raw: &str, _plan: &ExtractionPlan) -> Option<Map<String, Value>> {
        let mut fields = Map::new();
        let (document_type, confidence, reasoning) = match Self::detect(raw) {
            Some(found) => (found, defaults::KEYWORD_CONFIDENCE, defaults::KEYWORD_REASONING),
            None => (DocumentType::Unknown, 0.0, defaults::KEYWORD_MISS_REASONING),
        };
        fields.insert("documentType".to_string(), Value::from(document_type.as_str()));
        fields.insert("confidence".to_string(), Value::from(confidence));
        fields.insert("reasoning".to_string(), Value::from(reasoning));
        Some(fields)
    }
}

// =============================================================================
// EXTRACTOR
// =============================================================================

/// Runs the strategy cascade over raw model text.
#[derive(Debug, Clone, Default)]
pub struct ResponseExtractor {
    direct: DirectDecode,
    brace: BraceExtraction,
    field_regex: FieldRegexScan,
    keyword: KeywordHeuristic,
}

impl ResponseExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recover a mapping from `raw` under `plan`.
    ///
    /// Without keyword fallback the field-regex result is returned as is,
    /// possibly empty. With it, a scan that found no `documentType` gives way
    /// to the keyword tier; scanned fields outside the classification triple
    /// are carried over.
    pub fn extract(&self, raw: &str, plan: &ExtractionPlan) -> RawExtraction {
        let structured: [&dyn ExtractionStrategy; 2] = [&self.direct, &self.brace];
        for strategy in structured {
            if let Some(fields) = strategy.attempt(raw, plan) {
                debug!(tier = %strategy.tier(), fields = fields.len(), "Recovered structured response");
                return RawExtraction::new(strategy.tier(), fields);
            }
        }

        let scanned = self.field_regex.attempt(raw, plan).unwrap_or_default();
        if !plan.keyword_fallback || scanned.contains_key(CLASSIFICATION_FIELDS[0]) {
            debug!(
                tier = %ExtractionTier::FieldRegex,
                fields = scanned.len(),
                "Recovered fields by pattern scan"
            );
            return RawExtraction::new(ExtractionTier::FieldRegex, scanned);
        }

        let mut fields = self.keyword.attempt(raw, plan).unwrap_or_default();
        for (key, value) in scanned {
            if !CLASSIFICATION_FIELDS.contains(&key.as_str()) {
                fields.entry(key).or_insert(value);
            }
        }
        debug!(
            tier = %ExtractionTier::KeywordHeuristic,
            fields = fields.len(),
            "Fell back to keyword scan"
        );
        RawExtraction::new(ExtractionTier::KeywordHeuristic, fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(raw: &str, plan: &ExtractionPlan) -> RawExtraction {
        ResponseExtractor::new().extract(raw, plan)
    }

    #[test]
    fn test_direct_decode() {
        let result = extract(
            r#"{"documentType": "SalesQuote", "confidence": 0.9}"#,
            &ExtractionPlan::classification(),
        );
        assert_eq!(result.tier, ExtractionTier::Direct);
        assert_eq!(result.fields["documentType"], json!("SalesQuote"));
    }

    #[test]
    fn test_non_object_json_is_not_direct() {
        let result = extract(r#"["SalesQuote"]"#, &ExtractionPlan::verification());
        assert_eq!(result.tier, ExtractionTier::FieldRegex);
        assert!(result.is_empty());
    }

    #[test]
    fn test_fenced_block_is_brace_tier() {
        let raw = "Here is the result:\n```json\n{\"salesQuoteNo\": \"SQ-1042\"}\n```\nLet me know.";
        let result = extract(raw, &ExtractionPlan::identifiers("SalesQuote"));
        assert_eq!(result.tier, ExtractionTier::BraceExtracted);
        assert_eq!(result.fields["salesQuoteNo"], json!("SQ-1042"));
    }

    #[test]
    fn test_fence_preferred_over_outer_braces() {
        let raw = "Note {not json}\n```\n{\"a\": 1}\n```\ntrailing }";
        let result = extract(raw, &ExtractionPlan::verification());
        assert_eq!(result.tier, ExtractionTier::BraceExtracted);
        assert_eq!(result.fields["a"], json!(1));
    }

    #[test]
    fn test_outer_brace_span_in_prose() {
        let raw = "Sure! {\"overall_verification_confidence\": 0.8, \"discrepancies\": []} Done.";
        let result = extract(raw, &ExtractionPlan::verification());
        assert_eq!(result.tier, ExtractionTier::BraceExtracted);
        assert_eq!(result.fields["overall_verification_confidence"], json!(0.8));
    }

    #[test]
    fn test_field_regex_on_broken_json() {
        let raw = r#"{"documentType": "ProformaInvoice", "confidence": 0.85, "reasoning": "PRO FORMA header"#;
        let result = extract(raw, &ExtractionPlan::classification());
        assert_eq!(result.tier, ExtractionTier::FieldRegex);
        assert_eq!(result.fields["documentType"], json!("ProformaInvoice"));
        assert_eq!(result.fields["confidence"], json!("0.85"));
        assert_eq!(result.fields["reasoning"], json!("PRO FORMA header"));
    }

    #[test]
    fn test_field_regex_is_case_insensitive() {
        let raw = "SALESQUOTENO: SQ-77\ncustomer name unknown";
        let result = extract(raw, &ExtractionPlan::identifiers("salesquote"));
        assert_eq!(result.tier, ExtractionTier::FieldRegex);
        assert_eq!(result.fields["salesQuoteNo"], json!("SQ-77"));
        assert!(!result.fields.contains_key("customerName"));
    }

    #[test]
    fn test_field_regex_does_not_match_suffix_of_longer_key() {
        let raw = r#""classification_confidence": 0.4, "documentType": "JobConsumption""#;
        let result = extract(raw, &ExtractionPlan::classification());
        assert!(!result.fields.contains_key("confidence"));
        assert_eq!(result.fields["documentType"], json!("JobConsumption"));
    }

    #[test]
    fn test_keyword_tier_hit() {
        let raw = "This looks like a job shipment note with dispatch sections.";
        let result = extract(raw, &ExtractionPlan::classification());
        assert_eq!(result.tier, ExtractionTier::KeywordHeuristic);
        assert_eq!(result.fields["documentType"], json!("JobConsumption"));
        assert_eq!(result.fields["confidence"], json!(0.7));
    }

    #[test]
    fn test_keyword_tier_miss() {
        let raw = "I could not read the page.";
        let result = extract(raw, &ExtractionPlan::classification());
        assert_eq!(result.tier, ExtractionTier::KeywordHeuristic);
        assert_eq!(result.fields["documentType"], json!("UNKNOWN"));
        assert_eq!(result.fields["confidence"], json!(0.0));
    }

    #[test]
    fn test_keyword_tier_runs_when_labels_lack_document_type() {
        let raw = "This is a job shipment note.\nReasoning: dispatch table and JS header present.";
        let result = extract(raw, &ExtractionPlan::classification());
        assert_eq!(result.tier, ExtractionTier::KeywordHeuristic);
        assert_eq!(result.fields["documentType"], json!("JobConsumption"));
        assert_eq!(result.fields["confidence"], json!(0.7));
    }

    #[test]
    fn test_keyword_tier_keeps_scanned_non_classification_fields() {
        let raw = "Looks like a sales quote.\nconfidence: high\nsalesQuoteNo: SQ-0042";
        let plan = ExtractionPlan::classify_and_verify(&IdentifierValidator::default());
        let result = extract(raw, &plan);
        assert_eq!(result.tier, ExtractionTier::KeywordHeuristic);
        assert_eq!(result.fields["documentType"], json!("SalesQuote"));
        assert_eq!(result.fields["confidence"], json!(0.7));
        assert_eq!(result.fields["salesQuoteNo"], json!("SQ-0042"));
    }

    #[test]
    fn test_plan_compiles_one_pattern_per_field() {
        let plan = ExtractionPlan::classification();
        assert_eq!(plan.patterns.len(), plan.expected_fields().len());
    }

    #[test]
    fn test_keyword_tier_not_used_for_verification() {
        let raw = "The sales quote matches.";
        let result = extract(raw, &ExtractionPlan::verification());
        assert_eq!(result.tier, ExtractionTier::FieldRegex);
        assert!(result.is_empty());
    }

    #[test]
    fn test_keyword_priority_order() {
        assert_eq!(
            KeywordHeuristic::detect("Sales Quote converted to proforma invoice"),
            Some(DocumentType::SalesQuote)
        );
        assert_eq!(
            KeywordHeuristic::detect("PRO FORMA INVOICE"),
            Some(DocumentType::ProformaInvoice)
        );
        assert_eq!(KeywordHeuristic::detect("unrelated"), None);
    }

    #[test]
    fn test_plans() {
        assert_eq!(
            ExtractionPlan::identifiers("SalesQuote").expected_fields(),
            vec!["salesQuoteNo", "customerName"]
        );
        assert_eq!(
            ExtractionPlan::identifiers("mystery").expected_fields(),
            vec!["documentId"]
        );
        let combined = ExtractionPlan::classify_and_verify(&IdentifierValidator::default());
        assert!(combined.keyword_fallback());
        assert_eq!(combined.expected_fields()[..4], [
            "documentType".to_string(),
            "confidence".to_string(),
            "reasoning".to_string(),
            OVERALL_CONFIDENCE_FIELD.to_string(),
        ]);
        assert!(combined.expected_fields().contains(&"jobShipmentNo".to_string()));
    }
}
