//! Per-document-type identifier rule.
//!
//! A known document type must come back with at least one usable business
//! identifier. Unknown documents pass unconditionally.

use std::collections::BTreeMap;

use docverify_core::DocumentType;

/// Identifier fields accepted for one document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierRule {
    pub document_type: DocumentType,
    pub fields: Vec<String>,
    /// Message reported when none of `fields` is present. `None` falls back
    /// to the generic message.
    pub message: Option<String>,
}

impl IdentifierRule {
    pub fn new(document_type: DocumentType, fields: &[&str], message: Option<&str>) -> Self {
        Self {
            document_type,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            message: message.map(str::to_string),
        }
    }

    fn rejection_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| generic_message(self.document_type))
    }
}

fn generic_message(document_type: DocumentType) -> String {
    format!(
        "Cannot find required document identifier from {} document",
        document_type.display_name()
    )
}

/// Result of checking extracted identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Passed,
    Rejected(String),
}

impl ValidationOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Passed => None,
            ValidationOutcome::Rejected(message) => Some(message),
        }
    }
}

/// Checks that a usable identifier was extracted for a document type.
#[derive(Debug, Clone)]
pub struct IdentifierValidator {
    rules: Vec<IdentifierRule>,
}

impl Default for IdentifierValidator {
    fn default() -> Self {
        Self::new(vec![
            IdentifierRule::new(
                DocumentType::SalesQuote,
                &["salesQuoteNo", "salesQuoteNumber", "quoteNo", "quoteNumber"],
                Some("Cannot find Sales Quote Number from Sales Quote document"),
            ),
            IdentifierRule::new(
                DocumentType::ProformaInvoice,
                &[
                    "proformaInvoiceNo",
                    "proformaInvoiceNumber",
                    "taxInvoiceNo",
                    "invoiceNo",
                    "invoiceNumber",
                ],
                Some(
                    "Cannot find Tax Invoice Number from Proforma Invoice document - please check Proforma Invoice",
                ),
            ),
            IdentifierRule::new(
                DocumentType::JobConsumption,
                &["jobConsumptionNo", "jobShipmentNo", "jobNo", "jobNumber"],
                Some("Cannot find Job Number from Job Consumption document"),
            ),
        ])
    }
}

impl IdentifierValidator {
    pub fn new(rules: Vec<IdentifierRule>) -> Self {
        Self { rules }
    }

    pub fn rule(&self, document_type: DocumentType) -> Option<&IdentifierRule> {
        self.rules.iter().find(|r| r.document_type == document_type)
    }

    /// Accepted identifier fields for `document_type`, empty when none declared.
    pub fn accepted_fields(&self, document_type: DocumentType) -> &[String] {
        self.rule(document_type)
            .map(|r| r.fields.as_slice())
            .unwrap_or(&[])
    }

    /// Every declared identifier field across all rules, in catalog order.
    pub fn all_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for field in self.rules.iter().flat_map(|r| r.fields.iter()) {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }

    pub fn is_identifier_field(&self, name: &str) -> bool {
        self.rules
            .iter()
            .flat_map(|r| r.fields.iter())
            .any(|f| f.eq_ignore_ascii_case(name))
    }

    /// Pass if any accepted field for `document_type` has a non-blank value.
    ///
    /// Keys are compared case-insensitively. A known type without a rule is
    /// rejected with the generic message.
    pub fn validate(
        &self,
        document_type: DocumentType,
        identifiers: &BTreeMap<String, String>,
    ) -> ValidationOutcome {
        if !document_type.is_known() {
            return ValidationOutcome::Passed;
        }

        let Some(rule) = self.rule(document_type) else {
            return ValidationOutcome::Rejected(generic_message(document_type));
        };

        let found = identifiers.iter().any(|(key, value)| {
            !value.trim().is_empty() && rule.fields.iter().any(|f| f.eq_ignore_ascii_case(key))
        });

        if found {
            ValidationOutcome::Passed
        } else {
            ValidationOutcome::Rejected(rule.rejection_message())
        }
    }
}
