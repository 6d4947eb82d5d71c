//! Reconciler — deterministic repairs applied to every extracted record
//! before it reaches the ledger.
//!
//! Never fails. Fields other than Date, Operation/Activity and Notes pass
//! through untouched.

use tracing::{debug, warn};

use crate::pipeline::dates::normalize_mdy;
use crate::pipeline::keywords::KeywordTable;
use crate::pipeline::types::{ExtractedRecord, Field, NormalizedText, is_blank_or_tbd};

/// Length of the document snippet used when both Notes and Details are empty.
pub const NOTES_SNIPPET_CHARS: usize = 220;

/// Applies date normalization and the Operation/Notes fallbacks.
#[derive(Debug, Clone)]
pub struct Reconciler {
    keywords: KeywordTable,
}

impl Reconciler {
    pub fn new(keywords: KeywordTable) -> Self {
        if !keywords.is_consistent() {
            warn!(
                version = keywords.version,
                "Keyword table names categories outside the Operation/Activity picklist"
            );
        }
        Self { keywords }
    }

    pub fn reconcile(&self, mut record: ExtractedRecord, text: &NormalizedText) -> ExtractedRecord {
        let date = normalize_mdy(record.get(Field::Date));
        record.set(Field::Date, date);

        if is_blank_or_tbd(record.get(Field::OperationActivity)) {
            let inferred = self.keywords.infer(text.as_str());
            debug!(operation = inferred, version = self.keywords.version, "Inferred operation");
            record.set(Field::OperationActivity, inferred);
        }

        if is_blank_or_tbd(record.get(Field::Notes)) {
            let details = record.get(Field::Details).trim();
            let notes = if details.is_empty() {
                snippet(text.as_str())
            } else {
                details.to_string()
            };
            record.set(Field::Notes, notes);
        }

        record
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(KeywordTable::operations_v1())
    }
}

/// First [`NOTES_SNIPPET_CHARS`] characters of the trimmed text, on one line.
fn snippet(text: &str) -> String {
    text.trim()
        .chars()
        .take(NOTES_SNIPPET_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{FIELD_COUNT, OPERATION_VALUES};

    fn record(pairs: &[(Field, &str)]) -> ExtractedRecord {
        let mut values: [String; FIELD_COUNT] = Default::default();
        for (field, value) in pairs {
            values[field.index()] = value.to_string();
        }
        ExtractedRecord::from_values(values)
    }

    fn forklift_text() -> NormalizedText {
        NormalizedText::new(
            "From: Dana <dana@example.com>\nDate: \nSubject: Dock 3\n\n\
             Forklift struck shelving near loading dock, no injuries.",
        )
    }

    // ── Scenarios ───────────────────────────────────────────────────

    #[test]
    fn forklift_scenario() {
        let input = record(&[
            (Field::Date, "03/04/2025"),
            (Field::Location, "HSV"),
            (Field::Details, "Forklift struck shelving near loading dock, no injuries."),
            (Field::Category, "Near Miss"),
            (Field::ReportType, "Equipment failure"),
            (Field::OperationActivity, "TBD"),
            (Field::ContributingFactors, "TBD"),
            (Field::Notes, ""),
        ]);
        let out = Reconciler::default().reconcile(input, &forklift_text());

        assert_eq!(out.get(Field::OperationActivity), "OPERATING MOBILE EQUIPMENT");
        assert!(!out.get(Field::Notes).is_empty());
        assert_eq!(out.get(Field::Date), "3/4/2025");
        assert_eq!(out.get(Field::ContributingFactors), "TBD");
    }

    // ── Operation fallback ──────────────────────────────────────────

    #[test]
    fn tbd_operation_becomes_a_known_category() {
        let cases = ["TBD", "tbd", "", "  "];
        for value in cases {
            let input = record(&[(Field::OperationActivity, value)]);
            let out = Reconciler::default().reconcile(input, &NormalizedText::new("something"));
            assert!(OPERATION_VALUES.contains(&out.get(Field::OperationActivity)));
        }
    }

    #[test]
    fn custom_keyword_table_drives_inference() {
        use crate::pipeline::keywords::KeywordCategory;

        let table = KeywordTable {
            version: 2,
            categories: vec![KeywordCategory {
                name: "ERGONOMIC",
                terms: &["forklift"],
            }],
            fallback: "OFFICE/OTHER",
        };
        let out = Reconciler::new(table).reconcile(record(&[]), &forklift_text());
        assert_eq!(out.get(Field::OperationActivity), "ERGONOMIC");
    }

    #[test]
    fn model_operation_is_kept() {
        let input = record(&[(Field::OperationActivity, "ERGONOMIC")]);
        let out = Reconciler::default().reconcile(input, &forklift_text());
        assert_eq!(out.get(Field::OperationActivity), "ERGONOMIC");
    }

    // ── Notes fallback ──────────────────────────────────────────────

    #[test]
    fn empty_notes_copy_details() {
        let input = record(&[(Field::Details, "Spill in bay 2"), (Field::Notes, "TBD")]);
        let out = Reconciler::default().reconcile(input, &forklift_text());
        assert_eq!(out.get(Field::Notes), "Spill in bay 2");
    }

    #[test]
    fn empty_notes_and_details_use_snippet() {
        let long_body = "x".repeat(500);
        let text = NormalizedText::new(format!("From: a\nDate: \nSubject: s\n\n{long_body}"));
        let out = Reconciler::default().reconcile(record(&[]), &text);

        let notes = out.get(Field::Notes);
        assert_eq!(notes.chars().count(), NOTES_SNIPPET_CHARS);
        assert!(notes.starts_with("From: a Date:  Subject: s  x"));
        assert!(!notes.contains('\n'));
    }

    #[test]
    fn short_text_snippet_is_whole_text() {
        let text = NormalizedText::new("  From: \nDate: \nSubject: \n\nhi  ");
        let out = Reconciler::default().reconcile(record(&[]), &text);
        assert_eq!(out.get(Field::Notes), "From:  Date:  Subject:   hi");
    }

    #[test]
    fn existing_notes_are_kept() {
        let input = record(&[(Field::Details, "d"), (Field::Notes, "already noted")]);
        let out = Reconciler::default().reconcile(input, &forklift_text());
        assert_eq!(out.get(Field::Notes), "already noted");
    }

    // ── Pass-through ────────────────────────────────────────────────

    #[test]
    fn unparseable_date_and_other_fields_pass_through() {
        let input = record(&[
            (Field::Date, "TBD"),
            (Field::Location, "tbd"),
            (Field::Category, "whatever"),
            (Field::OperationActivity, "AMBULATORY"),
            (Field::Notes, "n"),
        ]);
        let out = Reconciler::default().reconcile(input.clone(), &forklift_text());
        assert_eq!(out, input);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let reconciler = Reconciler::default();
        let once = reconciler.reconcile(record(&[(Field::Date, "March 4, 2025")]), &forklift_text());
        let twice = reconciler.reconcile(once.clone(), &forklift_text());
        assert_eq!(once, twice);
    }
}
