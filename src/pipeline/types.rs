//! Pipeline types — the field schema, extracted records, and the values that
//! flow between the normalizer, extractor, reconciler and ledger.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Number of columns in an incident record.
pub const FIELD_COUNT: usize = 8;

/// Placeholder meaning "value intentionally unknown".
pub const TBD: &str = "TBD";

pub const LOCATION_VALUES: &[&str] = &["COS", "FGA", "HSV", "VSFB", "SBX", "LRDR", "TBD"];

pub const CATEGORY_VALUES: &[&str] = &[
    "Environmental",
    "Hazard Alert",
    "Health",
    "Injury",
    "Near Miss",
    "Property Damage",
    "TBD",
];

pub const REPORT_TYPE_VALUES: &[&str] = &[
    "Hazardous object",
    "Equipment failure",
    "Environment hazard",
    "Hazardous substance",
    "Unplanned release",
    "Slip or trip",
    "Transportation incident",
    "TBD/Other",
    "TBD",
];

pub const OPERATION_VALUES: &[&str] = &[
    "AMBULATORY",
    "ERGONOMIC",
    "HAZMAT HANDLING",
    "ELECTRICAL or HOT WORK",
    "INSPECTING/TESTING",
    "OPERATING PORTABLE TOOLS/APPLIANCES",
    "OPERATING MOBILE EQUIPMENT",
    "OPERATING STATIONARY EQUIPMENT/CRANES",
    "OFFICE/OTHER",
];

/// Catch-all operation used when nothing else matches.
pub const OPERATION_CATCH_ALL: &str = "OFFICE/OTHER";

/// One column of the incident report, in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    Location,
    Details,
    Category,
    ReportType,
    OperationActivity,
    ContributingFactors,
    Notes,
}

impl Field {
    /// All fields in column order.
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Date,
        Field::Location,
        Field::Details,
        Field::Category,
        Field::ReportType,
        Field::OperationActivity,
        Field::ContributingFactors,
        Field::Notes,
    ];

    /// Column header / JSON key.
    pub fn name(self) -> &'static str {
        match self {
            Field::Date => "Date",
            Field::Location => "Location",
            Field::Details => "Details",
            Field::Category => "Category",
            Field::ReportType => "Report Type",
            Field::OperationActivity => "Operation/Activity",
            Field::ContributingFactors => "Contributing Factors",
            Field::Notes => "Notes",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Permitted values for dropdown-constrained columns.
    pub fn picklist(self) -> Option<&'static [&'static str]> {
        match self {
            Field::Location => Some(LOCATION_VALUES),
            Field::Category => Some(CATEGORY_VALUES),
            Field::ReportType => Some(REPORT_TYPE_VALUES),
            Field::OperationActivity => Some(OPERATION_VALUES),
            Field::Date | Field::Details | Field::ContributingFactors | Field::Notes => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static view over the record schema.
pub struct FieldSchema;

impl FieldSchema {
    pub fn field_names() -> Vec<&'static str> {
        Field::ALL.iter().map(|f| f.name()).collect()
    }

    /// Fields that carry a picklist, with their values.
    pub fn picklists() -> impl Iterator<Item = (Field, &'static [&'static str])> {
        Field::ALL
            .into_iter()
            .filter_map(|f| f.picklist().map(|values| (f, values)))
    }

    /// Match `value` against a field's picklist, ignoring case and surrounding
    /// whitespace. Returns the canonical spelling.
    pub fn canonical_choice(field: Field, value: &str) -> Option<&'static str> {
        let wanted = value.trim();
        field
            .picklist()?
            .iter()
            .copied()
            .find(|choice| choice.eq_ignore_ascii_case(wanted))
    }
}

/// True when a value is empty or the "TBD" sentinel (case-insensitive).
pub fn is_blank_or_tbd(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(TBD)
}

/// Why a model reply does not have the record's shape.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("expected a JSON object")]
    NotAnObject,

    #[error("missing required key '{0}'")]
    MissingField(&'static str),

    #[error("unexpected key '{0}'")]
    UnexpectedField(String),

    #[error("value of '{0}' is not a string")]
    NotAString(&'static str),
}

/// One incident record, one string per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRecord {
    values: [String; FIELD_COUNT],
}

impl ExtractedRecord {
    /// Build a record from a parsed JSON value, enforcing the exact key set
    /// and string-typed values.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ShapeError> {
        let object = value.as_object().ok_or(ShapeError::NotAnObject)?;

        if let Some(extra) = object.keys().find(|k| Field::from_name(k).is_none()) {
            return Err(ShapeError::UnexpectedField(extra.clone()));
        }

        let mut values: [String; FIELD_COUNT] = Default::default();
        for field in Field::ALL {
            let raw = object
                .get(field.name())
                .ok_or(ShapeError::MissingField(field.name()))?;
            let text = raw.as_str().ok_or(ShapeError::NotAString(field.name()))?;
            values[field.index()] = text.to_string();
        }

        Ok(Self { values })
    }

    pub fn from_values(values: [String; FIELD_COUNT]) -> Self {
        Self { values }
    }

    pub fn get(&self, field: Field) -> &str {
        &self.values[field.index()]
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values[field.index()] = value.into();
    }

    pub fn values(&self) -> &[String; FIELD_COUNT] {
        &self.values
    }

    pub fn into_values(self) -> [String; FIELD_COUNT] {
        self.values
    }
}

/// Stable identity of a source document (its file name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name without its extension, used to name rejection files.
    pub fn stem(&self) -> &str {
        Path::new(&self.0)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A source message as read from disk.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: DocumentId,
    pub bytes: Vec<u8>,
}

impl RawDocument {
    pub fn new(id: DocumentId, bytes: Vec<u8>) -> Self {
        Self { id, bytes }
    }
}

/// Canonical model input: sender, date, subject and body in one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A committed record and its 1-based sheet row (row 1 is the header).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub position: u32,
    pub values: [String; FIELD_COUNT],
}

/// The four ways a document can fail to reach the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MalformedDocument,
    ExtractionExhausted,
    SchemaViolation,
    PersistenceFailure,
}

impl FailureKind {
    pub fn label(self) -> &'static str {
        match self {
            FailureKind::MalformedDocument => "MalformedDocument",
            FailureKind::ExtractionExhausted => "ExtractionExhausted",
            FailureKind::SchemaViolation => "SchemaViolation",
            FailureKind::PersistenceFailure => "PersistenceFailure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A document that could not be committed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionRecord {
    pub id: DocumentId,
    pub kind: FailureKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_object() -> serde_json::Value {
        json!({
            "Date": "3/4/2024",
            "Location": "HSV",
            "Details": "Forklift struck shelving",
            "Category": "Near Miss",
            "Report Type": "Equipment failure",
            "Operation/Activity": "TBD",
            "Contributing Factors": "TBD",
            "Notes": "",
        })
    }

    #[test]
    fn field_order_matches_header() {
        assert_eq!(
            FieldSchema::field_names(),
            vec![
                "Date",
                "Location",
                "Details",
                "Category",
                "Report Type",
                "Operation/Activity",
                "Contributing Factors",
                "Notes",
            ]
        );
    }

    #[test]
    fn four_fields_carry_picklists() {
        let fields: Vec<Field> = FieldSchema::picklists().map(|(f, _)| f).collect();
        assert_eq!(
            fields,
            vec![
                Field::Location,
                Field::Category,
                Field::ReportType,
                Field::OperationActivity
            ]
        );
    }

    #[test]
    fn catch_all_is_an_operation_choice() {
        assert!(OPERATION_VALUES.contains(&OPERATION_CATCH_ALL));
        assert_eq!(OPERATION_VALUES.len(), 9);
    }

    #[test]
    fn canonical_choice_ignores_case() {
        assert_eq!(
            FieldSchema::canonical_choice(Field::Category, " near miss "),
            Some("Near Miss")
        );
        assert_eq!(FieldSchema::canonical_choice(Field::Location, "Mars"), None);
        assert_eq!(FieldSchema::canonical_choice(Field::Details, "anything"), None);
    }

    #[test]
    fn blank_or_tbd() {
        assert!(is_blank_or_tbd(""));
        assert!(is_blank_or_tbd("  "));
        assert!(is_blank_or_tbd("tbd"));
        assert!(is_blank_or_tbd(" TBD "));
        assert!(!is_blank_or_tbd("TBD/Other"));
    }

    // ── ExtractedRecord shape ───────────────────────────────────────

    #[test]
    fn record_from_complete_object() {
        let record = ExtractedRecord::from_json(&full_object()).unwrap();
        assert_eq!(record.get(Field::Location), "HSV");
        assert_eq!(record.get(Field::Notes), "");
    }

    #[test]
    fn record_rejects_missing_key() {
        let mut value = full_object();
        value.as_object_mut().unwrap().remove("Notes");
        assert_eq!(
            ExtractedRecord::from_json(&value),
            Err(ShapeError::MissingField("Notes"))
        );
    }

    #[test]
    fn record_rejects_extra_key() {
        let mut value = full_object();
        value
            .as_object_mut()
            .unwrap()
            .insert("Severity".into(), json!("high"));
        assert_eq!(
            ExtractedRecord::from_json(&value),
            Err(ShapeError::UnexpectedField("Severity".into()))
        );
    }

    #[test]
    fn record_rejects_non_string_value() {
        let mut value = full_object();
        value.as_object_mut().unwrap().insert("Date".into(), json!(20240304));
        assert_eq!(
            ExtractedRecord::from_json(&value),
            Err(ShapeError::NotAString("Date"))
        );
    }

    #[test]
    fn record_rejects_array() {
        assert_eq!(
            ExtractedRecord::from_json(&json!([1, 2])),
            Err(ShapeError::NotAnObject)
        );
    }

    #[test]
    fn document_stem_drops_extension() {
        let id = DocumentId::new("2025-03-04 forklift.eml");
        assert_eq!(id.stem(), "2025-03-04 forklift");
    }
}
