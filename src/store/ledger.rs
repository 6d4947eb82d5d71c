//! Ledger — the xlsx incident table.
//!
//! The committed rows are held in memory and the whole workbook is rendered
//! and atomically persisted on every append. Reopening an existing file
//! reloads its rows, so appends resume after the last one.

use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use rust_xlsxwriter::Workbook;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::pipeline::types::{ExtractedRecord, FIELD_COUNT, Field, FieldSchema, LedgerRow, TBD};
use crate::store::layout::{apply_sheet_layout, cell_format};
use crate::store::write_atomic;

pub struct Ledger {
    path: PathBuf,
    rows: Vec<[String; FIELD_COUNT]>,
}

impl Ledger {
    /// Load the table at `path`, or create it with just the styled header.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        if path.exists() {
            let rows = load_rows(&path)?;
            info!(path = %path.display(), rows = rows.len(), "Ledger loaded");
            return Ok(Self { path, rows });
        }

        let ledger = Self {
            path,
            rows: Vec::new(),
        };
        ledger.persist()?;
        info!(path = %ledger.path.display(), "Ledger created");
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of data rows (the header is not counted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[[String; FIELD_COUNT]] {
        &self.rows
    }

    /// Validate `record`, append it as the next row and persist the table.
    ///
    /// On a persistence failure the in-memory table is left as it was.
    pub fn append(&mut self, record: &ExtractedRecord) -> Result<LedgerRow, StoreError> {
        let values = validate(record)?;

        self.rows.push(values.clone());
        if let Err(e) = self.persist() {
            self.rows.pop();
            return Err(e);
        }

        // Row 1 is the header.
        let position = self.rows.len() as u32 + 1;
        debug!(position, "Ledger row appended");
        Ok(LedgerRow { position, values })
    }

    fn persist(&self) -> Result<(), StoreError> {
        let bytes = self
            .render()
            .map_err(|e| StoreError::persistence(&self.path, e))?;
        write_atomic(&self.path, &bytes)
    }

    fn render(&self) -> Result<Vec<u8>, rust_xlsxwriter::XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        apply_sheet_layout(sheet, self.rows.len() as u32)?;

        for (index, values) in self.rows.iter().enumerate() {
            let data_row = index as u32 + 1;
            for field in Field::ALL {
                sheet.write_string_with_format(
                    data_row,
                    field.index() as u16,
                    &values[field.index()],
                    &cell_format(field, data_row),
                )?;
            }
        }

        workbook.save_to_buffer()
    }
}

/// Check picklist columns and substitute "TBD" for empty values.
fn validate(record: &ExtractedRecord) -> Result<[String; FIELD_COUNT], StoreError> {
    let mut values: [String; FIELD_COUNT] = Default::default();

    for field in Field::ALL {
        let raw = record.get(field).trim();
        values[field.index()] = if raw.is_empty() {
            TBD.to_string()
        } else if field.picklist().is_some() {
            FieldSchema::canonical_choice(field, raw)
                .ok_or_else(|| StoreError::SchemaViolation {
                    field: field.name().to_string(),
                    reason: format!("'{raw}' is not an allowed value"),
                })?
                .to_string()
        } else {
            record.get(field).to_string()
        };
    }

    Ok(values)
}

fn load_rows(path: &Path) -> Result<Vec<[String; FIELD_COUNT]>, StoreError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| StoreError::load(path, e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| StoreError::load(path, "workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| StoreError::load(path, e))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(cell_to_string).collect())
        .unwrap_or_default();
    let expected = FieldSchema::field_names();
    if header.len() < FIELD_COUNT || header[..FIELD_COUNT] != expected[..] {
        return Err(StoreError::load(
            path,
            format!("unexpected header row: {}", header.join(", ")),
        ));
    }

    let mut loaded = Vec::new();
    for cells in rows {
        let mut values: [String; FIELD_COUNT] = Default::default();
        for (slot, cell) in values.iter_mut().zip(cells.iter()) {
            *slot = cell_to_string(cell);
        }
        if values.iter().all(String::is_empty) {
            continue;
        }
        loaded.push(values);
    }
    Ok(loaded)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => format!("{}", dt),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(location: &str, category: &str) -> ExtractedRecord {
        ExtractedRecord::from_values([
            "3/4/2025".to_string(),
            location.to_string(),
            "Forklift struck shelving".to_string(),
            category.to_string(),
            "Equipment failure".to_string(),
            "OPERATING MOBILE EQUIPMENT".to_string(),
            "".to_string(),
            "Forklift struck shelving".to_string(),
        ])
    }

    #[test]
    fn open_creates_table_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valid.xlsx");

        let ledger = Ledger::open(&path).unwrap();
        assert!(path.exists());
        assert!(ledger.is_empty());

        // Reloading an empty table finds the header and no rows.
        let reopened = Ledger::open(&path).unwrap();
        assert_eq!(reopened.len(), 0);
    }

    #[test]
    fn append_persists_and_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("valid.xlsx");
        let mut ledger = Ledger::open(&path).unwrap();

        let first = ledger.append(&record("HSV", "Near Miss")).unwrap();
        let second = ledger.append(&record("COS", "Injury")).unwrap();
        assert_eq!(first.position, 2);
        assert_eq!(second.position, 3);

        let reopened = Ledger::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.rows()[1][Field::Location.index()], "COS");
    }

    #[test]
    fn empty_values_become_tbd() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path().join("valid.xlsx")).unwrap();
        let row = ledger.append(&record("", "Near Miss")).unwrap();
        assert_eq!(row.values[Field::Location.index()], "TBD");
        assert_eq!(row.values[Field::ContributingFactors.index()], "TBD");
    }

    #[test]
    fn picklist_values_are_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path().join("valid.xlsx")).unwrap();
        let row = ledger.append(&record("hsv", "near miss")).unwrap();
        assert_eq!(row.values[Field::Location.index()], "HSV");
        assert_eq!(row.values[Field::Category.index()], "Near Miss");
    }

    #[test]
    fn off_picklist_value_is_a_schema_violation() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::open(dir.path().join("valid.xlsx")).unwrap();
        let err = ledger.append(&record("Mars", "Near Miss")).unwrap_err();
        assert!(matches!(err, StoreError::SchemaViolation { ref field, .. } if field == "Location"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn persistence_failure_leaves_table_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let table_dir = dir.path().join("out");
        std::fs::create_dir(&table_dir).unwrap();
        let mut ledger = Ledger::open(table_dir.join("valid.xlsx")).unwrap();

        std::fs::remove_dir_all(&table_dir).unwrap();
        let err = ledger.append(&record("HSV", "Near Miss")).unwrap_err();
        assert!(matches!(err, StoreError::Persistence { .. }));
        assert!(ledger.is_empty());
    }

    #[test]
    fn foreign_workbook_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.xlsx");
        let mut workbook = Workbook::new();
        workbook
            .add_worksheet()
            .write_string(0, 0, "Something else")
            .unwrap();
        workbook.save(&path).unwrap();

        assert!(matches!(Ledger::open(&path), Err(StoreError::Load { .. })));
    }
}
