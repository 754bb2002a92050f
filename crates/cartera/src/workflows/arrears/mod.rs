//! Turns heterogeneous arrears spreadsheets into canonical, classified debtor records.

pub mod classifier;
pub mod domain;
pub mod mapping;
mod normalizer;
mod parser;

pub use classifier::{classify, Classification, LegalStage, LetterType};
pub use domain::{CellValue, DebtorRecord, NormalizedBatch, RawRow};
pub use mapping::{CanonicalField, FieldRule, HeaderMatcher, RESOLUTION_TABLE};

use std::io::Read;
use std::path::Path;

use mapping::resolve_header;
use normalizer::{parse_amount, parse_months, ParsedAmount};

const DEFAULT_STATUS_LABEL: &str = "MOROSO";

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read arrears export: {}", err),
            ImportError::Csv(err) => write!(f, "invalid arrears CSV data: {}", err),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct ArrearsImporter;

impl ArrearsImporter {
    pub fn rows_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<RawRow>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::rows_from_reader(file)
    }

    pub fn rows_from_reader<R: Read>(reader: R) -> Result<Vec<RawRow>, ImportError> {
        Ok(parser::parse_rows(reader)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<NormalizedBatch, ImportError> {
        Ok(normalize_rows(&Self::rows_from_path(path)?))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<NormalizedBatch, ImportError> {
        Ok(normalize_rows(&Self::rows_from_reader(reader)?))
    }
}

/// Normalizes and classifies every row. Rows without a resolvable unit and owner
/// column, or with a blank unit cell, are dropped and counted.
pub fn normalize_rows(rows: &[RawRow]) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        rows_present: rows.len(),
        ..NormalizedBatch::default()
    };

    for row in rows {
        match normalize_row(row) {
            Some(debtor) => {
                batch.defaulted_cells += debtor.defaulted_fields.len();
                batch.debtors.push(debtor);
            }
            None => batch.rows_dropped += 1,
        }
    }

    batch.rows_accepted = batch.debtors.len();
    batch
}

/// Resolves and parses one row; `None` when the row has no usable unit/owner.
pub fn normalize_row(row: &RawRow) -> Option<DebtorRecord> {
    let unit_header = resolve_header(CanonicalField::UnitIdentifier, row.headers())?;
    let owner_header = resolve_header(CanonicalField::OwnerName, row.headers())?;
    let unit = row.get(unit_header)?.as_text()?;
    let owner_name = row
        .get(owner_header)
        .and_then(CellValue::as_text)
        .unwrap_or_default();

    let mut defaulted_fields = Vec::new();
    let mut read = |field: CanonicalField, parse: fn(Option<&CellValue>) -> ParsedAmount| {
        let cell = resolve_header(field, row.headers()).and_then(|header| row.get(header));
        let parsed = parse(cell);
        if parsed.defaulted {
            defaulted_fields.push(field);
        }
        parsed.value
    };

    let previous_balance = read(CanonicalField::PreviousBalance, parse_amount);
    let current_fee = read(CanonicalField::CurrentFee, parse_amount);
    let interest = read(CanonicalField::Interest, parse_amount);
    let other_charges = read(CanonicalField::OtherCharges, parse_amount);
    let total_payable = read(CanonicalField::TotalPayable, parse_amount);
    let months_overdue = read(CanonicalField::MonthsOverdue, parse_months);

    let text = |field: CanonicalField| {
        resolve_header(field, row.headers())
            .and_then(|header| row.get(header))
            .and_then(CellValue::as_text)
    };

    let letter_override = text(CanonicalField::LetterType);
    let classification = classify(months_overdue, letter_override.as_deref());

    Some(DebtorRecord {
        unit,
        owner_name,
        previous_balance,
        current_fee,
        interest,
        other_charges,
        total_payable,
        months_overdue,
        status_label: text(CanonicalField::StatusLabel)
            .unwrap_or_else(|| DEFAULT_STATUS_LABEL.to_string()),
        letter_type: classification.letter_type,
        legal_stage: classification.legal_stage,
        email: text(CanonicalField::Email),
        phone: text(CanonicalField::Phone),
        defaulted_fields,
    })
}
