use std::io::Read;
use std::sync::Arc;

use chrono::Datelike;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::workflows::arrears::{
    classify, normalize_rows, ArrearsImporter, DebtorRecord, ImportError, LetterType,
    NormalizedBatch, RawRow,
};

use super::clock::{Clock, SystemClock};
use super::comparison::{compare_reports, PeriodComparison};
use super::domain::{
    format_consecutive, BalanceLine, BalanceUpdate, BulkGeneration, InvalidPeriod, IssuedLetter,
    LetterChannel, LetterDraft, LetterFilter, LetterRecord, LetterRequest, LetterStatus,
    NewProperty, NewSnapshot, Period, Property, PropertyUpdate, ReportView,
};
use super::effectiveness::{analyze, EffectivenessReport};
use super::repository::{CollectionsStore, RepositoryError};

const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

/// Staged import: what a confirm would write, nothing persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportPreview {
    pub period: Period,
    pub rows_present: usize,
    pub rows_accepted: usize,
    pub rows_dropped: usize,
    /// Non-empty cells that could not be read as numbers and were set to zero.
    pub defaulted_cells: usize,
    pub total_amount: f64,
    /// A report already exists for the period and would be replaced.
    pub replaces_existing: bool,
    pub debtors: Vec<DebtorRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub report: ReportView,
    pub replaced: bool,
    pub rows_present: usize,
    pub rows_accepted: usize,
    pub rows_dropped: usize,
    pub defaulted_cells: usize,
}

/// Service composing the snapshot store, the letter ledger and the analytics.
pub struct CollectionsService<S, C = SystemClock> {
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S> CollectionsService<S, SystemClock>
where
    S: CollectionsStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }
}

impl<S, C> CollectionsService<S, C>
where
    S: CollectionsStore + 'static,
    C: Clock + 'static,
{
    pub fn with_clock(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    pub fn create_property(&self, new: NewProperty) -> Result<Property, CollectionsError> {
        let name = required_text(&new.name, "property name")?;
        let property = Property {
            id: Uuid::new_v4().to_string(),
            name,
            settings: new.settings.unwrap_or_else(|| json!({})),
            created_at: self.clock.now(),
        };
        let stored = self.store.insert_property(property)?;
        info!(property_id = %stored.id, name = %stored.name, "registered property");
        Ok(stored)
    }

    pub fn list_properties(&self) -> Result<Vec<Property>, CollectionsError> {
        Ok(self.store.list_properties()?)
    }

    pub fn get_property(&self, property_id: &str) -> Result<Property, CollectionsError> {
        let property = self
            .store
            .fetch_property(property_id)?
            .ok_or(RepositoryError::NotFound("property"))?;
        Ok(property)
    }

    pub fn update_property(
        &self,
        property_id: &str,
        update: PropertyUpdate,
    ) -> Result<Property, CollectionsError> {
        let mut property = self.get_property(property_id)?;
        if let Some(name) = update.name {
            property.name = required_text(&name, "property name")?;
        }
        if let Some(settings) = update.settings {
            property.settings = settings;
        }
        self.store.update_property(&property)?;
        Ok(property)
    }

    /// Deletes the property with its units, reports, balances, letters and counters.
    pub fn delete_property(&self, property_id: &str) -> Result<(), CollectionsError> {
        self.store.delete_property(property_id)?;
        warn!(property_id, "deleted property and all dependent records");
        Ok(())
    }

    pub fn preview(
        &self,
        property_id: &str,
        period: &Period,
        rows: &[RawRow],
    ) -> Result<ImportPreview, CollectionsError> {
        self.get_property(property_id)?;
        let batch = normalize_rows(rows);
        let replaces_existing = self.store.report_exists(property_id, period)?;
        debug!(
            property_id,
            period = %period,
            rows_present = batch.rows_present,
            rows_accepted = batch.rows_accepted,
            replaces_existing,
            "previewed arrears import"
        );

        Ok(ImportPreview {
            period: period.clone(),
            rows_present: batch.rows_present,
            rows_accepted: batch.rows_accepted,
            rows_dropped: batch.rows_dropped,
            defaulted_cells: batch.defaulted_cells,
            total_amount: batch.total_payable(),
            replaces_existing,
            debtors: batch.debtors,
        })
    }

    pub fn preview_csv<R: Read>(
        &self,
        property_id: &str,
        period: &Period,
        reader: R,
    ) -> Result<ImportPreview, CollectionsError> {
        let rows = ArrearsImporter::rows_from_reader(reader)?;
        self.preview(property_id, period, &rows)
    }

    /// Writes already-normalized debtors as the period's snapshot. Units and
    /// owners are trimmed, debtors with a blank unit are dropped, and the legal
    /// stage is derived again from each debtor's months overdue.
    pub fn ingest(
        &self,
        property_id: &str,
        period: &Period,
        label: Option<&str>,
        debtors: Vec<DebtorRecord>,
    ) -> Result<IngestOutcome, CollectionsError> {
        let rows_present = debtors.len();
        let debtors: Vec<DebtorRecord> = debtors
            .into_iter()
            .filter_map(|mut debtor| {
                let unit = debtor.unit.trim().to_string();
                if unit.is_empty() {
                    return None;
                }
                debtor.unit = unit;
                debtor.owner_name = debtor.owner_name.trim().to_string();
                Some(debtor)
            })
            .collect();
        let batch = NormalizedBatch {
            rows_present,
            rows_accepted: debtors.len(),
            rows_dropped: rows_present - debtors.len(),
            debtors,
            ..NormalizedBatch::default()
        };
        self.write_snapshot(property_id, period, label, batch)
    }

    pub fn ingest_rows(
        &self,
        property_id: &str,
        period: &Period,
        label: Option<&str>,
        rows: &[RawRow],
    ) -> Result<IngestOutcome, CollectionsError> {
        self.write_snapshot(property_id, period, label, normalize_rows(rows))
    }

    pub fn ingest_csv<R: Read>(
        &self,
        property_id: &str,
        period: &Period,
        label: Option<&str>,
        reader: R,
    ) -> Result<IngestOutcome, CollectionsError> {
        let rows = ArrearsImporter::rows_from_reader(reader)?;
        self.ingest_rows(property_id, period, label, &rows)
    }

    fn write_snapshot(
        &self,
        property_id: &str,
        period: &Period,
        label: Option<&str>,
        batch: NormalizedBatch,
    ) -> Result<IngestOutcome, CollectionsError> {
        let NormalizedBatch {
            debtors,
            rows_present,
            rows_accepted,
            rows_dropped,
            defaulted_cells,
        } = batch;

        let debtors = debtors
            .into_iter()
            .map(|mut debtor| {
                let classification =
                    classify(debtor.months_overdue, Some(debtor.letter_type.code()));
                debtor.legal_stage = classification.legal_stage;
                debtor
            })
            .collect();

        let label = label
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| period_label(period));

        let (report, replaced) = self.store.replace_report(NewSnapshot {
            property_id: property_id.to_string(),
            period: period.clone(),
            label,
            debtors,
            created_at: self.clock.now(),
        })?;

        info!(
            property_id,
            period = %period,
            rows_present,
            rows_accepted,
            rows_dropped,
            defaulted_cells,
            replaced,
            total_amount = report.report.total_amount,
            "stored arrears snapshot"
        );
        if rows_dropped > 0 {
            warn!(property_id, period = %period, rows_dropped, "rows without unit or owner were skipped");
        }

        Ok(IngestOutcome {
            report,
            replaced,
            rows_present,
            rows_accepted,
            rows_dropped,
            defaulted_cells,
        })
    }

    pub fn get_report(
        &self,
        property_id: &str,
        period: &Period,
    ) -> Result<ReportView, CollectionsError> {
        self.get_property(property_id)?;
        let report = self
            .store
            .fetch_report(property_id, period)?
            .ok_or(RepositoryError::NotFound("report"))?;
        Ok(report)
    }

    pub fn list_reports(&self, property_id: &str) -> Result<Vec<ReportView>, CollectionsError> {
        self.get_property(property_id)?;
        Ok(self.store.list_reports(property_id)?)
    }

    /// Removes a report and its balances; units stay for other periods.
    pub fn delete_report(&self, report_id: &str) -> Result<(), CollectionsError> {
        self.store.delete_report(report_id)?;
        info!(report_id, "deleted arrears snapshot");
        Ok(())
    }

    pub fn update_balance(
        &self,
        balance_id: &str,
        update: BalanceUpdate,
    ) -> Result<BalanceLine, CollectionsError> {
        let classification = classify(
            update.months_overdue,
            update.letter_type.map(LetterType::code),
        );
        let line = self
            .store
            .update_balance(balance_id, &update, classification)?;
        debug!(balance_id, unit = %line.unit, "updated balance");
        Ok(line)
    }

    pub fn delete_balance(&self, balance_id: &str) -> Result<(), CollectionsError> {
        self.store.delete_balance(balance_id)?;
        debug!(balance_id, "deleted balance");
        Ok(())
    }

    /// Code the next generated letter of `letter_type` would receive. Does not
    /// reserve it.
    pub fn next_consecutive(
        &self,
        property_id: &str,
        letter_type: LetterType,
    ) -> Result<String, CollectionsError> {
        self.get_property(property_id)?;
        let last = self.store.last_issued(property_id, letter_type)?;
        Ok(format_consecutive(letter_type, last + 1))
    }

    /// Generate-or-fetch: a repeat request for the same unit, type and period
    /// returns the original record without consuming a number.
    pub fn generate_letter(
        &self,
        property_id: &str,
        mut request: LetterRequest,
    ) -> Result<IssuedLetter, CollectionsError> {
        request.unit = required_text(&request.unit, "unit")?;
        request.owner_name = request.owner_name.trim().to_string();

        let issued = self.store.issue_letter(LetterDraft {
            id: Uuid::new_v4().to_string(),
            property_id: property_id.to_string(),
            request,
            generated_at: self.clock.now(),
        })?;

        if issued.created {
            info!(
                property_id,
                unit = %issued.record.unit,
                period = %issued.record.period,
                consecutive = %issued.record.consecutive,
                "generated collection letter"
            );
        } else {
            debug!(
                property_id,
                consecutive = %issued.record.consecutive,
                "letter already generated for unit and period"
            );
        }
        Ok(issued)
    }

    /// Generates letters for every balance of the period whose category is in
    /// `letter_types` (every category when empty). Safe to retry.
    pub fn generate_bulk(
        &self,
        property_id: &str,
        period: &Period,
        letter_types: &[LetterType],
    ) -> Result<BulkGeneration, CollectionsError> {
        let report = self.get_report(property_id, period)?;
        let mut outcome = BulkGeneration {
            period: period.clone(),
            created: 0,
            reused: 0,
            letters: Vec::new(),
        };

        for balance in report
            .balances
            .into_iter()
            .filter(|balance| letter_types.is_empty() || letter_types.contains(&balance.letter_type))
        {
            let issued = self.generate_letter(
                property_id,
                LetterRequest {
                    unit: balance.unit,
                    letter_type: balance.letter_type,
                    period: period.clone(),
                    owner_name: balance.owner_name,
                    amount: balance.total_payable,
                    email: balance.email,
                },
            )?;
            if issued.created {
                outcome.created += 1;
            } else {
                outcome.reused += 1;
            }
            outcome.letters.push(issued.record);
        }

        info!(
            property_id,
            period = %period,
            created = outcome.created,
            reused = outcome.reused,
            "bulk letter generation finished"
        );
        Ok(outcome)
    }

    pub fn update_status(
        &self,
        letter_id: &str,
        status: LetterStatus,
        channel: Option<LetterChannel>,
    ) -> Result<LetterRecord, CollectionsError> {
        let mut record = self.get_letter(letter_id)?;
        record.status = status;
        if channel.is_some() {
            record.channel = channel;
        }
        self.store.update_letter(&record)?;
        debug!(letter_id, status = status.label(), "updated letter status");
        Ok(record)
    }

    pub fn update_follow_up(
        &self,
        letter_id: &str,
        notes: String,
        payment_commitment: Option<String>,
    ) -> Result<LetterRecord, CollectionsError> {
        let mut record = self.get_letter(letter_id)?;
        record.notes = notes;
        record.payment_commitment = payment_commitment.filter(|value| !value.trim().is_empty());
        self.store.update_letter(&record)?;
        Ok(record)
    }

    pub fn get_letter(&self, letter_id: &str) -> Result<LetterRecord, CollectionsError> {
        let record = self
            .store
            .fetch_letter(letter_id)?
            .ok_or(RepositoryError::NotFound("letter"))?;
        Ok(record)
    }

    pub fn delete_letter(&self, letter_id: &str) -> Result<(), CollectionsError> {
        self.store.delete_letter(letter_id)?;
        info!(letter_id, "deleted letter record");
        Ok(())
    }

    /// Administrative wipe of the property's ledger; numbering restarts at 1.
    pub fn reset_letters(&self, property_id: &str) -> Result<usize, CollectionsError> {
        self.get_property(property_id)?;
        let removed = self.store.reset_letters(property_id)?;
        warn!(property_id, removed, "reset letter ledger");
        Ok(removed)
    }

    pub fn list_letters(
        &self,
        property_id: &str,
        filter: &LetterFilter,
    ) -> Result<Vec<LetterRecord>, CollectionsError> {
        self.get_property(property_id)?;
        Ok(self.store.list_letters(property_id, filter)?)
    }

    /// Recomputed on every call; `None` until the property has two periods.
    pub fn effectiveness(
        &self,
        property_id: &str,
    ) -> Result<Option<EffectivenessReport>, CollectionsError> {
        let reports = self.list_reports(property_id)?;
        let letters = self
            .store
            .list_letters(property_id, &LetterFilter::default())?;
        Ok(analyze(&reports, &letters))
    }

    pub fn compare(
        &self,
        property_id: &str,
        base: &Period,
        compare: &Period,
    ) -> Result<PeriodComparison, CollectionsError> {
        let base = self.get_report(property_id, base)?;
        let compare = self.get_report(property_id, compare)?;
        Ok(compare_reports(&base, &compare))
    }
}

/// Spanish display label for a period, e.g. "Enero 2026".
pub fn period_label(period: &Period) -> String {
    let parsed = chrono::NaiveDate::parse_from_str(&format!("{period}-01"), "%Y-%m-%d");
    match parsed {
        Ok(date) => format!("{} {}", MONTH_NAMES[date.month0() as usize], date.year()),
        Err(_) => period.to_string(),
    }
}

pub fn parse_letter_type(raw: &str) -> Result<LetterType, CollectionsError> {
    LetterType::parse(raw).ok_or_else(|| CollectionsError::InvalidLetterType(raw.to_string()))
}

pub fn parse_status(raw: &str) -> Result<LetterStatus, CollectionsError> {
    LetterStatus::parse(raw).ok_or_else(|| CollectionsError::InvalidStatus(raw.to_string()))
}

pub fn parse_channel(raw: &str) -> Result<LetterChannel, CollectionsError> {
    LetterChannel::parse(raw).ok_or_else(|| CollectionsError::InvalidChannel(raw.to_string()))
}

fn required_text(value: &str, field: &str) -> Result<String, CollectionsError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CollectionsError::InvalidRequest(format!(
            "{field} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Error raised by the collections service.
#[derive(Debug, thiserror::Error)]
pub enum CollectionsError {
    #[error(transparent)]
    InvalidPeriod(#[from] InvalidPeriod),
    #[error("unknown letter type `{0}`, expected CS, CP or AB")]
    InvalidLetterType(String),
    #[error("unknown letter status `{0}`, expected generada, enviada or entregada")]
    InvalidStatus(String),
    #[error("unknown delivery channel `{0}`, expected email, impresa or whatsapp")]
    InvalidChannel(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("collections worker failed: {0}")]
    Worker(String),
}

impl CollectionsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Repository(RepositoryError::NotFound(_)))
    }

    /// Caller mistakes, as opposed to storage or transport failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPeriod(_)
                | Self::InvalidLetterType(_)
                | Self::InvalidStatus(_)
                | Self::InvalidChannel(_)
                | Self::InvalidRequest(_)
                | Self::Import(_)
        )
    }
}
