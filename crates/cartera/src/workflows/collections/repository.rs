use crate::workflows::arrears::{Classification, LetterType};

use super::domain::{
    BalanceLine, BalanceUpdate, IssuedLetter, LetterDraft, LetterFilter, LetterRecord,
    NewSnapshot, Period, Property, ReportView,
};

/// Property registry storage.
pub trait PropertyRepository: Send + Sync {
    fn insert_property(&self, property: Property) -> Result<Property, RepositoryError>;
    fn fetch_property(&self, id: &str) -> Result<Option<Property>, RepositoryError>;
    fn list_properties(&self) -> Result<Vec<Property>, RepositoryError>;
    fn update_property(&self, property: &Property) -> Result<(), RepositoryError>;
    /// Removes the property and everything that hangs off it.
    fn delete_property(&self, id: &str) -> Result<(), RepositoryError>;
}

/// Per-(property, period) snapshot storage.
pub trait SnapshotRepository: Send + Sync {
    /// Upserts the snapshot's units and writes the report, replacing any report
    /// already stored for the same period. Returns the report as written by this
    /// call and whether a previous one was replaced. Must be all-or-nothing.
    fn replace_report(&self, snapshot: NewSnapshot)
        -> Result<(ReportView, bool), RepositoryError>;
    fn report_exists(&self, property_id: &str, period: &Period) -> Result<bool, RepositoryError>;
    fn fetch_report(
        &self,
        property_id: &str,
        period: &Period,
    ) -> Result<Option<ReportView>, RepositoryError>;
    /// Every report of the property, newest period first.
    fn list_reports(&self, property_id: &str) -> Result<Vec<ReportView>, RepositoryError>;
    fn delete_report(&self, report_id: &str) -> Result<(), RepositoryError>;
    /// Overwrites one balance and recomputes its report total atomically.
    fn update_balance(
        &self,
        balance_id: &str,
        update: &BalanceUpdate,
        classification: Classification,
    ) -> Result<BalanceLine, RepositoryError>;
    fn delete_balance(&self, balance_id: &str) -> Result<(), RepositoryError>;
}

/// Letter ledger storage with its per-type counters.
pub trait LetterRepository: Send + Sync {
    /// Last number issued for `(property_id, letter_type)`, zero when none.
    fn last_issued(&self, property_id: &str, letter_type: LetterType)
        -> Result<u32, RepositoryError>;
    /// Returns the existing record for the draft's key, or increments the counter
    /// and stores a new record. The lookup and the increment share one atomic unit.
    fn issue_letter(&self, draft: LetterDraft) -> Result<IssuedLetter, RepositoryError>;
    fn fetch_letter(&self, id: &str) -> Result<Option<LetterRecord>, RepositoryError>;
    /// Matching records, newest first.
    fn list_letters(
        &self,
        property_id: &str,
        filter: &LetterFilter,
    ) -> Result<Vec<LetterRecord>, RepositoryError>;
    /// Persists status, channel, notes and payment commitment of an existing record.
    fn update_letter(&self, record: &LetterRecord) -> Result<(), RepositoryError>;
    fn delete_letter(&self, id: &str) -> Result<(), RepositoryError>;
    /// Deletes every record of the property and zeroes its counters.
    fn reset_letters(&self, property_id: &str) -> Result<usize, RepositoryError>;
}

/// A single backend holding every collections table.
pub trait CollectionsStore: PropertyRepository + SnapshotRepository + LetterRepository {}

impl<T> CollectionsStore for T where T: PropertyRepository + SnapshotRepository + LetterRepository {}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(#[source] rusqlite::Error),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for RepositoryError {
    /// Unique and primary-key violations surface as conflicts.
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, message)
                if matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                ) =>
            {
                Self::Conflict(message.clone().unwrap_or_else(|| failure.to_string()))
            }
            _ => Self::Storage(err),
        }
    }
}
