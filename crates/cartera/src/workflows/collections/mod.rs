//! Monthly arrears snapshots, the collection-letter ledger and the analytics
//! computed from both.
//!
//! One report is kept per property and period; re-uploading a period replaces it
//! atomically. Letters are numbered per property and category from a durable
//! counter, and generating the same (unit, category, period) twice returns the
//! first record.

pub mod clock;
pub mod comparison;
pub mod domain;
pub mod effectiveness;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use comparison::{compare_reports, ChangeStatus, ComparisonSummary, PeriodComparison, UnitComparison};
pub use domain::{
    format_consecutive, AgingBucket, BalanceLine, BalanceUpdate, BulkGeneration, InvalidPeriod,
    IssuedLetter, LetterChannel, LetterFilter, LetterRecord, LetterRequest, LetterStatus,
    MonthlyReport, NewProperty, Period, Property, PropertyUpdate, ReportSummary, ReportView,
};
pub use effectiveness::{
    analyze, EffectivenessMetric, EffectivenessReport, LetterOutcome, Outcome, PeriodEffectiveness,
};
pub use repository::{
    CollectionsStore, LetterRepository, PropertyRepository, RepositoryError, SnapshotRepository,
};
pub use router::collections_router;
pub use service::{
    parse_channel, parse_letter_type, parse_status, period_label, CollectionsError,
    CollectionsService, ImportPreview, IngestOutcome,
};
pub use sqlite::SqliteStore;
