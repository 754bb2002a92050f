use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use crate::workflows::arrears::{
    classify, Classification, DebtorRecord, LetterType, RawRow,
};
use crate::workflows::collections::domain::{
    BalanceLine, BalanceUpdate, IssuedLetter, LetterDraft, LetterFilter, LetterRecord,
    LetterRequest, LetterStatus, MonthlyReport, NewProperty, NewSnapshot, Period, Property,
    ReportView,
};
use crate::workflows::collections::repository::{
    LetterRepository, PropertyRepository, RepositoryError, SnapshotRepository,
};
use crate::workflows::collections::{collections_router, CollectionsService, FixedClock, SqliteStore};

pub(super) type TestService = CollectionsService<SqliteStore, FixedClock>;

pub(super) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn period(raw: &str) -> Period {
    Period::parse(raw).expect("valid period")
}

pub(super) fn build_service() -> (TestService, Arc<SqliteStore>, Arc<FixedClock>) {
    let store = Arc::new(SqliteStore::in_memory().expect("in-memory store"));
    let clock = Arc::new(FixedClock::new(at(2026, 1, 15)));
    let service = CollectionsService::with_clock(store.clone(), clock.clone());
    (service, store, clock)
}

pub(super) fn create_property(service: &TestService, name: &str) -> Property {
    service
        .create_property(NewProperty {
            name: name.to_string(),
            settings: Some(json!({ "administrator": "Administración Torres" })),
        })
        .expect("property created")
}

pub(super) fn debtor(unit: &str, owner: &str, total: f64, months: f64) -> DebtorRecord {
    let Classification {
        letter_type,
        legal_stage,
    } = classify(months, None);
    DebtorRecord {
        unit: unit.to_string(),
        owner_name: owner.to_string(),
        previous_balance: total,
        current_fee: 0.0,
        interest: 0.0,
        other_charges: 0.0,
        total_payable: total,
        months_overdue: months,
        status_label: "MOROSO".to_string(),
        letter_type,
        legal_stage,
        email: Some(format!("{}@ejemplo.com", unit.to_lowercase())),
        phone: None,
        defaulted_fields: Vec::new(),
    }
}

pub(super) fn template_row(unit: &str, owner: &str, total: &str, months: &str) -> RawRow {
    RawRow::new()
        .with("LOCAL/OFI", unit)
        .with("PROPIETARIO", owner)
        .with("TOTAL A PAGAR", total)
        .with("EDAD VENCIDA", months)
}

pub(super) fn letter_request(unit: &str, letter_type: LetterType, period_raw: &str) -> LetterRequest {
    LetterRequest {
        unit: unit.to_string(),
        letter_type,
        period: period(period_raw),
        owner_name: format!("Propietario {unit}"),
        amount: 500_000.0,
        email: None,
    }
}

pub(super) fn ingest(
    service: &TestService,
    property_id: &str,
    period_raw: &str,
    debtors: Vec<DebtorRecord>,
) -> ReportView {
    service
        .ingest(property_id, &period(period_raw), None, debtors)
        .expect("ingest succeeds")
        .report
}

/// Report built in memory, for analyzer tests that do not need storage.
pub(super) fn report_view(period_raw: &str, lines: &[(&str, f64)]) -> ReportView {
    let report_id = format!("report-{period_raw}");
    let balances: Vec<BalanceLine> = lines
        .iter()
        .enumerate()
        .map(|(index, (unit, amount))| {
            let classification = classify(1.0, None);
            BalanceLine {
                id: format!("{report_id}-{index}"),
                report_id: report_id.clone(),
                unit_id: format!("unit-{unit}"),
                unit: unit.to_string(),
                owner_name: format!("Propietario {unit}"),
                email: None,
                phone: None,
                previous_balance: *amount,
                current_fee: 0.0,
                interest: 0.0,
                other_charges: 0.0,
                total_payable: *amount,
                months_overdue: 1.0,
                status_label: "MOROSO".to_string(),
                letter_type: classification.letter_type,
                legal_stage: classification.legal_stage,
            }
        })
        .collect();

    ReportView::new(
        MonthlyReport {
            id: report_id,
            property_id: "prop-1".to_string(),
            period: period(period_raw),
            label: period_raw.to_string(),
            total_amount: balances.iter().map(|line| line.total_payable).sum(),
            created_at: at(2026, 1, 1),
        },
        balances,
    )
}

pub(super) fn letter_record(unit: &str, sequence: u32, generated_at: DateTime<Utc>) -> LetterRecord {
    LetterRecord {
        id: format!("letter-{unit}-{sequence}"),
        property_id: "prop-1".to_string(),
        consecutive: format!("CP-{sequence:04}"),
        letter_type: LetterType::Persuasive,
        unit: unit.to_string(),
        owner_name: format!("Propietario {unit}"),
        amount: 0.0,
        period: Period::containing(generated_at),
        email: None,
        generated_at,
        status: LetterStatus::Sent,
        channel: None,
        notes: String::new(),
        payment_commitment: None,
    }
}

pub(super) fn count_rows(store: &SqliteStore, table: &str) -> i64 {
    let connection = store.connection().expect("connection");
    connection
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("count rows")
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    collections_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .expect("request")
}

pub(super) fn empty_request(method: &str, uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .expect("request")
}

/// Store whose every call fails as if the database were offline.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl PropertyRepository for UnavailableStore {
    fn insert_property(&self, _property: Property) -> Result<Property, RepositoryError> {
        offline()
    }

    fn fetch_property(&self, _id: &str) -> Result<Option<Property>, RepositoryError> {
        offline()
    }

    fn list_properties(&self) -> Result<Vec<Property>, RepositoryError> {
        offline()
    }

    fn update_property(&self, _property: &Property) -> Result<(), RepositoryError> {
        offline()
    }

    fn delete_property(&self, _id: &str) -> Result<(), RepositoryError> {
        offline()
    }
}

impl SnapshotRepository for UnavailableStore {
    fn replace_report(
        &self,
        _snapshot: NewSnapshot,
    ) -> Result<(ReportView, bool), RepositoryError> {
        offline()
    }

    fn report_exists(&self, _property_id: &str, _period: &Period) -> Result<bool, RepositoryError> {
        offline()
    }

    fn fetch_report(
        &self,
        _property_id: &str,
        _period: &Period,
    ) -> Result<Option<ReportView>, RepositoryError> {
        offline()
    }

    fn list_reports(&self, _property_id: &str) -> Result<Vec<ReportView>, RepositoryError> {
        offline()
    }

    fn delete_report(&self, _report_id: &str) -> Result<(), RepositoryError> {
        offline()
    }

    fn update_balance(
        &self,
        _balance_id: &str,
        _update: &BalanceUpdate,
        _classification: Classification,
    ) -> Result<BalanceLine, RepositoryError> {
        offline()
    }

    fn delete_balance(&self, _balance_id: &str) -> Result<(), RepositoryError> {
        offline()
    }
}

impl LetterRepository for UnavailableStore {
    fn last_issued(&self, _property_id: &str, _letter_type: LetterType) -> Result<u32, RepositoryError> {
        offline()
    }

    fn issue_letter(&self, _draft: LetterDraft) -> Result<IssuedLetter, RepositoryError> {
        offline()
    }

    fn fetch_letter(&self, _id: &str) -> Result<Option<LetterRecord>, RepositoryError> {
        offline()
    }

    fn list_letters(
        &self,
        _property_id: &str,
        _filter: &LetterFilter,
    ) -> Result<Vec<LetterRecord>, RepositoryError> {
        offline()
    }

    fn update_letter(&self, _record: &LetterRecord) -> Result<(), RepositoryError> {
        offline()
    }

    fn delete_letter(&self, _id: &str) -> Result<(), RepositoryError> {
        offline()
    }

    fn reset_letters(&self, _property_id: &str) -> Result<usize, RepositoryError> {
        offline()
    }
}
