//! SQLite persistence for properties, snapshots and the letter ledger.
//!
//! Every multi-statement write runs inside a `BEGIN IMMEDIATE` transaction so the
//! database write lock is held from the first read of the unit of work. The
//! connection mutex serialises callers inside one process; the SQLite lock and the
//! busy timeout serialise separate processes sharing the same file.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::workflows::arrears::{Classification, LegalStage, LetterType};

use super::domain::{
    format_consecutive, BalanceLine, BalanceUpdate, IssuedLetter, LetterChannel, LetterDraft,
    LetterFilter, LetterRecord, LetterStatus, MonthlyReport, NewSnapshot, Period, Property,
    ReportView,
};
use super::repository::{
    LetterRepository, PropertyRepository, RepositoryError, SnapshotRepository,
};

const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_init",
    include_str!("../../../migrations/0001_init.sql"),
)];

const PROPERTY_SELECT: &str = "SELECT id, name, settings, created_at FROM properties";

const REPORT_SELECT: &str =
    "SELECT id, property_id, period, label, total_amount, created_at FROM monthly_reports";

const BALANCE_SELECT: &str = "SELECT b.id, b.report_id, b.unit_id, u.identifier, u.owner_name, \
     u.email, u.phone, b.previous_balance, b.current_fee, b.interest, b.other_charges, \
     b.total_payable, b.months_overdue, b.status_label, b.letter_type, b.legal_stage \
     FROM unit_balances b JOIN units u ON u.id = b.unit_id";

const LETTER_SELECT: &str = "SELECT id, property_id, consecutive, letter_type, unit, owner_name, \
     amount, period, email, generated_at, status, channel, notes, payment_commitment \
     FROM letter_records";

pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database file, enabling WAL and foreign keys, and
    /// applies pending migrations.
    pub fn open(config: &StorageConfig) -> Result<Self, RepositoryError> {
        if let Some(parent) = config
            .database_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "cannot create database directory {}: {err}",
                    parent.display()
                ))
            })?;
        }

        let connection = Connection::open(&config.database_path)?;
        connection.busy_timeout(config.busy_timeout())?;
        let mode: String =
            connection.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %config.database_path.display(), journal_mode = %mode, "opened sqlite store");
        Self::prepare(connection)
    }

    /// Private in-memory database, used by tests and previews.
    pub fn in_memory() -> Result<Self, RepositoryError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(connection: Connection) -> Result<Self, RepositoryError> {
        connection.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self {
            connection: Mutex::new(connection),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Applies embedded migrations not yet recorded in `schema_migrations`.
    /// Returns how many were applied.
    pub fn migrate(&self) -> Result<usize, RepositoryError> {
        let mut connection = self.connection()?;
        connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            );",
        )?;

        let mut applied = 0;
        for (version, sql) in MIGRATIONS {
            let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let present: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
                params![version],
                |row| row.get(0),
            )?;
            if !present {
                tx.execute_batch(sql)?;
                tx.execute(
                    "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                    params![version, write_timestamp(Utc::now())],
                )?;
                debug!(version = *version, "applied migration");
                applied += 1;
            }
            tx.commit()?;
        }
        Ok(applied)
    }

    pub(crate) fn connection(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.connection
            .lock()
            .map_err(|_| RepositoryError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

impl PropertyRepository for SqliteStore {
    fn insert_property(&self, property: Property) -> Result<Property, RepositoryError> {
        let connection = self.connection()?;
        connection.execute(
            "INSERT INTO properties (id, name, settings, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                property.id,
                property.name,
                property.settings.to_string(),
                write_timestamp(property.created_at)
            ],
        )?;
        Ok(property)
    }

    fn fetch_property(&self, id: &str) -> Result<Option<Property>, RepositoryError> {
        let connection = self.connection()?;
        let property = connection
            .query_row(
                &format!("{PROPERTY_SELECT} WHERE id = ?1"),
                [id],
                map_property,
            )
            .optional()?;
        Ok(property)
    }

    fn list_properties(&self) -> Result<Vec<Property>, RepositoryError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(&format!(
            "{PROPERTY_SELECT} ORDER BY name COLLATE NOCASE, created_at"
        ))?;
        let properties = statement
            .query_map([], map_property)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(properties)
    }

    fn update_property(&self, property: &Property) -> Result<(), RepositoryError> {
        let connection = self.connection()?;
        let changed = connection.execute(
            "UPDATE properties SET name = ?2, settings = ?3 WHERE id = ?1",
            params![property.id, property.name, property.settings.to_string()],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound("property"));
        }
        Ok(())
    }

    fn delete_property(&self, id: &str) -> Result<(), RepositoryError> {
        let connection = self.connection()?;
        let changed = connection.execute("DELETE FROM properties WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(RepositoryError::NotFound("property"));
        }
        Ok(())
    }
}

impl SnapshotRepository for SqliteStore {
    fn replace_report(
        &self,
        snapshot: NewSnapshot,
    ) -> Result<(ReportView, bool), RepositoryError> {
        let mut connection = self.connection()?;
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_property(&tx, &snapshot.property_id)?;

        // Balances go with the report through ON DELETE CASCADE.
        let replaced = tx.execute(
            "DELETE FROM monthly_reports WHERE property_id = ?1 AND period = ?2",
            params![snapshot.property_id, snapshot.period],
        )? > 0;

        let report = MonthlyReport {
            id: Uuid::new_v4().to_string(),
            property_id: snapshot.property_id.clone(),
            period: snapshot.period.clone(),
            label: snapshot.label.clone(),
            total_amount: snapshot.debtors.iter().map(|debtor| debtor.total_payable).sum(),
            created_at: snapshot.created_at,
        };
        let stamped = write_timestamp(snapshot.created_at);

        tx.execute(
            "INSERT INTO monthly_reports (id, property_id, period, label, total_amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                report.id,
                report.property_id,
                report.period,
                report.label,
                report.total_amount,
                stamped
            ],
        )?;

        {
            let mut upsert_unit = tx.prepare(
                "INSERT INTO units (id, property_id, identifier, owner_name, email, phone, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (property_id, identifier) DO UPDATE SET
                     owner_name = excluded.owner_name,
                     email = COALESCE(excluded.email, units.email),
                     phone = COALESCE(excluded.phone, units.phone),
                     updated_at = excluded.updated_at
                 RETURNING id",
            )?;
            let mut insert_balance = tx.prepare(
                "INSERT INTO unit_balances (id, report_id, unit_id, position, previous_balance,
                     current_fee, interest, other_charges, total_payable, months_overdue,
                     status_label, letter_type, legal_stage)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;

            for (position, debtor) in snapshot.debtors.iter().enumerate() {
                let unit_id: String = upsert_unit.query_row(
                    params![
                        Uuid::new_v4().to_string(),
                        snapshot.property_id,
                        debtor.unit,
                        debtor.owner_name,
                        debtor.email,
                        debtor.phone,
                        stamped
                    ],
                    |row| row.get(0),
                )?;
                insert_balance.execute(params![
                    Uuid::new_v4().to_string(),
                    report.id,
                    unit_id,
                    position as i64,
                    debtor.previous_balance,
                    debtor.current_fee,
                    debtor.interest,
                    debtor.other_charges,
                    debtor.total_payable,
                    debtor.months_overdue,
                    debtor.status_label,
                    debtor.letter_type,
                    debtor.legal_stage
                ])?;
            }
        }

        let balances = load_balances(&tx, &report.id)?;
        tx.commit()?;
        Ok((ReportView::new(report, balances), replaced))
    }

    fn report_exists(&self, property_id: &str, period: &Period) -> Result<bool, RepositoryError> {
        let connection = self.connection()?;
        let exists = connection.query_row(
            "SELECT EXISTS(SELECT 1 FROM monthly_reports WHERE property_id = ?1 AND period = ?2)",
            params![property_id, period],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn fetch_report(
        &self,
        property_id: &str,
        period: &Period,
    ) -> Result<Option<ReportView>, RepositoryError> {
        let connection = self.connection()?;
        let report = connection
            .query_row(
                &format!("{REPORT_SELECT} WHERE property_id = ?1 AND period = ?2"),
                params![property_id, period],
                map_report,
            )
            .optional()?;

        match report {
            Some(report) => {
                let balances = load_balances(&connection, &report.id)?;
                Ok(Some(ReportView::new(report, balances)))
            }
            None => Ok(None),
        }
    }

    fn list_reports(&self, property_id: &str) -> Result<Vec<ReportView>, RepositoryError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(&format!(
            "{REPORT_SELECT} WHERE property_id = ?1 ORDER BY period DESC"
        ))?;
        let reports = statement
            .query_map([property_id], map_report)?
            .collect::<Result<Vec<_>, _>>()?;

        reports
            .into_iter()
            .map(|report| {
                let balances = load_balances(&connection, &report.id)?;
                Ok(ReportView::new(report, balances))
            })
            .collect()
    }

    fn delete_report(&self, report_id: &str) -> Result<(), RepositoryError> {
        let connection = self.connection()?;
        let changed = connection.execute("DELETE FROM monthly_reports WHERE id = ?1", [report_id])?;
        if changed == 0 {
            return Err(RepositoryError::NotFound("report"));
        }
        Ok(())
    }

    fn update_balance(
        &self,
        balance_id: &str,
        update: &BalanceUpdate,
        classification: Classification,
    ) -> Result<BalanceLine, RepositoryError> {
        let mut connection = self.connection()?;
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report_id = balance_report(&tx, balance_id)?;

        tx.execute(
            "UPDATE unit_balances SET
                 previous_balance = ?2,
                 current_fee = ?3,
                 interest = ?4,
                 other_charges = ?5,
                 total_payable = ?6,
                 months_overdue = ?7,
                 status_label = COALESCE(?8, status_label),
                 letter_type = ?9,
                 legal_stage = ?10
             WHERE id = ?1",
            params![
                balance_id,
                update.previous_balance,
                update.current_fee,
                update.interest,
                update.other_charges,
                update.total_payable,
                update.months_overdue,
                update.status_label,
                classification.letter_type,
                classification.legal_stage
            ],
        )?;
        refresh_report_total(&tx, &report_id)?;

        let line = tx.query_row(
            &format!("{BALANCE_SELECT} WHERE b.id = ?1"),
            [balance_id],
            map_balance,
        )?;
        tx.commit()?;
        Ok(line)
    }

    fn delete_balance(&self, balance_id: &str) -> Result<(), RepositoryError> {
        let mut connection = self.connection()?;
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let report_id = balance_report(&tx, balance_id)?;
        tx.execute("DELETE FROM unit_balances WHERE id = ?1", [balance_id])?;
        refresh_report_total(&tx, &report_id)?;
        tx.commit()?;
        Ok(())
    }
}

impl LetterRepository for SqliteStore {
    fn last_issued(
        &self,
        property_id: &str,
        letter_type: LetterType,
    ) -> Result<u32, RepositoryError> {
        let connection = self.connection()?;
        let last = connection
            .query_row(
                "SELECT last_issued FROM letter_counters WHERE property_id = ?1 AND letter_type = ?2",
                params![property_id, letter_type],
                |row| row.get(0),
            )
            .optional()?;
        Ok(last.unwrap_or(0))
    }

    fn issue_letter(&self, draft: LetterDraft) -> Result<IssuedLetter, RepositoryError> {
        let LetterDraft {
            id,
            property_id,
            request,
            generated_at,
        } = draft;

        let mut connection = self.connection()?;
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_property(&tx, &property_id)?;

        let existing = tx
            .query_row(
                &format!(
                    "{LETTER_SELECT} WHERE property_id = ?1 AND unit = ?2 AND letter_type = ?3 AND period = ?4"
                ),
                params![property_id, request.unit, request.letter_type, request.period],
                map_letter,
            )
            .optional()?;
        if let Some(record) = existing {
            tx.commit()?;
            return Ok(IssuedLetter {
                record,
                created: false,
            });
        }

        let sequence: u32 = tx.query_row(
            "INSERT INTO letter_counters (property_id, letter_type, last_issued) VALUES (?1, ?2, 1)
             ON CONFLICT (property_id, letter_type) DO UPDATE SET last_issued = last_issued + 1
             RETURNING last_issued",
            params![property_id, request.letter_type],
            |row| row.get(0),
        )?;

        let record = LetterRecord {
            id,
            property_id,
            consecutive: format_consecutive(request.letter_type, sequence),
            letter_type: request.letter_type,
            unit: request.unit,
            owner_name: request.owner_name,
            amount: request.amount,
            period: request.period,
            email: request.email,
            generated_at,
            status: LetterStatus::Generated,
            channel: None,
            notes: String::new(),
            payment_commitment: None,
        };

        tx.execute(
            "INSERT INTO letter_records (id, property_id, consecutive, letter_type, unit, owner_name,
                 amount, period, email, generated_at, status, channel, notes, payment_commitment)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                record.id,
                record.property_id,
                record.consecutive,
                record.letter_type,
                record.unit,
                record.owner_name,
                record.amount,
                record.period,
                record.email,
                write_timestamp(record.generated_at),
                record.status,
                record.channel,
                record.notes,
                record.payment_commitment
            ],
        )?;
        tx.commit()?;

        Ok(IssuedLetter {
            record,
            created: true,
        })
    }

    fn fetch_letter(&self, id: &str) -> Result<Option<LetterRecord>, RepositoryError> {
        let connection = self.connection()?;
        let record = connection
            .query_row(&format!("{LETTER_SELECT} WHERE id = ?1"), [id], map_letter)
            .optional()?;
        Ok(record)
    }

    fn list_letters(
        &self,
        property_id: &str,
        filter: &LetterFilter,
    ) -> Result<Vec<LetterRecord>, RepositoryError> {
        let mut sql = format!("{LETTER_SELECT} WHERE property_id = ?1");
        let mut values = vec![property_id.to_string()];

        if let Some(unit) = &filter.unit {
            values.push(unit.clone());
            sql.push_str(&format!(" AND unit = ?{}", values.len()));
        }
        if let Some(letter_type) = filter.letter_type {
            values.push(letter_type.code().to_string());
            sql.push_str(&format!(" AND letter_type = ?{}", values.len()));
        }
        if let Some(period) = &filter.period {
            values.push(period.to_string());
            sql.push_str(&format!(" AND period = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY generated_at DESC, consecutive DESC");

        let connection = self.connection()?;
        let mut statement = connection.prepare(&sql)?;
        let records = statement
            .query_map(params_from_iter(values.iter()), map_letter)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn update_letter(&self, record: &LetterRecord) -> Result<(), RepositoryError> {
        let connection = self.connection()?;
        let changed = connection.execute(
            "UPDATE letter_records
             SET status = ?2, channel = ?3, notes = ?4, payment_commitment = ?5
             WHERE id = ?1",
            params![
                record.id,
                record.status,
                record.channel,
                record.notes,
                record.payment_commitment
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound("letter"));
        }
        Ok(())
    }

    fn delete_letter(&self, id: &str) -> Result<(), RepositoryError> {
        let connection = self.connection()?;
        let changed = connection.execute("DELETE FROM letter_records WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(RepositoryError::NotFound("letter"));
        }
        Ok(())
    }

    fn reset_letters(&self, property_id: &str) -> Result<usize, RepositoryError> {
        let mut connection = self.connection()?;
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute(
            "DELETE FROM letter_records WHERE property_id = ?1",
            [property_id],
        )?;
        tx.execute(
            "DELETE FROM letter_counters WHERE property_id = ?1",
            [property_id],
        )?;
        tx.commit()?;
        Ok(removed)
    }
}

fn ensure_property(connection: &Connection, property_id: &str) -> Result<(), RepositoryError> {
    let exists: bool = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM properties WHERE id = ?1)",
        [property_id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(RepositoryError::NotFound("property"))
    }
}

fn balance_report(connection: &Connection, balance_id: &str) -> Result<String, RepositoryError> {
    connection
        .query_row(
            "SELECT report_id FROM unit_balances WHERE id = ?1",
            [balance_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(RepositoryError::NotFound("balance"))
}

fn refresh_report_total(connection: &Connection, report_id: &str) -> Result<(), RepositoryError> {
    connection.execute(
        "UPDATE monthly_reports
         SET total_amount = (
             SELECT COALESCE(SUM(total_payable), 0) FROM unit_balances WHERE report_id = ?1
         )
         WHERE id = ?1",
        [report_id],
    )?;
    Ok(())
}

fn load_balances(
    connection: &Connection,
    report_id: &str,
) -> Result<Vec<BalanceLine>, RepositoryError> {
    let mut statement = connection.prepare(&format!(
        "{BALANCE_SELECT} WHERE b.report_id = ?1 ORDER BY b.position"
    ))?;
    let balances = statement
        .query_map([report_id], map_balance)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(balances)
}

fn map_property(row: &Row<'_>) -> rusqlite::Result<Property> {
    let settings: String = row.get(2)?;
    let settings = serde_json::from_str(&settings)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(err)))?;
    Ok(Property {
        id: row.get(0)?,
        name: row.get(1)?,
        settings,
        created_at: read_timestamp(row, 3)?,
    })
}

fn map_report(row: &Row<'_>) -> rusqlite::Result<MonthlyReport> {
    Ok(MonthlyReport {
        id: row.get(0)?,
        property_id: row.get(1)?,
        period: row.get(2)?,
        label: row.get(3)?,
        total_amount: row.get(4)?,
        created_at: read_timestamp(row, 5)?,
    })
}

fn map_balance(row: &Row<'_>) -> rusqlite::Result<BalanceLine> {
    Ok(BalanceLine {
        id: row.get(0)?,
        report_id: row.get(1)?,
        unit_id: row.get(2)?,
        unit: row.get(3)?,
        owner_name: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
        previous_balance: row.get(7)?,
        current_fee: row.get(8)?,
        interest: row.get(9)?,
        other_charges: row.get(10)?,
        total_payable: row.get(11)?,
        months_overdue: row.get(12)?,
        status_label: row.get(13)?,
        letter_type: row.get(14)?,
        legal_stage: row.get(15)?,
    })
}

fn map_letter(row: &Row<'_>) -> rusqlite::Result<LetterRecord> {
    Ok(LetterRecord {
        id: row.get(0)?,
        property_id: row.get(1)?,
        consecutive: row.get(2)?,
        letter_type: row.get(3)?,
        unit: row.get(4)?,
        owner_name: row.get(5)?,
        amount: row.get(6)?,
        period: row.get(7)?,
        email: row.get(8)?,
        generated_at: read_timestamp(row, 9)?,
        status: row.get(10)?,
        channel: row.get(11)?,
        notes: row.get(12)?,
        payment_commitment: row.get(13)?,
    })
}

fn write_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn read_timestamp(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognised stored value `{0}`")]
struct UnknownLabel(String);

fn label_error(raw: &str) -> FromSqlError {
    FromSqlError::Other(Box::new(UnknownLabel(raw.to_string())))
}

impl ToSql for Period {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Period {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Period::parse(value.as_str()?).map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for LetterType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for LetterType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        LetterType::parse(raw).ok_or_else(|| label_error(raw))
    }
}

impl ToSql for LegalStage {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for LegalStage {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        [
            LegalStage::Preventive,
            LegalStage::Persuasive,
            LegalStage::Judicial,
        ]
        .into_iter()
        .find(|stage| stage.label() == raw)
        .ok_or_else(|| label_error(raw))
    }
}

impl ToSql for LetterStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for LetterStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        LetterStatus::parse(raw).ok_or_else(|| label_error(raw))
    }
}

impl ToSql for LetterChannel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.label()))
    }
}

impl FromSql for LetterChannel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        LetterChannel::parse(raw).ok_or_else(|| label_error(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_recorded_and_not_reapplied() {
        let store = SqliteStore::in_memory().expect("store");
        assert_eq!(store.migrate().expect("second run"), 0);

        let connection = store.connection().expect("lock");
        let versions: Vec<String> = connection
            .prepare("SELECT version FROM schema_migrations")
            .expect("prepare")
            .query_map([], |row| row.get(0))
            .expect("query")
            .collect::<Result<_, _>>()
            .expect("rows");
        assert_eq!(versions, vec!["0001_init".to_string()]);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let store = SqliteStore::in_memory().expect("store");
        let connection = store.connection().expect("lock");
        let result = connection.execute(
            "INSERT INTO letter_counters (property_id, letter_type, last_issued) VALUES ('ghost', 'CS', 1)",
            [],
        );
        assert!(result.is_err(), "orphan counter must be rejected");
    }

    #[test]
    fn duplicate_keys_surface_as_conflicts() {
        let store = SqliteStore::in_memory().expect("store");
        let property = Property {
            id: "prop-1".to_string(),
            name: "Edificio Torres".to_string(),
            settings: serde_json::json!({}),
            created_at: Utc::now(),
        };
        store.insert_property(property.clone()).expect("first insert");

        match store.insert_property(property) {
            Err(RepositoryError::Conflict(message)) => assert!(message.contains("properties.id")),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn timestamps_round_trip_through_text() {
        let store = SqliteStore::in_memory().expect("store");
        let connection = store.connection().expect("lock");
        let instant = DateTime::parse_from_rfc3339("2026-01-15T09:30:00.123456Z")
            .expect("parse")
            .with_timezone(&Utc);
        let read = connection
            .query_row("SELECT ?1", [write_timestamp(instant)], |row| {
                read_timestamp(row, 0)
            })
            .expect("read");
        assert_eq!(read, instant);
    }
}
