use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::workflows::arrears::{DebtorRecord, LegalStage, LetterType};

/// Calendar month in literal `YYYY-MM` form, the addressable key of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid period `{0}`, expected YYYY-MM")]
pub struct InvalidPeriod(pub String);

impl Period {
    pub fn parse(raw: &str) -> Result<Self, InvalidPeriod> {
        let trimmed = raw.trim();
        let well_formed = trimmed.len() == 7
            && trimmed.as_bytes()[4] == b'-'
            && NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d").is_ok();
        if well_formed {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidPeriod(raw.to_string()))
        }
    }

    /// UTC calendar month containing `instant`.
    pub fn containing(instant: DateTime<Utc>) -> Self {
        Self(format!("{:04}-{:02}", instant.year(), instant.month()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Period {
    type Error = InvalidPeriod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.0
    }
}

/// Managed building or complex; the tenancy root for every other record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    pub name: String,
    /// Letterhead, administrator and lawyer details; opaque to the ledger.
    pub settings: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub name: String,
    #[serde(default)]
    pub settings: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: Option<Value>,
}

/// Snapshot header. `total_amount` is the sum of its balances' `total_payable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub id: String,
    pub property_id: String,
    pub period: Period,
    pub label: String,
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
}

/// One debtor line of a report, read through the unit it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceLine {
    pub id: String,
    pub report_id: String,
    pub unit_id: String,
    pub unit: String,
    pub owner_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub previous_balance: f64,
    pub current_fee: f64,
    pub interest: f64,
    pub other_charges: f64,
    pub total_payable: f64,
    pub months_overdue: f64,
    pub status_label: String,
    pub letter_type: LetterType,
    pub legal_stage: LegalStage,
}

/// Replacement values for a single balance. The legal stage is derived again
/// from `months_overdue`; the category follows `letter_type` when given.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceUpdate {
    #[serde(default)]
    pub previous_balance: f64,
    #[serde(default)]
    pub current_fee: f64,
    #[serde(default)]
    pub interest: f64,
    #[serde(default)]
    pub other_charges: f64,
    pub total_payable: f64,
    #[serde(default)]
    pub months_overdue: f64,
    #[serde(default)]
    pub status_label: Option<String>,
    #[serde(default)]
    pub letter_type: Option<LetterType>,
}

/// Everything needed to write one snapshot.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub property_id: String,
    pub period: Period,
    pub label: String,
    pub debtors: Vec<DebtorRecord>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgingBucket {
    #[serde(rename = "0-30")]
    UpToThirty,
    #[serde(rename = "31-60")]
    ThirtyOneToSixty,
    #[serde(rename = "61-90")]
    SixtyOneToNinety,
    #[serde(rename = "90+")]
    OverNinety,
}

impl AgingBucket {
    pub fn from_months(months_overdue: f64) -> Self {
        if months_overdue <= 1.0 || months_overdue.is_nan() {
            Self::UpToThirty
        } else if months_overdue <= 2.0 {
            Self::ThirtyOneToSixty
        } else if months_overdue <= 3.0 {
            Self::SixtyOneToNinety
        } else {
            Self::OverNinety
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub letter_type: LetterType,
    pub count: usize,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgingTotal {
    pub bucket: AgingBucket,
    pub count: usize,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub debtor_count: usize,
    pub categories: Vec<CategoryTotal>,
    pub aging: Vec<AgingTotal>,
}

impl ReportSummary {
    pub fn from_balances(balances: &[BalanceLine]) -> Self {
        let mut categories: BTreeMap<LetterType, (usize, f64)> = LetterType::ordered()
            .into_iter()
            .map(|letter_type| (letter_type, (0, 0.0)))
            .collect();
        let mut aging: BTreeMap<AgingBucket, (usize, f64)> = BTreeMap::new();

        for balance in balances {
            let category = categories.entry(balance.letter_type).or_default();
            category.0 += 1;
            category.1 += balance.total_payable;

            let bucket = aging
                .entry(AgingBucket::from_months(balance.months_overdue))
                .or_default();
            bucket.0 += 1;
            bucket.1 += balance.total_payable;
        }

        Self {
            debtor_count: balances.len(),
            categories: categories
                .into_iter()
                .map(|(letter_type, (count, amount))| CategoryTotal {
                    letter_type,
                    count,
                    amount,
                })
                .collect(),
            aging: aging
                .into_iter()
                .map(|(bucket, (count, amount))| AgingTotal {
                    bucket,
                    count,
                    amount,
                })
                .collect(),
        }
    }
}

/// A report with its balances joined to unit identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: MonthlyReport,
    pub balances: Vec<BalanceLine>,
    pub summary: ReportSummary,
}

impl ReportView {
    pub fn new(report: MonthlyReport, balances: Vec<BalanceLine>) -> Self {
        let summary = ReportSummary::from_balances(&balances);
        Self {
            report,
            balances,
            summary,
        }
    }

    /// Outstanding amount of the first line for `unit`.
    pub fn amount_for(&self, unit: &str) -> Option<f64> {
        self.balances
            .iter()
            .find(|balance| balance.unit == unit)
            .map(|balance| balance.total_payable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterStatus {
    #[serde(rename = "generada")]
    Generated,
    #[serde(rename = "enviada")]
    Sent,
    #[serde(rename = "entregada")]
    Delivered,
}

impl LetterStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Generated => "generada",
            Self::Sent => "enviada",
            Self::Delivered => "entregada",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "generada" => Some(Self::Generated),
            "enviada" => Some(Self::Sent),
            "entregada" => Some(Self::Delivered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterChannel {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "impresa")]
    Printed,
    #[serde(rename = "whatsapp")]
    Whatsapp,
}

impl LetterChannel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Printed => "impresa",
            Self::Whatsapp => "whatsapp",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "email" => Some(Self::Email),
            "impresa" => Some(Self::Printed),
            "whatsapp" => Some(Self::Whatsapp),
            _ => None,
        }
    }
}

/// Formats the human-readable code of the `sequence`-th letter of a type.
pub fn format_consecutive(letter_type: LetterType, sequence: u32) -> String {
    format!("{}-{:04}", letter_type.code(), sequence)
}

/// Audit entry for one generated collection letter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterRecord {
    pub id: String,
    pub property_id: String,
    pub consecutive: String,
    pub letter_type: LetterType,
    pub unit: String,
    pub owner_name: String,
    pub amount: f64,
    pub period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub status: LetterStatus,
    pub channel: Option<LetterChannel>,
    pub notes: String,
    pub payment_commitment: Option<String>,
}

/// Caller-supplied fields for a generate-or-fetch request.
#[derive(Debug, Clone, Deserialize)]
pub struct LetterRequest {
    pub unit: String,
    pub letter_type: LetterType,
    pub period: Period,
    pub owner_name: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub email: Option<String>,
}

/// A request stamped with identity and time, ready for the ledger.
#[derive(Debug, Clone)]
pub struct LetterDraft {
    pub id: String,
    pub property_id: String,
    pub request: LetterRequest,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssuedLetter {
    #[serde(flatten)]
    pub record: LetterRecord,
    /// False when an existing record for the same key was returned.
    pub created: bool,
}

#[derive(Debug, Clone, Default)]
pub struct LetterFilter {
    pub unit: Option<String>,
    pub letter_type: Option<LetterType>,
    pub period: Option<Period>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkGeneration {
    pub period: Period,
    pub created: usize,
    pub reused: usize,
    pub letters: Vec<LetterRecord>,
}
