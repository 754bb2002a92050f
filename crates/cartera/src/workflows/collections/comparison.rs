use std::collections::BTreeSet;

use serde::Serialize;

use super::domain::{Period, ReportView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Increased,
    Decreased,
    Same,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitComparison {
    pub unit: String,
    pub owner_name: String,
    pub base_amount: f64,
    pub compare_amount: f64,
    pub diff: f64,
    pub percent_change: f64,
    pub status: ChangeStatus,
    /// Absent from the base report.
    pub is_new: bool,
    /// Present in the base report, absent from the compared one.
    pub is_resolved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonSummary {
    pub total_change: f64,
    pub debtor_change: i64,
    pub increased: usize,
    pub decreased: usize,
    pub same: usize,
    pub new_debtors: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub base_period: Period,
    pub compare_period: Period,
    pub base_label: String,
    pub compare_label: String,
    pub units: Vec<UnitComparison>,
    pub summary: ComparisonSummary,
}

/// Unit-by-unit change between two snapshots, largest increase first.
pub fn compare_reports(base: &ReportView, compare: &ReportView) -> PeriodComparison {
    let units: BTreeSet<&str> = base
        .balances
        .iter()
        .chain(compare.balances.iter())
        .map(|balance| balance.unit.as_str())
        .collect();

    let mut rows: Vec<UnitComparison> = units
        .into_iter()
        .map(|unit| compare_unit(unit, base, compare))
        .collect();
    rows.sort_by(|a, b| b.diff.total_cmp(&a.diff).then_with(|| a.unit.cmp(&b.unit)));

    let mut summary = ComparisonSummary {
        total_change: compare.report.total_amount - base.report.total_amount,
        debtor_change: compare.balances.len() as i64 - base.balances.len() as i64,
        ..ComparisonSummary::default()
    };
    for row in &rows {
        match row.status {
            ChangeStatus::Increased => summary.increased += 1,
            ChangeStatus::Decreased => summary.decreased += 1,
            ChangeStatus::Same => summary.same += 1,
        }
        summary.new_debtors += usize::from(row.is_new);
        summary.resolved += usize::from(row.is_resolved);
    }

    PeriodComparison {
        base_period: base.report.period.clone(),
        compare_period: compare.report.period.clone(),
        base_label: base.report.label.clone(),
        compare_label: compare.report.label.clone(),
        units: rows,
        summary,
    }
}

fn compare_unit(unit: &str, base: &ReportView, compare: &ReportView) -> UnitComparison {
    let before = base.balances.iter().find(|balance| balance.unit == unit);
    let after = compare.balances.iter().find(|balance| balance.unit == unit);

    let base_amount = before.map(|balance| balance.total_payable).unwrap_or(0.0);
    let compare_amount = after.map(|balance| balance.total_payable).unwrap_or(0.0);
    let diff = compare_amount - base_amount;

    let percent_change = if base_amount > 0.0 {
        diff / base_amount * 100.0
    } else if compare_amount > 0.0 {
        100.0
    } else {
        0.0
    };

    let status = if diff > 0.0 {
        ChangeStatus::Increased
    } else if diff < 0.0 {
        ChangeStatus::Decreased
    } else {
        ChangeStatus::Same
    };

    let owner_name = after
        .or(before)
        .map(|balance| balance.owner_name.clone())
        .unwrap_or_default();

    UnitComparison {
        unit: unit.to_string(),
        owner_name,
        base_amount,
        compare_amount,
        diff,
        percent_change,
        status,
        is_new: before.is_none(),
        is_resolved: before.is_some() && after.is_none(),
    }
}
