//! Period-over-period recovery attributed to the letters sent in the earlier period.

use serde::Serialize;

use crate::workflows::arrears::LetterType;

use super::domain::{LetterRecord, Period, ReportView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Balance went down; `partial` when some debt remains.
    Success { partial: bool },
    /// Balance stayed the same or grew.
    Failure,
    /// The unit had no line in the action period's report.
    Unmatched,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LetterOutcome {
    pub letter_id: String,
    pub consecutive: String,
    pub letter_type: LetterType,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_amount: Option<f64>,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EffectivenessMetric {
    pub total_letters: usize,
    pub success_count: usize,
    pub partial_count: usize,
    pub failure_count: usize,
    pub unmatched_count: usize,
    pub recovered_amount: f64,
    pub success_rate: f64,
}

impl EffectivenessMetric {
    fn record(&mut self, outcome: &LetterOutcome) {
        self.total_letters += 1;
        match outcome.outcome {
            Outcome::Success { partial } => {
                self.success_count += 1;
                if partial {
                    self.partial_count += 1;
                }
                if let (Some(initial), Some(last)) = (outcome.initial_amount, outcome.final_amount)
                {
                    self.recovered_amount += initial - last;
                }
            }
            Outcome::Failure => self.failure_count += 1,
            Outcome::Unmatched => self.unmatched_count += 1,
        }
    }

    fn absorb(&mut self, other: &EffectivenessMetric) {
        self.total_letters += other.total_letters;
        self.success_count += other.success_count;
        self.partial_count += other.partial_count;
        self.failure_count += other.failure_count;
        self.unmatched_count += other.unmatched_count;
        self.recovered_amount += other.recovered_amount;
    }

    fn finish(&mut self) {
        self.success_rate = if self.total_letters > 0 {
            self.success_count as f64 / self.total_letters as f64 * 100.0
        } else {
            0.0
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodEffectiveness {
    /// Month the letters were generated in.
    pub action_period: Period,
    /// Following month whose snapshot shows the outcome.
    pub target_period: Period,
    #[serde(flatten)]
    pub metric: EffectivenessMetric,
    pub letters: Vec<LetterOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectivenessReport {
    pub global: EffectivenessMetric,
    /// Newest action period first.
    pub by_period: Vec<PeriodEffectiveness>,
    /// Every period with a report, newest first.
    pub periods_considered: Vec<Period>,
    /// A unit missing from the target report is counted as fully paid.
    pub assumes_dropout_paid: bool,
}

/// Pairs each report with the one before it and scores the letters generated
/// in the earlier month. `None` when fewer than two periods have reports.
pub fn analyze(reports: &[ReportView], letters: &[LetterRecord]) -> Option<EffectivenessReport> {
    let mut ordered: Vec<&ReportView> = reports.iter().collect();
    ordered.sort_by(|a, b| b.report.period.cmp(&a.report.period));
    ordered.dedup_by(|a, b| a.report.period == b.report.period);

    if ordered.len() < 2 {
        return None;
    }

    let mut global = EffectivenessMetric::default();
    let mut by_period = Vec::with_capacity(ordered.len() - 1);

    for pair in ordered.windows(2) {
        let (target, action) = (pair[0], pair[1]);
        let period = score_period(action, target, letters);
        global.absorb(&period.metric);
        by_period.push(period);
    }
    global.finish();

    Some(EffectivenessReport {
        global,
        by_period,
        periods_considered: ordered
            .iter()
            .map(|view| view.report.period.clone())
            .collect(),
        assumes_dropout_paid: true,
    })
}

fn score_period(
    action: &ReportView,
    target: &ReportView,
    letters: &[LetterRecord],
) -> PeriodEffectiveness {
    let action_period = &action.report.period;
    let mut metric = EffectivenessMetric::default();
    let mut outcomes = Vec::new();

    for letter in letters
        .iter()
        .filter(|letter| &Period::containing(letter.generated_at) == action_period)
    {
        let outcome = score_letter(letter, action, target);
        metric.record(&outcome);
        outcomes.push(outcome);
    }
    metric.finish();

    PeriodEffectiveness {
        action_period: action_period.clone(),
        target_period: target.report.period.clone(),
        metric,
        letters: outcomes,
    }
}

fn score_letter(letter: &LetterRecord, action: &ReportView, target: &ReportView) -> LetterOutcome {
    let initial_amount = action.amount_for(&letter.unit);
    let (final_amount, outcome) = match initial_amount {
        Some(initial) => {
            let last = target.amount_for(&letter.unit).unwrap_or(0.0);
            let outcome = if last < initial {
                Outcome::Success {
                    partial: last > 0.0,
                }
            } else {
                Outcome::Failure
            };
            (Some(last), outcome)
        }
        None => (None, Outcome::Unmatched),
    };

    LetterOutcome {
        letter_id: letter.id.clone(),
        consecutive: letter.consecutive.clone(),
        letter_type: letter.letter_type,
        unit: letter.unit.clone(),
        initial_amount,
        final_amount,
        outcome,
    }
}
