use crate::infra::{open_service, parse_letter_type, parse_period, SqliteService};
use cartera::config::AppConfig;
use cartera::error::AppError;
use cartera::workflows::arrears::LetterType;
use cartera::workflows::collections::{
    CollectionsError, EffectivenessReport, ImportPreview, IngestOutcome, LetterFilter, NewProperty,
    Outcome, Period,
};
use chrono::Local;
use clap::{Args, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Subcommand, Debug)]
pub(crate) enum PropertyCommand {
    /// Register a property and print its id
    Create {
        /// Display name of the building or complex
        name: String,
        /// Optional JSON settings (letterhead, administrator, lawyer contacts)
        #[arg(long)]
        settings: Option<String>,
    },
    /// List registered properties
    List,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// CSV export with one row per unit
    pub(crate) csv: PathBuf,
    /// Property the snapshot belongs to
    #[arg(long)]
    pub(crate) property: String,
    /// Month of the snapshot (YYYY-MM)
    #[arg(long, value_parser = parse_period)]
    pub(crate) period: Period,
    /// Display label; defaults to the Spanish month name and year
    #[arg(long)]
    pub(crate) label: Option<String>,
    /// Show what would be stored without writing anything
    #[arg(long)]
    pub(crate) preview: bool,
}

#[derive(Subcommand, Debug)]
pub(crate) enum LettersCommand {
    /// Show the code the next letter of a category would receive
    Next {
        #[arg(long)]
        property: String,
        /// CS, CP or AB
        #[arg(long, value_parser = parse_letter_type)]
        letter_type: LetterType,
    },
    /// Generate letters for every debtor of a period (safe to re-run)
    Bulk {
        #[arg(long)]
        property: String,
        #[arg(long, value_parser = parse_period)]
        period: Period,
        /// Restrict to these categories; every category when omitted
        #[arg(long = "type", value_parser = parse_letter_type)]
        letter_types: Vec<LetterType>,
    },
    /// List generated letters, newest first
    List {
        #[arg(long)]
        property: String,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long, value_parser = parse_period)]
        period: Option<Period>,
    },
}

#[derive(Args, Debug)]
pub(crate) struct EffectivenessArgs {
    #[arg(long)]
    pub(crate) property: String,
    /// Also list the outcome of every scored letter
    #[arg(long)]
    pub(crate) letters: bool,
}

fn service(database: Option<PathBuf>) -> Result<Arc<SqliteService>, AppError> {
    let mut config = AppConfig::load()?;
    open_service(&mut config, database)
}

pub(crate) fn run_property(
    command: PropertyCommand,
    database: Option<PathBuf>,
) -> Result<(), AppError> {
    let service = service(database)?;
    match command {
        PropertyCommand::Create { name, settings } => {
            let settings = settings
                .map(|raw| {
                    serde_json::from_str(&raw).map_err(|err| {
                        CollectionsError::InvalidRequest(format!("settings must be JSON: {err}"))
                    })
                })
                .transpose()?;
            let property = service.create_property(NewProperty { name, settings })?;
            println!("Registered {} ({})", property.name, property.id);
        }
        PropertyCommand::List => {
            let properties = service.list_properties()?;
            if properties.is_empty() {
                println!("No properties registered");
            }
            for property in properties {
                println!(
                    "- {} ({}) since {}",
                    property.name,
                    property.id,
                    property.created_at.format("%Y-%m-%d")
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn run_import(args: ImportArgs, database: Option<PathBuf>) -> Result<(), AppError> {
    let ImportArgs {
        csv,
        property,
        period,
        label,
        preview,
    } = args;

    let service = service(database)?;
    let file = File::open(&csv)?;

    if preview {
        let preview = service.preview_csv(&property, &period, file)?;
        render_preview(&preview);
    } else {
        let outcome = service.ingest_csv(&property, &period, label.as_deref(), file)?;
        render_ingest(&outcome);
    }
    Ok(())
}

fn render_preview(preview: &ImportPreview) {
    println!("Preview for {}", preview.period);
    println!(
        "- {} rows read | {} accepted | {} dropped | {} unreadable amounts set to 0",
        preview.rows_present, preview.rows_accepted, preview.rows_dropped, preview.defaulted_cells
    );
    println!("- Total payable {:.2}", preview.total_amount);
    if preview.replaces_existing {
        println!("- A report already exists for this period and would be replaced");
    }
    for debtor in &preview.debtors {
        println!(
            "  - {} {}: {:.2} ({} months, {})",
            debtor.unit,
            debtor.owner_name,
            debtor.total_payable,
            debtor.months_overdue,
            debtor.letter_type
        );
    }
}

fn render_ingest(outcome: &IngestOutcome) {
    let report = &outcome.report;
    let verb = if outcome.replaced { "Replaced" } else { "Stored" };
    println!(
        "{verb} {} ({}) with {} debtors, total {:.2}",
        report.report.label, report.report.period, report.summary.debtor_count, report.report.total_amount
    );
    if outcome.rows_dropped > 0 {
        println!("- {} rows without unit or owner skipped", outcome.rows_dropped);
    }
    for category in &report.summary.categories {
        println!(
            "  - {}: {} debtors, {:.2}",
            category.letter_type.label(),
            category.count,
            category.amount
        );
    }
}

pub(crate) fn run_letters(command: LettersCommand, database: Option<PathBuf>) -> Result<(), AppError> {
    let service = service(database)?;
    match command {
        LettersCommand::Next {
            property,
            letter_type,
        } => {
            let consecutive = service.next_consecutive(&property, letter_type)?;
            println!("{consecutive}");
        }
        LettersCommand::Bulk {
            property,
            period,
            letter_types,
        } => {
            let outcome = service.generate_bulk(&property, &period, &letter_types)?;
            println!(
                "{} letters for {}: {} new, {} already generated",
                outcome.letters.len(),
                outcome.period,
                outcome.created,
                outcome.reused
            );
            for letter in &outcome.letters {
                println!("  - {} {} {:.2}", letter.consecutive, letter.unit, letter.amount);
            }
        }
        LettersCommand::List {
            property,
            unit,
            period,
        } => {
            let letters = service.list_letters(
                &property,
                &LetterFilter {
                    unit,
                    letter_type: None,
                    period,
                },
            )?;
            for letter in letters {
                println!(
                    "- {} {} {} {} [{}]",
                    letter.consecutive,
                    letter.period,
                    letter.unit,
                    letter
                        .generated_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M"),
                    letter.status.label()
                );
            }
        }
    }
    Ok(())
}

pub(crate) fn run_effectiveness(
    args: EffectivenessArgs,
    database: Option<PathBuf>,
) -> Result<(), AppError> {
    let service = service(database)?;
    match service.effectiveness(&args.property)? {
        Some(report) => render_effectiveness(&report, args.letters),
        None => println!("At least two monthly reports are needed to measure effectiveness"),
    }
    Ok(())
}

fn render_effectiveness(report: &EffectivenessReport, list_letters: bool) {
    let global = &report.global;
    println!(
        "{} letters | {:.0}% success | {} partial | {} failed | {} unmatched | {:.2} recovered",
        global.total_letters,
        global.success_rate,
        global.partial_count,
        global.failure_count,
        global.unmatched_count,
        global.recovered_amount
    );
    if report.assumes_dropout_paid {
        println!("(units missing from the following report are counted as paid)");
    }

    for period in &report.by_period {
        println!(
            "\n{} -> {}: {} letters, {:.0}% success, {:.2} recovered",
            period.action_period,
            period.target_period,
            period.metric.total_letters,
            period.metric.success_rate,
            period.metric.recovered_amount
        );
        if !list_letters {
            continue;
        }
        for letter in &period.letters {
            let outcome = match letter.outcome {
                Outcome::Success { partial: true } => "partial",
                Outcome::Success { partial: false } => "paid",
                Outcome::Failure => "no change",
                Outcome::Unmatched => "not in report",
            };
            println!(
                "  - {} {}: {} -> {} ({outcome})",
                letter.consecutive,
                letter.unit,
                letter
                    .initial_amount
                    .map(|amount| format!("{amount:.2}"))
                    .unwrap_or_else(|| "-".to_string()),
                letter
                    .final_amount
                    .map(|amount| format!("{amount:.2}"))
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }
}
