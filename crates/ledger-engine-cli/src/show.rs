use crate::batch::ChargeReport;
use crate::facts::FactSnapshot;
use anstyle::{AnsiColor, Color, Style};
use ledger_engine::facts::EntityDirectory;
use ledger_engine::{
    BalanceCalculator, BalanceResult, ChargeValidation, EngineConfig, GeneratedLedger,
    LedgerRecord, LedgerStatus,
};
use std::fmt::Write as _;

pub struct Palette {
    pub insert: Style,
    pub remove: Style,
    pub update: Style,
    pub error: Style,
    pub bold: Style,
}

impl Palette {
    pub fn colored() -> Self {
        Palette {
            insert: Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))),
            remove: Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))),
            update: Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
            error: Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red))).bold(),
            bold: Style::new().bold(),
        }
    }

    pub fn plain() -> Self {
        Palette {
            insert: Style::new(),
            remove: Style::new(),
            update: Style::new(),
            error: Style::new(),
            bold: Style::new(),
        }
    }
}

fn header(out: &mut String, style: Style, text: impl std::fmt::Display) {
    let _ = writeln!(out, "{style}━━━ {text} ━━━{style:#}");
}

fn record_lines(
    out: &mut String,
    record: &LedgerRecord,
    directory: &EntityDirectory,
    marker: char,
    style: Style,
) {
    for line in record.display(directory).to_string().lines() {
        let _ = writeln!(out, "{style}{marker} {line}{style:#}");
    }
}

fn unbalanced_lines(out: &mut String, balance: &BalanceResult, directory: &EntityDirectory) {
    for (entity, total) in &balance.unbalanced_entities {
        let _ = writeln!(out, "  {}\t{total:.2}", directory.name_of(*entity));
    }
}

fn count_line(out: &mut String, style: Style, count: usize, what: &str) {
    if count > 0 {
        let _ = writeln!(out, "  {style}{count}{style:#} {what}");
    }
}

pub fn render_diff(
    reports: &[ChargeReport<ChargeValidation>],
    directory: &EntityDirectory,
    palette: &Palette,
) -> String {
    let mut out = String::new();
    let (mut valid, mut diff, mut invalid, mut unsupported) = (0, 0, 0, 0);

    for report in reports {
        let validation = match &report.outcome {
            Ok(validation) => validation,
            Err(error) => {
                header(&mut out, palette.error, format_args!("{} unsupported", report.charge_id));
                let _ = writeln!(out, "  {error}\n");
                unsupported += 1;
                continue;
            }
        };

        match validation.status {
            LedgerStatus::Valid => valid += 1,
            LedgerStatus::Diff => {
                header(
                    &mut out,
                    palette.update,
                    format_args!("{} ({}) differs", report.charge_id, report.kind),
                );
                if let Some(plan) = &validation.plan {
                    for record in &plan.to_insert {
                        record_lines(&mut out, record, directory, '+', palette.insert);
                    }
                    for record in &plan.to_update {
                        record_lines(&mut out, record, directory, '~', palette.update);
                    }
                    for record in &plan.to_remove {
                        record_lines(&mut out, record, directory, '-', palette.remove);
                    }
                }
                diff += 1;
            }
            LedgerStatus::Invalid => {
                header(
                    &mut out,
                    palette.error,
                    format_args!("{} ({}) is invalid", report.charge_id, report.kind),
                );
                for error in &validation.errors {
                    let _ = writeln!(out, "  {error}");
                }
                invalid += 1;
            }
        }

        if let Some(balance) = validation.stored_balance.as_ref().filter(|b| !b.is_balanced) {
            let _ = writeln!(out, "  stored records are unbalanced:");
            unbalanced_lines(&mut out, balance, directory);
        }
        if validation.status != LedgerStatus::Valid {
            out.push('\n');
        }
    }

    if diff + invalid + unsupported == 0 {
        let _ = writeln!(out, "✓ All {valid} ledgers match!");
    } else {
        header(&mut out, palette.bold, "Summary");
        count_line(&mut out, palette.bold, valid, "charge(s) match");
        count_line(&mut out, palette.update, diff, "charge(s) differ");
        count_line(&mut out, palette.error, invalid, "charge(s) are invalid");
        count_line(&mut out, palette.error, unsupported, "charge(s) have an unsupported type");
    }
    out
}

pub fn render_generated(
    reports: &[ChargeReport<GeneratedLedger>],
    directory: &EntityDirectory,
    palette: &Palette,
) -> String {
    let mut out = String::new();
    let mut records = 0;
    let mut failed = 0;

    for report in reports {
        let ledger = match &report.outcome {
            Ok(ledger) => ledger,
            Err(error) => {
                header(&mut out, palette.error, format_args!("{} unsupported", report.charge_id));
                let _ = writeln!(out, "  {error}\n");
                failed += 1;
                continue;
            }
        };

        header(
            &mut out,
            palette.bold,
            format_args!("{} ({})", report.charge_id, ledger.charge_type),
        );
        for record in &ledger.records {
            let _ = writeln!(out, "{}", record.display(directory));
        }
        for error in &ledger.errors {
            let _ = writeln!(out, "{}! {error}{:#}", palette.error, palette.error);
        }
        out.push('\n');
        records += ledger.records.len();
        if !ledger.is_valid() {
            failed += 1;
        }
    }

    let _ = writeln!(
        out,
        "{} charge(s), {records} record(s), {failed} with errors",
        reports.len()
    );
    out
}

pub fn render_balance(snapshot: &FactSnapshot, config: &EngineConfig, palette: &Palette) -> String {
    let mut out = String::new();
    let stored = snapshot.stored_by_charge();
    let allowed = ledger_engine::generate::allowed_unbalanced(&snapshot.entities, config);
    let calculator = BalanceCalculator::new(config.balance_epsilon);

    let mut unbalanced = 0;
    for charge in &snapshot.charges {
        let records = stored.get(&charge.id).map(Vec::as_slice).unwrap_or_default();
        let balance = calculator.compute(records, &allowed);
        if balance.is_balanced {
            continue;
        }
        header(
            &mut out,
            palette.error,
            format_args!("{} ({}) is unbalanced", charge.id, charge.kind),
        );
        unbalanced_lines(&mut out, &balance, &snapshot.entities);
        out.push('\n');
        unbalanced += 1;
    }

    if unbalanced == 0 {
        let _ = writeln!(out, "✓ All {} stored ledgers balance!", snapshot.charges.len());
    } else {
        let _ = writeln!(
            out,
            "{}{unbalanced}{:#} of {} stored ledgers are unbalanced",
            palette.error,
            palette.error,
            snapshot.charges.len()
        );
    }
    out
}
