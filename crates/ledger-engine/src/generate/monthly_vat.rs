//! The monthly VAT report: input and output VAT of the period settled with the authority.

use super::{Generated, LedgerContext, RecordSink, month_end};
use crate::Decimal;
use crate::error::{LedgerError, Result};
use crate::facts::{Direction, DocumentKind, VatPeriodFact};
use crate::record::{EntityId, LedgerRecord, Leg};
use chrono::NaiveDate;

#[derive(Debug, Default, PartialEq, Eq)]
struct VatTotals {
    input: Decimal,
    output: Decimal,
}

fn period_totals(ctx: &LedgerContext<'_>, period: &VatPeriodFact) -> Result<VatTotals> {
    let mut totals = VatTotals::default();
    for document in &period.documents {
        if !document.kind.is_accounting_document() {
            continue;
        }
        let Some(vat) = document.vat.filter(|vat| !vat.is_zero()) else {
            continue;
        };
        let currency = document.required_currency()?;
        let mut local =
            ctx.to_local(vat.abs(), currency, document.exchange_rate, document.label())?;
        // credit invoices reduce the side of their issuer
        if document.kind == DocumentKind::CreditInvoice {
            local = -local;
        }
        match document.issuer_direction(ctx.charge.owner_id)? {
            Direction::Income { .. } => totals.output += local,
            Direction::Expense { .. } => totals.input += local,
        }
    }
    Ok(totals)
}

/// Moves `amount` from `from` to `to`; a negative total flips the sides.
fn closing_record(
    ctx: &LedgerContext<'_>,
    date: NaiveDate,
    from: EntityId,
    to: EntityId,
    amount: Decimal,
    description: String,
) -> LedgerRecord {
    let (debit, credit) = if amount.is_sign_negative() {
        (to, from)
    } else {
        (from, to)
    };
    ctx.local_record(date)
        .debit(Leg::new(debit, amount.abs()))
        .credit(Leg::new(credit, amount.abs()))
        .description(Some(description))
}

pub(super) fn generate(ctx: &LedgerContext<'_>) -> Generated {
    let charge = ctx.charge;
    let Some(period) = &charge.vat_period else {
        return Err(vec![LedgerError::missing(format!(
            "monthly VAT charge {} has no reporting period",
            charge.id
        ))]);
    };

    let mut sink = RecordSink::default();
    match period_totals(ctx, period) {
        Ok(totals) => {
            let accounts = ctx.accounts();
            let date = month_end(period.month);
            let description = format!("VAT {}", period.month.format("%Y-%m"));
            if !totals.output.is_zero() {
                sink.extend([closing_record(
                    ctx,
                    date,
                    accounts.vat_output,
                    accounts.vat_authority,
                    totals.output,
                    format!("{description} output"),
                )]);
            }
            if !totals.input.is_zero() {
                sink.extend([closing_record(
                    ctx,
                    date,
                    accounts.vat_authority,
                    accounts.vat_input,
                    totals.input,
                    format!("{description} input"),
                )]);
            }
        }
        Err(error) => sink.error(error),
    }

    for payment in charge.non_fee_transactions() {
        sink.push(ctx.settlement(payment, ctx.accounts().vat_authority));
    }
    ctx.fee_records(&mut sink);
    sink.finish()
}
