//! Dividend distributions to shareholders, including withheld tax.

use super::{Generated, LedgerContext, RecordSink};
use crate::error::{LedgerError, Result};
use crate::facts::Transaction;
use crate::record::{EntityId, LedgerRecord, Leg};

pub(super) fn generate(ctx: &LedgerContext<'_>) -> Generated {
    let charge = ctx.charge;
    let mut sink = RecordSink::default();
    let mut payments = 0;
    for transaction in charge.non_fee_transactions() {
        if !transaction.is_outgoing() {
            sink.error(LedgerError::ambiguous(format!(
                "dividend charge {} has an incoming transaction {}",
                charge.id, transaction.id
            )));
            continue;
        }
        payments += 1;
        let payee = match ctx.counterparty(transaction) {
            Ok(payee) => payee,
            Err(error) => {
                sink.error(error);
                continue;
            }
        };
        sink.push(declaration(ctx, transaction, payee));
        sink.push(ctx.settlement(transaction, payee));
    }
    if payments == 0 && !sink.has_errors() {
        sink.error(LedgerError::missing(format!(
            "dividend charge {} has no payments",
            charge.id
        )));
    }
    ctx.fee_records(&mut sink);
    sink.finish()
}

/// The share of the declared dividend owed to `payee`.
fn declaration(
    ctx: &LedgerContext<'_>,
    payment: &Transaction,
    payee: EntityId,
) -> Result<LedgerRecord> {
    let date = ctx
        .charge
        .dividend
        .as_ref()
        .and_then(|dividend| dividend.declared_on)
        .unwrap_or(payment.event_date);
    let local = payment.local_amount(ctx.local_currency())?;
    let foreign = ctx.foreign(payment.amount.abs(), &payment.currency);
    Ok(ctx
        .record(date, date, &payment.currency)
        .debit(Leg::new(ctx.accounts().dividend_equity, local).with_foreign(foreign))
        .credit(Leg::new(payee, local).with_foreign(foreign))
        .description(Some("dividend declaration")))
}
