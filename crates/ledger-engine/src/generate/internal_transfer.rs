//! Money moved between two of the owner's accounts in one currency.

use super::{Generated, LedgerContext, RecordSink};
use crate::aggregate::{AggregatedTransaction, aggregate_transactions};
use crate::error::{LedgerError, Result};
use crate::facts::{Transaction, round_local};
use crate::record::{LedgerRecord, Leg};

pub(super) fn generate(ctx: &LedgerContext<'_>) -> Generated {
    let charge = ctx.charge;
    let (outgoing, incoming): (Vec<&Transaction>, Vec<&Transaction>) = charge
        .non_fee_transactions()
        .partition(|transaction| transaction.is_outgoing());

    let mut errors = Vec::new();
    for (side, transactions) in [("outgoing", &outgoing), ("incoming", &incoming)] {
        if transactions.is_empty() {
            errors.push(LedgerError::missing(format!(
                "internal transfer {} has no {side} side",
                charge.id
            )));
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let mut sink = RecordSink::default();
    match (
        aggregate_transactions(outgoing),
        aggregate_transactions(incoming),
    ) {
        (Ok(source), Ok(target)) => match transfer_records(ctx, &source, &target) {
            Ok(records) => sink.extend(records),
            Err(error) => sink.error(error),
        },
        (source, target) => {
            for error in [source.err(), target.err()].into_iter().flatten() {
                sink.error(error);
            }
        }
    }
    ctx.fee_records(&mut sink);
    sink.finish()
}

/// Debit the receiving account, credit the sending one with what arrived.
/// Whatever got lost in transit is a bank fee at the sending rate, in its own
/// record; the local drift left over goes to the exchange-rate account.
fn transfer_records(
    ctx: &LedgerContext<'_>,
    source: &AggregatedTransaction<'_>,
    target: &AggregatedTransaction<'_>,
) -> Result<Vec<LedgerRecord>> {
    if source.currency != target.currency {
        return Err(LedgerError::ambiguous(format!(
            "internal transfer {} mixes {} and {}",
            ctx.charge.id, source.currency, target.currency
        )));
    }
    let currency = &source.currency;
    let sent = source.amount.abs();
    let received = target.amount.abs();
    if received > sent {
        return Err(LedgerError::ambiguous(format!(
            "internal transfer {} received {received} {currency} but only {sent} were sent",
            ctx.charge.id
        )));
    }

    let local = ctx.local_currency();
    let sent_local = source.local_amount(local)?;
    let received_local = target.local_amount(local)?;
    let lost = sent - received;
    let lost_local = if lost.is_zero() {
        lost
    } else {
        round_local(sent_local * lost / sent)
    };
    let description = ctx
        .charge
        .description
        .clone()
        .or_else(|| Some(source.description.clone()).filter(|text| !text.is_empty()));
    let (invoice_date, value_date) = (source.event_date, target.value_date()?);
    let source_account = source.account_entity()?;

    let mut transfer = ctx
        .record(invoice_date, value_date, currency)
        .debit(
            Leg::new(target.account_entity()?, received_local)
                .with_foreign(ctx.foreign(received, currency)),
        )
        .credit(
            Leg::new(source_account, sent_local - lost_local)
                .with_foreign(ctx.foreign(received, currency)),
        )
        .description(description.clone());

    let accounts = ctx.accounts();
    let drift = sent_local - lost_local - received_local;
    if drift.abs() > ctx.epsilon() {
        let leg = Leg::new(accounts.exchange_rate, drift.abs());
        transfer = if drift.is_sign_positive() {
            transfer.debit2(leg)
        } else {
            transfer.credit2(leg)
        };
    }

    let mut records = vec![transfer];
    if !lost.is_zero() {
        let foreign_lost = ctx.foreign(lost, currency);
        let fee = ctx
            .record(invoice_date, value_date, currency)
            .debit(Leg::new(accounts.bank_fees, lost_local).with_foreign(foreign_lost))
            .credit(Leg::new(source_account, lost_local).with_foreign(foreign_lost))
            .description(description);
        records.push(fee);
    }
    Ok(records)
}
