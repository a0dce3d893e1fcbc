//! Monthly credit-card debits: the bank pays off the card's charges per currency.

use super::{Generated, LedgerContext, RecordSink};
use crate::Decimal;
use crate::aggregate::{AggregatedTransaction, aggregate_transactions};
use crate::error::{LedgerError, Result};
use crate::facts::Transaction;
use crate::record::{Currency, LedgerRecord, Leg};
use std::collections::BTreeMap;

pub(super) fn generate(ctx: &LedgerContext<'_>) -> Generated {
    let charge = ctx.charge;
    let (bank_side, card_side): (Vec<&Transaction>, Vec<&Transaction>) = charge
        .non_fee_transactions()
        .partition(|transaction| transaction.is_outgoing());
    if bank_side.is_empty() {
        return Err(vec![LedgerError::missing(format!(
            "credit card charge {} has no bank debit",
            charge.id
        ))]);
    }
    if card_side.is_empty() {
        return Err(vec![LedgerError::missing(format!(
            "credit card charge {} has no card side",
            charge.id
        ))]);
    }

    let bank = match aggregate_transactions(bank_side) {
        Ok(bank) => bank,
        Err(error) => return Err(vec![error]),
    };

    let mut by_currency: BTreeMap<&Currency, Vec<&Transaction>> = BTreeMap::new();
    for transaction in card_side {
        by_currency
            .entry(&transaction.currency)
            .or_default()
            .push(transaction);
    }

    let mut sink = RecordSink::default();
    let mut paid_local = Decimal::ZERO;
    for transactions in by_currency.into_values() {
        let record = aggregate_transactions(transactions)
            .and_then(|card| card_payment(ctx, &bank, &card));
        if let Ok(record) = &record {
            paid_local += record.debit_local_total();
        }
        sink.push(record);
    }
    if !sink.has_errors() {
        match difference(ctx, &bank, paid_local) {
            Ok(Some(record)) => sink.push(Ok(record)),
            Ok(None) => {}
            Err(error) => sink.error(error),
        }
    }
    ctx.fee_records(&mut sink);
    sink.finish()
}

/// The bank account pays one currency's worth of card charges.
fn card_payment(
    ctx: &LedgerContext<'_>,
    bank: &AggregatedTransaction<'_>,
    card: &AggregatedTransaction<'_>,
) -> Result<LedgerRecord> {
    let local = card.local_amount(ctx.local_currency())?;
    let foreign = ctx.foreign(card.amount.abs(), &card.currency);
    Ok(ctx
        .record(bank.event_date, bank.value_date()?, &card.currency)
        .debit(Leg::new(card.account_entity()?, local).with_foreign(foreign))
        .credit(Leg::new(bank.account_entity()?, local).with_foreign(foreign))
        .description(Some(card.description.clone()).filter(|text| !text.is_empty())))
}

/// Any gap between what left the bank and what reached the card, in local currency.
fn difference(
    ctx: &LedgerContext<'_>,
    bank: &AggregatedTransaction<'_>,
    paid_local: Decimal,
) -> Result<Option<LedgerRecord>> {
    let debited = bank.local_amount(ctx.local_currency())?;
    let gap = debited - paid_local;
    if gap.abs() <= ctx.epsilon() {
        return Ok(None);
    }
    let account = Leg::new(bank.account_entity()?, gap.abs());
    let exchange_rate = Leg::new(ctx.accounts().exchange_rate, gap.abs());
    let record = ctx
        .record(bank.event_date, bank.value_date()?, ctx.local_currency())
        .description(Some("exchange rate difference"));
    Ok(Some(if gap.is_sign_positive() {
        record.debit(exchange_rate).credit(account)
    } else {
        record.debit(account).credit(exchange_rate)
    }))
}
