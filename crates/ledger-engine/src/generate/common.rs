//! Ordinary income and expense charges.

use super::{Generated, LedgerContext, RecordSink};
use crate::Decimal;
use crate::error::{LedgerError, Result};
use crate::facts::{Direction, Document, Transaction};
use crate::record::{Currency, EntityId, LedgerRecord, Leg, Side};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub(super) fn generate(ctx: &LedgerContext<'_>) -> Generated {
    let charge = ctx.charge;
    if charge.transactions.is_empty() && charge.documents.is_empty() {
        return Err(vec![LedgerError::missing(format!(
            "charge {} has no transactions or documents",
            charge.id
        ))]);
    }

    let documents: Vec<&Document> = charge
        .documents
        .iter()
        .filter(|document| document.kind.is_accounting_document())
        .collect();

    let mut sink = RecordSink::default();
    for document in &documents {
        sink.push(accrual(ctx, document));
    }
    for transaction in charge.non_fee_transactions() {
        let counter = if documents.is_empty() {
            ctx.tax_category(transaction.business_id)
        } else {
            counterparty(ctx, transaction, &documents)
        };
        sink.push(counter.and_then(|counter| ctx.settlement(transaction, counter)));
    }
    ctx.fee_records(&mut sink);

    if !sink.has_errors() {
        let differences = exchange_differences(ctx, sink.records());
        sink.extend(differences);
    }
    sink.finish()
}

/// The accrual of one invoice, VAT split onto a second leg.
pub(super) fn accrual(ctx: &LedgerContext<'_>, document: &Document) -> Result<LedgerRecord> {
    let direction = document.direction(ctx.charge.owner_id)?;
    let date = document.required_date()?;
    let currency = document.required_currency()?;
    let gross = document.required_amount()?.abs();
    let vat = document.vat.unwrap_or_default().abs();

    let label = document.label();
    let gross_local = ctx.to_local(gross, currency, document.exchange_rate, &label)?;
    let vat_local = ctx.to_local(vat, currency, document.exchange_rate, &label)?;

    let counterparty = direction.counterparty();
    let tax_category = ctx.tax_category(Some(counterparty))?;
    let party = Leg::new(counterparty, gross_local).with_foreign(ctx.foreign(gross, currency));
    let category = Leg::new(tax_category, gross_local - vat_local)
        .with_foreign(ctx.foreign(gross - vat, currency));

    let record = ctx
        .record(date, date, currency)
        .description(ctx.charge.description.clone())
        .reference(document.serial.clone());
    let mut record = match direction {
        Direction::Expense { .. } => record.debit(category).credit(party),
        Direction::Income { .. } => record.debit(party).credit(category),
    };
    if !vat.is_zero() {
        let accounts = ctx.accounts();
        match direction {
            Direction::Expense { .. } => {
                let leg = Leg::new(accounts.vat_input, vat_local);
                record = record.debit2(leg.with_foreign(ctx.foreign(vat, currency)));
            }
            Direction::Income { .. } => {
                let leg = Leg::new(accounts.vat_output, vat_local);
                record = record.credit2(leg.with_foreign(ctx.foreign(vat, currency)));
            }
        }
    }
    Ok(record)
}

/// The transaction's business, or the single counterparty of the documents.
fn counterparty(
    ctx: &LedgerContext<'_>,
    transaction: &Transaction,
    documents: &[&Document],
) -> Result<EntityId> {
    if let Some(business) = transaction.business_id {
        return Ok(business);
    }
    let mut parties: Vec<EntityId> = documents
        .iter()
        .filter_map(|document| document.direction(ctx.charge.owner_id).ok())
        .map(Direction::counterparty)
        .collect();
    parties.sort();
    parties.dedup();
    match parties.as_slice() {
        [single] => Ok(*single),
        _ => ctx.counterparty(transaction),
    }
}

#[derive(Default)]
struct Exposure {
    currency: Option<Currency>,
    mixed: bool,
    foreign: Decimal,
    local: Decimal,
    last_date: Option<NaiveDate>,
}

/// Close counterparties that net to zero in foreign currency but not in local currency.
pub(super) fn exchange_differences(
    ctx: &LedgerContext<'_>,
    records: &[LedgerRecord],
) -> Vec<LedgerRecord> {
    let exempt = ctx.allowed_unbalanced();
    let mut exposures: BTreeMap<EntityId, Exposure> = BTreeMap::new();
    for record in records {
        for (side, leg) in record.legs() {
            if exempt.contains(&leg.entity) {
                continue;
            }
            let exposure = exposures.entry(leg.entity).or_default();
            let sign = match side {
                Side::Credit => Decimal::ONE,
                Side::Debit => Decimal::NEGATIVE_ONE,
            };
            match &exposure.currency {
                Some(currency) if *currency != record.currency => exposure.mixed = true,
                Some(_) => {}
                None => exposure.currency = Some(record.currency.clone()),
            }
            match leg.foreign_amount {
                Some(foreign) => exposure.foreign += sign * foreign,
                None => exposure.mixed = true,
            }
            exposure.local += sign * leg.local_amount;
            exposure.last_date = exposure.last_date.max(Some(record.value_date));
        }
    }

    let epsilon = ctx.epsilon();
    let exchange_rate = ctx.accounts().exchange_rate;
    exposures
        .into_iter()
        .filter(|(_, exposure)| {
            !exposure.mixed && exposure.foreign.abs() <= epsilon && exposure.local.abs() > epsilon
        })
        .filter_map(|(entity, exposure)| {
            let difference = exposure.local.abs();
            let record = ctx
                .local_record(exposure.last_date?)
                .description(Some("exchange rate difference"));
            Some(if exposure.local.is_sign_positive() {
                record
                    .debit(Leg::new(entity, difference))
                    .credit(Leg::new(exchange_rate, difference))
            } else {
                record
                    .debit(Leg::new(exchange_rate, difference))
                    .credit(Leg::new(entity, difference))
            })
        })
        .collect()
}
