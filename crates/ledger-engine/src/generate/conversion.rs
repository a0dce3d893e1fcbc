//! Currency exchanges between two of the owner's accounts.

use super::{Generated, LedgerContext, RecordSink};
use crate::aggregate::{AggregatedTransaction, aggregate_transactions};
use crate::error::{LedgerError, Result};
use crate::facts::Transaction;
use crate::record::{LedgerRecord, Leg};

pub(super) fn generate(ctx: &LedgerContext<'_>) -> Generated {
    let charge = ctx.charge;
    let (outgoing, incoming): (Vec<&Transaction>, Vec<&Transaction>) = charge
        .non_fee_transactions()
        .partition(|transaction| transaction.is_outgoing());
    if outgoing.is_empty() && incoming.is_empty() {
        return Err(vec![LedgerError::missing(format!(
            "conversion charge {} has no transactions",
            charge.id
        ))]);
    }

    let base = aggregate_side(ctx, outgoing, "outgoing");
    let quote = aggregate_side(ctx, incoming, "incoming");
    let (base, quote) = match (base, quote) {
        (Ok(base), Ok(quote)) => (base, quote),
        (base, quote) => {
            return Err([base.err(), quote.err()].into_iter().flatten().collect());
        }
    };

    let mut sink = RecordSink::default();
    sink.push(conversion_record(ctx, &base, &quote));
    ctx.fee_records(&mut sink);
    sink.finish()
}

fn aggregate_side<'a>(
    ctx: &LedgerContext<'_>,
    transactions: Vec<&'a Transaction>,
    direction: &str,
) -> Result<AggregatedTransaction<'a>> {
    if transactions.is_empty() {
        return Err(LedgerError::missing(format!(
            "conversion charge {} has no {direction} side",
            ctx.charge.id
        )));
    }
    aggregate_transactions(transactions)
}

/// One record moving value from the base account to the quote account.
///
/// The record is kept in the foreign side's currency; when both sides are
/// foreign the base currency wins. A local difference beyond epsilon lands on
/// the exchange-rate account as a second leg.
fn conversion_record(
    ctx: &LedgerContext<'_>,
    base: &AggregatedTransaction<'_>,
    quote: &AggregatedTransaction<'_>,
) -> Result<LedgerRecord> {
    let local = ctx.local_currency();
    let base_local = base.local_amount(local)?;
    let quote_local = quote.local_amount(local)?;

    let (currency, amount) = if base.currency != *local {
        (&base.currency, base.amount.abs())
    } else {
        (&quote.currency, quote.amount.abs())
    };
    let foreign = ctx.foreign(amount, currency);

    let invoice_date = base.event_date.min(quote.event_date);
    let value_date = base.value_date()?.max(quote.value_date()?);
    let description = ctx
        .charge
        .description
        .clone()
        .or_else(|| Some(base.description.clone()).filter(|text| !text.is_empty()));

    let mut record = ctx
        .record(invoice_date, value_date, currency)
        .debit(Leg::new(quote.account_entity()?, quote_local).with_foreign(foreign))
        .credit(Leg::new(base.account_entity()?, base_local).with_foreign(foreign))
        .description(description);

    let difference = base_local - quote_local;
    if difference.abs() > ctx.epsilon() {
        let leg = Leg::new(ctx.accounts().exchange_rate, difference.abs());
        record = if difference.is_sign_positive() {
            record.debit2(leg)
        } else {
            record.credit2(leg)
        };
    }
    Ok(record)
}
