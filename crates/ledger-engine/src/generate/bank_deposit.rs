//! Fixed-term bank deposits: money parked and returned with interest.

use super::{Generated, LedgerContext, RecordSink};
use crate::Decimal;
use crate::error::{LedgerError, Result};
use crate::facts::Transaction;
use crate::record::{EntityId, LedgerRecord, Leg};

pub(super) fn generate(ctx: &LedgerContext<'_>) -> Generated {
    let charge = ctx.charge;
    let Some(deposit) = charge.tax_category_id else {
        return Err(vec![LedgerError::missing(format!(
            "bank deposit charge {} has no deposit account",
            charge.id
        ))]);
    };
    let movements: Vec<&Transaction> = charge.non_fee_transactions().collect();
    if movements.is_empty() {
        return Err(vec![LedgerError::missing(format!(
            "bank deposit charge {} has no transactions",
            charge.id
        ))]);
    }

    let mut sink = RecordSink::default();
    for movement in &movements {
        sink.push(ctx.settlement(movement, deposit));
    }
    match interest(ctx, deposit, &movements) {
        Ok(Some(record)) => sink.push(Ok(record)),
        Ok(None) => {}
        Err(error) => sink.error(error),
    }
    ctx.fee_records(&mut sink);
    sink.finish()
}

/// Interest earned: whatever came back beyond what was deposited.
fn interest(
    ctx: &LedgerContext<'_>,
    deposit: EntityId,
    movements: &[&Transaction],
) -> Result<Option<LedgerRecord>> {
    let currency = &movements[0].currency;
    if let Some(other) = movements.iter().find(|movement| movement.currency != *currency) {
        return Err(LedgerError::ambiguous(format!(
            "multiple currencies found ({currency}, {})",
            other.currency
        )));
    }
    let Some(last_withdrawal) = movements
        .iter()
        .filter(|movement| !movement.is_outgoing())
        .max_by_key(|movement| movement.event_date)
    else {
        return Ok(None);
    };

    let local_currency = ctx.local_currency();
    let mut earned = Decimal::ZERO;
    let mut earned_local = Decimal::ZERO;
    for movement in movements {
        let local = movement.local_amount(local_currency)?;
        if movement.is_outgoing() {
            earned -= movement.amount.abs();
            earned_local -= local;
        } else {
            earned += movement.amount.abs();
            earned_local += local;
        }
    }
    if earned <= Decimal::ZERO || earned_local <= Decimal::ZERO {
        return Ok(None);
    }

    let foreign = ctx.foreign(earned, currency);
    Ok(Some(
        ctx.record(
            last_withdrawal.event_date,
            last_withdrawal.value_date()?,
            currency,
        )
        .debit(Leg::new(deposit, earned_local).with_foreign(foreign))
        .credit(Leg::new(ctx.accounts().deposit_interest, earned_local).with_foreign(foreign))
        .description(Some("deposit interest")),
    ))
}
