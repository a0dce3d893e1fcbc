//! Revaluations, interest and bank charges.

use super::{Generated, LedgerContext, RecordSink};
use crate::error::LedgerError;
use crate::facts::RevaluationFact;
use crate::record::{LedgerRecord, Leg};

pub(super) fn generate(ctx: &LedgerContext<'_>) -> Generated {
    let charge = ctx.charge;
    if charge.revaluations.is_empty() && charge.transactions.is_empty() {
        return Err(vec![LedgerError::missing(format!(
            "financial charge {} has no revaluations or transactions",
            charge.id
        ))]);
    }

    let mut sink = RecordSink::default();
    sink.extend(
        charge
            .revaluations
            .iter()
            .filter(|revaluation| !revaluation.local_amount.is_zero())
            .map(|revaluation| revaluation_record(ctx, revaluation)),
    );

    let counter = charge
        .tax_category_id
        .unwrap_or(ctx.accounts().bank_fees);
    for transaction in charge.non_fee_transactions() {
        sink.push(ctx.settlement(transaction, counter));
    }
    ctx.fee_records(&mut sink);
    sink.finish()
}

fn revaluation_record(ctx: &LedgerContext<'_>, revaluation: &RevaluationFact) -> LedgerRecord {
    let amount = revaluation.local_amount.abs();
    let account = Leg::new(revaluation.account_entity, amount);
    let exchange_rate = Leg::new(ctx.accounts().exchange_rate, amount);
    let record = ctx
        .local_record(revaluation.date)
        .description(revaluation.description.clone());
    if revaluation.local_amount.is_sign_positive() {
        record.debit(account).credit(exchange_rate)
    } else {
        record.debit(exchange_rate).credit(account)
    }
}
