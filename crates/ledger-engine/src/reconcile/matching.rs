use crate::Decimal;
use crate::record::{EntityId, LedgerRecord, Leg};

fn entities(legs: &[Option<Leg>; 2]) -> [Option<EntityId>; 2] {
    legs.each_ref().map(|leg| leg.as_ref().map(|leg| leg.entity))
}

/// Two records carry the same accounting content; the persisted id is ignored.
pub fn records_match(stored: &LedgerRecord, generated: &LedgerRecord) -> bool {
    // id can be anything
    stored.charge_id == generated.charge_id
        && stored.owner_id == generated.owner_id
        && stored.invoice_date == generated.invoice_date
        && stored.value_date == generated.value_date
        && stored.debit == generated.debit
        && stored.credit == generated.credit
        && stored.currency == generated.currency
        && stored.description == generated.description
        && stored.reference1 == generated.reference1
}

/// Whether a stored record may be updated in place to become `generated`:
/// same charge, same entities on both sides and the same currency.
pub fn can_pair(stored: &LedgerRecord, generated: &LedgerRecord) -> bool {
    stored.charge_id == generated.charge_id
        && stored.currency == generated.currency
        && entities(&stored.debit) == entities(&generated.debit)
        && entities(&stored.credit) == entities(&generated.credit)
}

/// How far apart two pairable records are; smaller pairs first.
///
/// Invoice-date distance in days, then value-date distance, then the
/// difference in local totals across both sides.
pub fn pair_distance(stored: &LedgerRecord, generated: &LedgerRecord) -> (i64, i64, Decimal) {
    let invoice_days = (stored.invoice_date - generated.invoice_date).num_days().abs();
    let value_days = (stored.value_date - generated.value_date).num_days().abs();
    let amount = (stored.debit_local_total() - generated.debit_local_total()).abs()
        + (stored.credit_local_total() - generated.credit_local_total()).abs();
    (invoice_days, value_days, amount)
}
