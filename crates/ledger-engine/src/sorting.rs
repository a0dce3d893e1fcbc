use crate::record::LedgerRecord;
use std::cmp::Ordering;

/// Stable order for generated ledgers: accrual date, value date, then description.
pub fn sort_records(records: &mut [LedgerRecord]) {
    records.sort_by(record_order);
}

pub fn record_order(a: &LedgerRecord, b: &LedgerRecord) -> Ordering {
    a.invoice_date
        .cmp(&b.invoice_date)
        .then(a.value_date.cmp(&b.value_date))
        .then_with(|| a.description.cmp(&b.description))
}
