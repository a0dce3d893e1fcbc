use chrono::NaiveDate;
use ledger_engine::aggregate::aggregate_transactions;
use ledger_engine::facts::Transaction;
use ledger_engine::reconcile::{
    can_pair, full_match, pair_distance, partial_match, records_match,
};
use ledger_engine::{
    Currency, Decimal, EMPTY_ID, LedgerRecord, LedgerStore, Leg, MemoryLedgerStore, reconcile,
};
use proptest::prelude::*;
use uuid::Uuid;

const CHARGE: Uuid = Uuid::from_u128(1);
const OWNER: Uuid = Uuid::from_u128(2);
const CHECKING: Uuid = Uuid::from_u128(10);
const EXPENSES: [Uuid; 3] = [
    Uuid::from_u128(11),
    Uuid::from_u128(12),
    Uuid::from_u128(13),
];
const CURRENCIES: [&str; 3] = ["USD", "EUR", "GBP"];

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
}

fn record_strategy() -> impl Strategy<Value = LedgerRecord> {
    (1u32..=4, 0usize..EXPENSES.len(), 1i64..500).prop_map(|(day, expense, cents)| {
        let amount = Decimal::new(cents, 2);
        LedgerRecord::new(CHARGE, OWNER, date(day), date(day), Currency::new("EUR"))
            .debit(Leg::new(EXPENSES[expense], amount))
            .credit(Leg::new(CHECKING, amount))
    })
}

fn records_strategy() -> impl Strategy<Value = Vec<LedgerRecord>> {
    prop::collection::vec(record_strategy(), 0..8)
}

fn with_ids(records: Vec<LedgerRecord>) -> Vec<LedgerRecord> {
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| LedgerRecord {
            id: Uuid::from_u128(100 + i as u128),
            ..record
        })
        .collect()
}

/// Both sides hold the same records, ignoring ids and order.
fn same_content(a: &[LedgerRecord], b: &[LedgerRecord]) -> bool {
    let mut remaining: Vec<&LedgerRecord> = b.iter().collect();
    a.len() == b.len()
        && a.iter().all(|record| {
            match remaining.iter().position(|other| records_match(record, other)) {
                Some(index) => {
                    remaining.swap_remove(index);
                    true
                }
                None => false,
            }
        })
}

fn transaction_strategy() -> impl Strategy<Value = Transaction> {
    let currency = 0usize..CURRENCIES.len();
    let fee = prop::bool::weighted(0.2);
    (currency, 1u32..=28, -10_000i64..10_000, fee).prop_map(|(currency, day, cents, is_fee)| {
        Transaction {
            id: Uuid::new_v4(),
            account_entity: CHECKING,
            business_id: None,
            amount: Decimal::new(cents, 2),
            currency: Currency::new(CURRENCIES[currency]),
            event_date: date(day),
            debit_date: Some(date(day)),
            exchange_rate: None,
            description: None,
            reference: None,
            is_fee,
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn aggregate_reports_currencies_in_first_seen_order(
        transactions in prop::collection::vec(transaction_strategy(), 1..8),
    ) {
        let parts: Vec<&Transaction> = transactions.iter().filter(|t| !t.is_fee).collect();
        let mut currencies: Vec<&Currency> = Vec::new();
        for part in &parts {
            if !currencies.contains(&&part.currency) {
                currencies.push(&part.currency);
            }
        }

        let result = aggregate_transactions(&transactions);
        if parts.is_empty() {
            prop_assert_eq!(
                result.unwrap_err().to_string(),
                "all transactions are marked as fees"
            );
        } else if currencies.len() > 1 {
            let listed: Vec<_> = currencies.iter().map(|c| c.to_string()).collect();
            prop_assert_eq!(
                result.unwrap_err().to_string(),
                format!("multiple currencies found ({})", listed.join(", "))
            );
        } else {
            let aggregated = result.unwrap();
            let earliest = parts.iter().map(|part| part.event_date).min().unwrap();
            let total: Decimal = parts.iter().map(|part| part.amount).sum();
            prop_assert_eq!(aggregated.event_date, earliest);
            prop_assert_eq!(aggregated.amount, total);
            prop_assert_eq!(&aggregated.currency, currencies[0]);
        }
    }

    #[test]
    fn full_match_ignores_ids_and_order(
        (records, shuffled) in records_strategy()
            .prop_flat_map(|records| (Just(records.clone()), Just(records).prop_shuffle())),
    ) {
        let stored = with_ids(records);
        let full = full_match(&stored, &shuffled);
        prop_assert_eq!(full.full_matches.len(), stored.len());
        prop_assert!(full.unmatched_stored.is_empty());
        prop_assert!(full.unmatched_generated.is_empty());
        prop_assert!(reconcile(CHARGE, &stored, &shuffled).is_empty());
    }

    #[test]
    fn applied_plan_rediffs_to_nothing(
        stored in records_strategy().prop_map(with_ids),
        generated in records_strategy(),
    ) {
        let plan = reconcile(CHARGE, &stored, &generated);
        prop_assert!(plan.to_insert.iter().all(|record| record.id == EMPTY_ID));
        prop_assert!(plan.to_update.iter().all(|update| stored.iter().any(|s| s.id == update.id)));

        let mut store = MemoryLedgerStore::from_iter(stored.clone());
        store.apply(CHARGE, &plan).unwrap();
        let converged = store.records(CHARGE);
        prop_assert!(same_content(&converged, &generated));

        let again = reconcile(CHARGE, &converged, &generated);
        prop_assert!(again.is_empty());
        prop_assert_eq!(again.unchanged, generated.len());
    }

    #[test]
    fn pairing_is_deterministic_under_shuffling(
        (stored, shuffled_stored) in records_strategy()
            .prop_map(with_ids)
            .prop_flat_map(|records| (Just(records.clone()), Just(records).prop_shuffle())),
        (generated, shuffled_generated) in records_strategy()
            .prop_flat_map(|records| (Just(records.clone()), Just(records).prop_shuffle())),
    ) {
        let plan = reconcile(CHARGE, &stored, &generated);
        prop_assert_eq!(&plan, &reconcile(CHARGE, &stored, &generated));

        let shuffled = reconcile(CHARGE, &shuffled_stored, &shuffled_generated);
        prop_assert_eq!(shuffled.unchanged, plan.unchanged);
        prop_assert_eq!(shuffled.to_update.len(), plan.to_update.len());
        prop_assert_eq!(shuffled.to_insert.len(), plan.to_insert.len());
        prop_assert_eq!(shuffled.to_remove.len(), plan.to_remove.len());
        prop_assert!(same_content(&shuffled.apply(&shuffled_stored), &plan.apply(&stored)));
    }

    #[test]
    fn closest_stored_record_absorbs_the_update(
        stored in records_strategy().prop_map(with_ids),
        generated in record_strategy(),
    ) {
        let partial = partial_match(stored.clone(), vec![generated.clone()]);
        let closest = stored
            .iter()
            .filter(|record| can_pair(record, &generated))
            .min_by_key(|record| pair_distance(record, &generated));
        match closest {
            Some(closest) => {
                prop_assert_eq!(partial.to_update.len(), 1);
                prop_assert_eq!(partial.to_update[0].id, closest.id);
                prop_assert_eq!(partial.to_remove.len(), stored.len() - 1);
            }
            None => {
                prop_assert!(partial.to_update.is_empty());
                prop_assert_eq!(partial.to_insert.len(), 1);
            }
        }
    }
}
