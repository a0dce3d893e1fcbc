//! Reconciling differences between stored ledger records and a freshly generated ledger.

mod matching;

pub use matching::{can_pair, pair_distance, records_match};

use crate::record::{ChargeId, EMPTY_ID, LedgerRecord, RecordId};
use crate::utils::sort_merge_diff::{JoinResult, SortMergeDiff};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Result of the content-equality pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullMatch {
    /// Stored id to the matching generated id, `None` when the generated
    /// record has not been persisted.
    pub full_matches: BTreeMap<RecordId, Option<RecordId>>,
    pub unmatched_stored: Vec<LedgerRecord>,
    pub unmatched_generated: Vec<LedgerRecord>,
}

/// Result of pairing what the full match left over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialMatch {
    /// Generated content carrying the id of the stored record it replaces.
    pub to_update: Vec<LedgerRecord>,
    /// Generated records without a stored counterpart, id reset to [`EMPTY_ID`].
    pub to_insert: Vec<LedgerRecord>,
    pub to_remove: Vec<LedgerRecord>,
}

type Indexed<'a> = (usize, &'a LedgerRecord);

fn by_invoice_date<'a>(
    records: impl IntoIterator<Item = Indexed<'a>>,
) -> BTreeMap<NaiveDate, Vec<Indexed<'a>>> {
    let mut buckets: BTreeMap<_, Vec<_>> = BTreeMap::new();
    for (index, record) in records {
        buckets.entry(record.invoice_date).or_default().push((index, record));
    }
    buckets
}

/// Pair stored and generated records with identical content.
///
/// Matching is by content only, so neither input order nor stored ids matter.
/// A stored record without an id never matches. Unmatched records keep their
/// input order.
pub fn full_match(stored: &[LedgerRecord], generated: &[LedgerRecord]) -> FullMatch {
    let mut full_matches = BTreeMap::new();
    let (persisted, mut unmatched_stored): (Vec<Indexed<'_>>, Vec<Indexed<'_>>) = stored
        .iter()
        .enumerate()
        .partition(|(_, record)| record.is_persisted());
    let mut unmatched_generated: Vec<Indexed<'_>> = Vec::new();

    for bucket in SortMergeDiff::new(
        by_invoice_date(persisted).into_iter(),
        by_invoice_date(generated.iter().enumerate()).into_iter(),
        |(date_a, _), (date_b, _)| date_a.cmp(date_b),
    ) {
        match bucket {
            JoinResult::OnlyInFirst((_, items)) => unmatched_stored.extend(items),
            JoinResult::OnlyInSecond((_, items)) => unmatched_generated.extend(items),
            JoinResult::InBoth((_, mut bucket_stored), (_, bucket_generated)) => {
                // PERF: O(stored*generated) per bucket
                for (index, generated_item) in bucket_generated {
                    let match_at = bucket_stored
                        .iter()
                        .position(|(_, stored_item)| records_match(stored_item, generated_item));
                    match match_at {
                        Some(match_at) => {
                            let (_, stored_item) = bucket_stored.remove(match_at);
                            let generated_id =
                                generated_item.is_persisted().then_some(generated_item.id);
                            full_matches.insert(stored_item.id, generated_id);
                        }
                        None => unmatched_generated.push((index, generated_item)),
                    }
                }
                unmatched_stored.extend(bucket_stored);
            }
        }
    }

    unmatched_stored.sort_by_key(|(index, _)| *index);
    unmatched_generated.sort_by_key(|(index, _)| *index);
    FullMatch {
        full_matches,
        unmatched_stored: unmatched_stored.into_iter().map(|(_, r)| r.clone()).collect(),
        unmatched_generated: unmatched_generated
            .into_iter()
            .map(|(_, r)| r.clone())
            .collect(),
    }
}

/// Turn leftovers into updates where a stored record can absorb a generated one.
///
/// Generated records are visited in input order. Each takes the closest
/// pairable stored record by [`pair_distance`], ties going to the earlier
/// stored record. Stored ids are only ever reused through such a pairing, and
/// a stored record without an id is always removed.
pub fn partial_match(
    unmatched_stored: Vec<LedgerRecord>,
    unmatched_generated: Vec<LedgerRecord>,
) -> PartialMatch {
    let mut remaining: Vec<Option<LedgerRecord>> = unmatched_stored.into_iter().map(Some).collect();
    let mut result = PartialMatch::default();

    for generated in unmatched_generated {
        let best = remaining
            .iter()
            .enumerate()
            .filter_map(|(index, stored)| Some((index, stored.as_ref()?)))
            .filter(|(_, stored)| stored.is_persisted() && can_pair(stored, &generated))
            .min_by_key(|(index, stored)| (pair_distance(stored, &generated), *index))
            .map(|(index, _)| index);

        match best.and_then(|index| remaining[index].take()) {
            Some(stored) => result.to_update.push(LedgerRecord {
                id: stored.id,
                ..generated
            }),
            None => result.to_insert.push(LedgerRecord {
                id: EMPTY_ID,
                ..generated
            }),
        }
    }
    result.to_remove = remaining.into_iter().flatten().collect();
    result
}

/// The minimal set of writes converging one charge's stored ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilePlan {
    pub charge_id: ChargeId,
    pub to_insert: Vec<LedgerRecord>,
    pub to_update: Vec<LedgerRecord>,
    pub to_remove: Vec<LedgerRecord>,
    /// Stored records already equal to a generated one.
    pub unchanged: usize,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }

    /// Number of writes the plan performs.
    pub fn len(&self) -> usize {
        self.to_insert.len() + self.to_update.len() + self.to_remove.len()
    }

    /// The stored set as it looks after the plan ran. Inserted records keep
    /// [`EMPTY_ID`] until a store assigns them one.
    pub fn apply(&self, stored: &[LedgerRecord]) -> Vec<LedgerRecord> {
        let removed: BTreeSet<RecordId> = self.to_remove.iter().map(|record| record.id).collect();
        let updates: BTreeMap<RecordId, &LedgerRecord> = self
            .to_update
            .iter()
            .map(|record| (record.id, record))
            .collect();

        let mut records: Vec<LedgerRecord> = stored
            .iter()
            .filter(|record| !removed.contains(&record.id))
            .map(|record| match updates.get(&record.id) {
                Some(update) => (*update).clone(),
                None => record.clone(),
            })
            .collect();
        records.extend(self.to_insert.iter().cloned());
        crate::sorting::sort_records(&mut records);
        records
    }
}

/// Compute the plan converging `stored` on `generated` for one charge.
pub fn reconcile(
    charge_id: ChargeId,
    stored: &[LedgerRecord],
    generated: &[LedgerRecord],
) -> ReconcilePlan {
    let full = full_match(stored, generated);
    let partial = partial_match(full.unmatched_stored, full.unmatched_generated);
    let plan = ReconcilePlan {
        charge_id,
        to_insert: partial.to_insert,
        to_update: partial.to_update,
        to_remove: partial.to_remove,
        unchanged: full.full_matches.len(),
    };
    tracing::info!(
        charge = %charge_id,
        insert = plan.to_insert.len(),
        update = plan.to_update.len(),
        remove = plan.to_remove.len(),
        unchanged = plan.unchanged,
        "reconciled"
    );
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Decimal;
    use crate::facts::{EntityDirectory, EntityKind, FinancialEntity};
    use crate::record::{Currency, EntityId, Leg};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    const CHARGE: ChargeId = Uuid::from_u128(1);
    const CHECKING: EntityId = Uuid::from_u128(10);
    const FOOD: EntityId = Uuid::from_u128(11);
    const TRANSPORT: EntityId = Uuid::from_u128(12);

    fn directory() -> EntityDirectory {
        EntityDirectory::from_iter([
            FinancialEntity::new(CHECKING, "Checking", EntityKind::TaxCategory),
            FinancialEntity::new(FOOD, "Food", EntityKind::TaxCategory),
            FinancialEntity::new(TRANSPORT, "Transport", EntityKind::TaxCategory),
        ])
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn record(day: u32, expense: EntityId, amount: Decimal, description: &str) -> LedgerRecord {
        LedgerRecord::new(CHARGE, Uuid::from_u128(2), date(day), date(day), Currency::new("EUR"))
            .debit(Leg::new(expense, amount))
            .credit(Leg::new(CHECKING, amount))
            .description(Some(description))
    }

    fn stored(id: u128, record: LedgerRecord) -> LedgerRecord {
        LedgerRecord {
            id: Uuid::from_u128(id),
            ..record
        }
    }

    fn format_plan(plan: &ReconcilePlan) -> String {
        let directory = directory();
        let sections = [
            ("insert", &plan.to_insert),
            ("update", &plan.to_update),
            ("remove", &plan.to_remove),
        ];
        let mut lines = Vec::new();
        for (label, records) in sections {
            for record in records {
                lines.push(format!("; {label} {}", record.id.as_u128()));
                lines.push(record.display(&directory).to_string());
            }
        }
        lines.join("\n")
    }

    #[test]
    fn empty_stored_set_is_a_pure_insert() {
        let generated = vec![record(1, FOOD, dec!(100), "Transaction 1")];
        let full = full_match(&[], &generated);
        assert!(full.full_matches.is_empty());
        assert_eq!(full.unmatched_generated, generated);

        let partial = partial_match(full.unmatched_stored, full.unmatched_generated);
        assert!(partial.to_update.is_empty());
        assert!(partial.to_remove.is_empty());
        assert_eq!(partial.to_insert, generated);
    }

    #[test]
    fn identical_content_ignores_id() {
        let generated = vec![record(1, FOOD, dec!(100), "Transaction 1")];
        let stored = vec![stored(7, generated[0].clone())];

        let full = full_match(&stored, &generated);
        assert_eq!(
            full.full_matches,
            BTreeMap::from([(Uuid::from_u128(7), None)])
        );
        assert!(full.unmatched_stored.is_empty());
        assert!(full.unmatched_generated.is_empty());

        let plan = reconcile(CHARGE, &stored, &generated);
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn matching_is_order_independent() {
        let generated = vec![
            record(1, FOOD, dec!(100), "Transaction 1"),
            record(1, TRANSPORT, dec!(50), "Transaction 2"),
            record(3, FOOD, dec!(75), "Transaction 3"),
        ];
        let stored = vec![
            stored(3, generated[2].clone()),
            stored(2, generated[1].clone()),
            stored(1, generated[0].clone()),
        ];
        let plan = reconcile(CHARGE, &stored, &generated);
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, 3);
    }

    #[test]
    fn both_empty() {
        let plan = reconcile(CHARGE, &[], &[]);
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, 0);
    }

    #[test]
    fn changed_amount_updates_in_place() {
        let stored = vec![
            stored(1, record(1, FOOD, dec!(100), "Transaction 1")),
            stored(2, record(2, TRANSPORT, dec!(50), "Transaction 2")),
        ];
        let generated = vec![
            record(1, FOOD, dec!(100), "Transaction 1"),
            record(2, TRANSPORT, dec!(55), "Transaction 2"),
        ];
        let plan = reconcile(CHARGE, &stored, &generated);
        assert_eq!(plan.unchanged, 1);
        insta::assert_snapshot!(format_plan(&plan), @r#"
        ; update 2
        2025-01-02 2025-01-02 EUR "Transaction 2"
          Dr Transport	55.00
          Cr Checking	55.00
        "#);
    }

    #[test]
    fn changed_entity_is_removed_and_inserted() {
        let stored = vec![stored(1, record(1, FOOD, dec!(100), "Transaction 1"))];
        let generated = vec![record(1, TRANSPORT, dec!(100), "Transaction 1")];
        let plan = reconcile(CHARGE, &stored, &generated);
        insta::assert_snapshot!(format_plan(&plan), @r#"
        ; insert 0
        2025-01-01 2025-01-01 EUR "Transaction 1"
          Dr Transport	100.00
          Cr Checking	100.00
        ; remove 1
        2025-01-01 2025-01-01 EUR "Transaction 1"
          Dr Food	100.00
          Cr Checking	100.00
        "#);
    }

    #[test]
    fn duplicate_stored_records_are_removed() {
        let generated = vec![record(1, FOOD, dec!(100), "Transaction 1")];
        let stored = vec![
            stored(1, generated[0].clone()),
            stored(2, generated[0].clone()),
        ];
        let plan = reconcile(CHARGE, &stored, &generated);
        assert_eq!(plan.unchanged, 1);
        assert!(plan.to_update.is_empty());
        assert!(plan.to_insert.is_empty());
        assert_eq!(plan.to_remove.len(), 1);
        assert_eq!(plan.to_remove[0].id, Uuid::from_u128(2));
    }

    #[test]
    fn closest_invoice_date_wins() {
        let stored = vec![
            stored(1, record(1, FOOD, dec!(100), "early")),
            stored(2, record(5, FOOD, dec!(300), "late")),
        ];
        let generated = vec![record(4, FOOD, dec!(100), "moved")];
        let partial = partial_match(stored, generated);
        assert_eq!(partial.to_update.len(), 1);
        assert_eq!(partial.to_update[0].id, Uuid::from_u128(2));
        assert_eq!(partial.to_remove[0].id, Uuid::from_u128(1));
    }

    #[test]
    fn closest_amount_breaks_date_ties() {
        let stored = vec![
            stored(1, record(3, FOOD, dec!(100), "a")),
            stored(2, record(3, FOOD, dec!(205), "b")),
        ];
        let generated = vec![record(3, FOOD, dec!(200), "c")];
        let partial = partial_match(stored, generated);
        assert_eq!(partial.to_update[0].id, Uuid::from_u128(2));
    }

    #[test]
    fn full_tie_goes_to_the_earlier_stored_record() {
        let stored = vec![
            stored(9, record(3, FOOD, dec!(100), "a")),
            stored(4, record(3, FOOD, dec!(100), "b")),
        ];
        let generated = vec![
            record(3, FOOD, dec!(100), "c"),
            record(3, FOOD, dec!(100), "d"),
        ];
        let partial = partial_match(stored, generated);
        let ids: Vec<_> = partial.to_update.iter().map(|r| r.id.as_u128()).collect();
        assert_eq!(ids, vec![9, 4]);
        assert!(partial.to_remove.is_empty());
    }

    #[test]
    fn applied_plan_rediffs_to_nothing() {
        let stored = vec![
            stored(1, record(1, FOOD, dec!(100), "Transaction 1")),
            stored(2, record(2, TRANSPORT, dec!(50), "Transaction 2")),
            stored(3, record(3, FOOD, dec!(75), "Transaction 3")),
        ];
        let generated = vec![
            record(1, FOOD, dec!(100), "Transaction 1"),
            record(2, TRANSPORT, dec!(60), "Transaction 2"),
            record(4, CHECKING, dec!(10), "Transaction 4"),
        ];
        let plan = reconcile(CHARGE, &stored, &generated);
        assert_eq!(plan.len(), 3);

        let converged: Vec<_> = plan
            .apply(&stored)
            .into_iter()
            .map(|record| {
                if record.is_persisted() {
                    record
                } else {
                    LedgerRecord {
                        id: Uuid::from_u128(100),
                        ..record
                    }
                }
            })
            .collect();
        assert_eq!(converged.len(), 3);
        let again = reconcile(CHARGE, &converged, &generated);
        assert!(again.is_empty());
        assert_eq!(again.unchanged, 3);
    }

    #[test]
    fn stored_records_without_id_are_replaced() {
        let stored = vec![
            record(1, FOOD, dec!(100), "Transaction 1"),
            record(2, TRANSPORT, dec!(50), "Transaction 2"),
        ];
        let generated = vec![
            record(1, FOOD, dec!(101), "Transaction 1"),
            record(2, TRANSPORT, dec!(51), "Transaction 2"),
        ];
        let plan = reconcile(CHARGE, &stored, &generated);
        assert!(plan.to_update.is_empty());
        assert_eq!(plan.to_insert, generated);
        assert_eq!(plan.to_remove, stored);

        let converged = plan.apply(&stored);
        assert_eq!(converged, generated);

        let unchanged = reconcile(CHARGE, &stored, &stored);
        assert_eq!(unchanged.unchanged, 0);
        assert_eq!(unchanged.to_insert, stored);
        assert_eq!(unchanged.to_remove, stored);
    }
}
