//! Per-entity balance accumulation over a set of ledger records.

use crate::Decimal;
use crate::config::default_epsilon;
use crate::record::{EntityId, LedgerRecord, Side};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BalanceResult {
    pub is_balanced: bool,
    /// Entities left non-zero that are not allowed to be.
    pub unbalanced_entities: BTreeMap<EntityId, Decimal>,
    /// Signed local total of every entity touched, credits positive.
    pub entity_balances: BTreeMap<EntityId, Decimal>,
}

#[derive(Debug, Clone, Copy)]
pub struct BalanceCalculator {
    epsilon: Decimal,
}

impl Default for BalanceCalculator {
    fn default() -> Self {
        BalanceCalculator::new(default_epsilon())
    }
}

impl BalanceCalculator {
    pub fn new(epsilon: Decimal) -> Self {
        BalanceCalculator { epsilon }
    }

    pub fn compute<'a>(
        &self,
        records: impl IntoIterator<Item = &'a LedgerRecord>,
        allowed_unbalanced: &BTreeSet<EntityId>,
    ) -> BalanceResult {
        let mut entity_balances: BTreeMap<EntityId, Decimal> = BTreeMap::new();
        for record in records {
            for (side, leg) in record.legs() {
                let signed = match side {
                    Side::Credit => leg.local_amount,
                    Side::Debit => -leg.local_amount,
                };
                *entity_balances.entry(leg.entity).or_default() += signed;
            }
        }

        let unbalanced_entities: BTreeMap<EntityId, Decimal> = entity_balances
            .iter()
            .filter(|(entity, total)| {
                total.abs() > self.epsilon && !allowed_unbalanced.contains(*entity)
            })
            .map(|(entity, total)| (*entity, *total))
            .collect();

        if !unbalanced_entities.is_empty() {
            tracing::debug!(count = unbalanced_entities.len(), "unbalanced entities");
        }

        BalanceResult {
            is_balanced: unbalanced_entities.is_empty(),
            unbalanced_entities,
            entity_balances,
        }
    }
}

/// [`BalanceCalculator::compute`] with the default epsilon.
pub fn compute_balance<'a>(
    records: impl IntoIterator<Item = &'a LedgerRecord>,
    allowed_unbalanced: &BTreeSet<EntityId>,
) -> BalanceResult {
    BalanceCalculator::default().compute(records, allowed_unbalanced)
}
