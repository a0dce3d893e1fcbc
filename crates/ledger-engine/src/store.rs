//! Persisting reconcile plans.

use crate::reconcile::ReconcilePlan;
use crate::record::{ChargeId, LedgerRecord, RecordId};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("plan for charge {plan} cannot be applied to charge {charge}")]
    ChargeMismatch { plan: ChargeId, charge: ChargeId },
    #[error("charge {charge} has no stored record {record}")]
    UnknownRecord { charge: ChargeId, record: RecordId },
}

/// Where ledger records live between runs.
pub trait LedgerStore {
    /// Stored records of one charge, in storage order.
    fn records(&self, charge_id: ChargeId) -> Vec<LedgerRecord>;

    /// Apply `plan` to the records of `charge_id`, all or nothing.
    fn apply(&mut self, charge_id: ChargeId, plan: &ReconcilePlan) -> Result<(), StoreError>;
}

/// Keeps records in memory, grouped by charge.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    charges: BTreeMap<ChargeId, Vec<LedgerRecord>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        MemoryLedgerStore::default()
    }

    pub fn len(&self) -> usize {
        self.charges.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored record, grouped by charge.
    pub fn into_records(self) -> Vec<LedgerRecord> {
        self.charges.into_values().flatten().collect()
    }

    fn check(&self, charge_id: ChargeId, plan: &ReconcilePlan) -> Result<(), StoreError> {
        if plan.charge_id != charge_id {
            return Err(StoreError::ChargeMismatch {
                plan: plan.charge_id,
                charge: charge_id,
            });
        }
        let stored = self.charges.get(&charge_id).map(Vec::as_slice).unwrap_or_default();
        for record in plan.to_update.iter().chain(&plan.to_remove) {
            if !stored.iter().any(|stored| stored.id == record.id) {
                return Err(StoreError::UnknownRecord {
                    charge: charge_id,
                    record: record.id,
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<LedgerRecord> for MemoryLedgerStore {
    fn from_iter<T: IntoIterator<Item = LedgerRecord>>(iter: T) -> Self {
        let mut store = MemoryLedgerStore::default();
        for record in iter {
            store.charges.entry(record.charge_id).or_default().push(record);
        }
        store
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn records(&self, charge_id: ChargeId) -> Vec<LedgerRecord> {
        self.charges.get(&charge_id).cloned().unwrap_or_default()
    }

    fn apply(&mut self, charge_id: ChargeId, plan: &ReconcilePlan) -> Result<(), StoreError> {
        self.check(charge_id, plan)?;

        let stored = self.charges.entry(charge_id).or_default();
        let converged = plan.apply(stored);
        *stored = converged
            .into_iter()
            .map(|record| {
                if record.is_persisted() {
                    record
                } else {
                    LedgerRecord {
                        id: Uuid::new_v4(),
                        ..record
                    }
                }
            })
            .collect();

        tracing::debug!(charge = %charge_id, records = stored.len(), "stored ledger");
        Ok(())
    }
}
