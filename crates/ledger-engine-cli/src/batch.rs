use crate::facts::FactSnapshot;
use anyhow::{Context, Result};
use futures::{StreamExt as _, TryStreamExt as _, stream};
use ledger_engine::facts::Charge;
use ledger_engine::record::ChargeId;
use ledger_engine::{
    ChargeValidation, EngineConfig, GenerateOptions, GeneratedLedger, LedgerError, LedgerStatus,
    LedgerStore, ValidateOptions, generate_ledger, validate_charge,
};
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_CONCURRENCY: usize = 8;

pub struct ChargeReport<T> {
    pub charge_id: ChargeId,
    pub kind: String,
    pub outcome: Result<T, LedgerError>,
}

impl<T> ChargeReport<T> {
    pub fn is_unsupported(&self) -> bool {
        matches!(self.outcome, Err(LedgerError::UnsupportedType(_)))
    }
}

/// Run `f` for every charge of the snapshot on the blocking pool, at most
/// `concurrency` at a time. Results come back in snapshot order.
async fn for_each_charge<T, F>(
    snapshot: &Arc<FactSnapshot>,
    concurrency: usize,
    f: F,
) -> Result<Vec<T>>
where
    F: Fn(&FactSnapshot, &Charge) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    let start = Instant::now();
    let f = Arc::new(f);
    let mut results: Vec<(usize, T)> = stream::iter(0..snapshot.charges.len())
        .map(|index| {
            let snapshot = Arc::clone(snapshot);
            let f = Arc::clone(&f);
            tokio::task::spawn_blocking(move || (index, f(&snapshot, &snapshot.charges[index])))
        })
        .buffer_unordered(concurrency.max(1))
        .map(|joined| joined.context("charge worker failed"))
        .try_collect()
        .await?;

    // completion order is arbitrary
    results.sort_by_key(|(index, _)| *index);
    tracing::info!(
        charges = results.len(),
        concurrency,
        "processed charges in {:.2?}",
        start.elapsed()
    );
    Ok(results.into_iter().map(|(_, result)| result).collect())
}

pub async fn generate_all(
    snapshot: &Arc<FactSnapshot>,
    config: Arc<EngineConfig>,
    options: GenerateOptions,
    concurrency: usize,
) -> Result<Vec<ChargeReport<GeneratedLedger>>> {
    for_each_charge(snapshot, concurrency, move |snapshot, charge| ChargeReport {
        charge_id: charge.id,
        kind: charge.kind.clone(),
        outcome: generate_ledger(charge, &snapshot.entities, &config, options),
    })
    .await
}

pub async fn validate_all(
    snapshot: &Arc<FactSnapshot>,
    config: Arc<EngineConfig>,
    options: ValidateOptions,
    concurrency: usize,
) -> Result<Vec<ChargeReport<ChargeValidation>>> {
    let stored = Arc::new(snapshot.stored_by_charge());
    for_each_charge(snapshot, concurrency, move |snapshot, charge| {
        let records = stored.get(&charge.id).map(Vec::as_slice).unwrap_or_default();
        ChargeReport {
            charge_id: charge.id,
            kind: charge.kind.clone(),
            outcome: validate_charge(charge, records, &snapshot.entities, &config, options),
        }
    })
    .await
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub applied: usize,
    pub skipped: usize,
}

/// Write every persistable plan to `store`. Invalid charges and preview plans
/// are skipped with a warning.
pub fn apply_all(
    store: &mut impl LedgerStore,
    reports: &[ChargeReport<ChargeValidation>],
) -> Result<ApplySummary> {
    let mut summary = ApplySummary::default();
    for report in reports {
        let Ok(validation) = &report.outcome else {
            continue;
        };
        match (validation.status, &validation.plan) {
            (LedgerStatus::Diff, Some(plan)) if validation.persistable => {
                store.apply(report.charge_id, plan).with_context(|| {
                    format!("Failed to apply plan for charge {}", report.charge_id)
                })?;
                summary.applied += 1;
            }
            (LedgerStatus::Diff, _) => {
                tracing::warn!(charge = %report.charge_id, "skipping plan that is not persistable");
                summary.skipped += 1;
            }
            (LedgerStatus::Invalid, _) => {
                tracing::warn!(charge = %report.charge_id, "skipping invalid charge");
                summary.skipped += 1;
            }
            (LedgerStatus::Valid, _) => {}
        }
    }
    Ok(summary)
}
