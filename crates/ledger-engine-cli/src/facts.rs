use anyhow::{Context, Result, bail};
use ledger_engine::LedgerRecord;
use ledger_engine::facts::{Charge, EntityDirectory};
use ledger_engine::record::ChargeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Everything the engine reads, fetched ahead of time.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactSnapshot {
    pub entities: EntityDirectory,
    pub charges: Vec<Charge>,
    /// Ledger records as currently stored, for every charge.
    #[serde(default)]
    pub records: Vec<LedgerRecord>,
}

#[derive(Serialize)]
struct StoredLedger<'a> {
    records: &'a [LedgerRecord],
}

impl FactSnapshot {
    pub fn parse(contents: &str) -> Result<Self> {
        let snapshot: FactSnapshot = serde_json::from_str(contents)?;
        if let Some(record) = snapshot.records.iter().find(|record| !record.is_persisted()) {
            bail!(
                "stored record of charge {} dated {} has no id",
                record.charge_id,
                record.invoice_date
            );
        }
        Ok(snapshot)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read facts file: {}", path.display()))?;
        let snapshot = FactSnapshot::parse(&contents)
            .with_context(|| format!("Failed to parse facts file: {}", path.display()))?;
        tracing::info!(
            entities = snapshot.entities.len(),
            charges = snapshot.charges.len(),
            records = snapshot.records.len(),
            "loaded {}",
            path.display()
        );
        Ok(snapshot)
    }

    /// Keep only the listed charges; an empty list keeps all of them.
    /// Stored records are never filtered so a write-back keeps other charges intact.
    pub fn retain_charges(&mut self, charges: &[ChargeId]) {
        if !charges.is_empty() {
            self.charges.retain(|charge| charges.contains(&charge.id));
        }
    }

    pub fn stored_by_charge(&self) -> BTreeMap<ChargeId, Vec<LedgerRecord>> {
        let mut stored: BTreeMap<_, Vec<_>> = BTreeMap::new();
        for record in &self.records {
            stored.entry(record.charge_id).or_default().push(record.clone());
        }
        stored
    }
}

pub async fn write_records(path: &Path, records: &[LedgerRecord]) -> Result<()> {
    let contents = serde_json::to_string_pretty(&StoredLedger { records })?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write ledger file: {}", path.display()))
}
