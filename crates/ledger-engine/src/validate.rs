//! Checking a charge's stored ledger against what its facts generate.

use crate::balance::{BalanceCalculator, BalanceResult};
use crate::config::EngineConfig;
use crate::error::{LedgerError, Result};
use crate::facts::{Charge, EntityDirectory};
use crate::generate::{GenerateOptions, generate_ledger};
use crate::reconcile::{ReconcilePlan, reconcile};
use crate::record::{ChargeId, LedgerRecord};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    /// The stored records equal the generated ones.
    Valid,
    /// The stored records differ; see [`ChargeValidation::plan`].
    Diff,
    /// The facts of the charge could not be turned into a balanced ledger.
    Invalid,
}

impl fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LedgerStatus::Valid => "valid",
            LedgerStatus::Diff => "diff",
            LedgerStatus::Invalid => "invalid",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidateOptions {
    /// Also run the balance calculator over the stored records.
    pub check_stored_balance: bool,
    /// Generate for persisting rather than as a read-only preview.
    pub insert_if_not_exists: bool,
}

#[derive(Debug, Clone)]
pub struct ChargeValidation {
    pub charge_id: ChargeId,
    pub status: LedgerStatus,
    /// Present unless the charge is invalid.
    pub plan: Option<ReconcilePlan>,
    pub errors: Vec<LedgerError>,
    pub stored_balance: Option<BalanceResult>,
    /// Whether a writer may apply `plan`. Previews never are.
    pub persistable: bool,
}

/// Generate the ledger of `charge` and compare it with `stored`.
///
/// Only an unknown charge type is an `Err`; fact and balance problems make
/// the charge [`LedgerStatus::Invalid`].
pub fn validate_charge(
    charge: &Charge,
    stored: &[LedgerRecord],
    directory: &EntityDirectory,
    config: &EngineConfig,
    options: ValidateOptions,
) -> Result<ChargeValidation> {
    let generate_options = GenerateOptions {
        insert_if_not_exists: options.insert_if_not_exists,
    };
    let generated = generate_ledger(charge, directory, config, generate_options)?;
    let persistable = generated.is_persistable();

    let stored_balance = options.check_stored_balance.then(|| {
        let allowed = crate::generate::allowed_unbalanced(directory, config);
        BalanceCalculator::new(config.balance_epsilon).compute(stored, &allowed)
    });

    let (status, plan) = if generated.errors.is_empty() {
        let plan = reconcile(charge.id, stored, &generated.records);
        let status = if plan.is_empty() {
            LedgerStatus::Valid
        } else {
            LedgerStatus::Diff
        };
        (status, Some(plan))
    } else {
        (LedgerStatus::Invalid, None)
    };

    Ok(ChargeValidation {
        charge_id: charge.id,
        status,
        plan,
        errors: generated.errors,
        stored_balance,
        persistable,
    })
}
