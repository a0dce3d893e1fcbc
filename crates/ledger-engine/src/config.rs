//! Engine configuration, passed explicitly into every call.

use crate::Decimal;
use crate::record::{Currency, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Largest local-currency amount treated as zero when balancing.
pub fn default_epsilon() -> Decimal {
    Decimal::new(5, 3)
}

fn default_local_currency() -> Currency {
    Currency::new("ILS")
}

/// Well-known financial entities the generators book against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Accounts {
    /// Exchange-rate differences and revaluations.
    pub exchange_rate: EntityId,
    pub bank_fees: EntityId,
    pub vat_input: EntityId,
    pub vat_output: EntityId,
    pub vat_authority: EntityId,
    pub salary_expense: EntityId,
    pub pension_expense: EntityId,
    pub income_tax_authority: EntityId,
    pub social_security_authority: EntityId,
    /// Used when a salary fact names no pension fund of its own.
    pub pension_fund: EntityId,
    pub dividend_equity: EntityId,
    pub business_trip: EntityId,
    pub deposit_interest: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_local_currency")]
    pub local_currency: Currency,
    #[serde(default = "default_epsilon")]
    pub balance_epsilon: Decimal,
    /// Entities allowed to keep a non-zero balance, e.g. suspense accounts.
    #[serde(default)]
    pub allowed_unbalanced: BTreeSet<EntityId>,
    pub accounts: Accounts,
}

impl EngineConfig {
    pub fn new(accounts: Accounts) -> Self {
        EngineConfig {
            local_currency: default_local_currency(),
            balance_epsilon: default_epsilon(),
            allowed_unbalanced: BTreeSet::new(),
            accounts,
        }
    }

    pub fn with_local_currency(mut self, currency: impl Into<Currency>) -> Self {
        self.local_currency = currency.into();
        self
    }

    pub fn with_epsilon(mut self, epsilon: Decimal) -> Self {
        self.balance_epsilon = epsilon;
        self
    }

    pub fn allow_unbalanced(mut self, entity: EntityId) -> Self {
        self.allowed_unbalanced.insert(entity);
        self
    }
}
