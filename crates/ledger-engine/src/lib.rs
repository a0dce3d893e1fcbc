//! Deterministic double-entry ledgers for accounting charges.
//!
//! A [`facts::Charge`] with its resolved facts goes through
//! [`generate_ledger`], and the result is compared with the stored records
//! through [`reconcile()`] or [`validate_charge`].

pub mod aggregate;
pub mod balance;
pub mod config;
pub mod facts;
pub mod generate;
pub mod reconcile;
pub mod record;
pub mod store;
pub mod validate;

mod error;
mod sorting;
mod utils;

pub type Decimal = rust_decimal::Decimal;

pub use balance::{BalanceCalculator, BalanceResult, compute_balance};
pub use config::{Accounts, EngineConfig};
pub use error::{ErrorKind, LedgerError, Result};
pub use facts::{Charge, ChargeType, EntityDirectory};
pub use generate::{GenerateOptions, GeneratedLedger, generate_ledger};
pub use reconcile::{ReconcilePlan, reconcile};
pub use record::{Currency, EMPTY_ID, LedgerRecord, Leg};
pub use sorting::sort_records;
pub use store::{LedgerStore, MemoryLedgerStore, StoreError};
pub use validate::{ChargeValidation, LedgerStatus, ValidateOptions, validate_charge};
