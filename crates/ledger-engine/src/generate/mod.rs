//! Deriving the ledger records of a charge.
//!
//! [`generate_ledger`] is the single entry point: it parses the charge type,
//! dispatches to the matching generator, validates every record and runs the
//! balance calculator over the result. Fact errors never escape as `Err`;
//! they are collected in [`GeneratedLedger::errors`] so batch callers can
//! keep going. Only an unknown charge type is returned as an error.

mod bank_deposit;
mod business_trip;
mod common;
mod conversion;
mod creditcard;
mod dividend;
mod financial;
mod internal_transfer;
mod monthly_vat;
mod salary;

use crate::Decimal;
use crate::balance::{BalanceCalculator, BalanceResult};
use crate::config::{Accounts, EngineConfig};
use crate::error::{LedgerError, Result};
use crate::facts::{Charge, ChargeType, EntityDirectory, Transaction};
use crate::record::{ChargeId, Currency, EntityId, LedgerRecord, Leg};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// `false` generates a read-only preview; `true` permits persisting the result.
    pub insert_if_not_exists: bool,
}

#[derive(Debug, Clone)]
pub struct GeneratedLedger {
    pub charge_id: ChargeId,
    pub charge_type: ChargeType,
    pub records: Vec<LedgerRecord>,
    pub balance: BalanceResult,
    pub errors: Vec<LedgerError>,
    pub options: GenerateOptions,
}

impl GeneratedLedger {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.balance.is_balanced
    }

    /// Whether a writer may store these records.
    pub fn is_persistable(&self) -> bool {
        self.options.insert_if_not_exists && self.is_valid()
    }
}

/// Outcome of one generator: records, or every fact error found.
pub(crate) type Generated = std::result::Result<Vec<LedgerRecord>, Vec<LedgerError>>;

/// Collects records and errors so a generator can report all problems at once.
#[derive(Default)]
pub(crate) struct RecordSink {
    records: Vec<LedgerRecord>,
    errors: Vec<LedgerError>,
}

impl RecordSink {
    pub fn push(&mut self, record: Result<LedgerRecord>) {
        match record {
            Ok(record) => self.records.push(record),
            Err(error) => self.errors.push(error),
        }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = LedgerRecord>) {
        self.records.extend(records);
    }

    pub fn error(&mut self, error: LedgerError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn records(&self) -> &[LedgerRecord] {
        &self.records
    }

    pub fn finish(self) -> Generated {
        if self.errors.is_empty() {
            Ok(self.records)
        } else {
            Err(self.errors)
        }
    }
}

/// Everything a generator may read.
pub(crate) struct LedgerContext<'a> {
    pub charge: &'a Charge,
    pub directory: &'a EntityDirectory,
    pub config: &'a EngineConfig,
}

impl<'a> LedgerContext<'a> {
    pub fn accounts(&self) -> &'a Accounts {
        &self.config.accounts
    }

    pub fn local_currency(&self) -> &'a Currency {
        &self.config.local_currency
    }

    pub fn epsilon(&self) -> Decimal {
        self.config.balance_epsilon
    }

    pub fn record(
        &self,
        invoice_date: NaiveDate,
        value_date: NaiveDate,
        currency: &Currency,
    ) -> LedgerRecord {
        LedgerRecord::new(
            self.charge.id,
            self.charge.owner_id,
            invoice_date,
            value_date,
            currency.clone(),
        )
    }

    /// A local-currency record dated `date` on both axes.
    pub fn local_record(&self, date: NaiveDate) -> LedgerRecord {
        self.record(date, date, self.local_currency())
    }

    pub fn to_local(
        &self,
        amount: Decimal,
        currency: &Currency,
        exchange_rate: Option<Decimal>,
        what: impl fmt::Display,
    ) -> Result<Decimal> {
        crate::facts::to_local(amount, currency, exchange_rate, self.local_currency(), what)
    }

    /// The foreign amount to record on a leg: only for non-local record currencies.
    pub fn foreign(&self, amount: Decimal, currency: &Currency) -> Option<Decimal> {
        (currency != self.local_currency()).then_some(amount)
    }

    /// Tax category of the charge, or the counterparty's default.
    pub fn tax_category(&self, business: Option<EntityId>) -> Result<EntityId> {
        if let Some(tax_category) = self.charge.tax_category_id {
            return Ok(tax_category);
        }
        let Some(business) = business else {
            return Err(LedgerError::missing(format!(
                "charge {} has no tax category and no counterparty",
                self.charge.id
            )));
        };
        self.directory
            .resolve(business)?
            .default_tax_category
            .ok_or_else(|| {
                LedgerError::missing(format!(
                    "charge {} has no tax category and {} has no default",
                    self.charge.id,
                    self.directory.name_of(business)
                ))
            })
    }

    pub fn counterparty(&self, transaction: &Transaction) -> Result<EntityId> {
        transaction.business_id.ok_or_else(|| {
            LedgerError::missing(format!(
                "transaction {} has no counterparty",
                transaction.id
            ))
        })
    }

    /// Money moving between the transaction's account and `counter`.
    pub fn settlement(&self, transaction: &Transaction, counter: EntityId) -> Result<LedgerRecord> {
        let local = transaction.local_amount(self.local_currency())?;
        let foreign = self.foreign(transaction.amount.abs(), &transaction.currency);
        let account = Leg::new(transaction.account_entity, local).with_foreign(foreign);
        let counter = Leg::new(counter, local).with_foreign(foreign);
        let record = self.record(
            transaction.event_date,
            transaction.value_date()?,
            &transaction.currency,
        );
        let record = if transaction.is_outgoing() {
            record.debit(counter).credit(account)
        } else {
            record.debit(account).credit(counter)
        };
        Ok(record
            .description(transaction.description.clone())
            .reference(transaction.reference.clone()))
    }

    pub fn fee_record(&self, transaction: &Transaction) -> Result<LedgerRecord> {
        self.settlement(transaction, self.accounts().bank_fees)
    }

    /// Fee records for every fee transaction of the charge.
    pub fn fee_records(&self, sink: &mut RecordSink) {
        for fee in self.charge.fee_transactions() {
            sink.push(self.fee_record(fee));
        }
    }

    pub fn allowed_unbalanced(&self) -> BTreeSet<EntityId> {
        allowed_unbalanced(self.directory, self.config)
    }
}

/// Entities exempt from the balance check: the configured allow-list, every
/// flagged entity and every tax category.
pub fn allowed_unbalanced(
    directory: &EntityDirectory,
    config: &EngineConfig,
) -> BTreeSet<EntityId> {
    let mut allowed = directory.balance_exempt();
    allowed.extend(config.allowed_unbalanced.iter().copied());
    allowed
}

/// Last day of the month `date` falls in.
pub(crate) fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

fn dispatch(charge_type: ChargeType, ctx: &LedgerContext<'_>) -> Generated {
    match charge_type {
        ChargeType::Common => common::generate(ctx),
        ChargeType::Financial => financial::generate(ctx),
        ChargeType::Conversion => conversion::generate(ctx),
        ChargeType::Salary => salary::generate(ctx),
        ChargeType::Dividend => dividend::generate(ctx),
        ChargeType::InternalTransfer => internal_transfer::generate(ctx),
        ChargeType::BusinessTrip => business_trip::generate(ctx),
        ChargeType::MonthlyVat => monthly_vat::generate(ctx),
        ChargeType::BankDeposit => bank_deposit::generate(ctx),
        ChargeType::CreditcardAggregation => creditcard::generate(ctx),
    }
}

/// Derive the ledger of one charge.
///
/// Returns `Err` only for an unsupported charge type. Any other problem is
/// reported through [`GeneratedLedger::errors`]; when the generator itself
/// fails the record list is empty.
pub fn generate_ledger(
    charge: &Charge,
    directory: &EntityDirectory,
    config: &EngineConfig,
    options: GenerateOptions,
) -> Result<GeneratedLedger> {
    let charge_type = charge.charge_type()?;
    let ctx = LedgerContext {
        charge,
        directory,
        config,
    };

    let mut errors = Vec::new();
    let mut records = match dispatch(charge_type, &ctx) {
        Ok(records) => records,
        Err(generator_errors) => {
            for error in &generator_errors {
                tracing::warn!(charge = %charge.id, %charge_type, "{error}");
            }
            errors = generator_errors;
            Vec::new()
        }
    };

    for record in &records {
        if let Err(error) = record.check(directory, config.balance_epsilon) {
            errors.push(error);
        }
    }
    crate::sorting::sort_records(&mut records);

    let balance = BalanceCalculator::new(config.balance_epsilon)
        .compute(&records, &ctx.allowed_unbalanced());
    if !balance.is_balanced {
        let entities = balance
            .unbalanced_entities
            .iter()
            .map(|(entity, total)| format!("{} ({})", directory.name_of(*entity), total))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::warn!(charge = %charge.id, %charge_type, "unbalanced entities: {entities}");
        errors.push(LedgerError::unbalanced(format!(
            "unbalanced entities: {entities}"
        )));
    }

    tracing::debug!(
        charge = %charge.id,
        %charge_type,
        records = records.len(),
        errors = errors.len(),
        "generated ledger"
    );

    Ok(GeneratedLedger {
        charge_id: charge.id,
        charge_type,
        records,
        balance,
        errors,
        options,
    })
}
