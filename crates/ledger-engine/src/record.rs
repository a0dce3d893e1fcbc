//! The double-entry ledger record and the identifiers it refers to.

use crate::Decimal;
use crate::error::{LedgerError, Result};
use crate::facts::EntityDirectory;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type RecordId = Uuid;
pub type EntityId = Uuid;
pub type ChargeId = Uuid;
pub type OwnerId = Uuid;

/// Identity of a record that has not been persisted yet.
pub const EMPTY_ID: RecordId = Uuid::nil();

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: impl Into<String>) -> Self {
        Currency(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Currency::new(code)
    }
}

impl From<String> for Currency {
    fn from(code: String) -> Self {
        Currency::new(code)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Debit,
    Credit,
}

/// One `(entity, foreign amount, local amount)` triple on either side of a record.
///
/// Amounts are always non-negative; the side determines the direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub entity: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_amount: Option<Decimal>,
    pub local_amount: Decimal,
}

impl Leg {
    pub fn new(entity: EntityId, local_amount: Decimal) -> Self {
        Leg {
            entity,
            foreign_amount: None,
            local_amount,
        }
    }

    pub fn with_foreign(mut self, foreign_amount: Option<Decimal>) -> Self {
        self.foreign_amount = foreign_amount;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    #[serde(default)]
    pub id: RecordId,
    pub charge_id: ChargeId,
    pub owner_id: OwnerId,
    pub invoice_date: NaiveDate,
    pub value_date: NaiveDate,
    #[serde(default)]
    pub debit: [Option<Leg>; 2],
    #[serde(default)]
    pub credit: [Option<Leg>; 2],
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference1: Option<String>,
}

impl LedgerRecord {
    /// An unpersisted record without legs.
    pub fn new(
        charge_id: ChargeId,
        owner_id: OwnerId,
        invoice_date: NaiveDate,
        value_date: NaiveDate,
        currency: Currency,
    ) -> Self {
        LedgerRecord {
            id: EMPTY_ID,
            charge_id,
            owner_id,
            invoice_date,
            value_date,
            debit: [None, None],
            credit: [None, None],
            currency,
            description: None,
            reference1: None,
        }
    }

    pub fn debit(mut self, leg: Leg) -> Self {
        self.debit[0] = Some(leg);
        self
    }

    pub fn debit2(mut self, leg: Leg) -> Self {
        self.debit[1] = Some(leg);
        self
    }

    pub fn credit(mut self, leg: Leg) -> Self {
        self.credit[0] = Some(leg);
        self
    }

    pub fn credit2(mut self, leg: Leg) -> Self {
        self.credit[1] = Some(leg);
        self
    }

    pub fn description(mut self, description: Option<impl Into<String>>) -> Self {
        self.description = description.map(Into::into);
        self
    }

    pub fn reference(mut self, reference: Option<impl Into<String>>) -> Self {
        self.reference1 = reference.map(Into::into);
        self
    }

    pub fn is_persisted(&self) -> bool {
        self.id != EMPTY_ID
    }

    pub fn legs(&self) -> impl Iterator<Item = (Side, &Leg)> {
        let debits = self.debit.iter().flatten().map(|leg| (Side::Debit, leg));
        let credits = self.credit.iter().flatten().map(|leg| (Side::Credit, leg));
        debits.chain(credits)
    }

    pub fn debit_local_total(&self) -> Decimal {
        self.debit.iter().flatten().map(|leg| leg.local_amount).sum()
    }

    pub fn credit_local_total(&self) -> Decimal {
        self.credit.iter().flatten().map(|leg| leg.local_amount).sum()
    }

    /// Structural validity: both sides populated, every entity known and the
    /// local totals equal within `epsilon`.
    pub fn check(&self, directory: &EntityDirectory, epsilon: Decimal) -> Result<()> {
        if self.debit.iter().all(Option::is_none) || self.credit.iter().all(Option::is_none) {
            return Err(LedgerError::unbalanced(format!(
                "record dated {} has an empty {} side",
                self.invoice_date,
                if self.debit.iter().all(Option::is_none) {
                    "debit"
                } else {
                    "credit"
                }
            )));
        }
        for (_, leg) in self.legs() {
            directory.resolve(leg.entity)?;
        }

        let debit = self.debit_local_total();
        let credit = self.credit_local_total();
        if (debit - credit).abs() > epsilon {
            return Err(LedgerError::unbalanced(format!(
                "record dated {} does not balance: debit {} vs credit {}",
                self.invoice_date, debit, credit
            )));
        }
        Ok(())
    }

    /// Render the record with entity names resolved through `directory`.
    pub fn display<'a>(&'a self, directory: &'a EntityDirectory) -> RecordDisplay<'a> {
        RecordDisplay {
            record: self,
            directory,
        }
    }
}

pub struct RecordDisplay<'a> {
    record: &'a LedgerRecord,
    directory: &'a EntityDirectory,
}

impl fmt::Display for RecordDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.record;
        write!(
            f,
            "{} {} {}",
            record.invoice_date, record.value_date, record.currency
        )?;
        if let Some(description) = &record.description {
            write!(f, " \"{}\"", description)?;
        }
        if let Some(reference) = &record.reference1 {
            write!(f, " #{}", reference)?;
        }
        for (side, leg) in record.legs() {
            let marker = match side {
                Side::Debit => "Dr",
                Side::Credit => "Cr",
            };
            write!(
                f,
                "\n  {} {}\t{:.2}",
                marker,
                self.directory.name_of(leg.entity),
                leg.local_amount
            )?;
            if let Some(foreign) = leg.foreign_amount {
                write!(f, " ({:.2} {})", foreign, record.currency)?;
            }
        }
        Ok(())
    }
}
