//! Immutable inputs consumed by the generators.
//!
//! Facts are resolved by the caller before generation starts; nothing in this
//! crate fetches them lazily.

use crate::Decimal;
use crate::error::{LedgerError, Result};
use crate::record::{ChargeId, Currency, EntityId, OwnerId};
use chrono::NaiveDate;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Convert `amount` into the local currency using a frozen exchange rate.
pub fn to_local(
    amount: Decimal,
    currency: &Currency,
    exchange_rate: Option<Decimal>,
    local_currency: &Currency,
    what: impl fmt::Display,
) -> Result<Decimal> {
    if currency == local_currency {
        return Ok(amount);
    }
    match exchange_rate {
        Some(rate) => Ok(round_local(amount * rate)),
        None => Err(LedgerError::missing(format!(
            "{what} in {currency} has no exchange rate to {local_currency}"
        ))),
    }
}

/// Local amounts are kept in cents, half away from zero.
pub fn round_local(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// Financial account (a tax category entity) the money moved through.
    pub account_entity: EntityId,
    #[serde(default)]
    pub business_id: Option<EntityId>,
    /// Signed; negative amounts leave the account.
    pub amount: Decimal,
    pub currency: Currency,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub debit_date: Option<NaiveDate>,
    /// Rate to the local currency frozen at transaction time.
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub is_fee: bool,
}

impl Transaction {
    pub fn is_outgoing(&self) -> bool {
        self.amount.is_sign_negative()
    }

    pub fn value_date(&self) -> Result<NaiveDate> {
        self.debit_date.ok_or_else(|| {
            LedgerError::missing(format!("transaction {} is missing a debit date", self.id))
        })
    }

    /// Absolute amount in the local currency.
    pub fn local_amount(&self, local_currency: &Currency) -> Result<Decimal> {
        to_local(
            self.amount.abs(),
            &self.currency,
            self.exchange_rate,
            local_currency,
            format_args!("transaction {}", self.id),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Receipt,
    InvoiceReceipt,
    CreditInvoice,
    Proforma,
    Unprocessed,
}

impl DocumentKind {
    /// Receipts, proformas and unprocessed scans carry no accrual.
    pub fn is_accounting_document(self) -> bool {
        matches!(
            self,
            DocumentKind::Invoice | DocumentKind::InvoiceReceipt | DocumentKind::CreditInvoice
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub kind: DocumentKind,
    #[serde(default)]
    pub creditor_id: Option<EntityId>,
    #[serde(default)]
    pub debtor_id: Option<EntityId>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    /// Gross amount, VAT included.
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub vat: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    #[serde(default)]
    pub serial: Option<String>,
}

/// Whether the charge owner issued or received a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Income { counterparty: EntityId },
    Expense { counterparty: EntityId },
}

impl Direction {
    pub fn counterparty(self) -> EntityId {
        match self {
            Direction::Income { counterparty } | Direction::Expense { counterparty } => {
                counterparty
            }
        }
    }
}

impl Document {
    pub fn label(&self) -> String {
        match &self.serial {
            Some(serial) => format!("document {serial}"),
            None => format!("document {}", self.id),
        }
    }

    /// Direction from the owner's point of view, reversed for credit invoices.
    pub fn direction(&self, owner: OwnerId) -> Result<Direction> {
        let direction = self.issuer_direction(owner)?;
        if self.kind != DocumentKind::CreditInvoice {
            return Ok(direction);
        }
        Ok(match direction {
            Direction::Income { counterparty } => Direction::Expense { counterparty },
            Direction::Expense { counterparty } => Direction::Income { counterparty },
        })
    }

    /// `Income` when the owner issued the document, whatever its kind.
    pub fn issuer_direction(&self, owner: OwnerId) -> Result<Direction> {
        Ok(match (self.creditor_id, self.debtor_id) {
            (Some(creditor), Some(debtor)) if creditor == owner => Direction::Income {
                counterparty: debtor,
            },
            (Some(creditor), Some(debtor)) if debtor == owner => Direction::Expense {
                counterparty: creditor,
            },
            (None, _) | (_, None) => {
                return Err(LedgerError::missing(format!(
                    "{} is missing its creditor or debtor",
                    self.label()
                )));
            }
            _ => {
                return Err(LedgerError::ambiguous(format!(
                    "{} is neither issued by nor addressed to the owner",
                    self.label()
                )));
            }
        })
    }

    pub fn required_date(&self) -> Result<NaiveDate> {
        self.date
            .ok_or_else(|| LedgerError::missing(format!("{} is missing a date", self.label())))
    }

    pub fn required_amount(&self) -> Result<Decimal> {
        self.amount
            .ok_or_else(|| LedgerError::missing(format!("{} is missing an amount", self.label())))
    }

    pub fn required_currency(&self) -> Result<&Currency> {
        self.currency
            .as_ref()
            .ok_or_else(|| LedgerError::missing(format!("{} is missing a currency", self.label())))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Business,
    TaxCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialEntity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub default_tax_category: Option<EntityId>,
    #[serde(default)]
    pub is_allowed_unbalanced: bool,
}

impl FinancialEntity {
    pub fn new(id: EntityId, name: impl Into<String>, kind: EntityKind) -> Self {
        FinancialEntity {
            id,
            name: name.into(),
            kind,
            default_tax_category: None,
            is_allowed_unbalanced: false,
        }
    }

    pub fn with_tax_category(mut self, tax_category: EntityId) -> Self {
        self.default_tax_category = Some(tax_category);
        self
    }

    pub fn allowed_unbalanced(mut self) -> Self {
        self.is_allowed_unbalanced = true;
        self
    }
}

/// Pre-fetched financial entities, keyed by id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<FinancialEntity>", into = "Vec<FinancialEntity>")]
pub struct EntityDirectory {
    entities: HashMap<EntityId, FinancialEntity>,
}

impl EntityDirectory {
    pub fn insert(&mut self, entity: FinancialEntity) {
        self.entities.insert(entity.id, entity);
    }

    pub fn get(&self, id: EntityId) -> Option<&FinancialEntity> {
        self.entities.get(&id)
    }

    pub fn resolve(&self, id: EntityId) -> Result<&FinancialEntity> {
        self.get(id)
            .ok_or_else(|| LedgerError::missing(format!("unknown financial entity {id}")))
    }

    pub fn name_of(&self, id: EntityId) -> String {
        match self.get(id) {
            Some(entity) => entity.name.clone(),
            None => id.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities that may carry a balance: flagged ones and every tax category.
    pub fn balance_exempt(&self) -> BTreeSet<EntityId> {
        self.entities
            .values()
            .filter(|entity| entity.is_allowed_unbalanced || entity.kind == EntityKind::TaxCategory)
            .map(|entity| entity.id)
            .collect()
    }
}

impl FromIterator<FinancialEntity> for EntityDirectory {
    fn from_iter<T: IntoIterator<Item = FinancialEntity>>(iter: T) -> Self {
        let mut directory = EntityDirectory::default();
        for entity in iter {
            directory.insert(entity);
        }
        directory
    }
}

impl From<Vec<FinancialEntity>> for EntityDirectory {
    fn from(entities: Vec<FinancialEntity>) -> Self {
        entities.into_iter().collect()
    }
}

impl From<EntityDirectory> for Vec<FinancialEntity> {
    fn from(directory: EntityDirectory) -> Self {
        let mut entities: Vec<_> = directory.entities.into_values().collect();
        entities.sort_by_key(|entity| entity.id);
        entities
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalaryFact {
    pub employee_id: EntityId,
    /// Any day within the salary month.
    pub month: NaiveDate,
    pub gross: Decimal,
    pub net: Decimal,
    #[serde(default)]
    pub income_tax: Decimal,
    #[serde(default)]
    pub social_security_employee: Decimal,
    #[serde(default)]
    pub social_security_employer: Decimal,
    #[serde(default)]
    pub pension_employee: Decimal,
    #[serde(default)]
    pub pension_employer: Decimal,
    #[serde(default)]
    pub pension_fund_id: Option<EntityId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DividendFact {
    #[serde(default)]
    pub declared_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeExpense {
    pub employee_id: EntityId,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessTripFact {
    pub attendees: Vec<EntityId>,
    #[serde(default)]
    pub employee_expenses: Vec<EmployeeExpense>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VatPeriodFact {
    /// Any day within the reported month.
    pub month: NaiveDate,
    #[serde(default)]
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevaluationFact {
    pub account_entity: EntityId,
    pub date: NaiveDate,
    /// Signed local-currency change; positive is a gain.
    pub local_amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
}

/// Closed set of charge types; every variant has exactly one generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChargeType {
    Common,
    Financial,
    Conversion,
    Salary,
    Dividend,
    InternalTransfer,
    BusinessTrip,
    MonthlyVat,
    BankDeposit,
    CreditcardAggregation,
}

impl ChargeType {
    pub const ALL: [ChargeType; 10] = [
        ChargeType::Common,
        ChargeType::Financial,
        ChargeType::Conversion,
        ChargeType::Salary,
        ChargeType::Dividend,
        ChargeType::InternalTransfer,
        ChargeType::BusinessTrip,
        ChargeType::MonthlyVat,
        ChargeType::BankDeposit,
        ChargeType::CreditcardAggregation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChargeType::Common => "common",
            ChargeType::Financial => "financial",
            ChargeType::Conversion => "conversion",
            ChargeType::Salary => "salary",
            ChargeType::Dividend => "dividend",
            ChargeType::InternalTransfer => "internal_transfer",
            ChargeType::BusinessTrip => "business_trip",
            ChargeType::MonthlyVat => "monthly_vat",
            ChargeType::BankDeposit => "bank_deposit",
            ChargeType::CreditcardAggregation => "creditcard_aggregation",
        }
    }
}

impl fmt::Display for ChargeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChargeType {
    type Err = LedgerError;

    /// Accepts `internal_transfer`, `InternalTransfer`, `INTERNAL-TRANSFER`
    /// and the `...Charge` suffixed forms.
    fn from_str(tag: &str) -> Result<Self> {
        let normalized: String = tag
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        let normalized = normalized.strip_suffix("charge").unwrap_or(&normalized);

        ChargeType::ALL
            .into_iter()
            .find(|kind| kind.as_str().replace('_', "") == normalized)
            .ok_or_else(|| LedgerError::UnsupportedType(tag.to_owned()))
    }
}

/// The unit of reconciliation with all of its facts already resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    pub id: ChargeId,
    pub owner_id: OwnerId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tax_category_id: Option<EntityId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub salaries: Vec<SalaryFact>,
    #[serde(default)]
    pub dividend: Option<DividendFact>,
    #[serde(default)]
    pub business_trip: Option<BusinessTripFact>,
    #[serde(default)]
    pub vat_period: Option<VatPeriodFact>,
    #[serde(default)]
    pub revaluations: Vec<RevaluationFact>,
}

impl Charge {
    pub fn new(id: ChargeId, owner_id: OwnerId, kind: ChargeType) -> Self {
        Charge {
            id,
            owner_id,
            kind: kind.as_str().to_owned(),
            tax_category_id: None,
            description: None,
            transactions: Vec::new(),
            documents: Vec::new(),
            salaries: Vec::new(),
            dividend: None,
            business_trip: None,
            vat_period: None,
            revaluations: Vec::new(),
        }
    }

    pub fn charge_type(&self) -> Result<ChargeType> {
        self.kind.parse()
    }

    pub fn non_fee_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|transaction| !transaction.is_fee)
    }

    pub fn fee_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|transaction| transaction.is_fee)
    }
}
