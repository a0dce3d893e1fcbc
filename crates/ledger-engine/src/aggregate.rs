//! Folding several raw transactions of one economic event into a single one.

use crate::Decimal;
use crate::error::{LedgerError, Result};
use crate::facts::Transaction;
use crate::record::{Currency, EntityId};
use chrono::NaiveDate;

/// A synthetic transaction standing in for its non-fee `parts`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedTransaction<'a> {
    pub amount: Decimal,
    pub currency: Currency,
    pub business_id: Option<EntityId>,
    /// Earliest event date among the parts.
    pub event_date: NaiveDate,
    /// Latest debit date, present only when every part has one.
    pub debit_date: Option<NaiveDate>,
    pub description: String,
    pub parts: Vec<&'a Transaction>,
}

impl AggregatedTransaction<'_> {
    /// Sum of the parts' absolute local amounts, each at its own frozen rate.
    pub fn local_amount(&self, local_currency: &Currency) -> Result<Decimal> {
        self.parts
            .iter()
            .map(|part| part.local_amount(local_currency))
            .sum()
    }

    pub fn value_date(&self) -> Result<NaiveDate> {
        match self.debit_date {
            Some(date) => Ok(date),
            None => {
                let missing = self
                    .parts
                    .iter()
                    .find(|part| part.debit_date.is_none())
                    .map(|part| part.id.to_string())
                    .unwrap_or_default();
                Err(LedgerError::missing(format!(
                    "transaction {missing} is missing a debit date"
                )))
            }
        }
    }

    /// The single financial account all parts moved through.
    pub fn account_entity(&self) -> Result<EntityId> {
        let mut accounts = self.parts.iter().map(|part| part.account_entity);
        let first = accounts
            .next()
            .ok_or_else(|| LedgerError::missing("array is empty"))?;
        if accounts.any(|account| account != first) {
            return Err(LedgerError::ambiguous(format!(
                "multiple accounts found in {} {} transactions",
                self.amount, self.currency
            )));
        }
        Ok(first)
    }
}

fn join_distinct<T: PartialEq + ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_distinct<T: PartialEq>(values: &mut Vec<T>, value: T) {
    if !values.contains(&value) {
        values.push(value);
    }
}

pub fn aggregate_transactions<'a>(
    transactions: impl IntoIterator<Item = &'a Transaction>,
) -> Result<AggregatedTransaction<'a>> {
    let transactions: Vec<&Transaction> = transactions.into_iter().collect();
    if transactions.is_empty() {
        return Err(LedgerError::missing("array is empty"));
    }

    let parts: Vec<&Transaction> = transactions
        .into_iter()
        .filter(|transaction| !transaction.is_fee)
        .collect();
    let Some(first) = parts.first() else {
        return Err(LedgerError::missing("all transactions are marked as fees"));
    };

    let mut currencies = Vec::new();
    let mut business_ids = Vec::new();
    for part in &parts {
        push_distinct(&mut currencies, part.currency.clone());
        if let Some(business_id) = part.business_id {
            push_distinct(&mut business_ids, business_id);
        }
    }
    if currencies.len() > 1 {
        return Err(LedgerError::ambiguous(format!(
            "multiple currencies found ({})",
            join_distinct(&currencies)
        )));
    }
    if business_ids.len() > 1 {
        return Err(LedgerError::ambiguous(format!(
            "multiple business IDs found ({})",
            join_distinct(&business_ids)
        )));
    }

    let amount = parts.iter().map(|part| part.amount).sum();
    let event_date = parts
        .iter()
        .map(|part| part.event_date)
        .min()
        .unwrap_or(first.event_date);
    let debit_date = parts
        .iter()
        .map(|part| part.debit_date)
        .collect::<Option<Vec<_>>>()
        .and_then(|dates| dates.into_iter().max());
    let description = parts
        .iter()
        .filter_map(|part| part.description.as_deref())
        .filter(|description| !description.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(AggregatedTransaction {
        amount,
        currency: first.currency.clone(),
        business_id: business_ids.first().copied(),
        event_date,
        debit_date,
        description,
        parts,
    })
}
