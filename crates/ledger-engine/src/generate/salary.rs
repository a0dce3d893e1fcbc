//! Monthly payroll: accruals per employee and the payments settling them.

use super::{Generated, LedgerContext, RecordSink, month_end};
use crate::Decimal;
use crate::error::{LedgerError, Result};
use crate::facts::SalaryFact;
use crate::record::{EntityId, LedgerRecord, Leg};

pub(super) fn generate(ctx: &LedgerContext<'_>) -> Generated {
    let charge = ctx.charge;
    if charge.salaries.is_empty() {
        return Err(vec![LedgerError::missing(format!(
            "salary charge {} has no salary records",
            charge.id
        ))]);
    }

    let mut sink = RecordSink::default();
    for salary in &charge.salaries {
        match accruals(ctx, salary) {
            Ok(records) => sink.extend(records),
            Err(error) => sink.error(error),
        }
    }
    for payment in charge.non_fee_transactions() {
        sink.push(
            ctx.counterparty(payment)
                .and_then(|payee| ctx.settlement(payment, payee)),
        );
    }
    ctx.fee_records(&mut sink);
    sink.finish()
}

fn check_components(ctx: &LedgerContext<'_>, salary: &SalaryFact) -> Result<()> {
    let deductions = salary.net
        + salary.income_tax
        + salary.social_security_employee
        + salary.pension_employee;
    if salary.gross != deductions {
        return Err(LedgerError::ambiguous(format!(
            "salary of {} for {} does not add up: gross {} vs {}",
            ctx.directory.name_of(salary.employee_id),
            salary.month.format("%Y-%m"),
            salary.gross,
            deductions
        )));
    }
    Ok(())
}

/// Month-end record of up to two legs per side. Zero legs are dropped, and so
/// is a record left with an empty side.
fn split_record(
    ctx: &LedgerContext<'_>,
    salary: &SalaryFact,
    debits: [(EntityId, Decimal); 2],
    credits: [(EntityId, Decimal); 2],
) -> Option<LedgerRecord> {
    let date = month_end(salary.month);
    let mut debits = debits
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(entity, amount)| Leg::new(entity, amount));
    let mut credits = credits
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(entity, amount)| Leg::new(entity, amount));

    let mut record = ctx
        .local_record(date)
        .debit(debits.next()?)
        .credit(credits.next()?)
        .description(Some(format!(
            "salary {} {}",
            ctx.directory.name_of(salary.employee_id),
            salary.month.format("%Y-%m")
        )));
    record.debit[1] = debits.next();
    record.credit[1] = credits.next();
    Some(record)
}

fn accruals(ctx: &LedgerContext<'_>, salary: &SalaryFact) -> Result<Vec<LedgerRecord>> {
    check_components(ctx, salary)?;
    let accounts = ctx.accounts();
    let pension_fund = salary.pension_fund_id.unwrap_or(accounts.pension_fund);

    let records = [
        split_record(
            ctx,
            salary,
            [
                (accounts.salary_expense, salary.net + salary.income_tax),
                (accounts.salary_expense, Decimal::ZERO),
            ],
            [
                (salary.employee_id, salary.net),
                (accounts.income_tax_authority, salary.income_tax),
            ],
        ),
        split_record(
            ctx,
            salary,
            [
                (
                    accounts.salary_expense,
                    salary.social_security_employee + salary.social_security_employer,
                ),
                (accounts.salary_expense, Decimal::ZERO),
            ],
            [
                (
                    accounts.social_security_authority,
                    salary.social_security_employee + salary.social_security_employer,
                ),
                (accounts.social_security_authority, Decimal::ZERO),
            ],
        ),
        split_record(
            ctx,
            salary,
            [
                (accounts.salary_expense, salary.pension_employee),
                (accounts.pension_expense, salary.pension_employer),
            ],
            [
                (
                    pension_fund,
                    salary.pension_employee + salary.pension_employer,
                ),
                (pension_fund, Decimal::ZERO),
            ],
        ),
    ];
    Ok(records.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use crate::facts::{ChargeType, SalaryFact};
    use crate::generate::tests::*;
    use rust_decimal_macros::dec;

    fn alice() -> SalaryFact {
        SalaryFact {
            employee_id: ALICE,
            month: date(3, 1),
            gross: dec!(10000),
            net: dec!(7500),
            income_tax: dec!(1500),
            social_security_employee: dec!(400),
            social_security_employer: dec!(350),
            pension_employee: dec!(600),
            pension_employer: dec!(650),
            pension_fund_id: None,
        }
    }

    fn payroll() -> crate::facts::Charge {
        let mut charge = charge(ChargeType::Salary);
        charge.salaries.push(alice());
        charge.transactions = vec![
            transaction(1, BANK_ILS, Some(ALICE), dec!(-7500), "ILS", 9),
            transaction(2, BANK_ILS, Some(TAX_AUTHORITY), dec!(-1500), "ILS", 15),
            transaction(3, BANK_ILS, Some(SOCIAL_SECURITY), dec!(-750), "ILS", 15),
            transaction(4, BANK_ILS, Some(PENSION_FUND), dec!(-1250), "ILS", 15),
        ];
        charge
    }

    #[test]
    fn accruals_and_payments_balance() {
        insta::assert_snapshot!(render(&payroll()), @r#"
        2024-03-09 2024-03-10 ILS
          Dr Alice	7500.00
          Cr Bank ILS	7500.00
        2024-03-15 2024-03-16 ILS
          Dr Tax authority	1500.00
          Cr Bank ILS	1500.00
        2024-03-15 2024-03-16 ILS
          Dr Social security	750.00
          Cr Bank ILS	750.00
        2024-03-15 2024-03-16 ILS
          Dr Pension fund	1250.00
          Cr Bank ILS	1250.00
        2024-03-31 2024-03-31 ILS "salary Alice 2024-03"
          Dr Salaries	9000.00
          Cr Alice	7500.00
          Cr Tax authority	1500.00
        2024-03-31 2024-03-31 ILS "salary Alice 2024-03"
          Dr Salaries	750.00
          Cr Social security	750.00
        2024-03-31 2024-03-31 ILS "salary Alice 2024-03"
          Dr Salaries	600.00
          Dr Pensions	650.00
          Cr Pension fund	1250.00
        "#);
    }

    #[test]
    fn zero_components_drop_their_records() {
        let mut charge = charge(ChargeType::Salary);
        charge.salaries.push(SalaryFact {
            income_tax: dec!(0),
            social_security_employee: dec!(0),
            social_security_employer: dec!(0),
            pension_employee: dec!(0),
            pension_employer: dec!(0),
            gross: dec!(7500),
            ..alice()
        });
        charge
            .transactions
            .push(transaction(1, BANK_ILS, Some(ALICE), dec!(-7500), "ILS", 9));
        let ledger = generate(&charge);
        assert!(ledger.is_valid());
        assert_eq!(ledger.records.len(), 2);
        assert!(ledger.records[1].credit[1].is_none());
    }

    #[test]
    fn unpaid_salary_leaves_the_employee_unbalanced() {
        let mut charge = payroll();
        charge.transactions.remove(0);
        let ledger = generate(&charge);
        assert!(!ledger.balance.is_balanced);
        assert_eq!(ledger.balance.unbalanced_entities[&ALICE], dec!(7500));
    }

    #[test]
    fn inconsistent_gross_is_rejected() {
        let mut charge = payroll();
        charge.salaries[0].gross = dec!(10001);
        assert_eq!(
            error_messages(&charge),
            vec!["salary of Alice for 2024-03 does not add up: gross 10001 vs 10000"]
        );
    }

    #[test]
    fn payment_without_payee_is_reported() {
        let mut charge = payroll();
        charge.transactions[0].business_id = None;
        assert_eq!(
            error_messages(&charge),
            vec![format!(
                "transaction {} has no counterparty",
                uuid::Uuid::from_u128(1)
            )]
        );
    }

    #[test]
    fn missing_salary_records_fail() {
        let charge = charge(ChargeType::Salary);
        assert_eq!(
            error_messages(&charge),
            vec![format!("salary charge {CHARGE} has no salary records")]
        );
    }
}
