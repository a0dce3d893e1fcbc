//! Business trips: expenses paid by attendees, their reimbursement and direct vendor payments.

use super::{Generated, LedgerContext, RecordSink};
use crate::Decimal;
use crate::aggregate::aggregate_transactions;
use crate::error::{LedgerError, Result};
use crate::facts::{BusinessTripFact, EmployeeExpense, Transaction};
use crate::record::{EntityId, LedgerRecord, Leg};

pub(super) fn generate(ctx: &LedgerContext<'_>) -> Generated {
    let charge = ctx.charge;
    let Some(trip) = &charge.business_trip else {
        return Err(vec![LedgerError::missing(format!(
            "business trip charge {} has no trip details",
            charge.id
        ))]);
    };

    let mut sink = RecordSink::default();
    for expense in &trip.employee_expenses {
        if !trip.attendees.contains(&expense.employee_id) {
            sink.error(LedgerError::ambiguous(format!(
                "{} paid a trip expense on {} but is not an attendee",
                ctx.directory.name_of(expense.employee_id),
                expense.date
            )));
        }
    }
    if sink.has_errors() {
        return sink.finish();
    }

    for attendee in &trip.attendees {
        let records = [
            attendee_accrual(ctx, trip, *attendee),
            reimbursement(ctx, *attendee),
        ];
        for record in records.into_iter().flatten() {
            sink.push(record);
        }
    }
    for transaction in charge.non_fee_transactions() {
        let paid_attendee = transaction
            .business_id
            .is_some_and(|business| trip.attendees.contains(&business));
        if !paid_attendee {
            sink.push(ctx.settlement(transaction, ctx.accounts().business_trip));
        }
    }
    ctx.fee_records(&mut sink);
    sink.finish()
}

fn expense_local(ctx: &LedgerContext<'_>, expense: &EmployeeExpense) -> Result<Decimal> {
    ctx.to_local(
        expense.amount.abs(),
        &expense.currency,
        expense.exchange_rate,
        format_args!(
            "expense of {} on {}",
            ctx.directory.name_of(expense.employee_id),
            expense.date
        ),
    )
}

/// Everything one attendee paid out of pocket, as a single local-currency record.
fn attendee_accrual(
    ctx: &LedgerContext<'_>,
    trip: &BusinessTripFact,
    attendee: EntityId,
) -> Option<Result<LedgerRecord>> {
    let expenses: Vec<&EmployeeExpense> = trip
        .employee_expenses
        .iter()
        .filter(|expense| expense.employee_id == attendee)
        .collect();
    let date = expenses.iter().map(|expense| expense.date).max()?;

    let total = expenses
        .iter()
        .map(|expense| expense_local(ctx, expense))
        .sum::<Result<Decimal>>();
    Some(total.map(|total| {
        ctx.local_record(date)
            .debit(Leg::new(ctx.accounts().business_trip, total))
            .credit(Leg::new(attendee, total))
            .description(Some(format!(
                "trip expenses of {}",
                ctx.directory.name_of(attendee)
            )))
    }))
}

/// All transfers to one attendee folded into one repayment.
fn reimbursement(ctx: &LedgerContext<'_>, attendee: EntityId) -> Option<Result<LedgerRecord>> {
    let transfers: Vec<&Transaction> = ctx
        .charge
        .non_fee_transactions()
        .filter(|transaction| transaction.business_id == Some(attendee))
        .collect();
    if transfers.is_empty() {
        return None;
    }

    let record = aggregate_transactions(transfers).and_then(|aggregated| {
        let local = aggregated.local_amount(ctx.local_currency())?;
        let foreign = ctx.foreign(aggregated.amount.abs(), &aggregated.currency);
        let account = Leg::new(aggregated.account_entity()?, local).with_foreign(foreign);
        let employee = Leg::new(attendee, local).with_foreign(foreign);
        let record = ctx
            .record(
                aggregated.event_date,
                aggregated.value_date()?,
                &aggregated.currency,
            )
            .description(Some(aggregated.description.clone()).filter(|text| !text.is_empty()));
        Ok(if aggregated.amount.is_sign_negative() {
            record.debit(employee).credit(account)
        } else {
            record.debit(account).credit(employee)
        })
    });
    Some(record)
}
