//! Flat-rate ("fixed charge") schedules.
//!
//! The finance charge is agreed once at origination and added to the
//! principal; the sum is split into identical installments. Nothing ever
//! recalculates the charge: early payment, late payment and reversal all
//! leave total_payable untouched.

use rust_decimal::Decimal;

use crate::loan::LoanOrigination;
use crate::schedule::{due_date_for, GeneratedSchedule, ScheduleRow};
use crate::types::{round_money, Money};
use crate::CarteraResult;

pub(crate) fn build(
    input: &LoanOrigination,
    finance_charge: Money,
    warnings: &mut Vec<String>,
) -> CarteraResult<GeneratedSchedule> {
    let n = Decimal::from(input.term_count);
    let total_payable = input.principal + finance_charge;
    let installment_amount = round_money(total_payable / n);

    // Reporting split only; collection always moves in whole installments.
    let principal_per_installment = round_money(input.principal / n);
    let interest_per_installment = round_money(finance_charge / n);

    let collected_over_term = installment_amount * n;
    if collected_over_term != total_payable {
        warnings.push(format!(
            "Rounded installment drifts {} from total payable over the term",
            (collected_over_term - total_payable).abs()
        ));
    }

    let mut rows = Vec::with_capacity(input.term_count as usize);
    let mut balance = total_payable;

    for number in 1..=input.term_count {
        let opening = balance;
        balance = (balance - installment_amount).max(Decimal::ZERO);

        rows.push(ScheduleRow {
            installment_number: number,
            due_date: due_date_for(input.start_date, input.payment_frequency, number)?,
            opening_balance: opening,
            expected_amount: installment_amount,
            principal_expected: principal_per_installment,
            interest_expected: interest_per_installment,
            closing_balance: balance,
        });
    }

    Ok(GeneratedSchedule {
        rows,
        installment_amount,
        total_payable,
        total_interest: finance_charge,
    })
}
