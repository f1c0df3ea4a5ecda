//! French (declining-balance) amortization.
//!
//! Fixed annuity per period; each row splits it into interest on the opening
//! balance and a principal remainder. Rounding residue accumulates over the
//! term and the final row absorbs it: its principal is the entire remaining
//! balance, so the schedule closes at exactly zero.

use rust_decimal::{Decimal, MathematicalOps};

use crate::loan::LoanOrigination;
use crate::schedule::{due_date_for, GeneratedSchedule, ScheduleRow};
use crate::types::{round_money, Money, Rate};
use crate::CarteraResult;

/// Fixed annuity for a principal amortized over `term_count` periods at
/// `periodic_rate`, rounded to cents.
///
/// `C = P * r * (1+r)^n / ((1+r)^n - 1)`; the zero-rate degenerate case is a
/// straight split `P / n`. `term_count` must be at least 1 (validated by the
/// callers); 0 yields 0.
pub fn annuity_payment(principal: Money, periodic_rate: Rate, term_count: u32) -> Money {
    if term_count == 0 {
        return Decimal::ZERO;
    }
    let n = Decimal::from(term_count);
    if periodic_rate.is_zero() {
        return round_money(principal / n);
    }
    let factor = (Decimal::ONE + periodic_rate).powd(n);
    round_money(principal * periodic_rate * factor / (factor - Decimal::ONE))
}

pub(crate) fn build(
    input: &LoanOrigination,
    annual_rate: Rate,
    warnings: &mut Vec<String>,
) -> CarteraResult<GeneratedSchedule> {
    let periodic_rate = input.payment_frequency.periodic_rate(annual_rate);
    let annuity = annuity_payment(input.principal, periodic_rate, input.term_count);

    if periodic_rate.is_zero() {
        warnings.push("Zero annual rate; schedule is a straight interest-free split".into());
    }

    let mut rows = Vec::with_capacity(input.term_count as usize);
    let mut balance = input.principal;
    let mut total_interest = Decimal::ZERO;
    let mut total_payable = Decimal::ZERO;

    for number in 1..=input.term_count {
        let opening = balance;
        let interest = round_money(opening * periodic_rate);

        // Final row absorbs all accumulated rounding: principal clears the
        // balance exactly instead of following the annuity split.
        let principal_part = if number == input.term_count {
            opening
        } else {
            (annuity - interest).min(opening).max(Decimal::ZERO)
        };
        let expected_amount = if number == input.term_count {
            round_money(principal_part + interest)
        } else {
            annuity
        };

        balance = round_money(opening - principal_part);
        total_interest += interest;
        total_payable += expected_amount;

        rows.push(ScheduleRow {
            installment_number: number,
            due_date: due_date_for(input.start_date, input.payment_frequency, number)?,
            opening_balance: opening,
            expected_amount,
            principal_expected: principal_part,
            interest_expected: interest,
            closing_balance: balance,
        });
    }

    Ok(GeneratedSchedule {
        rows,
        installment_amount: annuity,
        total_payable,
        total_interest,
    })
}
