//! Repayment schedule generation.
//!
//! Pure calculators: nothing here touches a store. Origination runs these to
//! derive the installment amount and total payable before persisting; the CLI
//! runs them to preview a table.

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::CarteraError;
use crate::loan::{LoanOrigination, LoanTerms};
use crate::types::*;
use crate::CarteraResult;

mod flat_rate;
mod french;

pub use french::annuity_payment;

/// One row of a generated schedule, before persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub opening_balance: Money,
    pub expected_amount: Money,
    pub principal_expected: Money,
    pub interest_expected: Money,
    pub closing_balance: Money,
}

/// A complete generated schedule with its derived loan figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSchedule {
    pub rows: Vec<ScheduleRow>,
    /// The per-installment collection amount.
    pub installment_amount: Money,
    /// Principal plus all finance cost over the life of the loan.
    pub total_payable: Money,
    pub total_interest: Money,
}

/// Build the full repayment schedule for an origination request.
///
/// Dispatches on the pricing regime. Validation failures reject the request
/// before any figure is derived; the loan must never exist with bad terms.
pub fn generate_schedule(
    input: &LoanOrigination,
) -> CarteraResult<ComputationOutput<GeneratedSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_origination(input)?;

    let schedule = match input.terms {
        LoanTerms::French { annual_rate } => french::build(input, annual_rate, &mut warnings)?,
        LoanTerms::FlatRate { finance_charge } => {
            flat_rate::build(input, finance_charge, &mut warnings)?
        }
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Installment Schedule Generator",
        &serde_json::json!({
            "regime": regime_name(&input.terms),
            "principal": input.principal.to_string(),
            "term_count": input.term_count,
            "frequency": input.payment_frequency,
            "start_date": input.start_date,
        }),
        warnings,
        elapsed,
        schedule,
    ))
}

/// Reject origination requests with unusable terms.
pub fn validate_origination(input: &LoanOrigination) -> CarteraResult<()> {
    if input.principal <= Money::ZERO {
        return Err(CarteraError::InvalidLoanTerms {
            field: "principal".into(),
            reason: "Principal must be positive".into(),
        });
    }
    if input.term_count == 0 {
        return Err(CarteraError::InvalidLoanTerms {
            field: "term_count".into(),
            reason: "Term count must be at least 1".into(),
        });
    }
    match input.terms {
        LoanTerms::French { annual_rate } => {
            if annual_rate < Rate::ZERO {
                return Err(CarteraError::InvalidLoanTerms {
                    field: "annual_rate".into(),
                    reason: "Annual rate cannot be negative".into(),
                });
            }
        }
        LoanTerms::FlatRate { finance_charge } => {
            if finance_charge < Money::ZERO {
                return Err(CarteraError::InvalidLoanTerms {
                    field: "finance_charge".into(),
                    reason: "Finance charge cannot be negative".into(),
                });
            }
        }
    }
    Ok(())
}

/// Due date of installment `installment_number` on the grid anchored at
/// `start` (number 0 is the start date itself).
///
/// Monthly grids keep the origination day-of-month, clamping only in the
/// months that are too short: a loan started Jan 31 falls due Feb 28/29 and
/// then Mar 31 again. Each date is computed from the anchor, never by
/// stepping a previously clamped date.
pub fn due_date_for(
    start: NaiveDate,
    frequency: PaymentFrequency,
    installment_number: u32,
) -> CarteraResult<NaiveDate> {
    let date = match frequency {
        PaymentFrequency::Daily => {
            start.checked_add_signed(Duration::days(i64::from(installment_number)))
        }
        PaymentFrequency::Weekly => {
            start.checked_add_signed(Duration::days(7 * i64::from(installment_number)))
        }
        PaymentFrequency::Biweekly => {
            start.checked_add_signed(Duration::days(14 * i64::from(installment_number)))
        }
        PaymentFrequency::Monthly => start.checked_add_months(Months::new(installment_number)),
    };
    date.ok_or_else(|| CarteraError::InvalidLoanTerms {
        field: "start_date".into(),
        reason: format!("Due date overflows the calendar at installment {installment_number}"),
    })
}

fn regime_name(terms: &LoanTerms) -> &'static str {
    match terms {
        LoanTerms::French { .. } => "FRENCH",
        LoanTerms::FlatRate { .. } => "FLAT_RATE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flat_origination() -> LoanOrigination {
        LoanOrigination {
            client_id: Uuid::new_v4(),
            principal: dec!(10000),
            terms: LoanTerms::FlatRate {
                finance_charge: dec!(3500),
            },
            payment_frequency: PaymentFrequency::Daily,
            term_count: 45,
            start_date: d(2024, 6, 1),
        }
    }

    #[test]
    fn test_rejects_non_positive_principal() {
        let mut input = flat_origination();
        input.principal = Money::ZERO;
        let err = generate_schedule(&input).unwrap_err();
        assert_eq!(err.code(), "INVALID_LOAN_TERMS");

        input.principal = dec!(-500);
        assert!(generate_schedule(&input).is_err());
    }

    #[test]
    fn test_rejects_zero_term_count() {
        let mut input = flat_origination();
        input.term_count = 0;
        let err = generate_schedule(&input).unwrap_err();
        assert_eq!(err.code(), "INVALID_LOAN_TERMS");
    }

    #[test]
    fn test_rejects_negative_rate_and_charge() {
        let mut input = flat_origination();
        input.terms = LoanTerms::French {
            annual_rate: dec!(-0.05),
        };
        assert!(generate_schedule(&input).is_err());

        input.terms = LoanTerms::FlatRate {
            finance_charge: dec!(-1),
        };
        assert!(generate_schedule(&input).is_err());
    }

    #[test]
    fn test_daily_grid() {
        let start = d(2024, 6, 1);
        assert_eq!(
            due_date_for(start, PaymentFrequency::Daily, 1).unwrap(),
            d(2024, 6, 2)
        );
        assert_eq!(
            due_date_for(start, PaymentFrequency::Daily, 45).unwrap(),
            d(2024, 7, 16)
        );
    }

    #[test]
    fn test_weekly_and_biweekly_grids() {
        let start = d(2024, 3, 14);
        assert_eq!(
            due_date_for(start, PaymentFrequency::Weekly, 1).unwrap(),
            d(2024, 3, 21)
        );
        assert_eq!(
            due_date_for(start, PaymentFrequency::Weekly, 4).unwrap(),
            d(2024, 4, 11)
        );
        assert_eq!(
            due_date_for(start, PaymentFrequency::Biweekly, 2).unwrap(),
            d(2024, 4, 11)
        );
    }

    #[test]
    fn test_monthly_grid_keeps_anchor_day_after_clamp() {
        // Jan 31 grid: the February date clamps, March returns to the 31st
        let start = d(2024, 1, 31);
        assert_eq!(
            due_date_for(start, PaymentFrequency::Monthly, 1).unwrap(),
            d(2024, 2, 29)
        );
        assert_eq!(
            due_date_for(start, PaymentFrequency::Monthly, 2).unwrap(),
            d(2024, 3, 31)
        );
        assert_eq!(
            due_date_for(start, PaymentFrequency::Monthly, 3).unwrap(),
            d(2024, 4, 30)
        );
    }

    #[test]
    fn test_grid_number_zero_is_the_start() {
        let start = d(2024, 5, 10);
        for freq in [
            PaymentFrequency::Daily,
            PaymentFrequency::Weekly,
            PaymentFrequency::Biweekly,
            PaymentFrequency::Monthly,
        ] {
            assert_eq!(due_date_for(start, freq, 0).unwrap(), start);
        }
    }

    #[test]
    fn test_envelope_carries_regime_assumption() {
        let output = generate_schedule(&flat_origination()).unwrap();
        assert_eq!(output.result.rows.len(), 45);
        assert_eq!(output.assumptions["regime"], "FLAT_RATE");
        assert_eq!(output.assumptions["term_count"], 45);
    }
}
