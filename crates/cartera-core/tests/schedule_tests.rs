use cartera_core::loan::{LoanOrigination, LoanTerms};
use cartera_core::payment::distribution::{calculate_distribution, DistributionInput};
use cartera_core::schedule::{due_date_for, generate_schedule};
use cartera_core::PaymentFrequency;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn origination(
    principal: Decimal,
    terms: LoanTerms,
    frequency: PaymentFrequency,
    term_count: u32,
    start: NaiveDate,
) -> LoanOrigination {
    LoanOrigination {
        client_id: Uuid::new_v4(),
        principal,
        terms,
        payment_frequency: frequency,
        term_count,
        start_date: start,
    }
}

/// 10000 financed at a fixed 3500 charge over 45 daily installments.
fn daily_microloan() -> LoanOrigination {
    origination(
        dec!(10000),
        LoanTerms::FlatRate {
            finance_charge: dec!(3500),
        },
        PaymentFrequency::Daily,
        45,
        d(2024, 6, 1),
    )
}

/// 10000 at 24% nominal annual over 12 monthly annuities.
fn monthly_consumer_loan() -> LoanOrigination {
    origination(
        dec!(10000),
        LoanTerms::French {
            annual_rate: dec!(0.24),
        },
        PaymentFrequency::Monthly,
        12,
        d(2024, 1, 15),
    )
}

// ===========================================================================
// Flat-rate schedule tests
// ===========================================================================

#[test]
fn test_flat_known_answer_daily_microloan() {
    let result = generate_schedule(&daily_microloan()).unwrap();
    let schedule = &result.result;

    // (10000 + 3500) / 45 = 300.00
    assert_eq!(schedule.installment_amount, dec!(300.00));
    assert_eq!(schedule.total_payable, dec!(13500));
    assert_eq!(schedule.total_interest, dec!(3500));
    assert_eq!(schedule.rows.len(), 45);

    // Daily grid: first row one day after funding, last 45 days after
    assert_eq!(schedule.rows[0].due_date, d(2024, 6, 2));
    assert_eq!(schedule.rows[44].due_date, d(2024, 7, 16));

    // Every row carries the same split: 10000/45 and 3500/45
    for row in &schedule.rows {
        assert_eq!(row.expected_amount, dec!(300.00));
        assert_eq!(row.principal_expected, dec!(222.22));
        assert_eq!(row.interest_expected, dec!(77.78));
    }

    // The balance walks from total payable down to exactly zero
    assert_eq!(schedule.rows[0].opening_balance, dec!(13500));
    assert_eq!(schedule.rows[0].closing_balance, dec!(13200.00));
    assert_eq!(schedule.rows[44].closing_balance, dec!(0.00));
    assert!(result.warnings.is_empty());
}

#[test]
fn test_flat_installment_sum_matches_total_within_rounding() {
    // (principal, charge, terms): the middle case carries the worst
    // per-row rounding this shape can produce
    let cases = [
        (dec!(1000), dec!(300), 3u32),
        (dec!(997), dec!(251), 7u32),
        (dec!(10), dec!(5), 4u32),
    ];

    for (principal, charge, terms) in cases {
        let result = generate_schedule(&origination(
            principal,
            LoanTerms::FlatRate {
                finance_charge: charge,
            },
            PaymentFrequency::Daily,
            terms,
            d(2024, 6, 1),
        ))
        .unwrap();
        let schedule = &result.result;

        let sum: Decimal = schedule.rows.iter().map(|r| r.expected_amount).sum();
        let drift = (sum - schedule.total_payable).abs();
        // Identical rounding on each row bounds drift at half a cent per row
        let bound = Decimal::new(5, 3) * Decimal::from(terms);
        assert!(
            drift <= bound,
            "drift {drift} exceeds {bound} for {principal}/{charge}/{terms}"
        );
        if drift > Decimal::ZERO {
            assert!(
                !result.warnings.is_empty(),
                "rounding drift must be surfaced as a warning"
            );
        }
    }
}

#[test]
fn test_flat_monthly_grid_keeps_anchor_day() {
    let result = generate_schedule(&origination(
        dec!(4000),
        LoanTerms::FlatRate {
            finance_charge: dec!(800),
        },
        PaymentFrequency::Monthly,
        4,
        d(2024, 1, 31),
    ))
    .unwrap();

    let dues: Vec<NaiveDate> = result.result.rows.iter().map(|r| r.due_date).collect();
    // A short month clamps that one due date; the 31st comes back afterwards
    assert_eq!(
        dues,
        vec![d(2024, 2, 29), d(2024, 3, 31), d(2024, 4, 30), d(2024, 5, 31)]
    );
}

#[test]
fn test_flat_weekly_and_biweekly_grids() {
    let weekly = generate_schedule(&origination(
        dec!(900),
        LoanTerms::FlatRate {
            finance_charge: dec!(90),
        },
        PaymentFrequency::Weekly,
        3,
        d(2024, 6, 1),
    ))
    .unwrap();
    let dues: Vec<NaiveDate> = weekly.result.rows.iter().map(|r| r.due_date).collect();
    assert_eq!(dues, vec![d(2024, 6, 8), d(2024, 6, 15), d(2024, 6, 22)]);

    let biweekly = generate_schedule(&origination(
        dec!(900),
        LoanTerms::FlatRate {
            finance_charge: dec!(90),
        },
        PaymentFrequency::Biweekly,
        3,
        d(2024, 6, 1),
    ))
    .unwrap();
    let dues: Vec<NaiveDate> = biweekly.result.rows.iter().map(|r| r.due_date).collect();
    assert_eq!(dues, vec![d(2024, 6, 15), d(2024, 6, 29), d(2024, 7, 13)]);
}

#[test]
fn test_flat_rows_agree_with_due_date_helper() {
    let result = generate_schedule(&daily_microloan()).unwrap();
    for row in &result.result.rows {
        let expected =
            due_date_for(d(2024, 6, 1), PaymentFrequency::Daily, row.installment_number).unwrap();
        assert_eq!(row.due_date, expected);
    }
}

// ===========================================================================
// French schedule tests
// ===========================================================================

#[test]
fn test_french_known_answer_annuity_table() {
    let result = generate_schedule(&monthly_consumer_loan()).unwrap();
    let schedule = &result.result;

    // 2% per period over 12 periods prices the annuity at 945.60
    assert_eq!(schedule.installment_amount, dec!(945.60));
    assert_eq!(schedule.rows.len(), 12);

    // First row: interest = 10000 * 0.02 = 200.00
    let first = &schedule.rows[0];
    assert_eq!(first.due_date, d(2024, 2, 15));
    assert_eq!(first.interest_expected, dec!(200.00));
    assert_eq!(first.principal_expected, dec!(745.60));
    assert_eq!(first.closing_balance, dec!(9254.40));

    // Last row retires whatever is left, so its amount absorbs the rounding
    let last = &schedule.rows[11];
    assert_eq!(last.due_date, d(2025, 1, 15));
    assert_eq!(last.opening_balance, dec!(927.01));
    assert_eq!(last.interest_expected, dec!(18.54));
    assert_eq!(last.principal_expected, dec!(927.01));
    assert_eq!(last.expected_amount, dec!(945.55));
    assert_eq!(last.closing_balance, dec!(0.00));

    assert_eq!(schedule.total_interest, dec!(1347.15));
    assert_eq!(schedule.total_payable, dec!(11347.15));
}

#[test]
fn test_french_principal_sums_exactly_to_principal() {
    let result = generate_schedule(&monthly_consumer_loan()).unwrap();
    let sum: Decimal = result
        .result
        .rows
        .iter()
        .map(|r| r.principal_expected)
        .sum();
    assert_eq!(sum, dec!(10000.00));
}

#[test]
fn test_french_interest_strictly_declines() {
    let result = generate_schedule(&monthly_consumer_loan()).unwrap();
    for pair in result.result.rows.windows(2) {
        assert!(
            pair[1].interest_expected < pair[0].interest_expected,
            "interest must fall with the balance: {} then {}",
            pair[0].interest_expected,
            pair[1].interest_expected,
        );
    }
}

#[test]
fn test_french_long_mortgage_closes_to_zero() {
    let result = generate_schedule(&origination(
        dec!(100000),
        LoanTerms::French {
            annual_rate: dec!(0.095),
        },
        PaymentFrequency::Monthly,
        360,
        d(2024, 3, 1),
    ))
    .unwrap();
    let schedule = &result.result;

    assert_eq!(schedule.rows.len(), 360);
    // 9.5% over 30 years prices in the 800s
    assert!(schedule.installment_amount > dec!(800));
    assert!(schedule.installment_amount < dec!(900));

    let principal_sum: Decimal = schedule.rows.iter().map(|r| r.principal_expected).sum();
    assert_eq!(principal_sum, dec!(100000.00));
    assert_eq!(schedule.rows[359].closing_balance, dec!(0.00));
}

#[test]
fn test_french_zero_rate_splits_evenly() {
    let result = generate_schedule(&origination(
        dec!(1000),
        LoanTerms::French {
            annual_rate: dec!(0),
        },
        PaymentFrequency::Monthly,
        3,
        d(2024, 1, 15),
    ))
    .unwrap();
    let schedule = &result.result;

    let amounts: Vec<Decimal> = schedule.rows.iter().map(|r| r.expected_amount).collect();
    assert_eq!(amounts, vec![dec!(333.33), dec!(333.33), dec!(333.34)]);
    for row in &schedule.rows {
        assert_eq!(row.interest_expected, dec!(0));
    }
    assert_eq!(schedule.total_payable, dec!(1000.00));
    assert_eq!(schedule.total_interest, dec!(0.00));
}

// ===========================================================================
// Distribution tests
// ===========================================================================

#[test]
fn test_distribution_covers_whole_installments_only() {
    // (amount, expected covered, expected excess) against a 300 installment
    let cases = [
        (dec!(300.01), 1u32, dec!(0.01)),
        (dec!(459.99), 1u32, dec!(159.99)),
        (dec!(599.99), 1u32, dec!(299.99)),
        (dec!(600.00), 2u32, dec!(0.00)),
        (dec!(600.01), 2u32, dec!(0.01)),
    ];

    for (amount, covered, excess) in cases {
        let dist = calculate_distribution(&DistributionInput {
            payment_amount: amount,
            installment_amount: dec!(300),
            pending_installments: 45,
            overdue_installments: 0,
            late_fee_override: None,
        })
        .unwrap()
        .result;

        assert_eq!(dist.installments_covered, covered, "amount {amount}");
        assert_eq!(dist.excess, excess, "amount {amount}");
        assert!(!dist.is_full_settlement);
        assert!(
            dist.excess < dec!(300),
            "short of settlement the leftover stays under one installment"
        );
    }
}

#[test]
fn test_distribution_settlement_keeps_every_spare_cent() {
    // 3 pending rows of 300 paid with 1000: all covered, 100 left over
    let dist = calculate_distribution(&DistributionInput {
        payment_amount: dec!(1000),
        installment_amount: dec!(300),
        pending_installments: 3,
        overdue_installments: 0,
        late_fee_override: None,
    })
    .unwrap()
    .result;

    assert!(dist.is_full_settlement);
    assert_eq!(dist.installments_covered, 3);
    assert_eq!(dist.excess, dec!(100.00));
}
