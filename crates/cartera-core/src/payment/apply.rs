//! Payment application: the single write path for client cash.
//!
//! One call, one atomic unit of work. Every rejection happens before the
//! first state change; after the commit the loan, its schedule and the
//! payment ledger agree with each other. The audit record goes out last and
//! is allowed to fail silently.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEntity, AuditRecord, AuditSink};
use crate::error::CarteraError;
use crate::loan::{
    flat_remaining_capital, EntryStatus, Loan, LoanBalanceSnapshot, LoanStatus, LoanTerms, Payment,
};
use crate::payment::distribution::{
    calculate_distribution, decimal_floor_to_u32, DistributionInput,
};
use crate::payment::{classify, PaymentRequest, PaymentResult};
use crate::schedule::due_date_for;
use crate::store::{EntryTransition, LoanMutation, LoanStore};
use crate::types::*;
use crate::CarteraResult;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Post a cash receipt against a loan.
///
/// Accepts only loans in ACTIVE or OVERDUE status; PAID and CANCELED loans
/// reject every receipt. A receipt that covers no whole installment (and,
/// on a French loan, retires no capital) is rejected as invalid rather than
/// partially applied.
pub fn apply_payment(
    store: &mut impl LoanStore,
    audit: &dyn AuditSink,
    request: &PaymentRequest,
) -> CarteraResult<PaymentResult> {
    validate_payment_request(request)?;

    let loan = store.loan(request.loan_id)?;
    if !loan.accepts_payments() {
        return Err(CarteraError::PaymentNotAllowed {
            loan_id: loan.id,
            reason: format!("loan status is {}", loan.status),
        });
    }

    let loan_before = loan.snapshot();
    let (payment, transitions, snapshot, excess) = match loan.terms {
        LoanTerms::FlatRate { .. } => prepare_flat(store, &loan, request)?,
        LoanTerms::French { annual_rate } => prepare_french(store, &loan, request, annual_rate)?,
    };

    store.commit(LoanMutation {
        loan_id: loan.id,
        payment: Some(payment.clone()),
        entry_transitions: transitions,
        snapshot,
    })?;

    tracing::info!(
        loan = %loan.id,
        payment = %payment.id,
        kind = ?payment.kind,
        covered = payment.installments_covered,
        "payment applied"
    );
    audit.record(AuditRecord::new(
        request.created_by,
        AuditAction::PaymentApplied,
        AuditEntity::Payment,
        payment.id,
        serde_json::json!({
            "loan_id": loan.id,
            "amount": payment.total_amount.to_string(),
            "late_fee": payment.late_fee_applied.to_string(),
            "installments_covered": payment.installments_covered,
            "kind": payment.kind,
            "remaining_capital": snapshot.remaining_capital.to_string(),
            "excess": excess.to_string(),
        }),
    ));

    Ok(PaymentResult {
        payment,
        loan_before,
        loan_after: snapshot,
        excess,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_payment_request(request: &PaymentRequest) -> CarteraResult<()> {
    if request.amount <= Decimal::ZERO {
        return Err(CarteraError::InvalidPaymentAmount {
            amount: request.amount,
            reason: "Payment amount must be positive".into(),
        });
    }
    if round_money(request.amount) != request.amount {
        return Err(CarteraError::InvalidPaymentAmount {
            amount: request.amount,
            reason: "Payment amount cannot have more than two decimal places".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Flat-rate application
// ---------------------------------------------------------------------------

type PreparedApplication = (Payment, Vec<EntryTransition>, LoanBalanceSnapshot, Money);

fn prepare_flat(
    store: &impl LoanStore,
    loan: &Loan,
    request: &PaymentRequest,
) -> CarteraResult<PreparedApplication> {
    let open = store.open_entries(loan.id)?;
    if open.is_empty() {
        return Err(CarteraError::PaymentNotAllowed {
            loan_id: loan.id,
            reason: "no open installments to pay".into(),
        });
    }

    let pending = open.len() as u32;
    // Lateness is judged by the calendar at receipt time, not by whether the
    // overdue sweep has run yet.
    let overdue = open
        .iter()
        .filter(|e| e.due_date < request.payment_date)
        .count() as u32;

    let dist = calculate_distribution(&DistributionInput {
        payment_amount: request.amount,
        installment_amount: loan.installment_amount,
        pending_installments: pending,
        overdue_installments: overdue,
        late_fee_override: None,
    })?
    .result;

    if dist.is_insufficient() {
        let minimum = dist.late_fee + loan.installment_amount;
        return Err(CarteraError::InvalidPaymentAmount {
            amount: request.amount,
            reason: format!("Covers no whole installment; minimum acceptable is {minimum}"),
        });
    }

    let covered = dist.installments_covered;
    let payment_id = Uuid::new_v4();

    // Chronological selection: open entries arrive ordered by installment
    // number, so the slice prefix is always the oldest debt.
    let transitions: Vec<EntryTransition> = open[..covered as usize]
        .iter()
        .map(|entry| EntryTransition {
            entry_id: entry.id,
            status: EntryStatus::Paid,
            paid_at: Some(request.payment_date),
            payment_id: Some(payment_id),
        })
        .collect();

    // Reporting split; collection itself moves in whole installments.
    let n = Decimal::from(loan.term_count);
    let finance_charge = loan.total_payable - loan.principal;
    let covered_dec = Decimal::from(covered);
    let capital_applied = round_money(loan.principal / n * covered_dec);
    let interest_applied = round_money(finance_charge / n * covered_dec);

    let installments_paid = loan.installments_paid + covered;
    let status = if installments_paid >= loan.term_count {
        LoanStatus::Paid
    } else {
        LoanStatus::Active
    };
    let snapshot = LoanBalanceSnapshot {
        remaining_capital: flat_remaining_capital(
            loan.total_payable,
            loan.installment_amount,
            installments_paid,
        ),
        installments_paid,
        status,
        next_due_date: match status {
            LoanStatus::Paid => None,
            _ => open.get(covered as usize).map(|e| e.due_date),
        },
    };

    let payment = Payment {
        id: payment_id,
        loan_id: loan.id,
        payment_date: request.payment_date,
        total_amount: request.amount,
        capital_applied,
        interest_applied,
        late_fee_applied: dist.late_fee,
        installments_covered: covered as i32,
        kind: classify(covered, pending),
        reverses: None,
        created_by: request.created_by,
        created_at: Utc::now(),
    };

    Ok((payment, transitions, snapshot, dist.excess))
}

// ---------------------------------------------------------------------------
// French application
// ---------------------------------------------------------------------------

// Interest accrues on the live balance over calendar days since the last
// standing payment (or origination), actual/365. The projected schedule uses
// the periodic rate; servicing deliberately follows the calendar, so a
// client who pays early pays less interest than projected and a late one
// pays more.
fn prepare_french(
    store: &impl LoanStore,
    loan: &Loan,
    request: &PaymentRequest,
    annual_rate: Rate,
) -> CarteraResult<PreparedApplication> {
    // Money owed on a French loan is the balance, not the row count: a
    // reversed prepayment can leave capital outstanding past the last
    // installment, and that residue must stay collectible.
    let pending = loan.pending_installments();
    if pending == 0 && loan.remaining_capital <= Decimal::ZERO {
        return Err(CarteraError::PaymentNotAllowed {
            loan_id: loan.id,
            reason: "nothing left to pay".into(),
        });
    }

    let accrual_start = store
        .last_effective_payment_date(loan.id)?
        .unwrap_or(loan.start_date);
    let days = (request.payment_date - accrual_start).num_days().max(0);
    let interest_due = round_money(
        loan.remaining_capital * annual_rate * Decimal::from(days)
            / Decimal::from(DAYS_PER_YEAR),
    );

    // One flat 5% of the installment per late receipt, not per overdue row.
    let is_late = loan
        .next_due_date
        .map(|due| request.payment_date > due)
        .unwrap_or(false);
    let late_fee = if is_late {
        round_money(loan.installment_amount * late_fee_rate())
    } else {
        Decimal::ZERO
    };

    let after_fee = request.amount - late_fee;
    if after_fee <= Decimal::ZERO {
        return Err(CarteraError::InvalidPaymentAmount {
            amount: request.amount,
            reason: format!("Does not cover the late fee of {late_fee}"),
        });
    }

    let interest_applied = interest_due.min(after_fee);
    let capital_available = after_fee - interest_applied;
    let capital_applied = capital_available.min(loan.remaining_capital);
    let excess = capital_available - capital_applied;

    let remaining_capital = loan.remaining_capital - capital_applied;
    let covered = if remaining_capital.is_zero() {
        // The balance is cleared: every open installment is settled no
        // matter how the annuity arithmetic came out.
        pending
    } else {
        decimal_floor_to_u32(after_fee / loan.installment_amount).min(pending.saturating_sub(1))
    };

    if covered == 0 && capital_applied <= Decimal::ZERO {
        let minimum = late_fee + interest_due;
        return Err(CarteraError::InvalidPaymentAmount {
            amount: request.amount,
            reason: format!(
                "Covers neither a whole installment nor any capital; fee plus accrued interest is {minimum}"
            ),
        });
    }

    let installments_paid = loan.installments_paid + covered;
    let status = if remaining_capital.is_zero() {
        LoanStatus::Paid
    } else {
        LoanStatus::Active
    };
    let next_due_date = if status == LoanStatus::Paid || installments_paid >= loan.term_count {
        None
    } else {
        Some(due_date_for(
            loan.start_date,
            loan.payment_frequency,
            installments_paid + 1,
        )?)
    };
    let snapshot = LoanBalanceSnapshot {
        remaining_capital,
        installments_paid,
        status,
        next_due_date,
    };

    let payment = Payment {
        id: Uuid::new_v4(),
        loan_id: loan.id,
        payment_date: request.payment_date,
        total_amount: request.amount,
        capital_applied,
        interest_applied,
        late_fee_applied: late_fee,
        installments_covered: covered as i32,
        kind: classify(covered, pending),
        reverses: None,
        created_by: request.created_by,
        created_at: Utc::now(),
    };

    Ok((payment, Vec::new(), snapshot, excess))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
