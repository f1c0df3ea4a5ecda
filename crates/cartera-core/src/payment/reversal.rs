//! Payment reversal: undo by appending, never by editing.
//!
//! A reversal posts a new ledger row with every amount negated and a
//! back-link to the original. The original row is untouched; history stays
//! replayable. Balance restoration is exact: flat loans re-derive the
//! balance from the decremented counter, French loans add back precisely
//! the capital the original retired.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEntity, AuditRecord, AuditSink};
use crate::error::CarteraError;
use crate::loan::{
    flat_remaining_capital, EntryStatus, Loan, LoanBalanceSnapshot, LoanStatus, LoanTerms,
    Payment, ScheduleEntry,
};
use crate::payment::{PaymentResult, ReversalRequest};
use crate::schedule::due_date_for;
use crate::store::{EntryTransition, LoanMutation, LoanStore};
use crate::CarteraResult;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reverse a posted payment, restoring the loan to the balance it would
/// have had without it.
///
/// Rejected when the payment was already reversed, when the target is
/// itself a reversal row, or when the loan has been canceled. Reversing a
/// payment on a PAID loan reopens it as ACTIVE.
pub fn reverse_payment(
    store: &mut impl LoanStore,
    audit: &dyn AuditSink,
    request: &ReversalRequest,
) -> CarteraResult<PaymentResult> {
    let original = store.payment(request.payment_id)?;
    if original.is_reversal() {
        return Err(CarteraError::CannotReversePayment {
            payment_id: original.id,
            reason: "reversal rows cannot be reversed".into(),
        });
    }
    if let Some(existing) = store.reversal_of(original.id)? {
        return Err(CarteraError::CannotReversePayment {
            payment_id: original.id,
            reason: format!("already reversed by {}", existing.id),
        });
    }

    let loan = store.loan(original.loan_id)?;
    if loan.status == LoanStatus::Canceled {
        return Err(CarteraError::CannotReversePayment {
            payment_id: original.id,
            reason: "loan is canceled".into(),
        });
    }

    let covered = original.installments_covered.max(0) as u32;
    let restored = store.entries_paid_by(original.id)?;
    let transitions: Vec<EntryTransition> = restored
        .iter()
        .map(|entry| EntryTransition {
            entry_id: entry.id,
            status: EntryStatus::Pending,
            paid_at: None,
            payment_id: None,
        })
        .collect();

    let installments_paid = loan.installments_paid.saturating_sub(covered);
    let loan_before = loan.snapshot();
    let snapshot = restored_snapshot(store, &loan, &original, installments_paid, &restored)?;

    let reversal = Payment {
        id: Uuid::new_v4(),
        loan_id: loan.id,
        payment_date: original.payment_date,
        total_amount: -original.total_amount,
        capital_applied: -original.capital_applied,
        interest_applied: -original.interest_applied,
        late_fee_applied: -original.late_fee_applied,
        installments_covered: -original.installments_covered,
        kind: original.kind,
        reverses: Some(original.id),
        created_by: request.created_by,
        created_at: Utc::now(),
    };

    store.commit(LoanMutation {
        loan_id: loan.id,
        payment: Some(reversal.clone()),
        entry_transitions: transitions,
        snapshot,
    })?;

    tracing::info!(
        loan = %loan.id,
        original = %original.id,
        reversal = %reversal.id,
        "payment reversed"
    );
    audit.record(AuditRecord::new(
        request.created_by,
        AuditAction::PaymentReversed,
        AuditEntity::Payment,
        original.id,
        serde_json::json!({
            "loan_id": loan.id,
            "reversal_id": reversal.id,
            "amount": original.total_amount.to_string(),
            "installments_restored": covered,
            "remaining_capital": snapshot.remaining_capital.to_string(),
            "reason": request.reason,
        }),
    ));

    Ok(PaymentResult {
        payment: reversal,
        loan_before,
        loan_after: snapshot,
        excess: Decimal::ZERO,
    })
}

// ---------------------------------------------------------------------------
// Balance restoration
// ---------------------------------------------------------------------------

fn restored_snapshot(
    store: &impl LoanStore,
    loan: &Loan,
    original: &Payment,
    installments_paid: u32,
    restored: &[ScheduleEntry],
) -> CarteraResult<LoanBalanceSnapshot> {
    let status = match loan.status {
        LoanStatus::Paid => LoanStatus::Active,
        other => other,
    };

    match loan.terms {
        LoanTerms::FlatRate { .. } => {
            // The fixed charge makes the balance a function of the counter;
            // restoring the counter restores the balance to the cent, fees
            // and excess notwithstanding.
            let open = store.open_entries(loan.id)?;
            let next_due_date = open
                .iter()
                .chain(restored.iter())
                .min_by_key(|e| e.installment_number)
                .map(|e| e.due_date);
            Ok(LoanBalanceSnapshot {
                remaining_capital: flat_remaining_capital(
                    loan.total_payable,
                    loan.installment_amount,
                    installments_paid,
                ),
                installments_paid,
                status,
                next_due_date,
            })
        }
        LoanTerms::French { .. } => {
            // The apply path subtracted exactly capital_applied, so adding
            // it back is the exact inverse.
            let next_due_date = if installments_paid >= loan.term_count {
                None
            } else {
                Some(due_date_for(
                    loan.start_date,
                    loan.payment_frequency,
                    installments_paid + 1,
                )?)
            };
            Ok(LoanBalanceSnapshot {
                remaining_capital: loan.remaining_capital + original.capital_applied,
                installments_paid,
                status,
                next_due_date,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
