//! Loan lifecycle: origination, overdue marking, cancelation.
//!
//! Origination is the only place loan figures are derived; the schedule
//! generator validates the terms and a loan with bad terms is never
//! persisted. Overdue marking is the bookkeeping half of lateness (the
//! scheduling trigger lives outside the engine). Cancelation closes a loan
//! administratively and terminally.

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEntity, AuditRecord, AuditSink};
use crate::error::CarteraError;
use crate::loan::{
    EntryStatus, Loan, LoanBalanceSnapshot, LoanOrigination, LoanStatus, LoanTerms,
    ScheduleEntry,
};
use crate::schedule::{due_date_for, generate_schedule};
use crate::store::{EntryTransition, LoanMutation, LoanStore};
use crate::types::{ActorId, LoanId};
use crate::CarteraResult;

// ---------------------------------------------------------------------------
// Origination
// ---------------------------------------------------------------------------

/// Open a loan: derive its figures, persist it with its schedule, audit it.
///
/// Flat-rate loans persist one entry per installment. French loans persist
/// none; their rows are projections recomputed from the live balance, which
/// capital payments change.
pub fn originate_loan(
    store: &mut impl LoanStore,
    audit: &dyn AuditSink,
    request: &LoanOrigination,
    created_by: ActorId,
) -> CarteraResult<Loan> {
    let schedule = generate_schedule(request)?.result;

    let loan_id = Uuid::new_v4();
    let remaining_capital = match request.terms {
        LoanTerms::FlatRate { .. } => schedule.total_payable,
        LoanTerms::French { .. } => request.principal,
    };
    let loan = Loan {
        id: loan_id,
        client_id: request.client_id,
        terms: request.terms,
        principal: request.principal,
        total_payable: schedule.total_payable,
        payment_frequency: request.payment_frequency,
        term_count: request.term_count,
        installment_amount: schedule.installment_amount,
        remaining_capital,
        installments_paid: 0,
        start_date: request.start_date,
        next_due_date: schedule.rows.first().map(|r| r.due_date),
        status: LoanStatus::Active,
        created_at: Utc::now(),
    };

    let entries: Vec<ScheduleEntry> = match request.terms {
        LoanTerms::FlatRate { .. } => schedule
            .rows
            .iter()
            .map(|row| ScheduleEntry {
                id: Uuid::new_v4(),
                loan_id,
                installment_number: row.installment_number,
                due_date: row.due_date,
                expected_amount: row.expected_amount,
                principal_expected: row.principal_expected,
                interest_expected: row.interest_expected,
                status: EntryStatus::Pending,
                paid_at: None,
                payment_id: None,
            })
            .collect(),
        LoanTerms::French { .. } => Vec::new(),
    };

    store.insert_loan(loan.clone(), entries)?;

    tracing::info!(loan = %loan.id, client = %loan.client_id, "loan originated");
    audit.record(AuditRecord::new(
        created_by,
        AuditAction::LoanOriginated,
        AuditEntity::Loan,
        loan.id,
        serde_json::json!({
            "client_id": loan.client_id,
            "principal": loan.principal.to_string(),
            "total_payable": loan.total_payable.to_string(),
            "installment_amount": loan.installment_amount.to_string(),
            "term_count": loan.term_count,
            "frequency": loan.payment_frequency,
        }),
    ));

    Ok(loan)
}

// ---------------------------------------------------------------------------
// Overdue marking
// ---------------------------------------------------------------------------

/// Flag lapsed installments of one loan as of a date.
///
/// Flips every pending entry past due to OVERDUE and moves the loan to
/// OVERDUE when anything is late. PAID and CANCELED loans are left alone.
/// Returns how many installments are newly or still past due; when to call
/// this is the job of an external scheduler.
pub fn mark_overdue(
    store: &mut impl LoanStore,
    audit: &dyn AuditSink,
    loan_id: LoanId,
    as_of: NaiveDate,
    actor: ActorId,
) -> CarteraResult<u32> {
    let loan = store.loan(loan_id)?;
    if !loan.accepts_payments() {
        return Ok(0);
    }

    let (lapsed_count, transitions) = match loan.terms {
        LoanTerms::FlatRate { .. } => {
            let open = store.open_entries(loan_id)?;
            let transitions: Vec<EntryTransition> = open
                .iter()
                .filter(|e| e.status == EntryStatus::Pending && e.due_date < as_of)
                .map(|e| EntryTransition {
                    entry_id: e.id,
                    status: EntryStatus::Overdue,
                    paid_at: None,
                    payment_id: None,
                })
                .collect();
            let lapsed = open.iter().filter(|e| e.due_date < as_of).count() as u32;
            (lapsed, transitions)
        }
        LoanTerms::French { .. } => {
            // No persisted rows; count past-due positions on the grid.
            let mut lapsed = 0;
            for number in (loan.installments_paid + 1)..=loan.term_count {
                if due_date_for(loan.start_date, loan.payment_frequency, number)? < as_of {
                    lapsed += 1;
                }
            }
            (lapsed, Vec::new())
        }
    };

    let status = if lapsed_count > 0 {
        LoanStatus::Overdue
    } else {
        loan.status
    };
    let status_changed = status != loan.status;

    if transitions.is_empty() && !status_changed {
        return Ok(lapsed_count);
    }

    store.commit(LoanMutation {
        loan_id,
        payment: None,
        entry_transitions: transitions,
        snapshot: LoanBalanceSnapshot { status, ..loan.snapshot() },
    })?;

    tracing::info!(loan = %loan_id, lapsed = lapsed_count, "overdue marking");
    audit.record(AuditRecord::new(
        actor,
        AuditAction::LoanMarkedOverdue,
        AuditEntity::Loan,
        loan_id,
        serde_json::json!({ "as_of": as_of, "lapsed_installments": lapsed_count }),
    ));

    Ok(lapsed_count)
}

// ---------------------------------------------------------------------------
// Cancelation
// ---------------------------------------------------------------------------

/// Close a loan administratively. Only ACTIVE and OVERDUE loans qualify;
/// CANCELED is terminal and accepts neither payments nor reversals.
pub fn cancel_loan(
    store: &mut impl LoanStore,
    audit: &dyn AuditSink,
    loan_id: LoanId,
    actor: ActorId,
    reason: Option<String>,
) -> CarteraResult<Loan> {
    let mut loan = store.loan(loan_id)?;
    if !loan.accepts_payments() {
        return Err(CarteraError::PaymentNotAllowed {
            loan_id,
            reason: format!(
                "only active or overdue loans can be canceled; status is {}",
                loan.status
            ),
        });
    }

    let snapshot = LoanBalanceSnapshot {
        status: LoanStatus::Canceled,
        ..loan.snapshot()
    };
    store.commit(LoanMutation {
        loan_id,
        payment: None,
        entry_transitions: Vec::new(),
        snapshot,
    })?;

    tracing::info!(loan = %loan_id, "loan canceled");
    audit.record(AuditRecord::new(
        actor,
        AuditAction::LoanCanceled,
        AuditEntity::Loan,
        loan_id,
        serde_json::json!({ "reason": reason }),
    ));

    snapshot.apply_to(&mut loan);
    Ok(loan)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
