//! Persistence handle for loans, schedules and the payment ledger.
//!
//! The engine never talks to a database directly: services read through
//! [`LoanStore`] and write by committing a [`LoanMutation`] they computed
//! up front. A commit is all-or-nothing; validation failures leave the
//! store exactly as it was.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::error::CarteraError;
use crate::loan::{
    EntryStatus, Loan, LoanBalanceSnapshot, Payment, ScheduleEntry,
};
use crate::types::{EntryId, LoanId, PaymentId};
use crate::CarteraResult;

/// One status flip for a persisted schedule entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryTransition {
    pub entry_id: EntryId,
    pub status: EntryStatus,
    pub paid_at: Option<NaiveDate>,
    pub payment_id: Option<PaymentId>,
}

/// Everything one service call wants to change, committed as a unit.
///
/// Services diff the loan's balance snapshot, collect entry transitions and
/// the new ledger row (if any), and hand the whole thing over. Partial
/// application never happens: the store validates first, applies second.
#[derive(Debug, Clone)]
pub struct LoanMutation {
    pub loan_id: LoanId,
    pub payment: Option<Payment>,
    pub entry_transitions: Vec<EntryTransition>,
    pub snapshot: LoanBalanceSnapshot,
}

/// Read and write surface the services run against.
pub trait LoanStore {
    fn loan(&self, id: LoanId) -> CarteraResult<Loan>;

    fn payment(&self, id: PaymentId) -> CarteraResult<Payment>;

    /// Every payment row of a loan, oldest first.
    fn payments_for(&self, loan_id: LoanId) -> CarteraResult<Vec<Payment>>;

    /// Collectible entries of a loan, lowest installment number first.
    fn open_entries(&self, loan_id: LoanId) -> CarteraResult<Vec<ScheduleEntry>>;

    /// Entries a given payment marked paid.
    fn entries_paid_by(&self, payment_id: PaymentId) -> CarteraResult<Vec<ScheduleEntry>>;

    /// The reversal row pointing at `payment_id`, if one was ever posted.
    fn reversal_of(&self, payment_id: PaymentId) -> CarteraResult<Option<Payment>>;

    /// Persist a new loan together with its schedule, atomically.
    fn insert_loan(&mut self, loan: Loan, entries: Vec<ScheduleEntry>) -> CarteraResult<()>;

    /// Apply a mutation whole, or not at all.
    fn commit(&mut self, mutation: LoanMutation) -> CarteraResult<()>;

    /// Date of the latest payment still standing (reversals and reversed
    /// payments excluded). The French interest clock reads this.
    fn last_effective_payment_date(&self, loan_id: LoanId) -> CarteraResult<Option<NaiveDate>> {
        let payments = self.payments_for(loan_id)?;
        let reversed: HashSet<PaymentId> = payments.iter().filter_map(|p| p.reverses).collect();
        Ok(payments
            .iter()
            .filter(|p| !p.is_reversal() && !reversed.contains(&p.id))
            .map(|p| p.payment_date)
            .max())
    }
}

/// HashMap-backed store for tests and the CLI simulator.
#[derive(Debug, Default)]
pub struct InMemoryLoanStore {
    loans: HashMap<LoanId, Loan>,
    /// Sorted by installment number at insert and kept that way.
    entries: HashMap<LoanId, Vec<ScheduleEntry>>,
    /// Insertion order, which is also chronological commit order.
    payments: HashMap<LoanId, Vec<Payment>>,
    payment_loans: HashMap<PaymentId, LoanId>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries of a loan, paid ones included. Handy for inspection.
    pub fn all_entries(&self, loan_id: LoanId) -> Vec<ScheduleEntry> {
        self.entries.get(&loan_id).cloned().unwrap_or_default()
    }

    fn check_mutation(&self, mutation: &LoanMutation) -> CarteraResult<()> {
        if !self.loans.contains_key(&mutation.loan_id) {
            return Err(CarteraError::LoanNotFound(mutation.loan_id));
        }
        if let Some(payment) = &mutation.payment {
            if payment.loan_id != mutation.loan_id {
                return Err(CarteraError::Storage(
                    "payment row belongs to a different loan".into(),
                ));
            }
            if self.payment_loans.contains_key(&payment.id) {
                return Err(CarteraError::Storage(format!(
                    "duplicate payment id {}",
                    payment.id
                )));
            }
        }
        let entries = self.entries.get(&mutation.loan_id);
        for transition in &mutation.entry_transitions {
            let known = entries
                .map(|list| list.iter().any(|e| e.id == transition.entry_id))
                .unwrap_or(false);
            if !known {
                return Err(CarteraError::Storage(format!(
                    "unknown schedule entry {}",
                    transition.entry_id
                )));
            }
        }
        Ok(())
    }
}

impl LoanStore for InMemoryLoanStore {
    fn loan(&self, id: LoanId) -> CarteraResult<Loan> {
        self.loans
            .get(&id)
            .cloned()
            .ok_or(CarteraError::LoanNotFound(id))
    }

    fn payment(&self, id: PaymentId) -> CarteraResult<Payment> {
        let loan_id = self
            .payment_loans
            .get(&id)
            .ok_or(CarteraError::PaymentNotFound(id))?;
        self.payments
            .get(loan_id)
            .and_then(|list| list.iter().find(|p| p.id == id))
            .cloned()
            .ok_or(CarteraError::PaymentNotFound(id))
    }

    fn payments_for(&self, loan_id: LoanId) -> CarteraResult<Vec<Payment>> {
        if !self.loans.contains_key(&loan_id) {
            return Err(CarteraError::LoanNotFound(loan_id));
        }
        Ok(self.payments.get(&loan_id).cloned().unwrap_or_default())
    }

    fn open_entries(&self, loan_id: LoanId) -> CarteraResult<Vec<ScheduleEntry>> {
        if !self.loans.contains_key(&loan_id) {
            return Err(CarteraError::LoanNotFound(loan_id));
        }
        Ok(self
            .entries
            .get(&loan_id)
            .map(|list| list.iter().filter(|e| e.is_open()).cloned().collect())
            .unwrap_or_default())
    }

    fn entries_paid_by(&self, payment_id: PaymentId) -> CarteraResult<Vec<ScheduleEntry>> {
        let loan_id = self
            .payment_loans
            .get(&payment_id)
            .ok_or(CarteraError::PaymentNotFound(payment_id))?;
        Ok(self
            .entries
            .get(loan_id)
            .map(|list| {
                list.iter()
                    .filter(|e| e.payment_id == Some(payment_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn reversal_of(&self, payment_id: PaymentId) -> CarteraResult<Option<Payment>> {
        let loan_id = self
            .payment_loans
            .get(&payment_id)
            .ok_or(CarteraError::PaymentNotFound(payment_id))?;
        Ok(self
            .payments
            .get(loan_id)
            .and_then(|list| list.iter().find(|p| p.reverses == Some(payment_id)))
            .cloned())
    }

    fn insert_loan(&mut self, loan: Loan, mut entries: Vec<ScheduleEntry>) -> CarteraResult<()> {
        if self.loans.contains_key(&loan.id) {
            return Err(CarteraError::Storage(format!(
                "duplicate loan id {}",
                loan.id
            )));
        }
        if entries.iter().any(|e| e.loan_id != loan.id) {
            return Err(CarteraError::Storage(
                "schedule entry belongs to a different loan".into(),
            ));
        }
        entries.sort_by_key(|e| e.installment_number);
        self.entries.insert(loan.id, entries);
        self.payments.insert(loan.id, Vec::new());
        self.loans.insert(loan.id, loan);
        Ok(())
    }

    fn commit(&mut self, mutation: LoanMutation) -> CarteraResult<()> {
        self.check_mutation(&mutation)?;

        // Checks passed; everything below is infallible.
        if let Some(payment) = mutation.payment {
            self.payment_loans.insert(payment.id, mutation.loan_id);
            self.payments
                .entry(mutation.loan_id)
                .or_default()
                .push(payment);
        }
        if let Some(entries) = self.entries.get_mut(&mutation.loan_id) {
            for transition in &mutation.entry_transitions {
                if let Some(entry) = entries.iter_mut().find(|e| e.id == transition.entry_id) {
                    entry.status = transition.status;
                    entry.paid_at = transition.paid_at;
                    entry.payment_id = transition.payment_id;
                }
            }
        }
        if let Some(loan) = self.loans.get_mut(&mutation.loan_id) {
            mutation.snapshot.apply_to(loan);
        }
        Ok(())
    }
}
