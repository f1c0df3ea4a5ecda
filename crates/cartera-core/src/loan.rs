use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{
    ActorId, ClientId, EntryId, LoanId, Money, PaymentFrequency, PaymentId, Rate,
};

/// Pricing regime of a loan.
///
/// The two regimes never share fields: a flat-rate loan has no annual rate
/// to read, a French loan has no fixed charge. Code that needs one or the
/// other matches on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanTerms {
    /// Declining-balance amortization with a fixed annuity payment.
    French { annual_rate: Rate },
    /// Fixed finance charge agreed at origination and never recalculated,
    /// regardless of early or late payment.
    FlatRate { finance_charge: Money },
}

/// Lifecycle state of a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// Collecting normally
    Active,
    /// At least one installment past due
    Overdue,
    /// Fully collected; terminal for payments, reversible
    Paid,
    /// Administratively closed; terminal
    Canceled,
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Overdue => "OVERDUE",
            LoanStatus::Paid => "PAID",
            LoanStatus::Canceled => "CANCELED",
        };
        f.write_str(name)
    }
}

/// State of a single schedule entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Pending,
    Overdue,
    Paid,
}

/// Classification of an accepted payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentKind {
    /// Covered exactly one installment
    Regular,
    /// Covered more than one installment
    Advance,
    /// Retired capital on a French loan without covering a whole annuity
    CapitalPayment,
    /// Cleared every pending installment and closed the loan
    FullSettlement,
}

/// A loan as held by the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub client_id: ClientId,
    pub terms: LoanTerms,
    /// Capital disbursed to the client.
    pub principal: Money,
    /// Everything the client owes over the life of the loan. Flat-rate:
    /// principal + finance charge, fixed forever. French: sum of the
    /// scheduled annuities at origination.
    pub total_payable: Money,
    pub payment_frequency: PaymentFrequency,
    /// Number of installments agreed at origination.
    pub term_count: u32,
    /// Amount of one installment. Identical on every flat-rate row; the
    /// fixed annuity on a French loan.
    pub installment_amount: Money,
    /// Flat-rate: unpaid portion of total_payable. French: outstanding
    /// principal balance that interest accrues on.
    pub remaining_capital: Money,
    pub installments_paid: u32,
    /// Origination date; the due-date grid and the French interest clock
    /// both start here.
    pub start_date: NaiveDate,
    /// Earliest unpaid due date. None once the loan is paid off.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<NaiveDate>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    /// Whether the status machine accepts payments right now.
    pub fn accepts_payments(&self) -> bool {
        matches!(self.status, LoanStatus::Active | LoanStatus::Overdue)
    }

    /// Installments not yet collected.
    pub fn pending_installments(&self) -> u32 {
        self.term_count.saturating_sub(self.installments_paid)
    }

    /// Current balance-bearing fields as an immutable snapshot.
    pub fn snapshot(&self) -> LoanBalanceSnapshot {
        LoanBalanceSnapshot {
            remaining_capital: self.remaining_capital,
            installments_paid: self.installments_paid,
            status: self.status,
            next_due_date: self.next_due_date,
        }
    }
}

/// Request to open a loan. Validated before anything is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanOrigination {
    pub client_id: ClientId,
    pub principal: Money,
    pub terms: LoanTerms,
    pub payment_frequency: PaymentFrequency,
    pub term_count: u32,
    pub start_date: NaiveDate,
}

/// One row of a repayment schedule as persisted.
///
/// Created in ascending installment_number order at origination; numbers are
/// unique per loan and the due-date grid follows the payment frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: EntryId,
    pub loan_id: LoanId,
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub expected_amount: Money,
    pub principal_expected: Money,
    pub interest_expected: Money,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<PaymentId>,
}

impl ScheduleEntry {
    /// Pending and overdue entries are both still collectible.
    pub fn is_open(&self) -> bool {
        matches!(self.status, EntryStatus::Pending | EntryStatus::Overdue)
    }
}

/// An immutable row in the payment ledger.
///
/// Reversals are new rows with negated amounts, never edits; `reverses`
/// back-links a reversal row to the payment it undoes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub payment_date: NaiveDate,
    /// Cash received. Negative on reversal rows.
    pub total_amount: Money,
    pub capital_applied: Money,
    pub interest_applied: Money,
    pub late_fee_applied: Money,
    /// Installments this payment marked paid. Negative on reversal rows.
    pub installments_covered: i32,
    pub kind: PaymentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverses: Option<PaymentId>,
    pub created_by: ActorId,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_reversal(&self) -> bool {
        self.reverses.is_some()
    }
}

/// Balance-bearing fields of a loan, computed pure and committed whole.
///
/// Services never mutate a Loan in place: they fold the payment (or
/// reversal) into the current snapshot, producing the next one, and hand
/// both the snapshot and its side records to the store as a single
/// mutation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanBalanceSnapshot {
    pub remaining_capital: Money,
    pub installments_paid: u32,
    pub status: LoanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<NaiveDate>,
}

impl LoanBalanceSnapshot {
    /// Write this snapshot back onto a loan. Store-side only.
    pub fn apply_to(&self, loan: &mut Loan) {
        loan.remaining_capital = self.remaining_capital;
        loan.installments_paid = self.installments_paid;
        loan.status = self.status;
        loan.next_due_date = self.next_due_date;
    }
}

/// Unpaid portion of a flat-rate loan after `installments_paid` collections.
///
/// The fixed charge makes this a pure function of the counter, which is what
/// lets a reversal restore the balance exactly: decrement the counter and
/// re-evaluate.
pub fn flat_remaining_capital(
    total_payable: Money,
    installment_amount: Money,
    installments_paid: u32,
) -> Money {
    let collected = installment_amount * Decimal::from(installments_paid);
    (total_payable - collected).max(Decimal::ZERO)
}
