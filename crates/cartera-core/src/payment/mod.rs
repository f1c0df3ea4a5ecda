//! Payment intake: distribution, application, reversal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::loan::{LoanBalanceSnapshot, Payment, PaymentKind};
use crate::types::{ActorId, LoanId, Money, PaymentId};

pub mod apply;
pub mod distribution;
pub mod reversal;

/// A cash receipt to post against a loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub loan_id: LoanId,
    pub amount: Money,
    pub payment_date: NaiveDate,
    pub created_by: ActorId,
}

/// Request to undo a posted payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalRequest {
    pub payment_id: PaymentId,
    pub created_by: ActorId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outcome of a posted payment or reversal: the ledger row that was written
/// and the loan balance before and after commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub payment: Payment,
    pub loan_before: LoanBalanceSnapshot,
    pub loan_after: LoanBalanceSnapshot,
    /// Cash beyond what the covered installments consumed. Reported to the
    /// caller for cashier handling; the engine retains nothing.
    pub excess: Money,
}

impl PaymentResult {
    pub fn status_changed(&self) -> bool {
        self.loan_before.status != self.loan_after.status
    }
}

/// Classification given to an accepted payment.
///
/// `covered == 0` reaches here only for French capital payments; the
/// services reject zero-coverage receipts with no capital effect before
/// classifying.
pub(crate) fn classify(covered: u32, pending_before: u32) -> PaymentKind {
    if pending_before > 0 && covered == pending_before {
        PaymentKind::FullSettlement
    } else if covered > 1 {
        PaymentKind::Advance
    } else if covered == 1 {
        PaymentKind::Regular
    } else {
        PaymentKind::CapitalPayment
    }
}
