use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{LoanId, PaymentId};

#[derive(Debug, Error)]
pub enum CarteraError {
    #[error("Invalid loan terms for '{field}': {reason}")]
    InvalidLoanTerms { field: String, reason: String },

    #[error("Loan not found: {0}")]
    LoanNotFound(LoanId),

    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    #[error("Payment not allowed on loan {loan_id}: {reason}")]
    PaymentNotAllowed { loan_id: LoanId, reason: String },

    #[error("Invalid payment amount {amount}: {reason}")]
    InvalidPaymentAmount { amount: Decimal, reason: String },

    #[error("Cannot reverse payment {payment_id}: {reason}")]
    CannotReversePayment {
        payment_id: PaymentId,
        reason: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CarteraError {
    /// Stable machine-readable code for API consumers.
    ///
    /// Codes never change across releases; Display messages may.
    pub fn code(&self) -> &'static str {
        match self {
            CarteraError::InvalidLoanTerms { .. } => "INVALID_LOAN_TERMS",
            CarteraError::LoanNotFound(_) => "LOAN_NOT_FOUND",
            CarteraError::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            CarteraError::PaymentNotAllowed { .. } => "PAYMENT_NOT_ALLOWED",
            CarteraError::InvalidPaymentAmount { .. } => "INVALID_PAYMENT_AMOUNT",
            CarteraError::CannotReversePayment { .. } => "CANNOT_REVERSE_PAYMENT",
            CarteraError::Storage(_) => "STORAGE",
        }
    }
}
