//! Pure distribution of a cash receipt across installments.
//!
//! Decides, without touching any state, how a payment splits into late fee
//! and whole covered installments. The application service feeds the
//! decision into its commit; the CLI exposes it for cashier previews.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::CarteraError;
use crate::types::*;
use crate::CarteraResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Facts about one receipt against one loan, as of the payment date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionInput {
    pub payment_amount: Money,
    pub installment_amount: Money,
    /// Installments not yet collected, overdue ones included.
    pub pending_installments: u32,
    pub overdue_installments: u32,
    /// Supplied when the caller already assessed the fee (French loans
    /// charge per receipt, not per overdue row). None applies the standard
    /// 5% per overdue installment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub late_fee_override: Option<Money>,
}

/// How a receipt splits. Purely advisory until a service commits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub late_fee: Money,
    /// Payment remaining after the fee; negative when the fee exceeded the
    /// receipt (in which case nothing is covered).
    pub amount_after_fee: Money,
    pub installments_covered: u32,
    pub is_full_settlement: bool,
    /// Cash beyond the covered installments. Never applied to anything and
    /// never reduces what the client owes.
    pub excess: Money,
}

impl Distribution {
    /// A receipt that covers nothing and settles nothing must be rejected
    /// by the caller before any state changes.
    pub fn is_insufficient(&self) -> bool {
        self.installments_covered == 0 && !self.is_full_settlement
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Split a receipt into late fee, covered installments and excess.
///
/// Installments are covered whole or not at all: a receipt is never smeared
/// partially across a row. Selection order is the caller's duty and is
/// always lowest installment number first.
pub fn calculate_distribution(
    input: &DistributionInput,
) -> CarteraResult<ComputationOutput<Distribution>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_distribution_input(input)?;

    let overdue = if input.overdue_installments > input.pending_installments {
        warnings.push("Overdue count exceeds pending count; clamped to pending".into());
        input.pending_installments
    } else {
        input.overdue_installments
    };

    let late_fee = match input.late_fee_override {
        Some(fee) => fee,
        None => round_money(
            Decimal::from(overdue) * input.installment_amount * late_fee_rate(),
        ),
    };

    let amount_after_fee = input.payment_amount - late_fee;
    if amount_after_fee < Decimal::ZERO {
        warnings.push(
            "Late fee exceeds the payment amount; nothing is available for installments".into(),
        );
    }

    let installments_covered = if amount_after_fee <= Decimal::ZERO {
        0
    } else {
        decimal_floor_to_u32(amount_after_fee / input.installment_amount)
            .min(input.pending_installments)
    };

    let is_full_settlement =
        input.pending_installments > 0 && installments_covered == input.pending_installments;

    let consumed = Decimal::from(installments_covered) * input.installment_amount;
    let excess = (amount_after_fee - consumed).max(Decimal::ZERO);

    let distribution = Distribution {
        late_fee,
        amount_after_fee,
        installments_covered,
        is_full_settlement,
        excess,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Installment Payment Distribution",
        &serde_json::json!({
            "payment_amount": input.payment_amount.to_string(),
            "installment_amount": input.installment_amount.to_string(),
            "pending_installments": input.pending_installments,
            "overdue_installments": overdue,
            "late_fee_rate": late_fee_rate().to_string(),
        }),
        warnings,
        elapsed,
        distribution,
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_distribution_input(input: &DistributionInput) -> CarteraResult<()> {
    if input.payment_amount <= Decimal::ZERO {
        return Err(CarteraError::InvalidPaymentAmount {
            amount: input.payment_amount,
            reason: "Payment amount must be positive".into(),
        });
    }
    if input.installment_amount <= Decimal::ZERO {
        return Err(CarteraError::InvalidLoanTerms {
            field: "installment_amount".into(),
            reason: "Installment amount must be positive".into(),
        });
    }
    if let Some(fee) = input.late_fee_override {
        if fee < Decimal::ZERO {
            return Err(CarteraError::InvalidPaymentAmount {
                amount: fee,
                reason: "Late fee cannot be negative".into(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Math helpers
// ---------------------------------------------------------------------------

/// Convert a non-negative Decimal to u32 by flooring. Saturates on values
/// beyond u32; callers clamp to the pending count anyway.
pub(crate) fn decimal_floor_to_u32(d: Decimal) -> u32 {
    let floored = d.floor();
    if floored < Decimal::ZERO {
        0
    } else {
        floored.to_string().parse::<u32>().unwrap_or(u32::MAX)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
