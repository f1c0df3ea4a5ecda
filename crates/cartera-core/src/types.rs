use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.24 = 24% annual). Never as percentages.
pub type Rate = Decimal;

/// Unique identifier for a loan
pub type LoanId = Uuid;

/// Unique identifier for a client
pub type ClientId = Uuid;

/// Unique identifier for a schedule entry
pub type EntryId = Uuid;

/// Unique identifier for a payment record
pub type PaymentId = Uuid;

/// Unique identifier for the acting user (collector, admin, system job)
pub type ActorId = Uuid;

/// Days in the year used for daily interest accrual (actual/365).
pub const DAYS_PER_YEAR: u32 = 365;

/// Late-fee rate charged once per overdue installment (5%, no compounding).
pub fn late_fee_rate() -> Rate {
    dec!(0.05)
}

/// Round a monetary amount to cents, half away from zero.
///
/// Commercial rounding: 0.125 rounds to 0.13, -0.125 to -0.13. All money
/// leaving a calculator passes through here; intermediate values stay at
/// full Decimal precision.
pub fn round_money(value: Money) -> Money {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Cadence of installment collection.
///
/// Microcredit portfolios collect on short cycles; the frequency fixes both
/// the due-date grid and the divisor that turns an annual rate into a
/// periodic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentFrequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
}

impl PaymentFrequency {
    /// Collection periods in one year, for periodic-rate conversion.
    pub fn periods_per_year(&self) -> u32 {
        match self {
            PaymentFrequency::Daily => 365,
            PaymentFrequency::Weekly => 52,
            PaymentFrequency::Biweekly => 26,
            PaymentFrequency::Monthly => 12,
        }
    }

    /// Periodic rate derived from an annual rate.
    pub fn periodic_rate(&self, annual_rate: Rate) -> Rate {
        annual_rate / Decimal::from(self.periods_per_year())
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
