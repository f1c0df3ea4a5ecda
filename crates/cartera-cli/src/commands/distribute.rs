use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use cartera_core::payment::distribution::{calculate_distribution, DistributionInput};

use crate::input;

/// Arguments for a distribution preview
#[derive(Args)]
pub struct DistributeArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Cash received
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Fixed installment amount of the loan
    #[arg(long)]
    pub installment: Option<Decimal>,

    /// Installments still unpaid on the schedule
    #[arg(long)]
    pub pending: Option<u32>,

    /// How many of the pending installments are past due
    #[arg(long, default_value = "0")]
    pub overdue: u32,

    /// Charge this late fee instead of the standard 5% per overdue installment
    #[arg(long)]
    pub late_fee: Option<Decimal>,
}

pub fn run_distribute(args: DistributeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let dist_input: DistributionInput = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        DistributionInput {
            payment_amount: args
                .amount
                .ok_or("--amount is required (or provide --input)")?,
            installment_amount: args
                .installment
                .ok_or("--installment is required (or provide --input)")?,
            pending_installments: args
                .pending
                .ok_or("--pending is required (or provide --input)")?,
            overdue_installments: args.overdue,
            late_fee_override: args.late_fee,
        }
    };

    let result = calculate_distribution(&dist_input)?;
    Ok(serde_json::to_value(result)?)
}
