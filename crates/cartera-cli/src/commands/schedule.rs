use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use cartera_core::loan::{LoanOrigination, LoanTerms};
use cartera_core::schedule::generate_schedule;
use cartera_core::PaymentFrequency;

use crate::input;

/// Arguments for schedule generation
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Amount financed
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Fixed finance charge, flat-rate pricing
    #[arg(long)]
    pub finance_charge: Option<Decimal>,

    /// Nominal annual rate as a fraction (e.g. 0.24), French pricing
    #[arg(long)]
    pub annual_rate: Option<Decimal>,

    /// Installment frequency: daily, weekly, biweekly, monthly
    #[arg(long, default_value = "monthly")]
    pub frequency: String,

    /// Number of installments
    #[arg(long)]
    pub term_count: Option<u32>,

    /// Funding date (YYYY-MM-DD); the first installment falls one period later
    #[arg(long)]
    pub start_date: Option<NaiveDate>,
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let origination: LoanOrigination = if let Some(ref path) = args.input {
        input::file::read_json(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let principal = args
            .principal
            .ok_or("--principal is required (or provide --input)")?;
        let term_count = args
            .term_count
            .ok_or("--term-count is required (or provide --input)")?;
        let start_date = args
            .start_date
            .ok_or("--start-date is required (or provide --input)")?;

        LoanOrigination {
            client_id: Uuid::new_v4(),
            principal,
            terms: pricing_terms(args.finance_charge, args.annual_rate)?,
            payment_frequency: parse_frequency(&args.frequency)?,
            term_count,
            start_date,
        }
    };

    let result = generate_schedule(&origination)?;
    Ok(serde_json::to_value(result)?)
}

fn pricing_terms(
    finance_charge: Option<Decimal>,
    annual_rate: Option<Decimal>,
) -> Result<LoanTerms, Box<dyn std::error::Error>> {
    match (finance_charge, annual_rate) {
        (Some(charge), None) => Ok(LoanTerms::FlatRate {
            finance_charge: charge,
        }),
        (None, Some(rate)) => Ok(LoanTerms::French { annual_rate: rate }),
        (Some(_), Some(_)) => {
            Err("--finance-charge and --annual-rate are mutually exclusive".into())
        }
        (None, None) => {
            Err("one of --finance-charge or --annual-rate is required (or provide --input)".into())
        }
    }
}

fn parse_frequency(frequency: &str) -> Result<PaymentFrequency, Box<dyn std::error::Error>> {
    match frequency.to_lowercase().as_str() {
        "daily" => Ok(PaymentFrequency::Daily),
        "weekly" => Ok(PaymentFrequency::Weekly),
        "biweekly" | "fortnightly" => Ok(PaymentFrequency::Biweekly),
        "monthly" => Ok(PaymentFrequency::Monthly),
        _ => Err(format!(
            "Unknown frequency '{}'. Use: daily, weekly, biweekly, monthly",
            frequency
        )
        .into()),
    }
}
