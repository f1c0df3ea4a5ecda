mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::distribute::DistributeArgs;
use commands::schedule::ScheduleArgs;
use commands::simulate::SimulateArgs;

/// Installment loan accounting with decimal precision
#[derive(Parser)]
#[command(
    name = "cartera",
    version,
    about = "Installment loan accounting with decimal precision",
    long_about = "A CLI for installment lending back offices. Generates French and \
                  flat-rate repayment schedules, previews how a cash receipt splits \
                  into late fee, covered installments and excess, and replays whole \
                  servicing scenarios (payments, reversals, overdue sweeps) against \
                  an in-memory portfolio."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a repayment schedule (flat-rate or French)
    Schedule(ScheduleArgs),
    /// Preview how a cash receipt distributes across installments
    Distribute(DistributeArgs),
    /// Replay a servicing scenario against an in-memory portfolio
    Simulate(SimulateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Schedule(args) => commands::schedule::run_schedule(args),
        Commands::Distribute(args) => commands::distribute::run_distribute(args),
        Commands::Simulate(args) => commands::simulate::run_simulate(args),
        Commands::Version => {
            println!("cartera {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
