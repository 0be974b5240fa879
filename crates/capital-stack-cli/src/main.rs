mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::monte_carlo::SimulateArgs;
use commands::scenarios::{ScenariosArgs, SensitivityArgs};
use commands::stack::{CalculateArgs, IrrArgs, PaymentArgs, ScheduleArgs};

/// Capital stack and investment return calculations
#[derive(Parser)]
#[command(
    name = "capstack",
    version,
    about = "Capital stack and investment return calculations",
    long_about = "A CLI for structuring small-business acquisitions with decimal precision. \
                  Splits a purchase across equity, seller note, SBA 7(a) and conventional \
                  debt, then reports debt service, DSCR, cash-on-cash return, IRR and \
                  equity multiple. Supports sensitivity grids, scenarios and Monte Carlo."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log calculation steps to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Round decimal values to this many places for display
    #[arg(long, global = true)]
    round: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full capital stack calculation
    Calculate(CalculateArgs),
    /// Monthly payment for a single loan
    Payment(PaymentArgs),
    /// Year-by-year amortization schedule for a single loan
    Schedule(ScheduleArgs),
    /// IRR, NPV and equity multiple of a cash flow series
    Irr(IrrArgs),
    /// Two-way sensitivity grid over the capital stack
    Sensitivity(SensitivityArgs),
    /// Probability-weighted scenario analysis
    Scenarios(ScenariosArgs),
    /// Monte Carlo IRR simulation
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

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "capital_stack_core=debug,capstack=debug"
    } else {
        "capital_stack_core=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // stdout carries the result; logs go to stderr
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Calculate(args) => commands::stack::run_calculate(args),
        Commands::Payment(args) => commands::stack::run_payment(args),
        Commands::Schedule(args) => commands::stack::run_schedule(args),
        Commands::Irr(args) => commands::stack::run_irr(args),
        Commands::Sensitivity(args) => commands::scenarios::run_sensitivity(args),
        Commands::Scenarios(args) => commands::scenarios::run_scenarios(args),
        Commands::Simulate(args) => commands::monte_carlo::run_simulate(args),
        Commands::Version => {
            println!("capstack {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(mut value) => {
            if let Some(dp) = cli.round {
                output::round::round_decimals(&mut value, dp);
            }
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
