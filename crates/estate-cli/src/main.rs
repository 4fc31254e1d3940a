mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::cashflow::{FinancialScheduleArgs, IncomeArgs};
use commands::mortgage::{AmortizeArgs, PaymentScheduleArgs};
use commands::notes::{NotePriceArgs, NoteYieldArgs};
use commands::simulation::{SimulateManyArgs, SimulatePropertyArgs};

/// Rental property cash flows, mortgage notes and property simulation
#[derive(Parser)]
#[command(
    name = "estate",
    version,
    about = "Rental property cash flows, mortgage notes and property simulation",
    long_about = "A CLI for real-estate investment analysis with decimal precision. \
                  Builds amortization, payment and after-tax financial schedules, \
                  prices mortgage notes and solves their yields, and runs seeded \
                  Monte Carlo simulations of a leveraged rental property."
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
    /// Level-payment amortization schedule
    Amortize(AmortizeArgs),
    /// Mortgage + property tax payment schedule
    PaymentSchedule(PaymentScheduleArgs),
    /// Project monthly rent with annual growth
    Income(IncomeArgs),
    /// After-tax cash flow, LTV and equity schedule for a rental
    FinancialSchedule(FinancialScheduleArgs),
    /// Price a mortgage note at a market rate
    NotePrice(NotePriceArgs),
    /// Solve the yield implied by a note price
    NoteYield(NoteYieldArgs),
    /// Simulate one stochastic path of a rental property
    SimulateProperty(SimulatePropertyArgs),
    /// Simulate many paths and summarise bankruptcy and IRR
    SimulateMany(SimulateManyArgs),
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
        Commands::Amortize(args) => commands::mortgage::run_amortize(args),
        Commands::PaymentSchedule(args) => commands::mortgage::run_payment_schedule(args),
        Commands::Income(args) => commands::cashflow::run_income(args),
        Commands::FinancialSchedule(args) => commands::cashflow::run_financial_schedule(args),
        Commands::NotePrice(args) => commands::notes::run_note_price(args),
        Commands::NoteYield(args) => commands::notes::run_note_yield(args),
        Commands::SimulateProperty(args) => commands::simulation::run_simulate_property(args),
        Commands::SimulateMany(args) => commands::simulation::run_simulate_many(args),
        Commands::Version => {
            println!("estate {}", env!("CARGO_PKG_VERSION"));
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
