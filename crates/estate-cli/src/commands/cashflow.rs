use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use estate_core::cashflow::financial_schedule::{self, FinancialScheduleInput};
use estate_core::cashflow::income::{self, IncomeInput};

use crate::input;

/// Arguments for a rent projection
#[derive(Args)]
pub struct IncomeArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Monthly rent in the first period
    #[arg(long)]
    pub starting_rent: Option<Decimal>,

    /// Annual rent growth rate
    #[arg(long, allow_hyphen_values = true)]
    pub rent_growth_rate: Option<Decimal>,

    /// Number of monthly periods
    #[arg(long, default_value = "360")]
    pub num_periods: u32,
}

/// Arguments for the full rental financial schedule
#[derive(Args)]
pub struct FinancialScheduleArgs {
    /// Path to JSON input file with the property, loan and rent assumptions
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_income(args: IncomeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let income_input: IncomeInput = match input::load(args.input.as_deref())? {
        Some(loaded) => loaded,
        None => IncomeInput {
            starting_rent: args
                .starting_rent
                .ok_or("--starting-rent is required (or provide --input)")?,
            rent_growth_rate: args.rent_growth_rate.unwrap_or(dec!(0.02)),
            num_periods: args.num_periods,
        },
    };

    let result = income::project_income(&income_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_financial_schedule(
    args: FinancialScheduleArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let fs_input: FinancialScheduleInput =
        input::require(args.input.as_deref(), "the financial schedule")?;
    let result = financial_schedule::build_financial_schedule(&fs_input)?;
    Ok(serde_json::to_value(result)?)
}
