use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use estate_core::mortgage::amortization::{self, LoanTerms};
use estate_core::mortgage::payment_schedule::{self, PaymentScheduleInput};

use crate::input;

/// Arguments for a level-payment amortization schedule
#[derive(Args)]
pub struct AmortizeArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual interest rate (effective, e.g. 0.05 for 5%)
    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<Decimal>,

    /// Number of payments
    #[arg(long)]
    pub num_payments: Option<u32>,

    /// Payments per year
    #[arg(long, default_value = "12")]
    pub payments_per_year: u32,
}

/// Arguments for the mortgage + property tax schedule
#[derive(Args)]
pub struct PaymentScheduleArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Purchase price of the property
    #[arg(long)]
    pub asset_price: Option<Decimal>,

    /// Loan-to-value at origination
    #[arg(long, default_value = "0.8")]
    pub ltv: Decimal,

    /// Annual mortgage rate
    #[arg(long, allow_hyphen_values = true)]
    pub rate: Option<Decimal>,

    /// Number of payments
    #[arg(long, default_value = "360")]
    pub num_payments: u32,

    /// Annual property tax rate
    #[arg(long)]
    pub property_tax_rate: Option<Decimal>,

    /// Annual property value growth rate
    #[arg(long, allow_hyphen_values = true)]
    pub property_growth_rate: Option<Decimal>,

    /// Payments per year
    #[arg(long, default_value = "12")]
    pub payments_per_year: u32,
}

pub fn run_amortize(args: AmortizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let terms: LoanTerms = match input::load(args.input.as_deref())? {
        Some(loaded) => loaded,
        None => LoanTerms {
            principal: args
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            annual_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            num_payments: args
                .num_payments
                .ok_or("--num-payments is required (or provide --input)")?,
            payments_per_year: args.payments_per_year,
        },
    };

    let result = amortization::amortize(&terms)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_payment_schedule(
    args: PaymentScheduleArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let schedule_input: PaymentScheduleInput = match input::load(args.input.as_deref())? {
        Some(loaded) => loaded,
        None => PaymentScheduleInput {
            asset_price: args
                .asset_price
                .ok_or("--asset-price is required (or provide --input)")?,
            ltv: args.ltv,
            annual_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            num_payments: args.num_payments,
            property_tax_rate: args.property_tax_rate.unwrap_or(dec!(0.01)),
            property_growth_rate: args.property_growth_rate.unwrap_or(Decimal::ZERO),
            payments_per_year: args.payments_per_year,
        },
    };

    let result = payment_schedule::build_payment_schedule(&schedule_input)?;
    Ok(serde_json::to_value(result)?)
}
