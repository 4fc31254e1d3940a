use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use estate_core::notes::valuation::{self, NotePriceInput, NoteYieldInput};

use crate::input;

/// Arguments for pricing a mortgage note
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct NotePriceArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Outstanding principal on the note
    #[arg(long)]
    pub unpaid_balance: Option<Decimal>,

    /// Annual coupon rate of the underlying mortgage
    #[arg(long)]
    pub coupon_rate: Option<Decimal>,

    /// Annual market rate used to discount the payments
    #[arg(long)]
    pub market_rate: Option<Decimal>,

    /// Monthly payments left on the note
    #[arg(long)]
    pub remaining_payments: Option<u32>,
}

/// Arguments for solving a note's yield from its price
#[derive(Args)]
pub struct NoteYieldArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Price paid for the note
    #[arg(long)]
    pub price: Option<Decimal>,

    /// Outstanding principal on the note
    #[arg(long)]
    pub unpaid_balance: Option<Decimal>,

    /// Annual coupon rate of the underlying mortgage
    #[arg(long)]
    pub coupon_rate: Option<Decimal>,

    /// Monthly payments left on the note
    #[arg(long)]
    pub remaining_payments: Option<u32>,
}

pub fn run_note_price(args: NotePriceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let note_input: NotePriceInput = match input::load(args.input.as_deref())? {
        Some(loaded) => loaded,
        None => NotePriceInput {
            unpaid_balance: args
                .unpaid_balance
                .ok_or("--unpaid-balance is required (or provide --input)")?,
            coupon_rate: args
                .coupon_rate
                .ok_or("--coupon-rate is required (or provide --input)")?,
            market_rate: args
                .market_rate
                .ok_or("--market-rate is required (or provide --input)")?,
            remaining_payments: args
                .remaining_payments
                .ok_or("--remaining-payments is required (or provide --input)")?,
        },
    };

    let result = valuation::price_note(&note_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_note_yield(args: NoteYieldArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let yield_input: NoteYieldInput = match input::load(args.input.as_deref())? {
        Some(loaded) => loaded,
        None => NoteYieldInput {
            price: args.price.ok_or("--price is required (or provide --input)")?,
            unpaid_balance: args
                .unpaid_balance
                .ok_or("--unpaid-balance is required (or provide --input)")?,
            coupon_rate: args
                .coupon_rate
                .ok_or("--coupon-rate is required (or provide --input)")?,
            remaining_payments: args
                .remaining_payments
                .ok_or("--remaining-payments is required (or provide --input)")?,
        },
    };

    let result = valuation::solve_note_yield(&yield_input)?;
    Ok(serde_json::to_value(result)?)
}
