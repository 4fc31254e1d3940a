//! Mortgage note price/yield parity.
//!
//! A note pays a level monthly amount fixed by its coupon rate. Pricing it at
//! a different market rate is closed form: the payment stream is worth
//! `unpaid * f(coupon) / f(market)`, where `f` is the level payment per unit
//! of principal. The inverse, the yield implied by a traded price, is found
//! by bisection over annual rates in [-100%, 1000%], using that `f` is
//! strictly increasing in the rate. All math in `rust_decimal::Decimal`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EstateError;
use crate::math::{annuity_factor, periodic_rate};
use crate::mortgage::amortization::{amortization_periods, LoanTerms};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EstateResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Note payments are always monthly.
const NOTE_PAYMENTS_PER_YEAR: u32 = 12;

/// Lower end of the yield search domain (annualized).
const YIELD_LOWER_BOUND: Rate = dec!(-1);

/// Upper end of the yield search domain (annualized).
const YIELD_UPPER_BOUND: Rate = dec!(10);

/// Bisection stops once the bracket is narrower than this.
const BISECTION_TOL: Decimal = dec!(0.0000000001);

/// Maximum bisection iterations.
const BISECTION_MAX_ITER: u32 = 200;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for pricing a note at a market yield.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePriceInput {
    /// Outstanding principal on the note.
    pub unpaid_balance: Money,
    /// Annual rate the note was written at.
    pub coupon_rate: Rate,
    /// Annual yield demanded by the market.
    pub market_rate: Rate,
    /// Monthly payments left on the note.
    pub remaining_payments: u32,
}

/// Output of note pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotePriceOutput {
    /// Price of the remaining payment stream at the market rate.
    pub price: Money,
    /// Price / unpaid balance.
    pub price_to_par: Decimal,
    /// Price - unpaid balance (positive = premium).
    pub premium_discount: Money,
    /// Level monthly payment fixed by the coupon rate.
    pub monthly_payment: Money,
}

/// Input for solving the yield implied by a traded price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteYieldInput {
    /// Traded price of the note.
    pub price: Money,
    /// Outstanding principal on the note.
    pub unpaid_balance: Money,
    /// Annual rate the note was written at.
    pub coupon_rate: Rate,
    /// Monthly payments left on the note.
    pub remaining_payments: u32,
}

/// Output of the yield solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteYieldOutput {
    /// Effective annual yield implied by the price.
    pub yield_rate: Rate,
    /// Yield - coupon rate.
    pub spread_to_coupon: Rate,
    /// Level monthly payment fixed by the coupon rate.
    pub monthly_payment: Money,
    /// Monthly payment / price: the payment factor the yield reproduces.
    pub payment_to_price: Decimal,
    /// Bisection iterations used.
    pub iterations: u32,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Price a note at a market yield different from its coupon.
pub fn price_note(input: &NotePriceInput) -> EstateResult<ComputationOutput<NotePriceOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let price = note_price(
        input.unpaid_balance,
        input.coupon_rate,
        input.market_rate,
        input.remaining_payments,
    )?;
    let monthly_payment = input
        .unpaid_balance
        .checked_mul(payment_factor(input.coupon_rate, input.remaining_payments))
        .ok_or_else(balance_overflow)?;

    if input.market_rate < Decimal::ZERO {
        warnings.push("Negative market yield: price exceeds undiscounted payments".into());
    }

    let output = NotePriceOutput {
        price,
        price_to_par: price / input.unpaid_balance,
        premium_discount: price - input.unpaid_balance,
        monthly_payment,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Mortgage Note Pricing (level-payment parity)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Solve the effective annual yield implied by a note's traded price.
pub fn solve_note_yield(
    input: &NoteYieldInput,
) -> EstateResult<ComputationOutput<NoteYieldOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_yield_input(input)?;

    let monthly_payment = level_payment(
        input.unpaid_balance,
        input.coupon_rate,
        input.remaining_payments,
    )?;
    let payment_to_price = monthly_payment / input.price;
    let (yield_rate, iterations) = bisect_yield(payment_to_price, input.remaining_payments)?;

    let total_payments = monthly_payment.saturating_mul(Decimal::from(input.remaining_payments));
    if input.price > total_payments {
        warnings.push(format!(
            "Price exceeds the sum of remaining payments ({total_payments:.2}): \
             implied yield is negative"
        ));
    }

    let output = NoteYieldOutput {
        yield_rate,
        spread_to_coupon: yield_rate - input.coupon_rate,
        monthly_payment,
        payment_to_price,
        iterations,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Mortgage Note Yield (bisection on level-payment factor)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Closed-form note price: unpaid * f(coupon, n) / f(market, n).
pub fn note_price(
    unpaid_balance: Money,
    coupon_rate: Rate,
    market_rate: Rate,
    remaining_payments: u32,
) -> EstateResult<Money> {
    validate_note(unpaid_balance, coupon_rate, remaining_payments)?;
    if market_rate <= dec!(-1) {
        return Err(EstateError::InvalidInput {
            field: "market_rate".into(),
            reason: "Market rate must be greater than -100%".into(),
        });
    }

    let market_factor = payment_factor(market_rate, remaining_payments);
    if market_factor.is_zero() {
        return Err(EstateError::DivisionByZero {
            context: "note price market payment factor".into(),
        });
    }

    unpaid_balance
        .checked_mul(payment_factor(coupon_rate, remaining_payments))
        .and_then(|scaled| scaled.checked_div(market_factor))
        .ok_or_else(balance_overflow)
}

/// Effective annual yield implied by `price`.
pub fn note_yield(
    price: Money,
    unpaid_balance: Money,
    coupon_rate: Rate,
    remaining_payments: u32,
) -> EstateResult<Rate> {
    let input = NoteYieldInput {
        price,
        unpaid_balance,
        coupon_rate,
        remaining_payments,
    };
    validate_yield_input(&input)?;
    let payment = level_payment(unpaid_balance, coupon_rate, remaining_payments)?;
    bisect_yield(payment / price, remaining_payments).map(|(rate, _)| rate)
}

// ---------------------------------------------------------------------------
// Solver internals
// ---------------------------------------------------------------------------

/// Level monthly payment per unit of principal at an annual rate.
fn payment_factor(annual_rate: Rate, n: u32) -> Decimal {
    annuity_factor(periodic_rate(annual_rate, NOTE_PAYMENTS_PER_YEAR), n)
}

/// Level payment of the note taken from the first row of its amortization.
fn level_payment(unpaid_balance: Money, coupon_rate: Rate, n: u32) -> EstateResult<Money> {
    let periods = amortization_periods(&LoanTerms {
        principal: unpaid_balance,
        annual_rate: coupon_rate,
        num_payments: n,
        payments_per_year: NOTE_PAYMENTS_PER_YEAR,
    })?;
    periods
        .first()
        .map(|p| p.interest_payment + p.principal_payment)
        .ok_or_else(|| EstateError::InsufficientData("Note has no remaining payments".into()))
}

/// Bisection for the rate whose payment factor equals `target`.
fn bisect_yield(target: Decimal, n: u32) -> EstateResult<(Rate, u32)> {
    let mut lo = YIELD_LOWER_BOUND;
    let mut hi = YIELD_UPPER_BOUND;

    if target < payment_factor(lo, n) || target > payment_factor(hi, n) {
        return Err(EstateError::InvalidInput {
            field: "price".into(),
            reason: format!(
                "Implied yield lies outside the search domain [{:.0}%, {:.0}%]",
                lo * dec!(100),
                hi * dec!(100)
            ),
        });
    }

    for iter in 0..BISECTION_MAX_ITER {
        if hi - lo < BISECTION_TOL {
            return Ok(((lo + hi) / dec!(2), iter));
        }
        let mid = (lo + hi) / dec!(2);
        if payment_factor(mid, n) > target {
            hi = mid;
        } else {
            lo = mid;
        }
    }

    Err(EstateError::ConvergenceFailure {
        function: "note_yield_bisection".into(),
        iterations: BISECTION_MAX_ITER,
        last_delta: hi - lo,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn balance_overflow() -> EstateError {
    EstateError::InvalidInput {
        field: "unpaid_balance".into(),
        reason: "Note value overflows decimal range".into(),
    }
}

fn validate_note(
    unpaid_balance: Money,
    coupon_rate: Rate,
    remaining_payments: u32,
) -> EstateResult<()> {
    if unpaid_balance <= Decimal::ZERO {
        return Err(EstateError::InvalidInput {
            field: "unpaid_balance".into(),
            reason: "Unpaid balance must be positive".into(),
        });
    }
    if remaining_payments == 0 {
        return Err(EstateError::InvalidInput {
            field: "remaining_payments".into(),
            reason: "Note must have at least one remaining payment".into(),
        });
    }
    if coupon_rate <= dec!(-1) {
        return Err(EstateError::InvalidInput {
            field: "coupon_rate".into(),
            reason: "Coupon rate must be greater than -100%".into(),
        });
    }
    Ok(())
}

fn validate_yield_input(input: &NoteYieldInput) -> EstateResult<()> {
    validate_note(input.unpaid_balance, input.coupon_rate, input.remaining_payments)?;
    if input.price <= Decimal::ZERO {
        return Err(EstateError::InvalidInput {
            field: "price".into(),
            reason: "Price must be positive".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
