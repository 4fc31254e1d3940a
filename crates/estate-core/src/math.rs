//! Decimal math helpers shared by the schedule and note modules.
//!
//! Integer powers use iterative multiplication and fractional roots use
//! Newton's method, so no result depends on `Decimal::powd`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::Rate;

/// Newton iteration cap for `nth_root`.
const ROOT_MAX_ITER: u32 = 60;

/// Newton step size below which `nth_root` stops.
const ROOT_EPSILON: Decimal = dec!(0.000000000000000001);

/// Compute base^n for a non-negative integer exponent, `None` on overflow.
pub fn checked_pow(base: Decimal, n: u32) -> Option<Decimal> {
    let mut result = Decimal::ONE;
    for _ in 0..n {
        result = result.checked_mul(base)?;
    }
    Some(result)
}

/// Compute base^n, saturating at `Decimal::MAX` on overflow.
pub fn iterative_pow(base: Decimal, n: u32) -> Decimal {
    checked_pow(base, n).unwrap_or(Decimal::MAX)
}

/// Sum of `values`, `None` on overflow.
pub fn checked_sum<I: IntoIterator<Item = Decimal>>(values: I) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

/// Compute the nth root of a non-negative x using Newton's method.
pub fn nth_root(x: Decimal, n: u32) -> Decimal {
    if x == Decimal::ONE || n == 1 {
        return x;
    }
    if x <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if n == 0 {
        return Decimal::ONE;
    }

    let n_dec = Decimal::from(n);
    let mut guess = Decimal::ONE;

    for _ in 0..ROOT_MAX_ITER {
        let g_n_minus_1 = iterative_pow(guess, n - 1);
        if g_n_minus_1.is_zero() {
            break;
        }
        let (Some(g_n), Some(slope)) = (
            g_n_minus_1.checked_mul(guess),
            n_dec.checked_mul(g_n_minus_1),
        ) else {
            // Overshot: the root lies below guess.
            guess /= dec!(2);
            continue;
        };

        let delta = (g_n - x) / slope;
        guess -= delta;

        if delta.abs() < ROOT_EPSILON {
            break;
        }
    }

    guess
}

/// Per-interval rate that compounds to `annual_rate` over `periods_per_year`
/// intervals: (1 + i)^(1/k) - 1. Rates at or below -100% map to -1.
pub fn periodic_rate(annual_rate: Rate, periods_per_year: u32) -> Rate {
    let base = Decimal::ONE + annual_rate;
    if base <= Decimal::ZERO {
        return dec!(-1);
    }
    nth_root(base, periods_per_year) - Decimal::ONE
}

/// Level payment per unit of principal: r(1+r)^n / ((1+r)^n - 1).
///
/// Degenerate cases are resolved by their limits: a zero rate gives 1/n,
/// a -100% rate gives 0, and a compound factor too large for `Decimal`
/// gives r.
pub fn annuity_factor(periodic_rate: Rate, n: u32) -> Decimal {
    if n == 0 {
        return Decimal::ZERO;
    }
    if periodic_rate <= dec!(-1) {
        return Decimal::ZERO;
    }

    let n_dec = Decimal::from(n);
    if periodic_rate.is_zero() {
        return Decimal::ONE / n_dec;
    }

    match checked_pow(Decimal::ONE + periodic_rate, n) {
        Some(compound) => {
            let denominator = compound - Decimal::ONE;
            if denominator.is_zero() {
                Decimal::ONE / n_dec
            } else {
                periodic_rate * compound / denominator
            }
        }
        None => periodic_rate,
    }
}
