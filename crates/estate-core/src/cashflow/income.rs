use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EstateError;
use crate::math::{checked_sum, nth_root};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EstateResult;

/// Input for a rent projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeInput {
    /// Rent collected in the first period.
    pub starting_rent: Money,
    /// Expected annual rent growth rate.
    pub rent_growth_rate: Rate,
    /// Number of monthly periods to project.
    pub num_periods: u32,
}

/// Projected rent per period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomeOutput {
    pub rents: Vec<Money>,
    pub total_income: Money,
    pub final_rent: Money,
}

/// Project rent forward at the monthly equivalent of the annual growth rate.
pub fn project_income(input: &IncomeInput) -> EstateResult<ComputationOutput<IncomeOutput>> {
    let start = Instant::now();

    let rents = income_schedule(input.starting_rent, input.rent_growth_rate, input.num_periods)?;
    let total_income: Money =
        checked_sum(rents.iter().copied()).ok_or_else(|| rent_overflow(input.num_periods))?;
    let final_rent = rents.last().copied().unwrap_or(Decimal::ZERO);

    let output = IncomeOutput {
        rents,
        total_income,
        final_rent,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rental Income Projection (monthly compounding)",
        input,
        Vec::new(),
        elapsed,
        output,
    ))
}

/// Rent sequence of length `n`: starting_rent * (1 + g)^(t/12) for t = 0..n.
pub fn income_schedule(
    starting_rent: Money,
    growth_rate: Rate,
    n: u32,
) -> EstateResult<Vec<Money>> {
    if n == 0 {
        return Err(EstateError::InvalidInput {
            field: "num_periods".into(),
            reason: "At least one period is required".into(),
        });
    }
    if starting_rent < Decimal::ZERO {
        return Err(EstateError::InvalidInput {
            field: "starting_rent".into(),
            reason: "Starting rent cannot be negative".into(),
        });
    }
    if growth_rate <= dec!(-1) {
        return Err(EstateError::InvalidInput {
            field: "rent_growth_rate".into(),
            reason: "Rent growth rate must be greater than -100%".into(),
        });
    }

    let monthly_growth = nth_root(Decimal::ONE + growth_rate, 12);
    let mut rent = starting_rent;
    let mut rents = Vec::with_capacity(n as usize);
    for t in 0..n {
        if t > 0 {
            rent = rent
                .checked_mul(monthly_growth)
                .ok_or_else(|| rent_overflow(t))?;
        }
        rents.push(rent);
    }
    Ok(rents)
}

fn rent_overflow(period: u32) -> EstateError {
    EstateError::InvalidInput {
        field: "rent_growth_rate".into(),
        reason: format!("Rent overflows decimal range by period {period}"),
    }
}
