//! Mortgage plus property tax payment schedule.
//!
//! Layers property value growth and property tax on top of a fixed-rate
//! amortization of `ltv * asset_price`. Growth and tax are always stepped
//! monthly, whatever the payment cadence of the loan.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EstateError;
use crate::math::{checked_sum, nth_root};
use crate::mortgage::amortization::{
    amortization_periods, default_payments_per_year, AmortizationPeriod, LoanTerms,
};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EstateResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// LTV above which a high-leverage warning is emitted.
const HIGH_LTV_THRESHOLD: Rate = dec!(0.80);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a combined mortgage and property tax schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentScheduleInput {
    /// Purchase price; also taken as the assessed value.
    pub asset_price: Money,
    /// Loan-to-value at origination (debt / asset_price).
    pub ltv: Rate,
    /// Annual mortgage interest rate.
    pub annual_rate: Rate,
    /// Number of mortgage payments.
    pub num_payments: u32,
    /// Annual property tax rate on current property value.
    pub property_tax_rate: Rate,
    /// Annual property value growth rate.
    pub property_growth_rate: Rate,
    /// Mortgage payments per year.
    #[serde(default = "default_payments_per_year")]
    pub payments_per_year: u32,
}

/// One payment interval with property value and tax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPeriod {
    #[serde(flatten)]
    pub amortization: AmortizationPeriod,
    /// Property value at this period, grown monthly from the purchase price.
    pub property_value: Money,
    /// Monthly property tax on the current property value.
    pub property_tax_payment: Money,
    /// Property tax + interest + principal.
    pub total_payment: Money,
}

/// Output of the payment schedule builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentScheduleOutput {
    /// Original loan amount.
    pub debt: Money,
    /// Constant interest + principal payment.
    pub level_mortgage_payment: Money,
    /// Sum of property tax over the schedule.
    pub total_property_tax: Money,
    /// Sum of total payments over the schedule.
    pub total_payments: Money,
    /// One row per payment.
    pub periods: Vec<PaymentPeriod>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the mortgage + property tax schedule.
pub fn build_payment_schedule(
    input: &PaymentScheduleInput,
) -> EstateResult<ComputationOutput<PaymentScheduleOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let periods = payment_periods(input)?;

    if input.ltv > HIGH_LTV_THRESHOLD {
        warnings.push(format!(
            "LTV of {:.1}% exceeds 80%: high leverage",
            input.ltv.saturating_mul(dec!(100))
        ));
    }
    if input.payments_per_year != 12 {
        warnings.push(format!(
            "Property growth and tax are stepped monthly while the mortgage pays {} times per year",
            input.payments_per_year
        ));
    }

    let level_mortgage_payment = periods
        .first()
        .map(|p| p.amortization.interest_payment + p.amortization.principal_payment)
        .unwrap_or(Decimal::ZERO);
    let total_property_tax: Money = checked_sum(periods.iter().map(|p| p.property_tax_payment))
        .ok_or_else(|| growth_overflow(periods.len()))?;
    let total_payments: Money = checked_sum(periods.iter().map(|p| p.total_payment))
        .ok_or_else(|| growth_overflow(periods.len()))?;

    let output = PaymentScheduleOutput {
        debt: periods
            .first()
            .map(|p| p.amortization.principal_remaining)
            .unwrap_or(Decimal::ZERO),
        level_mortgage_payment,
        total_property_tax,
        total_payments,
        periods,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Mortgage + Property Tax Payment Schedule",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Schedule rows without the output envelope.
pub fn payment_periods(input: &PaymentScheduleInput) -> EstateResult<Vec<PaymentPeriod>> {
    validate_input(input)?;

    let terms = LoanTerms {
        principal: input
            .ltv
            .checked_mul(input.asset_price)
            .ok_or_else(|| EstateError::InvalidInput {
                field: "ltv".into(),
                reason: "Loan amount overflows decimal range".into(),
            })?,
        annual_rate: input.annual_rate,
        num_payments: input.num_payments,
        payments_per_year: input.payments_per_year,
    };
    let amortization = amortization_periods(&terms)?;

    let monthly_growth = nth_root(Decimal::ONE + input.property_growth_rate, 12);
    let mut property_value = input.asset_price;

    let mut periods = Vec::with_capacity(amortization.len());
    for (t, row) in amortization.into_iter().enumerate() {
        if t > 0 {
            property_value = property_value
                .checked_mul(monthly_growth)
                .ok_or_else(|| growth_overflow(t))?;
        }
        let property_tax_payment = property_value
            .checked_mul(input.property_tax_rate)
            .ok_or_else(|| growth_overflow(t))?
            / MONTHS_PER_YEAR;
        let total_payment = checked_sum([
            property_tax_payment,
            row.interest_payment,
            row.principal_payment,
        ])
        .ok_or_else(|| growth_overflow(t))?;
        periods.push(PaymentPeriod {
            amortization: row,
            property_value,
            property_tax_payment,
            total_payment,
        });
    }

    Ok(periods)
}

fn growth_overflow(period: usize) -> EstateError {
    EstateError::InvalidInput {
        field: "property_growth_rate".into(),
        reason: format!("Property value overflows decimal range by period {period}"),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &PaymentScheduleInput) -> EstateResult<()> {
    if input.asset_price <= Decimal::ZERO {
        return Err(EstateError::InvalidInput {
            field: "asset_price".into(),
            reason: "Asset price must be positive".into(),
        });
    }
    if input.ltv <= Decimal::ZERO {
        return Err(EstateError::InvalidInput {
            field: "ltv".into(),
            reason: "LTV must be positive".into(),
        });
    }
    if input.property_tax_rate < Decimal::ZERO {
        return Err(EstateError::InvalidInput {
            field: "property_tax_rate".into(),
            reason: "Property tax rate cannot be negative".into(),
        });
    }
    if input.property_growth_rate <= dec!(-1) {
        return Err(EstateError::InvalidInput {
            field: "property_growth_rate".into(),
            reason: "Property growth rate must be greater than -100%".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
