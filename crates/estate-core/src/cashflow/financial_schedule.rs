//! Rental property financial schedule: cash flow, tax and balance sheet.
//!
//! Joins the mortgage + property tax schedule with projected rent, then
//! derives per-period cash flow, straight-line depreciation, income tax,
//! after-tax cash flow, LTV and equity. Losses are not carried forward
//! between periods, and negative cash flow is not financed.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::cashflow::income::income_schedule;
use crate::math::checked_sum;
use crate::error::EstateError;
use crate::mortgage::amortization::default_payments_per_year;
use crate::mortgage::payment_schedule::{payment_periods, PaymentPeriod, PaymentScheduleInput};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EstateResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MONTHS_PER_YEAR: Decimal = dec!(12);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Input for a full rental property financial schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialScheduleInput {
    /// Purchase price; also taken as the assessed value.
    pub asset_price: Money,
    /// Loan-to-value at origination.
    pub ltv: Rate,
    /// Annual mortgage interest rate.
    pub annual_rate: Rate,
    /// Number of mortgage payments.
    pub num_payments: u32,
    /// Annual property tax rate.
    pub property_tax_rate: Rate,
    /// Annual property value growth rate.
    pub property_growth_rate: Rate,
    /// Annual rent growth rate.
    pub rent_growth_rate: Rate,
    /// Monthly rent in the first period.
    pub starting_rent: Money,
    /// Fraction of the property value that is depreciable (the building).
    #[serde(default = "default_assessed_fraction")]
    pub building_assessed_fraction: Rate,
    /// Straight-line depreciation life in years.
    #[serde(default = "default_depreciation_years")]
    pub depreciation_years: Decimal,
    /// Marginal personal income tax rate.
    #[serde(default = "default_personal_tax_rate")]
    pub personal_tax_rate: Rate,
    /// Mortgage payments per year.
    #[serde(default = "default_payments_per_year")]
    pub payments_per_year: u32,
}

fn default_assessed_fraction() -> Rate {
    dec!(0.5)
}

fn default_depreciation_years() -> Decimal {
    dec!(27.5)
}

fn default_personal_tax_rate() -> Rate {
    dec!(0.3)
}

/// One period of the financial schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialPeriod {
    #[serde(flatten)]
    pub payment: PaymentPeriod,
    /// Rent collected.
    pub revenue: Money,
    /// Revenue - total payment.
    pub cashflow: Money,
    /// Depreciable portion of the current property value.
    pub depreciable_value: Money,
    /// Monthly straight-line depreciation.
    pub depreciated_loss: Money,
    /// Cash flow with principal added back (principal is not an expense).
    pub net_income: Money,
    /// Income tax due this period, floored at zero.
    pub tax_payment: Money,
    /// Cash flow after income tax.
    pub after_tax_cashflow: Money,
    /// Remaining principal / property value.
    pub ltv: Rate,
    /// Property value - remaining principal.
    pub equity: Money,
}

/// Output of the financial schedule composer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialScheduleOutput {
    pub total_revenue: Money,
    pub total_cashflow: Money,
    pub total_tax: Money,
    pub total_after_tax_cashflow: Money,
    /// Number of periods where rent does not cover the total payment.
    pub negative_cashflow_periods: u32,
    pub final_equity: Money,
    pub final_ltv: Rate,
    pub periods: Vec<FinancialPeriod>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the full financial schedule for a leveraged rental property.
pub fn build_financial_schedule(
    input: &FinancialScheduleInput,
) -> EstateResult<ComputationOutput<FinancialScheduleOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let payments = payment_periods(&PaymentScheduleInput {
        asset_price: input.asset_price,
        ltv: input.ltv,
        annual_rate: input.annual_rate,
        num_payments: input.num_payments,
        property_tax_rate: input.property_tax_rate,
        property_growth_rate: input.property_growth_rate,
        payments_per_year: input.payments_per_year,
    })?;
    let revenues = income_schedule(
        input.starting_rent,
        input.rent_growth_rate,
        input.num_payments,
    )?;

    let periods: Vec<FinancialPeriod> = payments
        .into_iter()
        .zip(revenues)
        .map(|(payment, revenue)| compose_period(input, payment, revenue))
        .collect::<EstateResult<_>>()?;

    let total = |field: fn(&FinancialPeriod) -> Money| {
        checked_sum(periods.iter().map(field)).ok_or_else(|| cashflow_overflow(periods.len()))
    };
    let total_revenue = total(|p| p.revenue)?;
    let total_cashflow = total(|p| p.cashflow)?;
    let total_tax = total(|p| p.tax_payment)?;
    let total_after_tax_cashflow = total(|p| p.after_tax_cashflow)?;
    let negative_cashflow_periods =
        periods.iter().filter(|p| p.cashflow < Decimal::ZERO).count() as u32;

    let (final_equity, final_ltv) = periods
        .last()
        .map(|p| (p.equity, p.ltv))
        .unwrap_or((Decimal::ZERO, Decimal::ZERO));

    if negative_cashflow_periods > 0 {
        let first_negative = periods
            .iter()
            .find(|p| p.cashflow < Decimal::ZERO)
            .map(|p| p.payment.amortization.payment_n)
            .unwrap_or(0);
        warnings.push(format!(
            "Cash flow is negative in {negative_cashflow_periods} of {} periods \
             (first at period {first_negative}); shortfalls are not financed",
            periods.len()
        ));
    }

    let output = FinancialScheduleOutput {
        total_revenue,
        total_cashflow,
        total_tax,
        total_after_tax_cashflow,
        negative_cashflow_periods,
        final_equity,
        final_ltv,
        periods,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rental Property Financial Schedule (after-tax cash flow, no loss carry-forward)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Per-period derivation
// ---------------------------------------------------------------------------

fn compose_period(
    input: &FinancialScheduleInput,
    payment: PaymentPeriod,
    revenue: Money,
) -> EstateResult<FinancialPeriod> {
    let period = payment.amortization.payment_n as usize;
    let overflow = || cashflow_overflow(period);

    let cashflow = revenue
        .checked_sub(payment.total_payment)
        .ok_or_else(overflow)?;

    // Assessed fraction is validated into [0, 1].
    let depreciable_value = payment.property_value * input.building_assessed_fraction;
    let depreciated_loss = input
        .depreciation_years
        .checked_mul(MONTHS_PER_YEAR)
        .and_then(|months| depreciable_value.checked_div(months))
        .ok_or_else(overflow)?;

    let net_income = cashflow
        .checked_add(payment.amortization.principal_payment)
        .ok_or_else(overflow)?;
    let taxable = net_income.checked_sub(depreciated_loss).ok_or_else(overflow)?;
    let tax_payment = (taxable * input.personal_tax_rate).max(Decimal::ZERO);
    let after_tax_cashflow = cashflow.checked_sub(tax_payment).ok_or_else(overflow)?;

    if payment.property_value.is_zero() {
        return Err(EstateError::DivisionByZero {
            context: format!(
                "LTV at period {} (property value is zero)",
                payment.amortization.payment_n
            ),
        });
    }
    let remaining = payment.amortization.principal_remaining;
    let ltv = remaining / payment.property_value;
    let equity = payment.property_value - remaining;

    Ok(FinancialPeriod {
        payment,
        revenue,
        cashflow,
        depreciable_value,
        depreciated_loss,
        net_income,
        tax_payment,
        after_tax_cashflow,
        ltv,
        equity,
    })
}

fn cashflow_overflow(period: usize) -> EstateError {
    EstateError::InvalidInput {
        field: "starting_rent".into(),
        reason: format!("Cash flow overflows decimal range by period {period}"),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &FinancialScheduleInput) -> EstateResult<()> {
    if input.building_assessed_fraction < Decimal::ZERO
        || input.building_assessed_fraction > Decimal::ONE
    {
        return Err(EstateError::InvalidInput {
            field: "building_assessed_fraction".into(),
            reason: "Assessed fraction must be between 0 and 1".into(),
        });
    }
    if input.depreciation_years <= Decimal::ZERO {
        return Err(EstateError::InvalidInput {
            field: "depreciation_years".into(),
            reason: "Depreciation life must be positive".into(),
        });
    }
    if input.personal_tax_rate < Decimal::ZERO || input.personal_tax_rate > Decimal::ONE {
        return Err(EstateError::InvalidInput {
            field: "personal_tax_rate".into(),
            reason: "Personal tax rate must be between 0 and 1".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
