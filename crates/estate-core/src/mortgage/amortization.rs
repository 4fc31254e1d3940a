//! Fixed-rate amortization: level payment split into interest and principal.
//!
//! The annual rate is converted to the per-interval rate that compounds back
//! to it, (1 + i)^(1/k) - 1, and the schedule is produced by stepping the
//! balance forward one payment at a time. All math in `rust_decimal::Decimal`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::EstateError;
use crate::math::{annuity_factor, periodic_rate};
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::EstateResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Terms of a fixed-rate, fully amortizing loan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanTerms {
    /// Original loan amount.
    pub principal: Money,
    /// Annual effective interest rate (e.g. 0.05 = 5%).
    pub annual_rate: Rate,
    /// Total number of payments.
    pub num_payments: u32,
    /// Payments per year (12 = monthly, 2 = semiannual).
    #[serde(default = "default_payments_per_year")]
    pub payments_per_year: u32,
}

pub fn default_payments_per_year() -> u32 {
    12
}

/// One payment interval of an amortization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationPeriod {
    /// Payment index (0-based).
    pub payment_n: u32,
    /// Interest portion of the payment.
    pub interest_payment: Money,
    /// Principal portion of the payment.
    pub principal_payment: Money,
    /// Outstanding principal at the start of the interval.
    pub principal_remaining: Money,
}

/// Output of a fixed-rate amortization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationOutput {
    /// Constant interest + principal payment.
    pub level_payment: Money,
    /// Per-interval rate used for the schedule.
    pub periodic_rate: Rate,
    /// Sum of interest over the full schedule.
    pub total_interest: Money,
    /// Sum of principal over the full schedule.
    pub total_principal: Money,
    /// One row per payment.
    pub periods: Vec<AmortizationPeriod>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build a fixed-rate amortization schedule wrapped in the standard envelope.
pub fn amortize(terms: &LoanTerms) -> EstateResult<ComputationOutput<AmortizationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let periods = amortization_periods(terms)?;
    let rate = periodic_rate(terms.annual_rate, terms.payments_per_year);

    let level_payment = periods
        .first()
        .map(|p| p.interest_payment + p.principal_payment)
        .unwrap_or(Decimal::ZERO);
    let total_interest: Money = periods.iter().map(|p| p.interest_payment).sum();
    let total_principal: Money = periods.iter().map(|p| p.principal_payment).sum();

    if terms.annual_rate < Decimal::ZERO {
        warnings.push(format!(
            "Negative interest rate of {:.2}%: interest payments are credits",
            terms.annual_rate * dec!(100)
        ));
    }

    let output = AmortizationOutput {
        level_payment,
        periodic_rate: rate,
        total_interest,
        total_principal,
        periods,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Fixed-Rate Amortization (level payment)",
        terms,
        warnings,
        elapsed,
        output,
    ))
}

/// The bare amortization recurrence, without the output envelope.
///
/// `principal_remaining` is the balance before the period's payment, so the
/// last row's remaining principal equals its principal payment.
pub fn amortization_periods(terms: &LoanTerms) -> EstateResult<Vec<AmortizationPeriod>> {
    validate_terms(terms)?;

    let rate = periodic_rate(terms.annual_rate, terms.payments_per_year);
    let total = if rate.is_zero() {
        terms.principal / Decimal::from(terms.num_payments)
    } else {
        terms
            .principal
            .checked_mul(annuity_factor(rate, terms.num_payments))
            .ok_or_else(|| overflow(terms))?
    };

    let mut balance = terms.principal;
    let mut periods = Vec::with_capacity(terms.num_payments as usize);

    for n in 0..terms.num_payments {
        let interest_payment = balance.checked_mul(rate).ok_or_else(|| overflow(terms))?;
        let principal_payment = total
            .checked_sub(interest_payment)
            .ok_or_else(|| overflow(terms))?;
        periods.push(AmortizationPeriod {
            payment_n: n,
            interest_payment,
            principal_payment,
            principal_remaining: balance,
        });
        balance = balance
            .checked_sub(principal_payment)
            .ok_or_else(|| overflow(terms))?;
    }

    Ok(periods)
}

fn overflow(terms: &LoanTerms) -> EstateError {
    EstateError::InvalidInput {
        field: "principal".into(),
        reason: format!(
            "Schedule of {} at {} overflows decimal range",
            terms.principal, terms.annual_rate
        ),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_terms(terms: &LoanTerms) -> EstateResult<()> {
    if terms.principal <= Decimal::ZERO {
        return Err(EstateError::InvalidInput {
            field: "principal".into(),
            reason: "Principal must be positive".into(),
        });
    }
    if terms.num_payments == 0 {
        return Err(EstateError::InvalidInput {
            field: "num_payments".into(),
            reason: "Number of payments must be at least 1".into(),
        });
    }
    if terms.payments_per_year == 0 {
        return Err(EstateError::InvalidInput {
            field: "payments_per_year".into(),
            reason: "Payments per year must be at least 1".into(),
        });
    }
    if terms.annual_rate <= dec!(-1) {
        return Err(EstateError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Interest rate must be greater than -100%".into(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const TOL: Decimal = dec!(0.01);

    fn thirty_year(principal: Money) -> LoanTerms {
        LoanTerms {
            principal,
            annual_rate: dec!(0.05),
            num_payments: 360,
            payments_per_year: 12,
        }
    }

    #[test]
    fn test_schedule_length() {
        let out = amortize(&thirty_year(dec!(1000000))).unwrap();
        assert_eq!(out.result.periods.len(), 360);
        assert_eq!(out.result.periods[0].payment_n, 0);
        assert_eq!(out.result.periods[359].payment_n, 359);
    }

    #[test]
    fn test_loan_pays_off() {
        let out = amortize(&thirty_year(dec!(1000000))).unwrap();
        let last = out.result.periods.last().unwrap();
        assert!((last.principal_remaining - last.principal_payment).abs() < TOL);
        assert!((out.result.total_principal - dec!(1000000)).abs() < TOL);
    }

    #[test]
    fn test_level_payment_known_value() {
        // 1M at 5% effective annual over 30 years, monthly: ~5,300.55
        let out = amortize(&thirty_year(dec!(1000000))).unwrap();
        assert!(
            (out.result.level_payment - dec!(5300.55)).abs() < TOL,
            "level payment {}",
            out.result.level_payment
        );
    }

    #[test]
    fn test_payment_is_constant() {
        let out = amortize(&thirty_year(dec!(250000))).unwrap();
        let level = out.result.level_payment;
        for p in &out.result.periods {
            assert!((p.interest_payment + p.principal_payment - level).abs() < dec!(0.000001));
        }
    }

    #[test]
    fn test_principal_non_negative_and_balance_non_increasing() {
        let out = amortize(&thirty_year(dec!(1000000))).unwrap();
        for w in out.result.periods.windows(2) {
            assert!(w[0].principal_payment >= Decimal::ZERO);
            assert!(w[1].principal_remaining <= w[0].principal_remaining);
        }
    }

    #[test]
    fn test_semiannual_pays_more_interest() {
        let monthly = amortize(&thirty_year(dec!(1000000))).unwrap();
        let semiannual = amortize(&LoanTerms {
            principal: dec!(1000000),
            annual_rate: dec!(0.05),
            num_payments: 60,
            payments_per_year: 2,
        })
        .unwrap();

        assert_eq!(semiannual.result.periods.len(), 60);
        assert!((semiannual.result.total_principal - dec!(1000000)).abs() < TOL);
        let last = semiannual.result.periods.last().unwrap();
        assert!((last.principal_remaining - last.principal_payment).abs() < TOL);
        assert!(monthly.result.total_interest < semiannual.result.total_interest);
    }

    #[test]
    fn test_zero_rate_straight_line() {
        let out = amortize(&LoanTerms {
            principal: dec!(1000000),
            annual_rate: Decimal::ZERO,
            num_payments: 12,
            payments_per_year: 12,
        })
        .unwrap();
        let expected = dec!(1000000) / dec!(12);
        assert_eq!(out.result.periods.len(), 12);
        for p in &out.result.periods {
            assert_eq!(p.interest_payment, Decimal::ZERO);
            assert_eq!(p.principal_payment, expected);
        }
        assert_eq!(out.result.total_interest, Decimal::ZERO);
    }

    #[test]
    fn test_single_payment() {
        let out = amortize(&LoanTerms {
            principal: dec!(1000),
            annual_rate: dec!(0.12),
            num_payments: 1,
            payments_per_year: 1,
        })
        .unwrap();
        assert_eq!(out.result.periods.len(), 1);
        assert!((out.result.periods[0].principal_payment - dec!(1000)).abs() < TOL);
        assert!((out.result.periods[0].interest_payment - dec!(120)).abs() < TOL);
    }

    #[test]
    fn test_overflowing_schedule_is_an_error() {
        let terms = LoanTerms {
            principal: dec!(10_000_000_000_000_000_000_000_000),
            annual_rate: dec!(10000),
            num_payments: 5,
            payments_per_year: 1,
        };
        assert!(matches!(
            amortize(&terms),
            Err(EstateError::InvalidInput { ref field, .. }) if field == "principal"
        ));
    }

    #[test]
    fn test_zero_payments_error() {
        let mut terms = thirty_year(dec!(1000));
        terms.num_payments = 0;
        assert!(matches!(
            amortize(&terms),
            Err(EstateError::InvalidInput { ref field, .. }) if field == "num_payments"
        ));
    }

    #[test]
    fn test_non_positive_principal_error() {
        assert!(amortize(&thirty_year(Decimal::ZERO)).is_err());
        assert!(amortize(&thirty_year(dec!(-5))).is_err());
    }

    #[test]
    fn test_zero_payments_per_year_error() {
        let mut terms = thirty_year(dec!(1000));
        terms.payments_per_year = 0;
        assert!(amortize(&terms).is_err());
    }

    #[test]
    fn test_rate_below_minus_one_error() {
        let mut terms = thirty_year(dec!(1000));
        terms.annual_rate = dec!(-1);
        assert!(amortize(&terms).is_err());
    }

    #[test]
    fn test_negative_rate_warning() {
        let mut terms = thirty_year(dec!(1000));
        terms.annual_rate = dec!(-0.01);
        let out = amortize(&terms).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("Negative interest")));
    }

    #[test]
    fn test_payments_per_year_defaults_to_monthly() {
        let terms: LoanTerms = serde_json::from_str(
            r#"{"principal": "1000", "annual_rate": "0.05", "num_payments": 12}"#,
        )
        .unwrap();
        assert_eq!(terms.payments_per_year, 12);
    }

    #[test]
    fn test_methodology_string() {
        let out = amortize(&thirty_year(dec!(1000))).unwrap();
        assert_eq!(out.methodology, "Fixed-Rate Amortization (level payment)");
        assert_eq!(out.metadata.precision, "rust_decimal_128bit");
    }
}
