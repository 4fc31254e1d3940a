//! Market dynamics for the property simulator.
//!
//! A `MarketDynamics` implementation advances rate, rent and price by one
//! monthly step. Every method draws only from the RNG it is handed, so a
//! path seeded the same way reproduces exactly. The shipped models are
//! illustrative generators, not calibrated ones.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::error::EstateError;
use crate::EstateResult;

/// Floor on the cap rate used to value rent, so a near-zero rate cannot
/// send the fair price to infinity.
const MIN_CAP_RATE: f64 = 0.01;

const MONTHS_PER_YEAR: f64 = 12.0;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// One-month evolution of the market a property lives in.
///
/// The simulator calls `advance_rate`, then `advance_rent`, then
/// `advance_price` with the freshly advanced rent and rate.
pub trait MarketDynamics {
    fn advance_rate(&self, rate: f64, rng: &mut StdRng) -> f64;
    fn advance_rent(&self, rent: f64, rng: &mut StdRng) -> f64;
    fn advance_price(&self, price: f64, rent: f64, rate: f64, rng: &mut StdRng) -> f64;
}

/// Three independently injected step functions.
pub struct StepFunctions<R, P, T> {
    pub rent_step: R,
    pub price_step: P,
    pub rate_step: T,
}

impl<R, P, T> MarketDynamics for StepFunctions<R, P, T>
where
    R: Fn(f64, &mut StdRng) -> f64,
    P: Fn(f64, f64, f64, &mut StdRng) -> f64,
    T: Fn(f64, &mut StdRng) -> f64,
{
    fn advance_rate(&self, rate: f64, rng: &mut StdRng) -> f64 {
        (self.rate_step)(rate, rng)
    }

    fn advance_rent(&self, rent: f64, rng: &mut StdRng) -> f64 {
        (self.rent_step)(rent, rng)
    }

    fn advance_price(&self, price: f64, rent: f64, rate: f64, rng: &mut StdRng) -> f64 {
        (self.price_step)(price, rent, rate, rng)
    }
}

// ---------------------------------------------------------------------------
// Shipped models
// ---------------------------------------------------------------------------

/// Parameters of the random-walk market. All rates are annual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomWalkParams {
    /// Expected annual rent growth.
    #[serde(default = "default_rent_drift")]
    pub rent_drift: f64,
    /// Annual volatility of log rent.
    #[serde(default = "default_rent_volatility")]
    pub rent_volatility: f64,
    /// Annual standard deviation of the interest rate (absolute).
    #[serde(default = "default_rate_volatility")]
    pub rate_volatility: f64,
    /// Lowest rate the walk may reach.
    #[serde(default)]
    pub rate_floor: f64,
    /// Spread over the interest rate used as the valuation cap rate.
    #[serde(default = "default_cap_rate_spread")]
    pub cap_rate_spread: f64,
    /// Annual speed at which log price reverts toward the cap-rate value.
    #[serde(default = "default_mean_reversion")]
    pub mean_reversion: f64,
    /// Annual volatility of log price.
    #[serde(default = "default_price_volatility")]
    pub price_volatility: f64,
}

fn default_rent_drift() -> f64 {
    0.02
}

fn default_rent_volatility() -> f64 {
    0.05
}

fn default_rate_volatility() -> f64 {
    0.01
}

fn default_cap_rate_spread() -> f64 {
    0.02
}

fn default_mean_reversion() -> f64 {
    0.5
}

fn default_price_volatility() -> f64 {
    0.08
}

impl Default for RandomWalkParams {
    fn default() -> Self {
        Self {
            rent_drift: default_rent_drift(),
            rent_volatility: default_rent_volatility(),
            rate_volatility: default_rate_volatility(),
            rate_floor: 0.0,
            cap_rate_spread: default_cap_rate_spread(),
            mean_reversion: default_mean_reversion(),
            price_volatility: default_price_volatility(),
        }
    }
}

/// Market model selectable from JSON input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MarketModel {
    /// Rate, rent and price never move.
    Constant,
    /// Log-normal rent, Gaussian rate walk, mean-reverting log price.
    RandomWalk(RandomWalkParams),
}

impl Default for MarketModel {
    fn default() -> Self {
        MarketModel::RandomWalk(RandomWalkParams::default())
    }
}

impl MarketModel {
    pub fn validate(&self) -> EstateResult<()> {
        let params = match self {
            MarketModel::Constant => return Ok(()),
            MarketModel::RandomWalk(p) => p,
        };

        let non_negative = [
            ("rent_volatility", params.rent_volatility),
            ("rate_volatility", params.rate_volatility),
            ("mean_reversion", params.mean_reversion),
            ("price_volatility", params.price_volatility),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(EstateError::InvalidInput {
                    field: field.into(),
                    reason: "Must be a finite, non-negative number".into(),
                });
            }
        }
        if !params.rent_drift.is_finite() || params.rent_drift <= -1.0 {
            return Err(EstateError::InvalidInput {
                field: "rent_drift".into(),
                reason: "Rent drift must be greater than -100%".into(),
            });
        }
        if !params.rate_floor.is_finite() || !params.cap_rate_spread.is_finite() {
            return Err(EstateError::InvalidInput {
                field: "market".into(),
                reason: "Rate floor and cap rate spread must be finite".into(),
            });
        }
        Ok(())
    }
}

/// One standard normal draw.
fn standard_normal(rng: &mut StdRng) -> f64 {
    rng.sample(Normal::standard())
}

impl MarketDynamics for MarketModel {
    fn advance_rate(&self, rate: f64, rng: &mut StdRng) -> f64 {
        match self {
            MarketModel::Constant => rate,
            MarketModel::RandomWalk(p) => {
                let step = p.rate_volatility / MONTHS_PER_YEAR.sqrt() * standard_normal(rng);
                (rate + step).max(p.rate_floor)
            }
        }
    }

    fn advance_rent(&self, rent: f64, rng: &mut StdRng) -> f64 {
        match self {
            MarketModel::Constant => rent,
            MarketModel::RandomWalk(p) => {
                let mu = (1.0 + p.rent_drift).ln() / MONTHS_PER_YEAR;
                let sigma = p.rent_volatility / MONTHS_PER_YEAR.sqrt();
                rent * (mu - 0.5 * sigma * sigma + sigma * standard_normal(rng)).exp()
            }
        }
    }

    fn advance_price(&self, price: f64, rent: f64, rate: f64, rng: &mut StdRng) -> f64 {
        match self {
            MarketModel::Constant => price,
            MarketModel::RandomWalk(p) => {
                let sigma = p.price_volatility / MONTHS_PER_YEAR.sqrt();
                let noise = sigma * standard_normal(rng);
                let cap_rate = (rate + p.cap_rate_spread).max(MIN_CAP_RATE);
                let fair = rent * MONTHS_PER_YEAR / cap_rate;

                let pull = if fair > 0.0 && price > 0.0 {
                    p.mean_reversion / MONTHS_PER_YEAR * (fair.ln() - price.ln())
                } else {
                    0.0
                };
                price * (pull + noise).exp()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const SEED: u64 = 42;

    #[test]
    fn test_constant_model_never_moves() {
        let mut rng = StdRng::seed_from_u64(SEED);
        let model = MarketModel::Constant;
        assert_eq!(model.advance_rate(0.06, &mut rng), 0.06);
        assert_eq!(model.advance_rent(1800.0, &mut rng), 1800.0);
        assert_eq!(model.advance_price(300_000.0, 1800.0, 0.06, &mut rng), 300_000.0);
    }

    #[test]
    fn test_random_walk_is_seed_reproducible() {
        let model = MarketModel::default();
        let mut a = StdRng::seed_from_u64(SEED);
        let mut b = StdRng::seed_from_u64(SEED);
        for _ in 0..24 {
            assert_eq!(model.advance_rate(0.05, &mut a), model.advance_rate(0.05, &mut b));
            assert_eq!(model.advance_rent(2000.0, &mut a), model.advance_rent(2000.0, &mut b));
        }
    }

    #[test]
    fn test_rate_respects_floor() {
        let model = MarketModel::RandomWalk(RandomWalkParams {
            rate_volatility: 0.5,
            rate_floor: 0.01,
            ..RandomWalkParams::default()
        });
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut rate = 0.02;
        for _ in 0..500 {
            rate = model.advance_rate(rate, &mut rng);
            assert!(rate >= 0.01);
        }
    }

    #[test]
    fn test_rent_stays_positive_and_drifts() {
        let model = MarketModel::RandomWalk(RandomWalkParams {
            rent_drift: 0.03,
            rent_volatility: 0.0,
            ..RandomWalkParams::default()
        });
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut rent = 1000.0;
        for _ in 0..12 {
            rent = model.advance_rent(rent, &mut rng);
        }
        assert!((rent - 1030.0).abs() < 1e-6, "rent={rent}");
    }

    #[test]
    fn test_price_reverts_toward_cap_rate_value() {
        // Fair value = 2000 * 12 / (0.04 + 0.02) = 400,000.
        let model = MarketModel::RandomWalk(RandomWalkParams {
            price_volatility: 0.0,
            mean_reversion: 1.0,
            ..RandomWalkParams::default()
        });
        let mut rng = StdRng::seed_from_u64(SEED);
        let mut price = 300_000.0;
        for _ in 0..120 {
            let next = model.advance_price(price, 2000.0, 0.04, &mut rng);
            assert!(next >= price);
            price = next;
        }
        assert!((price - 400_000.0).abs() < 5_000.0, "price={price}");
    }

    #[test]
    fn test_step_functions_are_injectable() {
        let dynamics = StepFunctions {
            rent_step: |rent: f64, _: &mut StdRng| rent + 10.0,
            price_step: |_price: f64, rent: f64, _rate: f64, _: &mut StdRng| rent * 100.0,
            rate_step: |rate: f64, _: &mut StdRng| rate * 2.0,
        };
        let mut rng = StdRng::seed_from_u64(SEED);
        assert_eq!(dynamics.advance_rent(100.0, &mut rng), 110.0);
        assert_eq!(dynamics.advance_price(5.0, 110.0, 0.05, &mut rng), 11_000.0);
        assert_eq!(dynamics.advance_rate(0.05, &mut rng), 0.1);
    }

    #[test]
    fn test_validate_rejects_negative_volatility() {
        let model = MarketModel::RandomWalk(RandomWalkParams {
            price_volatility: -0.1,
            ..RandomWalkParams::default()
        });
        assert!(model.validate().is_err());
        assert!(MarketModel::Constant.validate().is_ok());
    }

    #[test]
    fn test_model_from_json() {
        let model: MarketModel =
            serde_json::from_str(r#"{"type": "RandomWalk", "rent_drift": 0.04}"#).unwrap();
        match model {
            MarketModel::RandomWalk(p) => {
                assert_eq!(p.rent_drift, 0.04);
                assert_eq!(p.rent_volatility, 0.05);
            }
            MarketModel::Constant => panic!("expected random walk"),
        }
        let constant: MarketModel = serde_json::from_str(r#"{"type": "Constant"}"#).unwrap();
        assert!(matches!(constant, MarketModel::Constant));
    }
}
