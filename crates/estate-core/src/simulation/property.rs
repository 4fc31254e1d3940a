//! Stochastic simulation of a leveraged rental property.
//!
//! Each path evolves (price, rent, rate, cash, debt) month by month. The
//! mortgage is fixed at origination; property tax follows the simulated
//! price; rent is lost in vacant months; positive cash earns a treasury-like
//! rate. A path that runs out of cash is bankrupt and stops at that month.
//! Paths own their RNG, so an ensemble is reproducible from one seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::error::EstateError;
use crate::mortgage::payment_schedule::{payment_periods, PaymentScheduleInput};
use crate::simulation::dynamics::{MarketDynamics, MarketModel};
use crate::types::{with_metadata_f64, ComputationOutput};
use crate::EstateResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MONTHS_PER_YEAR: f64 = 12.0;

/// Ensembles smaller than this get a noisy-statistics warning.
const MIN_STABLE_PATHS: u32 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Starting conditions shared by every simulated path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertySimulationInput {
    /// Purchase price.
    pub asset_price: f64,
    /// Loan-to-value at origination.
    pub ltv: f64,
    /// Mortgage rate at origination; also the starting market rate.
    pub annual_rate: f64,
    /// Number of monthly mortgage payments; the simulation horizon.
    pub num_payments: u32,
    /// Monthly rent at the start.
    pub starting_rent: f64,
    /// Cash reserve at the start.
    pub starting_cash: f64,
    /// Probability that any given month is vacant.
    pub vacancy_rate: f64,
    /// Annual property tax rate on the current simulated price.
    pub property_tax_rate: f64,
    /// Market dynamics driving rate, rent and price.
    #[serde(default)]
    pub market: MarketModel,
    /// Cash earns max(rate - spread, 0) per year.
    #[serde(default = "default_treasury_spread")]
    pub treasury_spread: f64,
    /// Month (1-based) at which IRR is measured; defaults to the path end.
    #[serde(default)]
    pub irr_horizon: Option<u32>,
}

fn default_treasury_spread() -> f64 {
    0.03
}

/// Tag attached to a simulated month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathEvent {
    Vacant,
    Bankrupt,
}

impl fmt::Display for PathEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathEvent::Vacant => write!(f, "vacant"),
            PathEvent::Bankrupt => write!(f, "bankrupt"),
        }
    }
}

impl FromStr for PathEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vacant" => Ok(PathEvent::Vacant),
            "bankrupt" => Ok(PathEvent::Bankrupt),
            other => Err(format!("Unknown path event '{other}'")),
        }
    }
}

/// Events serialize as one comma-joined string, e.g. `"vacant,bankrupt"`,
/// so every period stays a flat row in JSON, tables and CSV.
mod event_list {
    use super::{join_events, PathEvent};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(events: &[PathEvent], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&join_events(events))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<PathEvent>, D::Error> {
        let tags = String::deserialize(d)?;
        tags.split(',')
            .filter(|t| !t.is_empty())
            .map(|t| t.parse().map_err(de::Error::custom))
            .collect()
    }
}

fn join_events(events: &[PathEvent]) -> String {
    events
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Mutable state of one path.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub price: f64,
    pub rent: f64,
    pub rate: f64,
    pub cash: f64,
    pub debt: f64,
}

/// One simulated month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationPeriod {
    pub period: u32,
    pub price: f64,
    pub rent: f64,
    pub rate: f64,
    pub cash: f64,
    pub debt: f64,
    #[serde(with = "event_list")]
    pub events: Vec<PathEvent>,
    /// Mortgage payment plus property tax on the current price.
    pub total_payment: f64,
    /// price - debt
    pub equity: f64,
    /// equity + cash
    pub net_worth: f64,
}

impl SimulationPeriod {
    /// Event tags joined with commas, e.g. `"vacant,bankrupt"`.
    pub fn event_tags(&self) -> String {
        join_events(&self.events)
    }
}

/// Full history and summary of one path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResult {
    pub path_id: u32,
    pub periods: Vec<SimulationPeriod>,
    pub bankrupt: bool,
    /// Month in which cash first went negative.
    pub bankruptcy_period: Option<u32>,
    pub vacant_periods: u32,
    /// Annualized growth of net worth; `None` when either end is non-positive.
    pub irr: Option<f64>,
}

/// Input for a multi-path run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleInput {
    #[serde(default = "default_num_paths")]
    pub num_paths: u32,
    /// Base seed; path `i` is seeded with `seed + i`.
    pub seed: Option<u64>,
    pub property: PropertySimulationInput,
}

fn default_num_paths() -> u32 {
    100
}

/// One summary row per path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSummary {
    pub path_id: u32,
    pub bankrupt: bool,
    pub irr: Option<f64>,
}

/// A period row tagged with its path, for the concatenated history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRow {
    pub path_id: u32,
    #[serde(flatten)]
    pub period: SimulationPeriod,
}

/// Percentile summary of path IRRs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrPercentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

/// Output of a multi-path run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleOutput {
    pub num_paths: u32,
    pub seed: u64,
    pub bankrupt_paths: u32,
    pub bankruptcy_rate: f64,
    /// Mean IRR over paths with a defined IRR.
    pub mean_irr: Option<f64>,
    pub irr_percentiles: Option<IrrPercentiles>,
    pub summary: Vec<PathSummary>,
    pub paths: Vec<PathResult>,
}

impl EnsembleOutput {
    /// Every path's periods concatenated in path order.
    pub fn history(&self) -> Vec<HistoryRow> {
        self.paths
            .iter()
            .flat_map(|path| {
                path.periods.iter().map(move |period| HistoryRow {
                    path_id: path.path_id,
                    period: period.clone(),
                })
            })
            .collect()
    }
}

/// Scheduled mortgage cash flows for one month, fixed at origination.
#[derive(Debug, Clone, Copy)]
struct ScheduledPayment {
    mortgage_payment: f64,
    principal_payment: f64,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simulate a single path with the input's market model.
///
/// A `None` seed draws one from entropy; the seed used is reported in the
/// assumptions.
pub fn simulate_property(
    input: &PropertySimulationInput,
    seed: Option<u64>,
) -> EstateResult<ComputationOutput<PathResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;
    let schedule = scheduled_payments(input)?;

    let seed = seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let path = run_path(input, &schedule, &input.market, &mut rng, 0);

    if let Some(month) = path.bankruptcy_period {
        warnings.push(format!(
            "Cash reserve exhausted in month {month}; path stopped after {} of {} months",
            path.periods.len(),
            input.num_payments
        ));
    }
    if path.irr.is_none() {
        warnings.push("IRR undefined: net worth is non-positive at the start or the end".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Stochastic Property Simulation (single path)",
        &serde_json::json!({
            "input": input,
            "seed": seed,
        }),
        warnings,
        elapsed,
        path,
    ))
}

/// Simulate a single path with caller-supplied dynamics and RNG.
pub fn simulate_property_with(
    input: &PropertySimulationInput,
    dynamics: &dyn MarketDynamics,
    rng: &mut StdRng,
) -> EstateResult<PathResult> {
    validate_input(input)?;
    let schedule = scheduled_payments(input)?;
    Ok(run_path(input, &schedule, dynamics, rng, 0))
}

/// Run `num_paths` independent paths from identical starting conditions,
/// driven by the input's market model.
pub fn simulate_many(input: &EnsembleInput) -> EstateResult<ComputationOutput<EnsembleOutput>> {
    simulate_many_with(input, &input.property.market)
}

/// Run `num_paths` independent paths driven by caller-supplied dynamics.
///
/// `input.property.market` is validated but not used to step the market.
pub fn simulate_many_with(
    input: &EnsembleInput,
    dynamics: &dyn MarketDynamics,
) -> EstateResult<ComputationOutput<EnsembleOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.num_paths == 0 {
        return Err(EstateError::InvalidInput {
            field: "num_paths".into(),
            reason: "At least one path is required".into(),
        });
    }
    validate_input(&input.property)?;

    // The mortgage terms do not depend on the path.
    let schedule = scheduled_payments(&input.property)?;
    let seed = input.seed.unwrap_or_else(rand::random);

    let mut paths = Vec::with_capacity(input.num_paths as usize);
    for path_id in 0..input.num_paths {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(path_id as u64));
        paths.push(run_path(&input.property, &schedule, dynamics, &mut rng, path_id));
    }

    let summary: Vec<PathSummary> = paths
        .iter()
        .map(|p| PathSummary {
            path_id: p.path_id,
            bankrupt: p.bankrupt,
            irr: p.irr,
        })
        .collect();

    let bankrupt_paths = paths.iter().filter(|p| p.bankrupt).count() as u32;
    let bankruptcy_rate = bankrupt_paths as f64 / input.num_paths as f64;

    let mut irrs: Vec<f64> = paths.iter().filter_map(|p| p.irr).collect();
    irrs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let (mean_irr, irr_percentiles) = if irrs.is_empty() {
        (None, None)
    } else {
        let mean = irrs.iter().sum::<f64>() / irrs.len() as f64;
        (Some(mean), Some(irr_percentiles(&irrs)))
    };

    if input.num_paths < MIN_STABLE_PATHS {
        warnings.push(format!(
            "Only {} paths simulated; percentile estimates are noisy below {MIN_STABLE_PATHS}",
            input.num_paths
        ));
    }
    if bankrupt_paths > 0 {
        warnings.push(format!(
            "{bankrupt_paths} of {} paths went bankrupt ({:.1}%)",
            input.num_paths,
            bankruptcy_rate * 100.0
        ));
    }
    let undefined_irr = input.num_paths as usize - irrs.len();
    if undefined_irr > 0 {
        warnings.push(format!(
            "{undefined_irr} paths have an undefined IRR (non-positive net worth)"
        ));
    }

    let output = EnsembleOutput {
        num_paths: input.num_paths,
        seed,
        bankrupt_paths,
        bankruptcy_rate,
        mean_irr,
        irr_percentiles,
        summary,
        paths,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata_f64(
        "Stochastic Property Simulation (Monte Carlo ensemble)",
        &serde_json::json!({
            "num_paths": input.num_paths,
            "seed": seed,
            "property": input.property,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Path recurrence
// ---------------------------------------------------------------------------

fn run_path(
    input: &PropertySimulationInput,
    schedule: &[ScheduledPayment],
    dynamics: &dyn MarketDynamics,
    rng: &mut StdRng,
    path_id: u32,
) -> PathResult {
    let mut state = SimulationState {
        price: input.asset_price,
        rent: input.starting_rent,
        rate: input.annual_rate,
        cash: input.starting_cash,
        debt: input.ltv * input.asset_price,
    };

    let mut periods = Vec::with_capacity(schedule.len());
    let mut bankruptcy_period = None;
    let mut vacant_periods = 0u32;

    for (t, scheduled) in schedule.iter().enumerate() {
        let t = t as u32;
        let mut events = Vec::new();

        state.rate = dynamics.advance_rate(state.rate, rng);
        state.rent = dynamics.advance_rent(state.rent, rng);
        state.price = dynamics.advance_price(state.price, state.rent, state.rate, rng);

        let property_tax = input.property_tax_rate * state.price / MONTHS_PER_YEAR;
        let total_payment = scheduled.mortgage_payment + property_tax;

        let income = if rng.gen_bool(input.vacancy_rate) {
            events.push(PathEvent::Vacant);
            vacant_periods += 1;
            0.0
        } else {
            state.rent
        };

        state.cash += income - total_payment;
        if state.cash > 0.0 {
            let treasury = (state.rate - input.treasury_spread).max(0.0);
            state.cash *= (1.0 + treasury).powf(1.0 / MONTHS_PER_YEAR);
        } else if state.cash < 0.0 {
            events.push(PathEvent::Bankrupt);
            bankruptcy_period = Some(t);
        }

        state.debt -= scheduled.principal_payment;

        let equity = state.price - state.debt;
        periods.push(SimulationPeriod {
            period: t,
            price: state.price,
            rent: state.rent,
            rate: state.rate,
            cash: state.cash,
            debt: state.debt,
            events,
            total_payment,
            equity,
            net_worth: equity + state.cash,
        });

        if bankruptcy_period.is_some() {
            break;
        }
    }

    let irr = realized_irr(&periods, input.irr_horizon);
    PathResult {
        path_id,
        periods,
        bankrupt: bankruptcy_period.is_some(),
        bankruptcy_period,
        vacant_periods,
        irr,
    }
}

/// (net_worth[ref] / net_worth[0])^(12 / (ref + 1)) - 1, where `ref` is the
/// last recorded month, capped by the horizon.
fn realized_irr(periods: &[SimulationPeriod], horizon: Option<u32>) -> Option<f64> {
    let first = periods.first()?;
    let len = match horizon {
        Some(h) => (h as usize).min(periods.len()),
        None => periods.len(),
    };
    let reference = periods.get(len.checked_sub(1)?)?;

    if first.net_worth <= 0.0 || reference.net_worth <= 0.0 {
        return None;
    }
    Some((reference.net_worth / first.net_worth).powf(MONTHS_PER_YEAR / len as f64) - 1.0)
}

/// Mortgage-only payments from the deterministic schedule at origination.
fn scheduled_payments(input: &PropertySimulationInput) -> EstateResult<Vec<ScheduledPayment>> {
    let rows = payment_periods(&PaymentScheduleInput {
        asset_price: to_decimal("asset_price", input.asset_price)?,
        ltv: to_decimal("ltv", input.ltv)?,
        annual_rate: to_decimal("annual_rate", input.annual_rate)?,
        num_payments: input.num_payments,
        property_tax_rate: Decimal::ZERO,
        property_growth_rate: Decimal::ZERO,
        payments_per_year: 12,
    })?;

    Ok(rows
        .iter()
        .map(|row| ScheduledPayment {
            mortgage_payment: row.total_payment.to_f64().unwrap_or_default(),
            principal_payment: row.amortization.principal_payment.to_f64().unwrap_or_default(),
        })
        .collect())
}

fn to_decimal(field: &str, value: f64) -> EstateResult<Decimal> {
    Decimal::from_f64(value).ok_or_else(|| EstateError::InvalidInput {
        field: field.into(),
        reason: format!("{value} cannot be represented as a decimal"),
    })
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Percentile from a **sorted** slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

fn irr_percentiles(sorted: &[f64]) -> IrrPercentiles {
    IrrPercentiles {
        p5: percentile_sorted(sorted, 5.0),
        p10: percentile_sorted(sorted, 10.0),
        p25: percentile_sorted(sorted, 25.0),
        p50: percentile_sorted(sorted, 50.0),
        p75: percentile_sorted(sorted, 75.0),
        p90: percentile_sorted(sorted, 90.0),
        p95: percentile_sorted(sorted, 95.0),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_input(input: &PropertySimulationInput) -> EstateResult<()> {
    let finite = [
        ("asset_price", input.asset_price),
        ("ltv", input.ltv),
        ("annual_rate", input.annual_rate),
        ("starting_rent", input.starting_rent),
        ("starting_cash", input.starting_cash),
        ("vacancy_rate", input.vacancy_rate),
        ("property_tax_rate", input.property_tax_rate),
        ("treasury_spread", input.treasury_spread),
    ];
    for (field, value) in finite {
        if !value.is_finite() {
            return Err(EstateError::InvalidInput {
                field: field.into(),
                reason: "Must be a finite number".into(),
            });
        }
    }

    if input.asset_price <= 0.0 {
        return Err(EstateError::InvalidInput {
            field: "asset_price".into(),
            reason: "Asset price must be positive".into(),
        });
    }
    if input.ltv <= 0.0 {
        return Err(EstateError::InvalidInput {
            field: "ltv".into(),
            reason: "LTV must be positive".into(),
        });
    }
    if input.annual_rate <= -1.0 {
        return Err(EstateError::InvalidInput {
            field: "annual_rate".into(),
            reason: "Interest rate must be greater than -100%".into(),
        });
    }
    if input.num_payments == 0 {
        return Err(EstateError::InvalidInput {
            field: "num_payments".into(),
            reason: "Number of payments must be at least 1".into(),
        });
    }
    if input.starting_rent < 0.0 {
        return Err(EstateError::InvalidInput {
            field: "starting_rent".into(),
            reason: "Starting rent cannot be negative".into(),
        });
    }
    if !(0.0..=1.0).contains(&input.vacancy_rate) {
        return Err(EstateError::InvalidInput {
            field: "vacancy_rate".into(),
            reason: "Vacancy rate must be between 0 and 1".into(),
        });
    }
    if input.property_tax_rate < 0.0 {
        return Err(EstateError::InvalidInput {
            field: "property_tax_rate".into(),
            reason: "Property tax rate cannot be negative".into(),
        });
    }
    if input.irr_horizon == Some(0) {
        return Err(EstateError::InvalidInput {
            field: "irr_horizon".into(),
            reason: "IRR horizon must be at least 1 month".into(),
        });
    }
    input.market.validate()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::dynamics::{RandomWalkParams, StepFunctions};

    const SEED: u64 = 42;

    fn constant_input() -> PropertySimulationInput {
        PropertySimulationInput {
            asset_price: 300_000.0,
            ltv: 0.75,
            annual_rate: 0.06,
            num_payments: 360,
            starting_rent: 2_500.0,
            starting_cash: 10_000.0,
            vacancy_rate: 0.0,
            property_tax_rate: 0.022,
            market: MarketModel::Constant,
            treasury_spread: 0.03,
            irr_horizon: None,
        }
    }

    #[test]
    fn test_constant_market_runs_full_horizon() {
        let out = simulate_property(&constant_input(), Some(SEED)).unwrap();
        let path = &out.result;
        assert_eq!(path.periods.len(), 360);
        assert!(!path.bankrupt);
        assert_eq!(path.bankruptcy_period, None);
        assert!(path.periods.iter().all(|p| p.events.is_empty()));
    }

    #[test]
    fn test_first_month_cash_is_deterministic() {
        let out = simulate_property(&constant_input(), Some(SEED)).unwrap();
        let first = &out.result.periods[0];
        let mortgage = first.total_payment - 0.022 * 300_000.0 / 12.0;
        assert!((mortgage - 1326.08).abs() < 0.01, "mortgage={mortgage}");

        let expected = (10_000.0 + 2_500.0 - first.total_payment) * 1.03_f64.powf(1.0 / 12.0);
        assert!((first.cash - expected).abs() < 1e-6);
    }

    #[test]
    fn test_constant_market_ignores_seed() {
        let a = simulate_property(&constant_input(), Some(1)).unwrap();
        let b = simulate_property(&constant_input(), Some(2)).unwrap();
        let cash_a: Vec<f64> = a.result.periods.iter().map(|p| p.cash).collect();
        let cash_b: Vec<f64> = b.result.periods.iter().map(|p| p.cash).collect();
        assert_eq!(cash_a, cash_b);
    }

    #[test]
    fn test_debt_amortizes_to_zero() {
        let out = simulate_property(&constant_input(), Some(SEED)).unwrap();
        let last = out.result.periods.last().unwrap();
        assert!(last.debt.abs() < 0.01, "debt={}", last.debt);
        assert!((last.equity - last.price).abs() < 0.01);
    }

    #[test]
    fn test_net_worth_identity() {
        let out = simulate_property(&constant_input(), Some(SEED)).unwrap();
        for p in &out.result.periods {
            assert_eq!(p.equity, p.price - p.debt);
            assert_eq!(p.net_worth, p.equity + p.cash);
        }
    }

    #[test]
    fn test_bankruptcy_halts_path() {
        let mut input = constant_input();
        input.starting_rent = 0.0;
        input.starting_cash = 0.0;
        let out = simulate_property(&input, Some(SEED)).unwrap();
        let path = &out.result;
        assert!(path.bankrupt);
        assert_eq!(path.bankruptcy_period, Some(0));
        assert_eq!(path.periods.len(), 1);
        assert_eq!(path.periods[0].events, vec![PathEvent::Bankrupt]);
        assert!(out.warnings.iter().any(|w| w.contains("exhausted")));
    }

    #[test]
    fn test_full_vacancy_tags_every_month() {
        let mut input = constant_input();
        input.vacancy_rate = 1.0;
        input.num_payments = 12;
        input.starting_cash = 10_000_000.0;
        let out = simulate_property(&input, Some(SEED)).unwrap();
        let path = &out.result;
        assert_eq!(path.periods.len(), 12);
        assert_eq!(path.vacant_periods, 12);
        assert!(path.periods.iter().all(|p| p.event_tags() == "vacant"));
    }

    #[test]
    fn test_event_tags_join() {
        let period = SimulationPeriod {
            period: 3,
            price: 1.0,
            rent: 1.0,
            rate: 0.0,
            cash: -1.0,
            debt: 0.0,
            events: vec![PathEvent::Vacant, PathEvent::Bankrupt],
            total_payment: 2.0,
            equity: 1.0,
            net_worth: 0.0,
        };
        assert_eq!(period.event_tags(), "vacant,bankrupt");
    }

    #[test]
    fn test_irr_zero_for_flat_net_worth() {
        let flat = |nw: f64, t: u32| SimulationPeriod {
            period: t,
            price: nw,
            rent: 0.0,
            rate: 0.0,
            cash: 0.0,
            debt: 0.0,
            events: Vec::new(),
            total_payment: 0.0,
            equity: nw,
            net_worth: nw,
        };
        let periods: Vec<SimulationPeriod> = (0..24).map(|t| flat(100.0, t)).collect();
        assert_eq!(realized_irr(&periods, None), Some(0.0));

        let mut growing = periods.clone();
        growing[11].net_worth = 110.0;
        let irr = realized_irr(&growing, Some(12)).unwrap();
        assert!((irr - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_irr_undefined_for_non_positive_net_worth() {
        let mut input = constant_input();
        input.starting_rent = 0.0;
        input.starting_cash = -200_000.0;
        let out = simulate_property(&input, Some(SEED)).unwrap();
        assert_eq!(out.result.irr, None);
    }

    #[test]
    fn test_random_walk_seed_reproducible() {
        let mut input = constant_input();
        input.market = MarketModel::RandomWalk(RandomWalkParams::default());
        input.vacancy_rate = 0.05;
        let a = simulate_property(&input, Some(SEED)).unwrap();
        let b = simulate_property(&input, Some(SEED)).unwrap();
        assert_eq!(a.result.periods.len(), b.result.periods.len());
        for (x, y) in a.result.periods.iter().zip(&b.result.periods) {
            assert_eq!(x.price, y.price);
            assert_eq!(x.cash, y.cash);
            assert_eq!(x.events, y.events);
        }
    }

    #[test]
    fn test_custom_step_functions() {
        let dynamics = StepFunctions {
            rent_step: |rent: f64, _: &mut StdRng| rent + 1.0,
            price_step: |price: f64, _rent: f64, _rate: f64, _: &mut StdRng| price * 1.001,
            rate_step: |rate: f64, _: &mut StdRng| rate,
        };
        let mut input = constant_input();
        input.num_payments = 24;
        let mut rng = StdRng::seed_from_u64(SEED);
        let path = simulate_property_with(&input, &dynamics, &mut rng).unwrap();
        assert_eq!(path.periods.len(), 24);
        assert_eq!(path.periods[0].rent, 2_501.0);
        assert_eq!(path.periods[23].rent, 2_524.0);
        assert!(path.periods[23].price > 300_000.0);
    }

    #[test]
    fn test_ensemble_summary_rows() {
        let mut property = constant_input();
        property.market = MarketModel::RandomWalk(RandomWalkParams::default());
        property.num_payments = 60;
        let input = EnsembleInput {
            num_paths: 20,
            seed: Some(SEED),
            property,
        };
        let out = simulate_many(&input).unwrap();
        let result = &out.result;
        assert_eq!(result.summary.len(), 20);
        assert_eq!(result.paths.len(), 20);
        for (i, row) in result.summary.iter().enumerate() {
            assert_eq!(row.path_id, i as u32);
            assert_eq!(row.bankrupt, result.paths[i].bankrupt);
        }
        let rows: usize = result.paths.iter().map(|p| p.periods.len()).sum();
        assert_eq!(result.history().len(), rows);
        assert!(out.warnings.iter().any(|w| w.contains("noisy")));
    }

    #[test]
    fn test_ensemble_paths_differ_and_reproduce() {
        let mut property = constant_input();
        property.market = MarketModel::RandomWalk(RandomWalkParams::default());
        property.num_payments = 36;
        let input = EnsembleInput {
            num_paths: 5,
            seed: Some(SEED),
            property,
        };
        let a = simulate_many(&input).unwrap();
        let b = simulate_many(&input).unwrap();
        let last_price = |out: &ComputationOutput<EnsembleOutput>, i: usize| {
            out.result.paths[i].periods.last().map(|p| p.price)
        };
        assert_ne!(last_price(&a, 0), last_price(&a, 1));
        for i in 0..5 {
            assert_eq!(last_price(&a, i), last_price(&b, i));
        }
    }

    #[test]
    fn test_ensemble_bankruptcy_rate() {
        let mut property = constant_input();
        property.starting_rent = 0.0;
        property.starting_cash = 0.0;
        let input = EnsembleInput {
            num_paths: 10,
            seed: Some(SEED),
            property,
        };
        let out = simulate_many(&input).unwrap();
        assert_eq!(out.result.bankrupt_paths, 10);
        assert_eq!(out.result.bankruptcy_rate, 1.0);
        assert!(out.warnings.iter().any(|w| w.contains("bankrupt")));
    }

    #[test]
    fn test_irr_percentiles_ordered() {
        let mut property = constant_input();
        property.market = MarketModel::RandomWalk(RandomWalkParams::default());
        property.num_payments = 60;
        property.starting_cash = 50_000.0;
        let out = simulate_many(&EnsembleInput {
            num_paths: 100,
            seed: Some(SEED),
            property,
        })
        .unwrap();
        let p = out.result.irr_percentiles.unwrap();
        assert!(p.p5 <= p.p25 && p.p25 <= p.p50 && p.p50 <= p.p75 && p.p75 <= p.p95);
    }

    #[test]
    fn test_zero_paths_error() {
        let input = EnsembleInput {
            num_paths: 0,
            seed: Some(SEED),
            property: constant_input(),
        };
        assert!(simulate_many(&input).is_err());
    }

    #[test]
    fn test_invalid_vacancy_rate() {
        let mut input = constant_input();
        input.vacancy_rate = 1.5;
        assert!(simulate_property(&input, Some(SEED)).is_err());
    }

    #[test]
    fn test_invalid_irr_horizon() {
        let mut input = constant_input();
        input.irr_horizon = Some(0);
        assert!(simulate_property(&input, Some(SEED)).is_err());
    }

    #[test]
    fn test_metadata_precision_field() {
        let out = simulate_property(&constant_input(), Some(SEED)).unwrap();
        assert_eq!(out.metadata.precision, "ieee754_f64");
    }

    #[test]
    fn test_property_tax_follows_simulated_price() {
        let dynamics = StepFunctions {
            rent_step: |rent: f64, _: &mut StdRng| rent,
            price_step: |price: f64, _rent: f64, _rate: f64, _: &mut StdRng| price * 1.01,
            rate_step: |rate: f64, _: &mut StdRng| rate,
        };
        let mut input = constant_input();
        input.num_payments = 36;
        let mut rng = StdRng::seed_from_u64(SEED);
        let path = simulate_property_with(&input, &dynamics, &mut rng).unwrap();

        let tax = |price: f64| 0.022 * price / 12.0;
        let first = &path.periods[0];
        let mortgage = first.total_payment - tax(first.price);
        assert!((mortgage - 1326.08).abs() < 0.01, "mortgage={mortgage}");
        for p in &path.periods {
            assert!((p.total_payment - (mortgage + tax(p.price))).abs() < 1e-6);
        }

        let last = path.periods.last().unwrap();
        assert!(last.price > 300_000.0 * 1.4);
        assert!(last.total_payment - first.total_payment > 200.0);
    }

    #[test]
    fn test_cash_not_grown_when_rate_below_spread() {
        let mut input = constant_input();
        input.annual_rate = 0.02;
        input.num_payments = 24;
        let out = simulate_property(&input, Some(SEED)).unwrap();

        let mut cash = input.starting_cash;
        for p in &out.result.periods {
            assert!(p.cash > 0.0);
            cash += input.starting_rent - p.total_payment;
            assert_eq!(p.cash, cash);
        }
    }

    #[test]
    fn test_ensemble_with_step_functions() {
        let dynamics = StepFunctions {
            rent_step: |rent: f64, _: &mut StdRng| rent + 1.0,
            price_step: |price: f64, _rent: f64, _rate: f64, _: &mut StdRng| price * 1.002,
            rate_step: |rate: f64, _: &mut StdRng| rate,
        };
        let mut property = constant_input();
        property.num_payments = 24;
        let input = EnsembleInput {
            num_paths: 4,
            seed: Some(SEED),
            property,
        };
        let out = simulate_many_with(&input, &dynamics).unwrap();
        let result = &out.result;
        assert_eq!(result.summary.len(), 4);
        for path in &result.paths {
            assert_eq!(path.periods.len(), 24);
            assert_eq!(path.periods[0].rent, 2_501.0);
            assert_eq!(path.periods[23].rent, 2_524.0);
            assert!(path.periods[23].price > 300_000.0);
        }

        let constant = simulate_many(&input).unwrap();
        assert_eq!(constant.result.paths[0].periods[23].rent, 2_500.0);
    }

    #[test]
    fn test_events_serialize_comma_joined() {
        let mut input = constant_input();
        input.starting_rent = 0.0;
        input.starting_cash = 0.0;
        input.vacancy_rate = 1.0;
        let out = simulate_property(&input, Some(SEED)).unwrap();
        let period = &out.result.periods[0];
        assert_eq!(period.event_tags(), "vacant,bankrupt");

        let value = serde_json::to_value(period).unwrap();
        assert_eq!(value["events"], "vacant,bankrupt");
        let back: SimulationPeriod = serde_json::from_value(value).unwrap();
        assert_eq!(back.events, vec![PathEvent::Vacant, PathEvent::Bankrupt]);

        let quiet = simulate_property(&constant_input(), Some(SEED)).unwrap();
        let value = serde_json::to_value(&quiet.result.periods[0]).unwrap();
        assert_eq!(value["events"], "");
    }

    #[test]
    fn test_history_rows_are_flat() {
        let mut property = constant_input();
        property.num_payments = 3;
        property.vacancy_rate = 1.0;
        property.starting_cash = 1_000_000.0;
        let out = simulate_many(&EnsembleInput {
            num_paths: 2,
            seed: Some(SEED),
            property,
        })
        .unwrap();
        let rows = serde_json::to_value(out.result.history()).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[3]["path_id"], 1);
        assert_eq!(rows[3]["events"], "vacant");
    }
}
