use clap::Args;
use serde_json::Value;

use estate_core::simulation::property::{self, EnsembleInput, PropertySimulationInput};

use crate::input;

/// Arguments for a single simulated property path
#[derive(Args)]
pub struct SimulatePropertyArgs {
    /// Path to JSON file with the property and market assumptions
    #[arg(long)]
    pub input: Option<String>,

    /// RNG seed for a reproducible path
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for a Monte Carlo ensemble of property paths
#[derive(Args)]
pub struct SimulateManyArgs {
    /// Path to JSON file with `num_paths`, `seed` and `property`
    #[arg(long)]
    pub input: Option<String>,

    /// Override the number of paths
    #[arg(long)]
    pub num_paths: Option<u32>,

    /// Override the base RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Emit every period of every path instead of the summary
    #[arg(long)]
    pub history: bool,
}

pub fn run_simulate_property(
    args: SimulatePropertyArgs,
) -> Result<Value, Box<dyn std::error::Error>> {
    let sim_input: PropertySimulationInput =
        input::require(args.input.as_deref(), "property simulation")?;
    let result = property::simulate_property(&sim_input, args.seed)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_simulate_many(args: SimulateManyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut ensemble: EnsembleInput =
        input::require(args.input.as_deref(), "ensemble simulation")?;
    if let Some(n) = args.num_paths {
        ensemble.num_paths = n;
    }
    if args.seed.is_some() {
        ensemble.seed = args.seed;
    }

    let result = property::simulate_many(&ensemble)?;
    if args.history {
        return Ok(serde_json::to_value(result.result.history())?);
    }
    Ok(serde_json::to_value(result)?)
}
