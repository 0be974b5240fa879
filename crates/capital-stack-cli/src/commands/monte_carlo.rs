use clap::Args;
use serde_json::Value;

use capital_stack_core::monte_carlo::simulation::{self, StackMonteCarloInput};

use crate::input;

/// Arguments for Monte Carlo IRR simulation
#[derive(Args)]
pub struct SimulateArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the number of simulation paths
    #[arg(long)]
    pub simulations: Option<u32>,

    /// Override the random seed
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut mc_input: StackMonteCarloInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file> or stdin required for Monte Carlo simulation".into());
    };

    if let Some(n) = args.simulations {
        mc_input.num_simulations = n;
    }
    if args.seed.is_some() {
        mc_input.seed = args.seed;
    }

    let result = simulation::run_stack_monte_carlo(&mc_input)?;
    Ok(serde_json::to_value(result)?)
}
