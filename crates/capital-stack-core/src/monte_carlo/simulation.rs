use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Normal, Triangular, Uniform};
use std::time::Instant;

use crate::error::CapitalStackError;
use crate::stack::{calculate, CapitalStackInput};
use crate::types::{with_precision, ComputationOutput};
use crate::CapitalStackResult;

const MIN_SIMULATIONS: u32 = 100;
const MAX_SIMULATIONS: u32 = 100_000;

const GROWTH_BOUNDS: (f64, f64) = (-50.0, 100.0);
const EXIT_MULTIPLE_BOUNDS: (f64, f64) = (0.0, 20.0);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Probability distribution specification for a Monte Carlo variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum McDistribution {
    Normal { mean: f64, std_dev: f64 },
    Triangular { min: f64, mode: f64, max: f64 },
    Uniform { min: f64, max: f64 },
    /// Hold the variable at one value
    Fixed { value: f64 },
}

/// Input for a stochastic IRR simulation around a base deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackMonteCarloInput {
    pub base: CapitalStackInput,
    /// Annual growth in percent
    pub revenue_growth_rate: McDistribution,
    pub exit_multiple: McDistribution,
    /// Number of simulation paths (minimum 100).
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    /// Optional seed for reproducibility.
    pub seed: Option<u64>,
}

fn default_num_simulations() -> u32 {
    5_000
}

/// Percentile summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McPercentiles {
    pub p5: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

/// Distribution of deal returns across simulated paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackMonteCarloOutput {
    pub num_simulations: u32,
    /// IRR in percent
    pub irr: McPercentiles,
    pub irr_mean: f64,
    pub irr_std_dev: f64,
    pub equity_multiple: McPercentiles,
    pub equity_multiple_mean: f64,
    pub base_case_irr: f64,
    pub probability_irr_positive: f64,
    pub probability_irr_above_base: f64,
    /// Paths whose IRR is a best-effort estimate
    pub non_converged_paths: u32,
    /// Samples pulled back into the allowed input range
    pub clamped_samples: u32,
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

enum Sampler {
    Normal(Normal),
    Triangular(Triangular),
    Uniform(Uniform),
    Fixed(f64),
}

impl Sampler {
    fn new(field: &str, dist: &McDistribution) -> CapitalStackResult<Self> {
        Ok(match dist {
            McDistribution::Normal { mean, std_dev } => Sampler::Normal(
                Normal::new(*mean, *std_dev).map_err(|e| invalid_params(field, e))?,
            ),
            McDistribution::Triangular { min, mode, max } => Sampler::Triangular(
                Triangular::new(*min, *max, *mode).map_err(|e| invalid_params(field, e))?,
            ),
            McDistribution::Uniform { min, max } => Sampler::Uniform(
                Uniform::new(*min, *max).map_err(|e| invalid_params(field, e))?,
            ),
            McDistribution::Fixed { value } => Sampler::Fixed(*value),
        })
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        match self {
            Sampler::Normal(d) => rng.sample(d),
            Sampler::Triangular(d) => rng.sample(d),
            Sampler::Uniform(d) => rng.sample(d),
            Sampler::Fixed(v) => *v,
        }
    }
}

fn invalid_params(field: &str, e: impl std::fmt::Display) -> CapitalStackError {
    CapitalStackError::InvalidInput {
        field: field.into(),
        reason: format!("Invalid distribution parameters: {e}"),
    }
}

/// Pull a sample into `[min, max]` and convert it for the decimal engine.
fn to_bounded_decimal(
    field: &str,
    x: f64,
    (min, max): (f64, f64),
    clamped: &mut u32,
) -> CapitalStackResult<Decimal> {
    let bounded = x.clamp(min, max);
    if bounded != x {
        *clamped += 1;
    }
    Decimal::from_f64(bounded)
        .map(|d| d.round_dp(6))
        .ok_or_else(|| CapitalStackError::InvalidInput {
            field: field.into(),
            reason: format!("Sample {x} is not representable"),
        })
}

// ---------------------------------------------------------------------------
// Statistics helpers
// ---------------------------------------------------------------------------

/// Compute the percentile value from a **sorted** slice using linear interpolation.
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

fn percentiles(sorted: &[f64]) -> McPercentiles {
    McPercentiles {
        p5: percentile_sorted(sorted, 5.0),
        p10: percentile_sorted(sorted, 10.0),
        p25: percentile_sorted(sorted, 25.0),
        p50: percentile_sorted(sorted, 50.0),
        p75: percentile_sorted(sorted, 75.0),
        p90: percentile_sorted(sorted, 90.0),
        p95: percentile_sorted(sorted, 95.0),
    }
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

fn sort(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Simulate IRR and equity multiple under uncertain growth and exit multiple.
///
/// Each path draws a growth rate and an exit multiple, clamps them into the
/// ranges the calculator accepts, and runs the full capital stack
/// calculation. Everything else comes from the base input.
pub fn run_stack_monte_carlo(
    input: &StackMonteCarloInput,
) -> CapitalStackResult<ComputationOutput<StackMonteCarloOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.num_simulations < MIN_SIMULATIONS || input.num_simulations > MAX_SIMULATIONS {
        return Err(CapitalStackError::InvalidInput {
            field: "num_simulations".into(),
            reason: format!("Must be between {MIN_SIMULATIONS} and {MAX_SIMULATIONS}"),
        });
    }

    let growth = Sampler::new("revenue_growth_rate", &input.revenue_growth_rate)?;
    let exit = Sampler::new("exit_multiple", &input.exit_multiple)?;

    let base = calculate(&input.base)?.result;
    let base_case_irr = base.irr.to_f64().unwrap_or_default();

    let mut rng = match input.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    let n = input.num_simulations as usize;
    let mut irrs = Vec::with_capacity(n);
    let mut multiples = Vec::with_capacity(n);
    let mut non_converged_paths = 0u32;
    let mut clamped_samples = 0u32;

    for _ in 0..n {
        let mut path = input.base.clone();
        path.revenue_growth_rate = to_bounded_decimal(
            "revenue_growth_rate",
            growth.sample(&mut rng),
            GROWTH_BOUNDS,
            &mut clamped_samples,
        )?;
        path.exit_multiple = to_bounded_decimal(
            "exit_multiple",
            exit.sample(&mut rng),
            EXIT_MULTIPLE_BOUNDS,
            &mut clamped_samples,
        )?;

        let out = calculate(&path)?.result;
        if !out.irr_converged {
            non_converged_paths += 1;
        }
        irrs.push(out.irr.to_f64().unwrap_or_default());
        multiples.push(out.equity_multiple.to_f64().unwrap_or_default());
    }

    if non_converged_paths > 0 {
        warnings.push(format!(
            "{non_converged_paths} of {n} paths produced a non-convergent IRR estimate"
        ));
    }
    if clamped_samples > 0 {
        warnings.push(format!(
            "{clamped_samples} samples fell outside the allowed input range and were clamped"
        ));
    }

    let probability_irr_positive = irrs.iter().filter(|r| **r > 0.0).count() as f64 / n as f64;
    let probability_irr_above_base =
        irrs.iter().filter(|r| **r > base_case_irr).count() as f64 / n as f64;

    let (irr_mean, irr_std_dev) = mean_and_std(&irrs);
    let (equity_multiple_mean, _) = mean_and_std(&multiples);
    sort(&mut irrs);
    sort(&mut multiples);

    let output = StackMonteCarloOutput {
        num_simulations: input.num_simulations,
        irr: percentiles(&irrs),
        irr_mean,
        irr_std_dev,
        equity_multiple: percentiles(&multiples),
        equity_multiple_mean,
        base_case_irr,
        probability_irr_positive,
        probability_irr_above_base,
        non_converged_paths,
        clamped_samples,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_precision(
        "Monte Carlo IRR Simulation (growth and exit multiple)",
        &serde_json::json!({
            "num_simulations": input.num_simulations,
            "seed": input.seed,
            "revenue_growth_rate": input.revenue_growth_rate,
            "exit_multiple": input.exit_multiple,
        }),
        warnings,
        elapsed,
        "ieee754_f64_sampling_rust_decimal_128bit_paths",
        output,
    ))
}
