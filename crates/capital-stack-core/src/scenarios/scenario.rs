use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::CapitalStackError;
use crate::scenarios::sensitivity::{StackDriver, StackMetric};
use crate::stack::{calculate, CapitalStackInput};
use crate::types::*;
use crate::CapitalStackResult;

/// A single assumption changed from the base case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverOverride {
    pub driver: StackDriver,
    pub value: Decimal,
}

/// A named deal outcome and its likelihood
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackScenario {
    pub name: String,
    /// Probability as a decimal (0.25 = 25%)
    pub probability: Rate,
    pub overrides: Vec<DriverOverride>,
}

/// Input for scenario analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInput {
    pub base: CapitalStackInput,
    pub scenarios: Vec<StackScenario>,
    pub metric: StackMetric,
}

/// Result for a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub probability: Rate,
    pub output_value: Decimal,
    pub deviation_from_base: Decimal,
    pub deviation_pct: Rate,
    pub irr_converged: bool,
}

/// Output of scenario analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub metric: StackMetric,
    pub base_case_value: Decimal,
    pub results: Vec<ScenarioResult>,
    pub probability_weighted_value: Decimal,
}

/// Run bear/base/bull style scenarios through the capital stack calculation.
///
/// Probabilities must sum to 1.0 within 0.001. Each scenario applies its
/// overrides to a copy of the base input; a scenario that fails validation
/// fails the whole analysis, since its probability mass cannot be dropped.
pub fn analyze_scenarios(
    input: &ScenarioInput,
) -> CapitalStackResult<ComputationOutput<ScenarioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.scenarios.is_empty() {
        return Err(CapitalStackError::InsufficientData(
            "At least one scenario required".into(),
        ));
    }

    for s in &input.scenarios {
        if s.probability < Decimal::ZERO || s.probability > Decimal::ONE {
            return Err(CapitalStackError::InvalidInput {
                field: format!("scenario:{} probability", s.name),
                reason: "Probability must be between 0 and 1".into(),
            });
        }
    }

    let total_prob: Decimal = input.scenarios.iter().map(|s| s.probability).sum();
    let prob_tolerance = dec!(0.001);
    if (total_prob - Decimal::ONE).abs() > prob_tolerance {
        return Err(CapitalStackError::InvalidInput {
            field: "probabilities".into(),
            reason: format!("Probabilities must sum to 1.0 (got {total_prob})"),
        });
    }
    if total_prob != Decimal::ONE {
        warnings.push(format!(
            "Probabilities sum to {total_prob}; treated as approximately 1.0"
        ));
    }

    let base_case_value = input.metric.extract(&calculate(&input.base)?.result);

    let mut results = Vec::with_capacity(input.scenarios.len());
    let mut probability_weighted_value = Decimal::ZERO;

    for scenario in &input.scenarios {
        let mut scenario_input = input.base.clone();
        for o in &scenario.overrides {
            o.driver.apply(&mut scenario_input, o.value)?;
        }
        let out = calculate(&scenario_input).map_err(|e| CapitalStackError::InvalidInput {
            field: format!("scenario:{}", scenario.name),
            reason: e.to_string(),
        })?;
        let output_value = input.metric.extract(&out.result);

        if !out.result.irr_converged {
            warnings.push(format!(
                "Scenario '{}': IRR did not converge",
                scenario.name
            ));
        }

        let deviation = output_value - base_case_value;
        let deviation_pct = if base_case_value.is_zero() {
            if !deviation.is_zero() {
                warnings.push(format!(
                    "Base case is zero; cannot compute deviation_pct for scenario '{}'",
                    scenario.name
                ));
            }
            Decimal::ZERO
        } else {
            deviation / base_case_value
        };

        probability_weighted_value += scenario.probability * output_value;

        results.push(ScenarioResult {
            name: scenario.name.clone(),
            probability: scenario.probability,
            output_value,
            deviation_from_base: deviation,
            deviation_pct,
            irr_converged: out.result.irr_converged,
        });
    }

    let output = ScenarioOutput {
        metric: input.metric,
        base_case_value,
        results,
        probability_weighted_value,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Bear/Base/Bull Scenario Analysis (Capital Stack)",
        &serde_json::json!({
            "num_scenarios": input.scenarios.len(),
            "metric": input.metric,
            "base_case_value": base_case_value.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::test_support::sample_input;
    use rust_decimal_macros::dec;

    fn scenario(name: &str, probability: Decimal, exit_multiple: Decimal) -> StackScenario {
        StackScenario {
            name: name.into(),
            probability,
            overrides: vec![DriverOverride {
                driver: StackDriver::ExitMultiple,
                value: exit_multiple,
            }],
        }
    }

    fn bear_base_bull() -> ScenarioInput {
        ScenarioInput {
            base: sample_input(),
            scenarios: vec![
                scenario("Bear", dec!(0.25), dec!(2)),
                scenario("Base", dec!(0.50), dec!(3)),
                scenario("Bull", dec!(0.25), dec!(4)),
            ],
            metric: StackMetric::EquityMultiple,
        }
    }

    #[test]
    fn test_weighted_value() {
        let out = analyze_scenarios(&bear_base_bull()).unwrap().result;
        assert_eq!(out.results.len(), 3);
        // Base scenario repeats the base input
        assert_eq!(out.results[1].deviation_from_base, Decimal::ZERO);
        assert!(out.results[0].output_value < out.base_case_value);
        assert!(out.results[2].output_value > out.base_case_value);

        let expected: Decimal = out
            .results
            .iter()
            .map(|r| r.probability * r.output_value)
            .sum();
        assert_eq!(out.probability_weighted_value, expected);
    }

    #[test]
    fn test_probabilities_must_sum_to_one() {
        let mut input = bear_base_bull();
        input.scenarios[0].probability = dec!(0.5);
        assert!(analyze_scenarios(&input).is_err());
    }

    #[test]
    fn test_empty_scenarios() {
        let mut input = bear_base_bull();
        input.scenarios.clear();
        assert!(analyze_scenarios(&input).is_err());
    }

    #[test]
    fn test_invalid_override_fails() {
        let mut input = bear_base_bull();
        input.scenarios[2].overrides[0].value = dec!(50);
        let err = analyze_scenarios(&input).unwrap_err();
        assert!(err.to_string().contains("scenario:Bull"));
    }
}
