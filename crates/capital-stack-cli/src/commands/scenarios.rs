use clap::Args;
use serde_json::Value;

use capital_stack_core::scenarios::scenario::{self, ScenarioInput};
use capital_stack_core::scenarios::sensitivity::{
    self, SensitivityInput, SensitivityVariable, StackDriver, StackMetric,
};
use capital_stack_core::stack::CapitalStackInput;

use crate::input;

/// Arguments for sensitivity analysis
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON or YAML file with the base deal
    #[arg(long)]
    pub input: Option<String>,

    /// First sensitivity variable in format driver:min:max:step
    /// (e.g. "exit_multiple:2:5:0.5")
    #[arg(long, allow_hyphen_values = true)]
    pub var1: String,

    /// Second sensitivity variable in format driver:min:max:step
    #[arg(long, allow_hyphen_values = true)]
    pub var2: String,

    /// Output metric: irr, cash_on_cash_return, dscr, equity_multiple,
    /// annual_cash_flow_after_debt
    #[arg(long, default_value = "irr")]
    pub metric: String,
}

fn parse_sens_var(spec: &str) -> Result<SensitivityVariable, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.len() != 4 {
        return Err(format!(
            "Sensitivity variable must be driver:min:max:step, got '{}'",
            spec
        )
        .into());
    }
    Ok(SensitivityVariable {
        driver: parts[0].parse::<StackDriver>()?,
        min: parts[1].parse()?,
        max: parts[2].parse()?,
        step: parts[3].parse()?,
    })
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let base: CapitalStackInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file> or stdin required for sensitivity analysis".into());
    };

    let sens_input = SensitivityInput {
        base,
        variable_1: parse_sens_var(&args.var1)?,
        variable_2: parse_sens_var(&args.var2)?,
        metric: args.metric.parse::<StackMetric>()?,
    };
    let result = sensitivity::run_sensitivity(&sens_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for scenario analysis
#[derive(Args)]
pub struct ScenariosArgs {
    /// Path to JSON or YAML file with base deal, scenarios and metric
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_scenarios(args: ScenariosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario_input: ScenarioInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file> or stdin required for scenario analysis".into());
    };
    let result = scenario::analyze_scenarios(&scenario_input)?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_sens_var() {
        let var = parse_sens_var("revenue_growth_rate:-5:10:2.5").unwrap();
        assert_eq!(var.driver, StackDriver::RevenueGrowthRate);
        assert_eq!(var.min, dec!(-5));
        assert_eq!(var.max, dec!(10));
        assert_eq!(var.step, dec!(2.5));
    }

    #[test]
    fn test_parse_sens_var_rejects_bad_specs() {
        assert!(parse_sens_var("exit_multiple:2:5").is_err());
        assert!(parse_sens_var("not_a_driver:1:2:1").is_err());
        assert!(parse_sens_var("exit_multiple:a:5:1").is_err());
    }
}
