use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::error::CapitalStackError;
use crate::stack::{calculate, CapitalStackInput, CapitalStackOutput, TrancheKind};
use crate::types::*;
use crate::CapitalStackResult;

const MAX_SWEEP_POINTS: usize = 100;

/// An input assumption that can be swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackDriver {
    ExitMultiple,
    RevenueGrowthRate,
    HoldPeriodYears,
    AnnualCashFlow,
    PurchasePrice,
    ConventionalRate,
    Sba7aRate,
    SellerNoteRate,
}

impl StackDriver {
    pub fn name(&self) -> &'static str {
        match self {
            StackDriver::ExitMultiple => "exit_multiple",
            StackDriver::RevenueGrowthRate => "revenue_growth_rate",
            StackDriver::HoldPeriodYears => "hold_period_years",
            StackDriver::AnnualCashFlow => "annual_cash_flow",
            StackDriver::PurchasePrice => "purchase_price",
            StackDriver::ConventionalRate => "conventional_rate",
            StackDriver::Sba7aRate => "sba_7a_rate",
            StackDriver::SellerNoteRate => "seller_note_rate",
        }
    }

    fn loan(&self) -> Option<TrancheKind> {
        match self {
            StackDriver::ConventionalRate => Some(TrancheKind::Conventional),
            StackDriver::Sba7aRate => Some(TrancheKind::Sba7a),
            StackDriver::SellerNoteRate => Some(TrancheKind::SellerNote),
            _ => None,
        }
    }

    /// Current value of this driver in `input`.
    pub fn value(&self, input: &CapitalStackInput) -> Decimal {
        if let Some(kind) = self.loan() {
            return input
                .terms(kind)
                .map(|t| t.annual_interest_rate)
                .unwrap_or_default();
        }
        match self {
            StackDriver::ExitMultiple => input.exit_multiple,
            StackDriver::RevenueGrowthRate => input.revenue_growth_rate,
            StackDriver::HoldPeriodYears => Decimal::from(input.hold_period_years),
            StackDriver::AnnualCashFlow => input.annual_cash_flow,
            StackDriver::PurchasePrice => input.purchase_price,
            _ => Decimal::ZERO,
        }
    }

    /// Overwrite this driver in `input`.
    pub fn apply(&self, input: &mut CapitalStackInput, value: Decimal) -> CapitalStackResult<()> {
        if let Some(kind) = self.loan() {
            if let Some(terms) = input.terms_mut(kind) {
                terms.annual_interest_rate = value;
            }
            return Ok(());
        }
        match self {
            StackDriver::ExitMultiple => input.exit_multiple = value,
            StackDriver::RevenueGrowthRate => input.revenue_growth_rate = value,
            StackDriver::HoldPeriodYears => {
                input.hold_period_years = value
                    .to_u32()
                    .filter(|_| value.fract().is_zero())
                    .ok_or_else(|| CapitalStackError::InvalidInput {
                        field: self.name().into(),
                        reason: format!("Hold period must be a whole number of years (got {value})"),
                    })?;
            }
            StackDriver::AnnualCashFlow => input.annual_cash_flow = value,
            StackDriver::PurchasePrice => input.purchase_price = value,
            _ => {}
        }
        Ok(())
    }
}

impl fmt::Display for StackDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StackDriver {
    type Err = CapitalStackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            StackDriver::ExitMultiple,
            StackDriver::RevenueGrowthRate,
            StackDriver::HoldPeriodYears,
            StackDriver::AnnualCashFlow,
            StackDriver::PurchasePrice,
            StackDriver::ConventionalRate,
            StackDriver::Sba7aRate,
            StackDriver::SellerNoteRate,
        ]
        .into_iter()
        .find(|d| d.name() == s)
        .ok_or_else(|| CapitalStackError::InvalidInput {
            field: "driver".into(),
            reason: format!("Unknown sensitivity driver '{s}'"),
        })
    }
}

/// Output measured in each cell of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackMetric {
    Irr,
    CashOnCashReturn,
    Dscr,
    EquityMultiple,
    AnnualCashFlowAfterDebt,
}

impl StackMetric {
    pub fn extract(&self, output: &CapitalStackOutput) -> Decimal {
        match self {
            StackMetric::Irr => output.irr,
            StackMetric::CashOnCashReturn => output.cash_on_cash_return,
            StackMetric::Dscr => output.dscr,
            StackMetric::EquityMultiple => output.equity_multiple,
            StackMetric::AnnualCashFlowAfterDebt => output.annual_cash_flow_after_debt,
        }
    }
}

impl FromStr for StackMetric {
    type Err = CapitalStackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "irr" => Ok(StackMetric::Irr),
            "cash_on_cash_return" | "coc" => Ok(StackMetric::CashOnCashReturn),
            "dscr" => Ok(StackMetric::Dscr),
            "equity_multiple" => Ok(StackMetric::EquityMultiple),
            "annual_cash_flow_after_debt" => Ok(StackMetric::AnnualCashFlowAfterDebt),
            other => Err(CapitalStackError::InvalidInput {
                field: "metric".into(),
                reason: format!("Unknown metric '{other}'"),
            }),
        }
    }
}

/// A driver and the range to sweep it over
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityVariable {
    pub driver: StackDriver,
    pub min: Decimal,
    pub max: Decimal,
    pub step: Decimal,
}

/// Input for 2-way sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    pub base: CapitalStackInput,
    pub variable_1: SensitivityVariable,
    pub variable_2: SensitivityVariable,
    pub metric: StackMetric,
}

/// Output of 2-way sensitivity analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub variable_1: StackDriver,
    pub variable_2: StackDriver,
    pub variable_1_values: Vec<Decimal>,
    pub variable_2_values: Vec<Decimal>,
    pub metric: StackMetric,
    /// Matrix[i][j] = metric when variable_1 = variable_1_values[i], variable_2 = variable_2_values[j]
    pub matrix: Vec<Vec<Decimal>>,
    /// Metric for the unmodified base input
    pub base_case_value: Decimal,
    /// Grid cell closest to the base input (row, col)
    pub base_case_position: (usize, usize),
}

/// Generate the sweep values for a sensitivity variable from min to max with step.
fn generate_sweep_values(var: &SensitivityVariable) -> CapitalStackResult<Vec<Decimal>> {
    if var.step <= Decimal::ZERO {
        return Err(CapitalStackError::InvalidInput {
            field: format!("variable:{}", var.driver),
            reason: "Step must be positive".into(),
        });
    }
    if var.min > var.max {
        return Err(CapitalStackError::InvalidInput {
            field: format!("variable:{}", var.driver),
            reason: "Min must be <= max".into(),
        });
    }
    // ceil(span / step) steps plus the starting point, counting an appended max
    if ((var.max - var.min) / var.step).ceil() >= Decimal::from(MAX_SWEEP_POINTS) {
        return Err(CapitalStackError::InvalidInput {
            field: format!("variable:{}", var.driver),
            reason: format!("Sweep would exceed {MAX_SWEEP_POINTS} points"),
        });
    }

    let mut values = Vec::new();
    let mut current = var.min;
    while current <= var.max {
        values.push(current);
        current += var.step;
    }
    // Ensure max is included if step doesn't land exactly on it
    if let Some(&last) = values.last() {
        if last < var.max {
            values.push(var.max);
        }
    }

    Ok(values)
}

/// Find the closest index to a target value in a sorted list.
fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (**v - target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Re-run the capital stack calculation across a grid of two drivers.
///
/// Cells whose inputs fail validation are reported as zero with a warning
/// rather than aborting the grid.
pub fn run_sensitivity(
    input: &SensitivityInput,
) -> CapitalStackResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.variable_1.driver == input.variable_2.driver {
        return Err(CapitalStackError::InvalidInput {
            field: "variable_2".into(),
            reason: "The two sensitivity variables must use different drivers".into(),
        });
    }

    let v1_values = generate_sweep_values(&input.variable_1)?;
    let v2_values = generate_sweep_values(&input.variable_2)?;
    let base_case_value = input.metric.extract(&calculate(&input.base)?.result);

    let mut matrix = Vec::with_capacity(v1_values.len());
    for v1 in &v1_values {
        let mut row = Vec::with_capacity(v2_values.len());
        for v2 in &v2_values {
            let cell = evaluate_cell(input, *v1, *v2);
            match cell {
                Ok(val) => row.push(val),
                Err(e) => {
                    warnings.push(format!("Evaluation failed at ({v1}, {v2}): {e}"));
                    row.push(Decimal::ZERO);
                }
            }
        }
        matrix.push(row);
    }

    let base_row = closest_index(&v1_values, input.variable_1.driver.value(&input.base));
    let base_col = closest_index(&v2_values, input.variable_2.driver.value(&input.base));

    tracing::debug!(
        rows = v1_values.len(),
        cols = v2_values.len(),
        failed = warnings.len(),
        "sensitivity grid evaluated"
    );

    let output = SensitivityOutput {
        variable_1: input.variable_1.driver,
        variable_2: input.variable_2.driver,
        variable_1_values: v1_values,
        variable_2_values: v2_values,
        metric: input.metric,
        matrix,
        base_case_value,
        base_case_position: (base_row, base_col),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "2-Way Sensitivity Analysis (Capital Stack)",
        &serde_json::json!({
            "variable_1": input.variable_1.driver.name(),
            "variable_2": input.variable_2.driver.name(),
            "metric": input.metric,
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn evaluate_cell(input: &SensitivityInput, v1: Decimal, v2: Decimal) -> CapitalStackResult<Decimal> {
    let mut scenario = input.base.clone();
    input.variable_1.driver.apply(&mut scenario, v1)?;
    input.variable_2.driver.apply(&mut scenario, v2)?;
    let out = calculate(&scenario)?;
    Ok(input.metric.extract(&out.result))
}
