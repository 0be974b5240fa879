use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use capital_stack_core::time_value::{self, DEFAULT_IRR_GUESS};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Capital stack
// ---------------------------------------------------------------------------

#[napi]
pub fn calculate_capital_stack(input_json: String) -> NapiResult<String> {
    let input: capital_stack_core::stack::CapitalStackInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    capital_stack_core::stack::allocation::validate_bounds(&input).map_err(to_napi_error)?;
    let output = capital_stack_core::stack::calculate(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct PaymentRequest {
    principal: Decimal,
    annual_interest_rate: Decimal,
    term_years: u32,
}

#[derive(Serialize)]
struct PaymentResponse {
    monthly_payment: Decimal,
    annual_payment: Decimal,
}

#[napi]
pub fn monthly_payment(input_json: String) -> NapiResult<String> {
    let req: PaymentRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    if req.principal < Decimal::ZERO || req.annual_interest_rate < Decimal::ZERO {
        return Err(to_napi_error("principal and annual_interest_rate cannot be negative"));
    }
    if req.term_years == 0 {
        return Err(to_napi_error("term_years must be at least 1"));
    }
    let monthly = capital_stack_core::stack::amortization::monthly_payment(
        req.principal,
        req.annual_interest_rate,
        req.term_years,
    );
    serde_json::to_string(&PaymentResponse {
        monthly_payment: monthly,
        annual_payment: monthly * Decimal::from(12),
    })
    .map_err(to_napi_error)
}

#[napi]
pub fn amortization_schedule(input_json: String) -> NapiResult<String> {
    let input: capital_stack_core::stack::amortization::ScheduleInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = capital_stack_core::stack::amortization::amortization_schedule(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Time value
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct IrrRequest {
    cash_flows: Vec<Decimal>,
    /// Starting guess as a decimal rate (0.10 = 10%)
    #[serde(default)]
    guess: Option<Decimal>,
    /// Discount rate for NPV as a decimal rate
    #[serde(default)]
    npv_rate: Option<Decimal>,
}

#[derive(Serialize)]
struct IrrResponse {
    irr: Decimal,
    irr_converged: bool,
    iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    npv: Option<Decimal>,
}

#[napi]
pub fn calculate_irr(input_json: String) -> NapiResult<String> {
    let req: IrrRequest = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let solution = time_value::irr(&req.cash_flows, req.guess.unwrap_or(DEFAULT_IRR_GUESS));
    let npv = match req.npv_rate {
        Some(rate) => Some(time_value::npv(rate, &req.cash_flows).map_err(to_napi_error)?),
        None => None,
    };
    serde_json::to_string(&IrrResponse {
        irr: solution.percent(),
        irr_converged: solution.converged,
        iterations: solution.iterations,
        npv,
    })
    .map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn stack_sensitivity(input_json: String) -> NapiResult<String> {
    let input: capital_stack_core::scenarios::sensitivity::SensitivityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = capital_stack_core::scenarios::sensitivity::run_sensitivity(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn stack_scenarios(input_json: String) -> NapiResult<String> {
    let input: capital_stack_core::scenarios::scenario::ScenarioInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = capital_stack_core::scenarios::scenario::analyze_scenarios(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Monte Carlo
// ---------------------------------------------------------------------------

#[napi]
pub fn stack_monte_carlo(input_json: String) -> NapiResult<String> {
    let input: capital_stack_core::monte_carlo::simulation::StackMonteCarloInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = capital_stack_core::monte_carlo::simulation::run_stack_monte_carlo(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
