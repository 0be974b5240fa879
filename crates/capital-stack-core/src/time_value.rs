use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::CapitalStackError;
use crate::types::{Money, Multiple, Percent, Rate};
use crate::CapitalStackResult;

/// Starting estimate for the IRR solver (10%).
pub const DEFAULT_IRR_GUESS: Rate = dec!(0.10);

const STEP_TOLERANCE: Decimal = dec!(0.0001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MIN_RATE: Rate = dec!(-0.99);
const MAX_RATE: Rate = dec!(100);

/// Net Present Value of a series of periodic cash flows
pub fn npv(rate: Rate, cash_flows: &[Money]) -> CapitalStackResult<Money> {
    if rate <= dec!(-1) {
        return Err(CapitalStackError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        let out_of_range = || CapitalStackError::InvalidInput {
            field: "rate".into(),
            reason: format!("Discount factor out of range at period {t}"),
        };
        if t > 0 {
            discount = discount.checked_mul(one_plus_r).ok_or_else(out_of_range)?;
        }
        result = cf
            .checked_div(discount)
            .and_then(|pv| result.checked_add(pv))
            .ok_or_else(out_of_range)?;
    }

    Ok(result)
}

/// Outcome of the Newton-Raphson IRR search.
///
/// `rate` is the last estimate whether or not the search converged; callers
/// that need to distinguish a real root from an exhausted search check
/// `converged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrrSolution {
    pub rate: Rate,
    pub converged: bool,
    pub iterations: u32,
}

impl IrrSolution {
    /// The rate as a percentage (0.12 -> 12).
    pub fn percent(&self) -> Percent {
        self.rate * dec!(100)
    }
}

/// NPV and dNPV/dr in a single pass. `None` when a term leaves the Decimal range.
fn npv_and_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;
    let mut npv_val = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount.checked_mul(one_plus_r)?;
        }
        npv_val = npv_val.checked_add(cf.checked_div(discount)?)?;
        if t > 0 {
            let next = discount.checked_mul(one_plus_r)?;
            let weighted = Decimal::from(t as u64).checked_mul(*cf)?;
            dnpv = dnpv.checked_sub(weighted.checked_div(next)?)?;
        }
    }

    Some((npv_val, dnpv))
}

/// Internal Rate of Return using Newton-Raphson.
///
/// Iterates `r <- r - NPV(r) / NPV'(r)` until the step is smaller than 0.0001,
/// for at most 100 iterations. Never fails: a series with no root (all flows
/// of one sign), a flat derivative, or a search that leaves the representable
/// range yields the last estimate with `converged == false`.
pub fn irr(cash_flows: &[Money], guess: Rate) -> IrrSolution {
    let mut rate = guess.clamp(MIN_RATE, MAX_RATE);

    for i in 0..MAX_IRR_ITERATIONS {
        let Some((npv_val, dnpv)) = npv_and_derivative(rate, cash_flows) else {
            return IrrSolution {
                rate,
                converged: false,
                iterations: i,
            };
        };

        let Some(step) = npv_val.checked_div(dnpv) else {
            return IrrSolution {
                rate,
                converged: false,
                iterations: i,
            };
        };

        // Keep 1 + r away from zero so the next discount factor exists
        rate = match rate.checked_sub(step) {
            Some(next) => next.clamp(MIN_RATE, MAX_RATE),
            None if step.is_sign_positive() => MIN_RATE,
            None => MAX_RATE,
        };

        if step.abs() < STEP_TOLERANCE {
            return IrrSolution {
                rate,
                converged: true,
                iterations: i + 1,
            };
        }
    }

    IrrSolution {
        rate,
        converged: false,
        iterations: MAX_IRR_ITERATIONS,
    }
}

/// Total cash returned after the initial outlay divided by equity invested.
///
/// `cash_flows[0]` is the outlay and is excluded. Zero when there is no equity.
pub fn equity_multiple(cash_flows: &[Money], equity_amount: Money) -> Multiple {
    if equity_amount <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let returned: Money = cash_flows.iter().skip(1).sum();
    returned / equity_amount
}
