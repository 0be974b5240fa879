use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Assumptions driving the hold-period projection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub equity_amount: Money,
    pub annual_revenue: Money,
    pub annual_cash_flow: Money,
    /// Percent per year, applied to both revenue and cash flow
    pub revenue_growth_rate: Percent,
    pub exit_multiple: Multiple,
    pub annual_debt_service: Money,
    pub hold_period_years: u32,
}

/// One year of the projection. `cash_flow` is what equity receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionYear {
    pub year: u32,
    pub revenue: Money,
    pub operating_cash_flow: Money,
    pub debt_service: Money,
    pub exit_value: Money,
    pub cash_flow: Money,
}

/// Project equity cash flows over the hold period.
///
/// Year 0 is the equity outlay (negative). Each later year grows revenue and
/// cash flow by the growth rate and pays the same annual debt service; the
/// payment is not re-amortized against the declining balance. The final year
/// adds the exit value (terminal revenue times the exit multiple) without
/// deducting any remaining loan balance.
pub fn project_cash_flows(input: &ProjectionInput) -> Vec<ProjectionYear> {
    let growth = Decimal::ONE + input.revenue_growth_rate / Decimal::ONE_HUNDRED;
    let mut years = Vec::with_capacity(input.hold_period_years as usize + 1);

    years.push(ProjectionYear {
        year: 0,
        revenue: Decimal::ZERO,
        operating_cash_flow: Decimal::ZERO,
        debt_service: Decimal::ZERO,
        exit_value: Decimal::ZERO,
        cash_flow: -input.equity_amount,
    });

    let mut factor = Decimal::ONE;
    for year in 1..=input.hold_period_years {
        factor *= growth;
        let revenue = input.annual_revenue * factor;
        let operating_cash_flow = input.annual_cash_flow * factor;

        let exit_value = if year == input.hold_period_years {
            revenue * input.exit_multiple
        } else {
            Decimal::ZERO
        };

        years.push(ProjectionYear {
            year,
            revenue,
            operating_cash_flow,
            debt_service: input.annual_debt_service,
            exit_value,
            cash_flow: operating_cash_flow - input.annual_debt_service + exit_value,
        });
    }

    years
}

/// The bare cash-flow series, year 0 first.
pub fn cash_flow_series(years: &[ProjectionYear]) -> Vec<Money> {
    years.iter().map(|y| y.cash_flow).collect()
}
