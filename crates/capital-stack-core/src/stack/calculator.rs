use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::stack::allocation::{allocate, validate_bounds, CapitalAllocation};
use crate::stack::amortization::{build_amortization_schedule, build_tranche, LoanTranche};
use crate::stack::debt_service::aggregate;
use crate::stack::metrics::{return_metrics, DscrAssessment, LENDER_MIN_DSCR};
use crate::stack::projection::{cash_flow_series, project_cash_flows, ProjectionInput, ProjectionYear};
use crate::stack::{CapitalStackInput, TrancheKind};
use crate::time_value::{self, DEFAULT_IRR_GUESS};
use crate::types::*;
use crate::CapitalStackResult;

/// Financing, debt service, return metrics and projection for one deal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalStackOutput {
    pub allocation: CapitalAllocation,
    /// Seller note, SBA 7(a) and conventional loan, in that order
    pub tranches: Vec<LoanTranche>,
    pub monthly_debt_service: Money,
    pub annual_debt_service: Money,
    pub annual_cash_flow_after_debt: Money,
    pub cash_on_cash_return: Percent,
    pub dscr: Multiple,
    pub dscr_assessment: DscrAssessment,
    /// Internal rate of return in percent; best estimate when not converged
    pub irr: Percent,
    pub irr_converged: bool,
    pub equity_multiple: Multiple,
    pub months_to_break_even: Decimal,
    pub projections: Vec<ProjectionYear>,
    /// Loan principal still outstanding at the end of the hold period.
    /// Reported only; the exit-year cash flow does not deduct it.
    pub debt_balance_at_exit: Money,
}

/// Run the full capital stack calculation.
///
/// Bounds and the allocation sum are validated before anything is computed;
/// after that every degenerate case (no debt, no equity, negative cash flow,
/// an IRR with no root) resolves to a defined value plus a warning.
pub fn calculate(
    input: &CapitalStackInput,
) -> CapitalStackResult<ComputationOutput<CapitalStackOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_bounds(input)?;
    let allocation = allocate(input)?;

    let tranches: Vec<LoanTranche> = TrancheKind::DEBT
        .into_iter()
        .filter_map(|kind| {
            input
                .terms(kind)
                .map(|terms| build_tranche(kind, allocation.amount(kind), terms))
        })
        .collect();
    let debt_service = aggregate(&tranches);

    tracing::debug!(
        total_investment = %allocation.total_investment,
        equity = %allocation.equity,
        total_debt = %allocation.total_debt(),
        annual_debt_service = %debt_service.annual,
        "capital stack allocated"
    );

    let metrics = return_metrics(allocation.equity, input.annual_cash_flow, debt_service.annual);
    let dscr_assessment = DscrAssessment::from_dscr(metrics.dscr, debt_service.has_debt());

    let projections = project_cash_flows(&ProjectionInput {
        equity_amount: allocation.equity,
        annual_revenue: input.annual_revenue,
        annual_cash_flow: input.annual_cash_flow,
        revenue_growth_rate: input.revenue_growth_rate,
        exit_multiple: input.exit_multiple,
        annual_debt_service: debt_service.annual,
        hold_period_years: input.hold_period_years,
    });
    let series = cash_flow_series(&projections);
    let irr = time_value::irr(&series, DEFAULT_IRR_GUESS);
    let equity_multiple = time_value::equity_multiple(&series, allocation.equity);

    let debt_balance_at_exit: Money = tranches
        .iter()
        .map(|t| {
            build_amortization_schedule(t, input.hold_period_years)
                .balance_after(input.hold_period_years)
        })
        .sum();

    if metrics.annual_cash_flow_after_debt < Decimal::ZERO {
        warnings.push(format!(
            "Cash flow does not cover debt service (after-debt cash flow {}); break-even not computed",
            metrics.annual_cash_flow_after_debt.round_dp(2)
        ));
    }
    if matches!(
        dscr_assessment,
        DscrAssessment::Weak | DscrAssessment::Insufficient
    ) {
        warnings.push(format!(
            "DSCR of {}x is below the {}x lenders typically require",
            metrics.dscr.round_dp(2),
            LENDER_MIN_DSCR
        ));
    }
    if allocation.equity.is_zero() {
        warnings.push(
            "All-debt structure: cash-on-cash return and equity multiple are reported as 0".into(),
        );
    }
    if !irr.converged {
        tracing::warn!(
            iterations = irr.iterations,
            estimate = %irr.rate,
            "IRR search did not converge"
        );
        warnings.push(format!(
            "IRR did not converge after {} iterations; {}% is a best-effort estimate",
            irr.iterations,
            irr.percent().round_dp(2)
        ));
    }
    for tranche in &tranches {
        if !tranche.principal.is_zero() && tranche.term_years < input.hold_period_years {
            warnings.push(format!(
                "{} matures in year {} but its payment is carried through year {}",
                tranche.kind.label(),
                tranche.term_years,
                input.hold_period_years
            ));
        }
    }
    if debt_balance_at_exit > Decimal::ZERO {
        warnings.push(format!(
            "{} of loan principal is outstanding at exit and is not deducted from exit proceeds",
            debt_balance_at_exit.round_dp(2)
        ));
    }

    let output = CapitalStackOutput {
        allocation,
        tranches,
        monthly_debt_service: debt_service.monthly,
        annual_debt_service: debt_service.annual,
        annual_cash_flow_after_debt: metrics.annual_cash_flow_after_debt,
        cash_on_cash_return: metrics.cash_on_cash_return,
        dscr: metrics.dscr,
        dscr_assessment,
        irr: irr.percent(),
        irr_converged: irr.converged,
        equity_multiple,
        months_to_break_even: metrics.months_to_break_even,
        projections,
        debt_balance_at_exit,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Capital Stack: level-payment debt service, constant-debt-service projection, Newton-Raphson IRR",
        &serde_json::json!({
            "purchase_price": input.purchase_price.to_string(),
            "closing_costs": input.closing_costs.to_string(),
            "revenue_growth_rate": input.revenue_growth_rate.to_string(),
            "exit_multiple": input.exit_multiple.to_string(),
            "hold_period_years": input.hold_period_years,
        }),
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CapitalStackError;
    use crate::stack::test_support::sample_input;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_end_to_end_sample() {
        let out = calculate(&sample_input()).unwrap();
        let r = &out.result;

        assert_eq!(r.allocation.equity, dec!(185000));
        assert_eq!(r.allocation.seller_note, dec!(92500));
        assert_eq!(r.allocation.conventional, dec!(647500));
        assert!(r.annual_cash_flow_after_debt > Decimal::ZERO);
        assert!(r.cash_on_cash_return > dec!(20));
        assert_eq!(r.dscr_assessment, DscrAssessment::Strong);
        assert!(r.irr_converged);
        assert!(r.irr > Decimal::ZERO);
        assert_eq!(r.projections.len(), 6);
        assert_eq!(r.projections[0].cash_flow, dec!(-185000));
    }

    #[test]
    fn test_debt_service_matches_tranches() {
        let r = calculate(&sample_input()).unwrap().result;
        let monthly: Decimal = r.tranches.iter().map(|t| t.monthly_payment).sum();
        assert_eq!(r.monthly_debt_service, monthly);
        assert_eq!(r.annual_debt_service, monthly * dec!(12));
        // Conventional: 647,500 at 6.5% over 15 years
        assert!((r.tranches[2].monthly_payment - dec!(5640.4)).abs() < dec!(1));
        // SBA tranche is unused
        assert_eq!(r.tranches[1].monthly_payment, Decimal::ZERO);
    }

    #[test]
    fn test_irr_and_multiple_use_projection() {
        let r = calculate(&sample_input()).unwrap().result;
        let series = cash_flow_series(&r.projections);
        assert_eq!(
            r.equity_multiple,
            time_value::equity_multiple(&series, r.allocation.equity)
        );
        let at_irr = time_value::npv(r.irr / dec!(100), &series).unwrap();
        assert!(at_irr.abs() < dec!(50), "NPV at IRR was {at_irr}");
    }

    #[test]
    fn test_allocation_mismatch_stops_calculation() {
        let mut input = sample_input();
        input.conventional_percent = dec!(75);
        match calculate(&input) {
            Err(CapitalStackError::AllocationMismatch { sum }) => assert_eq!(sum, dec!(105)),
            other => panic!("expected allocation mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut input = sample_input();
        input.exit_multiple = dec!(25);
        assert!(matches!(
            calculate(&input),
            Err(CapitalStackError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_all_equity_deal() {
        let mut input = sample_input();
        input.equity_percent = dec!(100);
        input.seller_note_percent = Decimal::ZERO;
        input.conventional_percent = Decimal::ZERO;
        let r = calculate(&input).unwrap().result;
        assert_eq!(r.annual_debt_service, Decimal::ZERO);
        assert_eq!(r.dscr, Decimal::ZERO);
        assert_eq!(r.dscr_assessment, DscrAssessment::NoDebt);
        assert_eq!(r.annual_cash_flow_after_debt, dec!(150000));
        assert_eq!(r.debt_balance_at_exit, Decimal::ZERO);
    }

    #[test]
    fn test_all_debt_deal_is_total() {
        let mut input = sample_input();
        input.equity_percent = Decimal::ZERO;
        input.seller_note_percent = dec!(30);
        let out = calculate(&input).unwrap();
        let r = &out.result;
        assert_eq!(r.cash_on_cash_return, Decimal::ZERO);
        assert_eq!(r.equity_multiple, Decimal::ZERO);
        assert!(out.warnings.iter().any(|w| w.contains("All-debt")));
    }

    #[test]
    fn test_underwater_deal_warns() {
        let mut input = sample_input();
        input.annual_cash_flow = dec!(60000);
        let out = calculate(&input).unwrap();
        let r = &out.result;
        assert!(r.annual_cash_flow_after_debt < Decimal::ZERO);
        assert_eq!(r.months_to_break_even, Decimal::ZERO);
        assert_eq!(r.dscr_assessment, DscrAssessment::Insufficient);
        assert!(out.warnings.iter().any(|w| w.contains("does not cover")));
    }

    #[test]
    fn test_balance_at_exit_reported() {
        let out = calculate(&sample_input()).unwrap();
        assert!(out.result.debt_balance_at_exit > Decimal::ZERO);
        assert!(out.result.debt_balance_at_exit < dec!(740000));
        assert!(out.warnings.iter().any(|w| w.contains("outstanding at exit")));
    }

    #[test]
    fn test_unused_tranche_terms_are_ignored() {
        let base = calculate(&sample_input()).unwrap().result;

        let mut input = sample_input();
        input.sba_7a = crate::stack::LoanTerms {
            annual_interest_rate: Decimal::ZERO,
            term_years: 0,
        };
        let r = calculate(&input).unwrap().result;
        assert_eq!(r.tranches[1].monthly_payment, Decimal::ZERO);
        assert_eq!(r.monthly_debt_service, base.monthly_debt_service);
        assert_eq!(r.irr, base.irr);
        assert_eq!(r.debt_balance_at_exit, base.debt_balance_at_exit);
    }

    #[test]
    fn test_largest_inputs_do_not_overflow() {
        let mut input = sample_input();
        input.purchase_price = crate::stack::allocation::MAX_MONEY;
        input.closing_costs = crate::stack::allocation::MAX_MONEY;
        input.annual_revenue = crate::stack::allocation::MAX_MONEY;
        input.annual_cash_flow = crate::stack::allocation::MAX_MONEY;
        input.revenue_growth_rate = dec!(100);
        input.exit_multiple = dec!(20);
        input.hold_period_years = 30;
        let r = calculate(&input).unwrap().result;
        assert_eq!(r.projections.len(), 31);
        assert!(r.projections[30].exit_value > Decimal::ZERO);
    }

    #[test]
    fn test_oversized_revenue_is_rejected() {
        let mut input = sample_input();
        input.annual_revenue = dec!(100000000000000000000);
        input.annual_cash_flow = dec!(100000000000000000000);
        input.revenue_growth_rate = dec!(100);
        input.exit_multiple = dec!(20);
        input.hold_period_years = 30;
        assert!(matches!(
            calculate(&input),
            Err(CapitalStackError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_short_note_maturity_warning() {
        let mut input = sample_input();
        input.seller_note.term_years = 3;
        let out = calculate(&input).unwrap();
        assert!(out.warnings.iter().any(|w| w.starts_with("Seller Note matures")));
    }
}
