use capital_stack_core::stack::{
    self, allocation, amortization, metrics, projection, CapitalStackInput, DscrAssessment,
    LoanTerms, TrancheKind,
};
use capital_stack_core::time_value;
use capital_stack_core::CapitalStackError;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn terms(rate: Decimal, years: u32) -> LoanTerms {
    LoanTerms {
        annual_interest_rate: rate,
        term_years: years,
    }
}

fn acquisition() -> CapitalStackInput {
    CapitalStackInput {
        purchase_price: dec!(900000),
        closing_costs: dec!(25000),
        equity_percent: dec!(20),
        seller_note_percent: dec!(10),
        sba_7a_percent: dec!(0),
        conventional_percent: dec!(70),
        seller_note: terms(dec!(6), 10),
        sba_7a: terms(dec!(10.5), 10),
        conventional: terms(dec!(6.5), 15),
        annual_revenue: dec!(109425),
        annual_cash_flow: dec!(150000),
        revenue_growth_rate: dec!(3),
        exit_multiple: dec!(3),
        hold_period_years: 5,
    }
}

fn assert_close(actual: Decimal, expected: Decimal, tol: Decimal) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected} ± {tol}, got {actual}"
    );
}

// ===========================================================================
// Amortization
// ===========================================================================

#[test]
fn test_payment_known_answers() {
    assert_close(amortization::monthly_payment(dec!(400000), dec!(7.5), 10), dec!(4748), dec!(1));
    assert_close(amortization::monthly_payment(dec!(300000), dec!(6.5), 15), dec!(2613), dec!(1));
    assert_close(amortization::monthly_payment(dec!(100000), dec!(5.0), 5), dec!(1887), dec!(1));
    assert_close(amortization::monthly_payment(dec!(100000), dec!(0), 5), dec!(1667), dec!(1));
}

#[test]
fn test_payment_higher_rate_costs_more() {
    let low = amortization::monthly_payment(dec!(500000), dec!(6), 10);
    let high = amortization::monthly_payment(dec!(500000), dec!(11), 10);
    assert!(high > low);
}

#[test]
fn test_payment_longer_term_costs_less() {
    let short = amortization::monthly_payment(dec!(500000), dec!(8), 10);
    let long = amortization::monthly_payment(dec!(500000), dec!(8), 25);
    assert!(long < short);
}

// ===========================================================================
// Validator
// ===========================================================================

#[test]
fn test_sum_of_105_reports_105() {
    let err = allocation::validate_allocation(dec!(30), dec!(25), dec!(25), dec!(25)).unwrap_err();
    assert!(matches!(err, CapitalStackError::AllocationMismatch { sum } if sum == dec!(105)));
    assert!(err.to_string().contains("105"));
}

#[test]
fn test_allocation_amounts_sum_to_total() {
    let alloc = allocation::allocate(&acquisition()).unwrap();
    assert_eq!(
        alloc.equity + alloc.total_debt(),
        alloc.total_investment
    );
    assert_eq!(alloc.amount(TrancheKind::Conventional), dec!(647500));
}

// ===========================================================================
// Metrics
// ===========================================================================

#[test]
fn test_metric_known_answers() {
    let m = metrics::return_metrics(dec!(100000), dec!(150000), dec!(90000));
    assert_eq!(m.cash_on_cash_return, dec!(60));
    assert_eq!(m.months_to_break_even, dec!(20));

    let m = metrics::return_metrics(dec!(100000), dec!(80000), dec!(90000));
    assert_eq!(m.cash_on_cash_return, dec!(-10));

    let m = metrics::return_metrics(dec!(100000), dec!(200000), dec!(100000));
    assert_eq!(m.dscr, dec!(2));
    assert_eq!(DscrAssessment::from_dscr(m.dscr, true), DscrAssessment::Strong);

    let m = metrics::return_metrics(dec!(100000), dec!(110000), dec!(100000));
    assert_eq!(m.dscr, dec!(1.1));
    assert_eq!(DscrAssessment::from_dscr(m.dscr, true), DscrAssessment::Weak);
}

#[test]
fn test_equity_multiple_known_answer() {
    let flows = vec![dec!(-100000), dec!(50000), dec!(50000), dec!(150000)];
    assert_eq!(time_value::equity_multiple(&flows, dec!(100000)), dec!(2.5));
}

// ===========================================================================
// Projection and IRR
// ===========================================================================

#[test]
fn test_projection_shape() {
    let years = projection::project_cash_flows(&projection::ProjectionInput {
        equity_amount: dec!(185000),
        annual_revenue: dec!(109425),
        annual_cash_flow: dec!(150000),
        revenue_growth_rate: dec!(3),
        exit_multiple: dec!(3),
        annual_debt_service: dec!(80000),
        hold_period_years: 7,
    });
    assert_eq!(years.len(), 8);
    assert_eq!(years[0].cash_flow, dec!(-185000));
    assert!(years[1..7].iter().all(|y| y.exit_value.is_zero()));
    assert!(years[7].exit_value > Decimal::ZERO);
    assert!(years[1..].iter().all(|y| y.debt_service == dec!(80000)));
}

#[test]
fn test_irr_known_answer() {
    let result = time_value::irr(&[dec!(-1000), dec!(400), dec!(400), dec!(400)], dec!(0.10));
    assert!(result.converged);
    assert_close(result.percent(), dec!(9.7), dec!(0.1));
}

#[test]
fn test_irr_two_period_exact() {
    // -100 now, 110 in a year => exactly 10%
    let result = time_value::irr(&[dec!(-100), dec!(110)], dec!(0.05));
    assert!(result.converged);
    assert_close(result.percent(), dec!(10), dec!(0.001));
}

// ===========================================================================
// End to end
// ===========================================================================

#[test]
fn test_end_to_end_acquisition() {
    let out = stack::calculate(&acquisition()).unwrap();
    let r = &out.result;

    assert_eq!(r.allocation.total_investment, dec!(925000));
    assert_eq!(r.allocation.equity, dec!(185000));
    assert_eq!(r.allocation.seller_note, dec!(92500));
    assert_eq!(r.allocation.conventional, dec!(647500));

    assert!(r.annual_cash_flow_after_debt > Decimal::ZERO);
    assert!(r.cash_on_cash_return > dec!(20));
    assert_close(r.monthly_debt_service, dec!(6667.4), dec!(2));
    assert_close(r.dscr, dec!(1.875), dec!(0.01));

    assert_eq!(r.projections.len(), 6);
    assert!(r.irr_converged);
    assert!(r.irr > dec!(20));
    assert!(r.equity_multiple > dec!(4));
}

#[test]
fn test_zero_principal_tranche_changes_nothing() {
    let base = stack::calculate(&acquisition()).unwrap().result;

    let mut varied = acquisition();
    varied.sba_7a = terms(dec!(20), 25);
    let other = stack::calculate(&varied).unwrap().result;

    assert_eq!(base.monthly_debt_service, other.monthly_debt_service);
    assert_eq!(base.annual_debt_service, other.annual_debt_service);
    assert_eq!(base.irr, other.irr);
}

#[test]
fn test_sba_heavy_structure() {
    let mut input = acquisition();
    input.equity_percent = dec!(10);
    input.seller_note_percent = dec!(10);
    input.sba_7a_percent = dec!(80);
    input.conventional_percent = dec!(0);
    input.hold_period_years = 10;

    let r = stack::calculate(&input).unwrap().result;
    assert_eq!(r.allocation.sba_7a, dec!(740000));
    assert_eq!(r.tranches[2].monthly_payment, Decimal::ZERO);
    assert!(r.tranches[1].monthly_payment > Decimal::ZERO);
    assert_eq!(r.projections.len(), 11);
}

#[test]
fn test_result_serializes_with_envelope() {
    let out = stack::calculate(&acquisition()).unwrap();
    let json = serde_json::to_value(&out).unwrap();
    assert!(json["result"]["irr"].is_string());
    assert_eq!(json["result"]["dscr_assessment"], "Strong");
    assert_eq!(json["result"]["projections"].as_array().unwrap().len(), 6);
    assert!(json["metadata"]["version"].is_string());
}

#[test]
fn test_input_deserializes_from_json() {
    let input: CapitalStackInput = serde_json::from_value(serde_json::json!({
        "purchase_price": 900000,
        "closing_costs": 25000,
        "equity_percent": 20,
        "seller_note_percent": 10,
        "conventional_percent": 70,
        "seller_note": { "annual_interest_rate": 6, "term_years": 10 },
        "sba_7a": { "annual_interest_rate": "10.5", "term_years": 10 },
        "conventional": { "annual_interest_rate": 6.5, "term_years": 15 },
        "annual_revenue": 109425,
        "annual_cash_flow": 150000,
        "revenue_growth_rate": 3,
        "exit_multiple": 3,
        "hold_period_years": 5
    }))
    .unwrap();
    assert_eq!(input.sba_7a_percent, Decimal::ZERO);
    assert_eq!(input.sba_7a.annual_interest_rate, dec!(10.5));
    assert!(stack::calculate(&input).is_ok());
}

#[test]
fn test_unused_tranche_terms_may_be_omitted() {
    let input: CapitalStackInput = serde_json::from_value(serde_json::json!({
        "purchase_price": 500000,
        "equity_percent": 30,
        "conventional_percent": 70,
        "conventional": { "annual_interest_rate": 7, "term_years": 10 },
        "annual_revenue": 400000,
        "annual_cash_flow": 120000,
        "exit_multiple": 2,
        "hold_period_years": 5
    }))
    .unwrap();
    assert_eq!(input.sba_7a, LoanTerms::default());

    let r = stack::calculate(&input).unwrap().result;
    assert_eq!(r.tranches[0].monthly_payment, Decimal::ZERO);
    assert_eq!(r.tranches[1].monthly_payment, Decimal::ZERO);
    assert_eq!(r.monthly_debt_service, r.tranches[2].monthly_payment);
}
