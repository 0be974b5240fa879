use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Coverage lenders typically require before extending acquisition debt.
pub const LENDER_MIN_DSCR: Multiple = dec!(1.25);

/// One year of cash flow measured against the financing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnMetrics {
    pub annual_cash_flow_after_debt: Money,
    /// Percent of equity returned per year; 0 without equity
    pub cash_on_cash_return: Percent,
    /// Annual cash flow over annual debt service; 0 without debt
    pub dscr: Multiple,
    /// 0 when after-debt cash flow is not positive (break-even never reached)
    pub months_to_break_even: Decimal,
}

/// How comfortably cash flow covers debt service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DscrAssessment {
    /// No debt service to cover
    NoDebt,
    /// Cash flow does not cover the payments
    Insufficient,
    /// Covered, but under the 1.25x lender threshold
    Weak,
    Strong,
}

impl DscrAssessment {
    pub fn from_dscr(dscr: Multiple, has_debt: bool) -> Self {
        if !has_debt {
            DscrAssessment::NoDebt
        } else if dscr < Decimal::ONE {
            DscrAssessment::Insufficient
        } else if dscr < LENDER_MIN_DSCR {
            DscrAssessment::Weak
        } else {
            DscrAssessment::Strong
        }
    }
}

/// Cash-on-cash, DSCR and break-even from one year of cash flow.
pub fn return_metrics(
    equity_amount: Money,
    annual_cash_flow: Money,
    annual_debt_service: Money,
) -> ReturnMetrics {
    let after_debt = annual_cash_flow - annual_debt_service;

    let cash_on_cash_return = if equity_amount > Decimal::ZERO {
        after_debt * dec!(100) / equity_amount
    } else {
        Decimal::ZERO
    };

    let dscr = if annual_debt_service > Decimal::ZERO {
        annual_cash_flow / annual_debt_service
    } else {
        Decimal::ZERO
    };

    let months_to_break_even = if after_debt > Decimal::ZERO {
        equity_amount * dec!(12) / after_debt
    } else {
        Decimal::ZERO
    };

    ReturnMetrics {
        annual_cash_flow_after_debt: after_debt,
        cash_on_cash_return,
        dscr,
        months_to_break_even,
    }
}
