//! Capital stack engine: allocation, debt service, return metrics and the
//! hold-period projection, tied together by [`calculator::calculate`].

pub mod allocation;
pub mod amortization;
pub mod calculator;
pub mod debt_service;
pub mod metrics;
pub mod projection;

use serde::{Deserialize, Serialize};

use crate::types::*;

/// One layer of the financing structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrancheKind {
    Equity,
    SellerNote,
    Sba7a,
    Conventional,
}

impl TrancheKind {
    /// The debt tranches, in reporting order.
    pub const DEBT: [TrancheKind; 3] = [
        TrancheKind::SellerNote,
        TrancheKind::Sba7a,
        TrancheKind::Conventional,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TrancheKind::Equity => "Equity",
            TrancheKind::SellerNote => "Seller Note",
            TrancheKind::Sba7a => "SBA 7(a) Loan",
            TrancheKind::Conventional => "Conventional Loan",
        }
    }

    /// Input field prefix, used in validation messages.
    pub fn field_name(&self) -> &'static str {
        match self {
            TrancheKind::Equity => "equity",
            TrancheKind::SellerNote => "seller_note",
            TrancheKind::Sba7a => "sba_7a",
            TrancheKind::Conventional => "conventional",
        }
    }

    /// Longest amortization term a lender offers for this tranche.
    pub fn max_term_years(&self) -> u32 {
        match self {
            TrancheKind::Equity => 0,
            TrancheKind::SellerNote => 10,
            TrancheKind::Sba7a => 25,
            TrancheKind::Conventional => 30,
        }
    }
}

/// Fixed-rate, fully amortizing loan terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    /// Annual interest rate in percent (6.5 = 6.5%)
    pub annual_interest_rate: Percent,
    pub term_years: u32,
}

/// Everything needed to size a deal's financing and project its returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalStackInput {
    pub purchase_price: Money,
    #[serde(default)]
    pub closing_costs: Money,
    /// Tranche weights as percentages of total investment; must sum to 100
    pub equity_percent: Percent,
    #[serde(default)]
    pub seller_note_percent: Percent,
    #[serde(default)]
    pub sba_7a_percent: Percent,
    #[serde(default)]
    pub conventional_percent: Percent,
    /// Terms may be omitted for a tranche with zero weight
    #[serde(default)]
    pub seller_note: LoanTerms,
    #[serde(default)]
    pub sba_7a: LoanTerms,
    #[serde(default)]
    pub conventional: LoanTerms,
    pub annual_revenue: Money,
    pub annual_cash_flow: Money,
    /// Annual growth applied to both revenue and cash flow, in percent
    #[serde(default)]
    pub revenue_growth_rate: Percent,
    /// Applied to terminal-year revenue to estimate sale proceeds
    pub exit_multiple: Multiple,
    pub hold_period_years: u32,
}

impl CapitalStackInput {
    pub fn total_investment(&self) -> Money {
        self.purchase_price + self.closing_costs
    }

    /// Weight of a tranche as a percentage of total investment.
    pub fn percent(&self, kind: TrancheKind) -> Percent {
        match kind {
            TrancheKind::Equity => self.equity_percent,
            TrancheKind::SellerNote => self.seller_note_percent,
            TrancheKind::Sba7a => self.sba_7a_percent,
            TrancheKind::Conventional => self.conventional_percent,
        }
    }

    /// Loan terms of a debt tranche; `None` for equity.
    pub fn terms(&self, kind: TrancheKind) -> Option<&LoanTerms> {
        match kind {
            TrancheKind::Equity => None,
            TrancheKind::SellerNote => Some(&self.seller_note),
            TrancheKind::Sba7a => Some(&self.sba_7a),
            TrancheKind::Conventional => Some(&self.conventional),
        }
    }

    pub(crate) fn terms_mut(&mut self, kind: TrancheKind) -> Option<&mut LoanTerms> {
        match kind {
            TrancheKind::Equity => None,
            TrancheKind::SellerNote => Some(&mut self.seller_note),
            TrancheKind::Sba7a => Some(&mut self.sba_7a),
            TrancheKind::Conventional => Some(&mut self.conventional),
        }
    }
}

pub use allocation::{allocate, validate_allocation, validate_bounds, CapitalAllocation};
pub use amortization::{
    build_amortization_schedule, build_tranche, monthly_payment, AmortizationSchedule, LoanTranche,
};
pub use calculator::{calculate, CapitalStackOutput};
pub use debt_service::{aggregate, DebtService};
pub use metrics::{return_metrics, DscrAssessment, ReturnMetrics};
pub use projection::{cash_flow_series, project_cash_flows, ProjectionInput, ProjectionYear};
