use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::CapitalStackError;
use crate::stack::{CapitalStackInput, LoanTerms, TrancheKind};
use crate::types::*;
use crate::CapitalStackResult;

/// Allowed deviation of the tranche weights from 100%.
pub const ALLOCATION_TOLERANCE: Percent = dec!(0.01);

const MAX_INTEREST_RATE: Percent = dec!(20);
const MIN_GROWTH_RATE: Percent = dec!(-50);
const MAX_GROWTH_RATE: Percent = dec!(100);
const MAX_EXIT_MULTIPLE: Multiple = dec!(20);
const MAX_HOLD_PERIOD_YEARS: u32 = 30;
/// Ceiling on every dollar input. Compounding the largest revenue at 100%
/// growth for 30 years and applying a 20x exit multiple stays well inside
/// the range of `Decimal`.
pub const MAX_MONEY: Money = dec!(1000000000000000);

/// Dollar amount of each financing source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapitalAllocation {
    pub total_investment: Money,
    pub equity: Money,
    pub seller_note: Money,
    pub sba_7a: Money,
    pub conventional: Money,
}

impl CapitalAllocation {
    /// Dollar amount allocated to a tranche.
    pub fn amount(&self, kind: TrancheKind) -> Money {
        match kind {
            TrancheKind::Equity => self.equity,
            TrancheKind::SellerNote => self.seller_note,
            TrancheKind::Sba7a => self.sba_7a,
            TrancheKind::Conventional => self.conventional,
        }
    }

    /// Total borrowed across the three debt tranches.
    pub fn total_debt(&self) -> Money {
        self.seller_note + self.sba_7a + self.conventional
    }
}

/// Confirm the four tranche weights add up to 100% (within 0.01).
///
/// Returns the actual sum on success. A mismatch is reported with the sum so
/// the caller can tell the user exactly how far off the structure is; the
/// weights are never rescaled.
pub fn validate_allocation(
    equity_percent: Percent,
    seller_note_percent: Percent,
    sba_7a_percent: Percent,
    conventional_percent: Percent,
) -> CapitalStackResult<Percent> {
    let sum = equity_percent + seller_note_percent + sba_7a_percent + conventional_percent;
    if (sum - dec!(100)).abs() > ALLOCATION_TOLERANCE {
        return Err(CapitalStackError::AllocationMismatch { sum });
    }
    Ok(sum)
}

/// Validate the weights and turn them into dollar amounts of total investment.
pub fn allocate(input: &CapitalStackInput) -> CapitalStackResult<CapitalAllocation> {
    validate_allocation(
        input.equity_percent,
        input.seller_note_percent,
        input.sba_7a_percent,
        input.conventional_percent,
    )?;

    let total_investment = input.total_investment();
    let share = |percent: Percent| total_investment * percent / dec!(100);

    Ok(CapitalAllocation {
        total_investment,
        equity: share(input.equity_percent),
        seller_note: share(input.seller_note_percent),
        sba_7a: share(input.sba_7a_percent),
        conventional: share(input.conventional_percent),
    })
}

fn invalid(field: &str, reason: impl Into<String>) -> CapitalStackError {
    CapitalStackError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

fn check_range(field: &str, value: Decimal, min: Decimal, max: Decimal) -> CapitalStackResult<()> {
    if value < min || value > max {
        return Err(invalid(
            field,
            format!("must be between {min} and {max} (got {value})"),
        ));
    }
    Ok(())
}

fn check_money(field: &str, value: Money) -> CapitalStackResult<()> {
    if value > MAX_MONEY {
        return Err(invalid(
            field,
            format!("must not exceed {MAX_MONEY} (got {value})"),
        ));
    }
    Ok(())
}

fn check_loan_terms(kind: TrancheKind, terms: &LoanTerms) -> CapitalStackResult<()> {
    let field = kind.field_name();
    check_range(
        &format!("{field}.annual_interest_rate"),
        terms.annual_interest_rate,
        Decimal::ZERO,
        MAX_INTEREST_RATE,
    )?;
    let max_term = kind.max_term_years();
    if terms.term_years < 1 || terms.term_years > max_term {
        return Err(invalid(
            &format!("{field}.term_years"),
            format!(
                "must be between 1 and {max_term} years (got {})",
                terms.term_years
            ),
        ));
    }
    Ok(())
}

/// Check every field against its documented range.
///
/// Fails on the first offending field. Loan terms are only checked for
/// tranches with a non-zero weight, since an unused tranche pays nothing
/// whatever its terms. The allocation sum is checked separately by
/// [`validate_allocation`].
pub fn validate_bounds(input: &CapitalStackInput) -> CapitalStackResult<()> {
    if input.purchase_price <= Decimal::ZERO {
        return Err(invalid("purchase_price", "Purchase price must be positive"));
    }
    if input.closing_costs < Decimal::ZERO {
        return Err(invalid("closing_costs", "Closing costs cannot be negative"));
    }
    check_money("purchase_price", input.purchase_price)?;
    check_money("closing_costs", input.closing_costs)?;

    for (field, value) in [
        ("equity_percent", input.equity_percent),
        ("seller_note_percent", input.seller_note_percent),
        ("sba_7a_percent", input.sba_7a_percent),
        ("conventional_percent", input.conventional_percent),
    ] {
        check_range(field, value, Decimal::ZERO, dec!(100))?;
    }

    for kind in TrancheKind::DEBT {
        if input.percent(kind).is_zero() {
            continue;
        }
        if let Some(terms) = input.terms(kind) {
            check_loan_terms(kind, terms)?;
        }
    }

    if input.annual_revenue <= Decimal::ZERO {
        return Err(invalid("annual_revenue", "Annual revenue must be positive"));
    }
    if input.annual_cash_flow <= Decimal::ZERO {
        return Err(invalid(
            "annual_cash_flow",
            "Annual cash flow must be positive",
        ));
    }
    check_money("annual_revenue", input.annual_revenue)?;
    check_money("annual_cash_flow", input.annual_cash_flow)?;
    check_range(
        "revenue_growth_rate",
        input.revenue_growth_rate,
        MIN_GROWTH_RATE,
        MAX_GROWTH_RATE,
    )?;
    check_range(
        "exit_multiple",
        input.exit_multiple,
        Decimal::ZERO,
        MAX_EXIT_MULTIPLE,
    )?;
    if input.hold_period_years < 1 || input.hold_period_years > MAX_HOLD_PERIOD_YEARS {
        return Err(invalid(
            "hold_period_years",
            format!(
                "must be between 1 and {MAX_HOLD_PERIOD_YEARS} years (got {})",
                input.hold_period_years
            ),
        ));
    }

    Ok(())
}
