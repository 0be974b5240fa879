use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::CapitalStackError;
use crate::stack::{LoanTerms, TrancheKind};
use crate::types::*;
use crate::CapitalStackResult;

const MONTHS_PER_YEAR: u32 = 12;

/// A debt source with its level monthly payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTranche {
    pub kind: TrancheKind,
    pub principal: Money,
    pub annual_interest_rate: Percent,
    pub term_years: u32,
    pub monthly_payment: Money,
    pub annual_payment: Money,
}

/// Level monthly payment that retires `principal` over `term_years`.
///
/// Zero principal pays nothing whatever the terms. A zero rate amortizes in
/// a straight line. A zero term has no schedule, so the whole principal is
/// due as a single payment.
pub fn monthly_payment(principal: Money, annual_rate_percent: Percent, term_years: u32) -> Money {
    if principal.is_zero() {
        return Decimal::ZERO;
    }
    if term_years == 0 {
        return principal;
    }

    let r = annual_rate_percent / dec!(100) / Decimal::from(MONTHS_PER_YEAR);
    let n = i64::from(term_years * MONTHS_PER_YEAR);

    if r.is_zero() {
        return principal / Decimal::from(n);
    }

    match (Decimal::ONE + r).checked_powi(n) {
        Some(factor) if factor > Decimal::ONE => principal * r * factor / (factor - Decimal::ONE),
        // Growth factor beyond Decimal range: payment tends to interest-only
        _ => principal * r,
    }
}

/// Size one debt tranche and its payment.
pub fn build_tranche(kind: TrancheKind, principal: Money, terms: &LoanTerms) -> LoanTranche {
    let monthly = monthly_payment(principal, terms.annual_interest_rate, terms.term_years);
    LoanTranche {
        kind,
        principal,
        annual_interest_rate: terms.annual_interest_rate,
        term_years: terms.term_years,
        monthly_payment: monthly,
        annual_payment: monthly * Decimal::from(MONTHS_PER_YEAR),
    }
}

/// A single year of a loan's amortization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizationYear {
    pub year: u32,
    pub opening_balance: Money,
    pub interest: Money,
    pub principal_repaid: Money,
    pub closing_balance: Money,
}

/// Year-by-year amortization of one tranche.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub kind: TrancheKind,
    pub principal: Money,
    pub monthly_payment: Money,
    pub years: Vec<AmortizationYear>,
    pub total_interest: Money,
    pub total_principal: Money,
}

impl AmortizationSchedule {
    /// Balance outstanding at the end of `year` (the original principal for year 0).
    pub fn balance_after(&self, year: u32) -> Money {
        if year == 0 {
            return self.principal;
        }
        self.years
            .iter()
            .take_while(|y| y.year <= year)
            .last()
            .map(|y| y.closing_balance)
            .unwrap_or(self.principal)
    }
}

/// Roll a tranche's balance forward month by month for `years` years.
///
/// Interest accrues monthly on the opening balance; the rest of the level
/// payment retires principal. The final scheduled payment clears whatever
/// balance remains, and years past the term show a zero balance.
pub fn build_amortization_schedule(tranche: &LoanTranche, years: u32) -> AmortizationSchedule {
    let r = tranche.annual_interest_rate / dec!(100) / Decimal::from(MONTHS_PER_YEAR);
    let term_months = tranche.term_years * MONTHS_PER_YEAR;

    let mut balance = tranche.principal;
    let mut rows = Vec::with_capacity(years as usize);
    let mut total_interest = Decimal::ZERO;
    let mut total_principal = Decimal::ZERO;

    for year in 1..=years {
        let opening = balance;
        let mut interest = Decimal::ZERO;
        let mut repaid = Decimal::ZERO;

        for m in 1..=MONTHS_PER_YEAR {
            let month = (year - 1) * MONTHS_PER_YEAR + m;
            if balance.is_zero() || month > term_months {
                break;
            }
            let month_interest = balance * r;
            let mut principal_part = tranche.monthly_payment - month_interest;
            if month == term_months || principal_part > balance {
                principal_part = balance;
            }
            interest += month_interest;
            repaid += principal_part;
            balance -= principal_part;
        }

        total_interest += interest;
        total_principal += repaid;
        rows.push(AmortizationYear {
            year,
            opening_balance: opening,
            interest,
            principal_repaid: repaid,
            closing_balance: balance,
        });
    }

    AmortizationSchedule {
        kind: tranche.kind,
        principal: tranche.principal,
        monthly_payment: tranche.monthly_payment,
        years: rows,
        total_interest,
        total_principal,
    }
}

/// Input for a standalone loan amortization schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInput {
    #[serde(default = "default_kind")]
    pub kind: TrancheKind,
    pub principal: Money,
    pub annual_interest_rate: Percent,
    pub term_years: u32,
    /// Years to show; defaults to the full term
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years: Option<u32>,
}

fn default_kind() -> TrancheKind {
    TrancheKind::Conventional
}

/// Build the amortization schedule for a single loan.
pub fn amortization_schedule(
    input: &ScheduleInput,
) -> CapitalStackResult<ComputationOutput<AmortizationSchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.kind == TrancheKind::Equity {
        return Err(CapitalStackError::InvalidInput {
            field: "kind".into(),
            reason: "Equity is not a loan and has no amortization".into(),
        });
    }
    if input.principal < Decimal::ZERO {
        return Err(CapitalStackError::InvalidInput {
            field: "principal".into(),
            reason: "Principal cannot be negative".into(),
        });
    }
    if input.annual_interest_rate < Decimal::ZERO {
        return Err(CapitalStackError::InvalidInput {
            field: "annual_interest_rate".into(),
            reason: "Interest rate cannot be negative".into(),
        });
    }
    if input.term_years == 0 {
        return Err(CapitalStackError::InvalidInput {
            field: "term_years".into(),
            reason: "Term must be at least 1 year".into(),
        });
    }
    if input.term_years > input.kind.max_term_years() {
        warnings.push(format!(
            "{}-year term exceeds the usual {}-year maximum for a {}",
            input.term_years,
            input.kind.max_term_years(),
            input.kind.label()
        ));
    }

    let terms = LoanTerms {
        annual_interest_rate: input.annual_interest_rate,
        term_years: input.term_years,
    };
    let tranche = build_tranche(input.kind, input.principal, &terms);
    let schedule = build_amortization_schedule(&tranche, input.years.unwrap_or(input.term_years));

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Level-payment amortization (monthly compounding)",
        &serde_json::json!({
            "tranche": input.kind.label(),
            "principal": input.principal.to_string(),
            "annual_interest_rate": input.annual_interest_rate.to_string(),
            "term_years": input.term_years,
        }),
        warnings,
        elapsed,
        schedule,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn assert_close(actual: Decimal, expected: Decimal, tol: Decimal) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected} ± {tol}, got {actual}"
        );
    }

    #[test]
    fn test_known_payments() {
        assert_close(monthly_payment(dec!(400000), dec!(7.5), 10), dec!(4748), dec!(1));
        assert_close(monthly_payment(dec!(300000), dec!(6.5), 15), dec!(2613), dec!(1));
        assert_close(monthly_payment(dec!(100000), dec!(5.0), 5), dec!(1887), dec!(1));
    }

    #[test]
    fn test_zero_rate_is_straight_line() {
        assert_eq!(
            monthly_payment(dec!(100000), dec!(0), 5),
            dec!(100000) / dec!(60)
        );
        assert_close(monthly_payment(dec!(100000), dec!(0), 5), dec!(1667), dec!(1));
    }

    #[test]
    fn test_zero_principal_pays_nothing() {
        assert_eq!(monthly_payment(Decimal::ZERO, dec!(7.5), 10), Decimal::ZERO);
        assert_eq!(monthly_payment(Decimal::ZERO, dec!(0), 0), Decimal::ZERO);
        let terms = LoanTerms {
            annual_interest_rate: dec!(12),
            term_years: 25,
        };
        let tranche = build_tranche(TrancheKind::Sba7a, Decimal::ZERO, &terms);
        assert_eq!(tranche.monthly_payment, Decimal::ZERO);
        assert_eq!(tranche.annual_payment, Decimal::ZERO);
    }

    #[test]
    fn test_zero_term_due_at_once() {
        assert_eq!(monthly_payment(dec!(5000), dec!(6), 0), dec!(5000));
    }

    #[test]
    fn test_annual_payment_is_twelve_months() {
        let terms = LoanTerms {
            annual_interest_rate: dec!(6.5),
            term_years: 15,
        };
        let tranche = build_tranche(TrancheKind::Conventional, dec!(647500), &terms);
        assert_eq!(tranche.annual_payment, tranche.monthly_payment * dec!(12));
    }

    #[test]
    fn test_schedule_retires_loan_at_term() {
        let terms = LoanTerms {
            annual_interest_rate: dec!(5),
            term_years: 5,
        };
        let tranche = build_tranche(TrancheKind::SellerNote, dec!(100000), &terms);
        let sched = build_amortization_schedule(&tranche, 5);

        assert_eq!(sched.years.len(), 5);
        assert_eq!(sched.years[4].closing_balance, Decimal::ZERO);
        assert_eq!(sched.total_principal, dec!(100000));
        // 60 payments of ~1887.12 less the principal
        assert_close(sched.total_interest, dec!(13227), dec!(2));
        for pair in sched.years.windows(2) {
            assert_eq!(pair[0].closing_balance, pair[1].opening_balance);
        }
    }

    #[test]
    fn test_schedule_balance_outstanding_before_term() {
        let terms = LoanTerms {
            annual_interest_rate: dec!(6.5),
            term_years: 15,
        };
        let tranche = build_tranche(TrancheKind::Conventional, dec!(647500), &terms);
        let sched = build_amortization_schedule(&tranche, 5);
        let balance = sched.balance_after(5);
        assert!(balance > Decimal::ZERO);
        assert!(balance < dec!(647500));
        assert_eq!(sched.balance_after(0), dec!(647500));
    }

    #[test]
    fn test_schedule_past_term_is_zero() {
        let terms = LoanTerms {
            annual_interest_rate: dec!(0),
            term_years: 2,
        };
        let tranche = build_tranche(TrancheKind::SellerNote, dec!(24000), &terms);
        let sched = build_amortization_schedule(&tranche, 4);
        assert_eq!(sched.years[0].principal_repaid, dec!(12000));
        assert_eq!(sched.years[1].closing_balance, Decimal::ZERO);
        assert_eq!(sched.years[3].principal_repaid, Decimal::ZERO);
        assert_eq!(sched.total_interest, Decimal::ZERO);
    }

    #[test]
    fn test_schedule_input_validation() {
        let input = ScheduleInput {
            kind: TrancheKind::Equity,
            principal: dec!(1000),
            annual_interest_rate: dec!(5),
            term_years: 5,
            years: None,
        };
        assert!(amortization_schedule(&input).is_err());

        let input = ScheduleInput {
            kind: TrancheKind::Sba7a,
            principal: dec!(1000),
            annual_interest_rate: dec!(5),
            term_years: 0,
            years: None,
        };
        assert!(amortization_schedule(&input).is_err());
    }

    #[test]
    fn test_schedule_warns_on_long_seller_note() {
        let input = ScheduleInput {
            kind: TrancheKind::SellerNote,
            principal: dec!(50000),
            annual_interest_rate: dec!(6),
            term_years: 12,
            years: None,
        };
        let out = amortization_schedule(&input).unwrap();
        assert_eq!(out.result.years.len(), 12);
        assert_eq!(out.warnings.len(), 1);
    }
}
