use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use capital_stack_core::stack::allocation::validate_bounds;
use capital_stack_core::stack::amortization::{self, ScheduleInput};
use capital_stack_core::stack::{self, CapitalStackInput, LoanTerms, TrancheKind};
use capital_stack_core::time_value::{self, DEFAULT_IRR_GUESS};
use capital_stack_core::types::with_metadata;

use crate::input;

/// Arguments for the capital stack calculation
#[derive(Args)]
pub struct CalculateArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Business purchase price
    #[arg(long)]
    pub purchase_price: Option<Decimal>,

    /// Closing costs added on top of the price
    #[arg(long, default_value = "0")]
    pub closing_costs: Decimal,

    /// Equity share of total investment (%)
    #[arg(long)]
    pub equity_pct: Option<Decimal>,

    /// Seller note share of total investment (%)
    #[arg(long, default_value = "0")]
    pub seller_note_pct: Decimal,

    /// SBA 7(a) share of total investment (%)
    #[arg(long, default_value = "0")]
    pub sba_pct: Decimal,

    /// Conventional loan share of total investment (%)
    #[arg(long, default_value = "0")]
    pub conventional_pct: Decimal,

    /// Seller note interest rate (%)
    #[arg(long, default_value = "6")]
    pub seller_note_rate: Decimal,

    /// Seller note term in years
    #[arg(long, default_value_t = 5)]
    pub seller_note_term: u32,

    /// SBA 7(a) interest rate (%)
    #[arg(long, default_value = "10.5")]
    pub sba_rate: Decimal,

    /// SBA 7(a) term in years
    #[arg(long, default_value_t = 10)]
    pub sba_term: u32,

    /// Conventional loan interest rate (%)
    #[arg(long, default_value = "7.5")]
    pub conventional_rate: Decimal,

    /// Conventional loan term in years
    #[arg(long, default_value_t = 10)]
    pub conventional_term: u32,

    /// Current annual revenue
    #[arg(long)]
    pub annual_revenue: Option<Decimal>,

    /// Current annual cash flow available for debt service
    #[arg(long)]
    pub annual_cash_flow: Option<Decimal>,

    /// Annual revenue growth (%)
    #[arg(long, default_value = "0", allow_hyphen_values = true)]
    pub growth: Decimal,

    /// Exit multiple applied to terminal-year revenue
    #[arg(long, default_value = "3")]
    pub exit_multiple: Decimal,

    /// Holding period in years
    #[arg(long, default_value_t = 5)]
    pub hold_years: u32,
}

impl CalculateArgs {
    fn to_input(&self) -> Result<CapitalStackInput, Box<dyn std::error::Error>> {
        let purchase_price = self
            .purchase_price
            .ok_or("--purchase-price is required (or provide --input)")?;
        let equity_percent = self
            .equity_pct
            .ok_or("--equity-pct is required (or provide --input)")?;
        let annual_revenue = self
            .annual_revenue
            .ok_or("--annual-revenue is required (or provide --input)")?;
        let annual_cash_flow = self
            .annual_cash_flow
            .ok_or("--annual-cash-flow is required (or provide --input)")?;

        Ok(CapitalStackInput {
            purchase_price,
            closing_costs: self.closing_costs,
            equity_percent,
            seller_note_percent: self.seller_note_pct,
            sba_7a_percent: self.sba_pct,
            conventional_percent: self.conventional_pct,
            seller_note: LoanTerms {
                annual_interest_rate: self.seller_note_rate,
                term_years: self.seller_note_term,
            },
            sba_7a: LoanTerms {
                annual_interest_rate: self.sba_rate,
                term_years: self.sba_term,
            },
            conventional: LoanTerms {
                annual_interest_rate: self.conventional_rate,
                term_years: self.conventional_term,
            },
            annual_revenue,
            annual_cash_flow,
            revenue_growth_rate: self.growth,
            exit_multiple: self.exit_multiple,
            hold_period_years: self.hold_years,
        })
    }
}

pub fn run_calculate(args: CalculateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let stack_input: CapitalStackInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        args.to_input()?
    };

    validate_bounds(&stack_input)?;
    let result = stack::calculate(&stack_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a single loan payment
#[derive(Args)]
pub struct PaymentArgs {
    /// Loan principal
    #[arg(long)]
    pub principal: Decimal,

    /// Annual interest rate (%)
    #[arg(long)]
    pub rate: Decimal,

    /// Term in years
    #[arg(long)]
    pub term: u32,
}

#[derive(Serialize)]
struct PaymentReport {
    principal: Decimal,
    annual_interest_rate: Decimal,
    term_years: u32,
    monthly_payment: Decimal,
    annual_payment: Decimal,
    total_paid: Decimal,
    total_interest: Decimal,
}

pub fn run_payment(args: PaymentArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    if args.principal < Decimal::ZERO {
        return Err("--principal cannot be negative".into());
    }
    if args.rate < Decimal::ZERO {
        return Err("--rate cannot be negative".into());
    }
    if args.term == 0 {
        return Err("--term must be at least 1 year".into());
    }

    let monthly_payment = amortization::monthly_payment(args.principal, args.rate, args.term);
    let total_paid = monthly_payment * Decimal::from(args.term * 12);
    let report = PaymentReport {
        principal: args.principal,
        annual_interest_rate: args.rate,
        term_years: args.term,
        monthly_payment,
        annual_payment: monthly_payment * Decimal::from(12),
        total_paid,
        total_interest: total_paid - args.principal,
    };

    let result = with_metadata(
        "Level-payment annuity (monthly compounding)",
        &serde_json::json!({
            "principal": args.principal.to_string(),
            "annual_interest_rate": args.rate.to_string(),
            "term_years": args.term,
        }),
        Vec::new(),
        start.elapsed().as_micros() as u64,
        report,
    );
    Ok(serde_json::to_value(result)?)
}

/// Arguments for a loan amortization schedule
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan type: seller_note, sba7a or conventional
    #[arg(long, default_value = "conventional")]
    pub kind: String,

    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual interest rate (%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Term in years
    #[arg(long)]
    pub term: Option<u32>,

    /// Number of years to show (defaults to the full term)
    #[arg(long)]
    pub years: Option<u32>,
}

fn parse_kind(s: &str) -> Result<TrancheKind, Box<dyn std::error::Error>> {
    match s.to_ascii_lowercase().replace('-', "_").as_str() {
        "seller_note" | "seller" => Ok(TrancheKind::SellerNote),
        "sba7a" | "sba_7a" | "sba" => Ok(TrancheKind::Sba7a),
        "conventional" | "bank" => Ok(TrancheKind::Conventional),
        other => Err(format!(
            "Unknown loan kind '{other}' (expected seller_note, sba7a or conventional)"
        )
        .into()),
    }
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let schedule_input: ScheduleInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        ScheduleInput {
            kind: parse_kind(&args.kind)?,
            principal: args
                .principal
                .ok_or("--principal is required (or provide --input)")?,
            annual_interest_rate: args.rate.ok_or("--rate is required (or provide --input)")?,
            term_years: args.term.ok_or("--term is required (or provide --input)")?,
            years: args.years,
        }
    };

    let result = amortization::amortization_schedule(&schedule_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Arguments for cash flow IRR / NPV
#[derive(Args)]
pub struct IrrArgs {
    /// Periodic cash flows, first one the investment (e.g. "-100,30,30,130")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub cash_flows: Vec<Decimal>,

    /// Discount rate for NPV (%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Starting guess for the IRR search (%)
    #[arg(long, default_value = "10")]
    pub guess: Decimal,
}

#[derive(Serialize)]
struct IrrReport {
    irr: Decimal,
    irr_converged: bool,
    iterations: u32,
    equity_multiple: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    npv: Option<Decimal>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let flows = &args.cash_flows;
    if flows.len() < 2 {
        return Err("--cash-flows needs at least two values".into());
    }

    let guess = if args.guess.is_zero() {
        DEFAULT_IRR_GUESS
    } else {
        args.guess / Decimal::ONE_HUNDRED
    };
    let solution = time_value::irr(flows, guess);

    let initial_outlay = -flows[0];
    let equity_multiple = time_value::equity_multiple(flows, initial_outlay);

    let npv = match args.rate {
        Some(rate) => Some(time_value::npv(rate / Decimal::ONE_HUNDRED, flows)?),
        None => None,
    };

    let mut warnings = Vec::new();
    if !solution.converged {
        warnings.push(format!(
            "IRR did not converge after {} iterations; value is a best-effort estimate",
            solution.iterations
        ));
    }
    if initial_outlay <= Decimal::ZERO {
        warnings.push("First cash flow is not an outflow; equity multiple reported as 0".into());
    }

    let report = IrrReport {
        irr: solution.percent(),
        irr_converged: solution.converged,
        iterations: solution.iterations,
        equity_multiple,
        npv,
    };
    let result = with_metadata(
        "Newton-Raphson IRR on annual cash flows",
        &serde_json::json!({
            "periods": flows.len(),
            "guess": args.guess.to_string(),
        }),
        warnings,
        start.elapsed().as_micros() as u64,
        report,
    );
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_kind_aliases() {
        assert_eq!(parse_kind("seller-note").unwrap(), TrancheKind::SellerNote);
        assert_eq!(parse_kind("SBA").unwrap(), TrancheKind::Sba7a);
        assert_eq!(parse_kind("conventional").unwrap(), TrancheKind::Conventional);
        assert!(parse_kind("equity").is_err());
    }

    #[test]
    fn test_payment_report() {
        let value = run_payment(PaymentArgs {
            principal: dec!(100000),
            rate: dec!(0),
            term: 5,
        })
        .unwrap();
        let monthly: Decimal = value["result"]["monthly_payment"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!((monthly - dec!(1666.67)).abs() < dec!(0.01));
        let interest: Decimal = value["result"]["total_interest"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(interest.abs() < dec!(0.01));
    }

    #[test]
    fn test_irr_report() {
        let value = run_irr(IrrArgs {
            cash_flows: vec![dec!(-100), dec!(110)],
            rate: Some(dec!(10)),
            guess: dec!(10),
        })
        .unwrap();
        assert_eq!(value["result"]["irr_converged"], true);
        let npv: Decimal = value["result"]["npv"].as_str().unwrap().parse().unwrap();
        assert!(npv.abs() < dec!(0.0001));
    }

    #[test]
    fn test_irr_requires_two_flows() {
        let err = run_irr(IrrArgs {
            cash_flows: vec![dec!(-100)],
            rate: None,
            guess: dec!(10),
        })
        .unwrap_err();
        assert!(err.to_string().contains("at least two"));
    }
}
