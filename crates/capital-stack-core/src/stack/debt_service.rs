use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::stack::LoanTranche;
use crate::types::Money;

/// Combined payment obligation across all debt tranches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebtService {
    pub monthly: Money,
    pub annual: Money,
}

impl DebtService {
    pub fn has_debt(&self) -> bool {
        self.annual > Decimal::ZERO
    }
}

/// Sum the tranches' monthly payments; annual service is twelve times that.
pub fn aggregate(tranches: &[LoanTranche]) -> DebtService {
    let monthly: Money = tranches.iter().map(|t| t.monthly_payment).sum();
    DebtService {
        monthly,
        annual: monthly * Decimal::from(12),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{build_tranche, LoanTerms, TrancheKind};
    use rust_decimal_macros::dec;

    fn terms(rate: Decimal, years: u32) -> LoanTerms {
        LoanTerms {
            annual_interest_rate: rate,
            term_years: years,
        }
    }

    #[test]
    fn test_sums_tranches() {
        let tranches = vec![
            build_tranche(TrancheKind::SellerNote, dec!(60000), &terms(dec!(0), 5)),
            build_tranche(TrancheKind::Sba7a, dec!(120000), &terms(dec!(0), 10)),
            build_tranche(TrancheKind::Conventional, dec!(0), &terms(dec!(7), 20)),
        ];
        let ds = aggregate(&tranches);
        // 1000 + 1000 + 0
        assert_eq!(ds.monthly, dec!(2000));
        assert_eq!(ds.annual, dec!(24000));
        assert!(ds.has_debt());
    }

    #[test]
    fn test_zero_principal_tranche_contributes_nothing() {
        let with_empty = vec![
            build_tranche(TrancheKind::SellerNote, dec!(92500), &terms(dec!(6), 10)),
            build_tranche(TrancheKind::Sba7a, dec!(0), &terms(dec!(19.9), 25)),
        ];
        let without = vec![with_empty[0].clone()];
        assert_eq!(aggregate(&with_empty), aggregate(&without));
    }

    #[test]
    fn test_no_tranches() {
        let ds = aggregate(&[]);
        assert_eq!(ds, DebtService::default());
        assert!(!ds.has_debt());
    }
}
