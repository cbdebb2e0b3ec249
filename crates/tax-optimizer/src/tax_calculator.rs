//! Tax Calculator
//!
//! Progressive personal income tax over net taxable income.

use serde::{Deserialize, Serialize};

/// One marginal band. `upper_limit` of `None` is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub upper_limit: Option<f64>,
    pub rate: f64,
}

impl TaxBracket {
    pub const fn new(upper_limit: f64, rate: f64) -> Self {
        Self { upper_limit: Some(upper_limit), rate }
    }

    pub const fn open(rate: f64) -> Self {
        Self { upper_limit: None, rate }
    }
}

/// Tax rules for a jurisdiction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRules {
    pub jurisdiction: String,
    /// Ascending by upper limit, the last one open-ended.
    pub brackets: Vec<TaxBracket>,
    /// Final withholding rate on dividends when no credit is claimed.
    pub dividend_withholding_rate: f64,
}

impl TaxRules {
    /// Thai personal income tax schedule.
    pub fn thailand() -> Self {
        Self {
            jurisdiction: "Thailand".to_string(),
            brackets: vec![
                TaxBracket::new(150_000.0, 0.00),
                TaxBracket::new(300_000.0, 0.05),
                TaxBracket::new(500_000.0, 0.10),
                TaxBracket::new(750_000.0, 0.15),
                TaxBracket::new(1_000_000.0, 0.20),
                TaxBracket::new(2_000_000.0, 0.25),
                TaxBracket::new(5_000_000.0, 0.30),
                TaxBracket::open(0.35),
            ],
            dividend_withholding_rate: 0.10,
        }
    }
}

impl Default for TaxRules {
    fn default() -> Self {
        Self::thailand()
    }
}

pub struct TaxCalculator {
    rules: TaxRules,
}

impl TaxCalculator {
    pub fn new() -> Self {
        Self::with_rules(TaxRules::thailand())
    }

    pub fn with_rules(rules: TaxRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &TaxRules {
        &self.rules
    }

    /// Tax due on `net_income`, each band taxed at its own rate.
    pub fn income_tax(&self, net_income: f64) -> f64 {
        let mut tax = 0.0;
        let mut lower = 0.0;

        for bracket in &self.rules.brackets {
            if net_income <= lower {
                break;
            }
            let upper = bracket.upper_limit.unwrap_or(f64::INFINITY);
            tax += (net_income.min(upper) - lower) * bracket.rate;
            lower = upper;
        }
        tax
    }

    /// Marginal rate applying to the last baht of `net_income`.
    pub fn marginal_rate(&self, net_income: f64) -> f64 {
        self.rules
            .brackets
            .iter()
            .find(|b| b.upper_limit.map_or(true, |limit| net_income <= limit))
            .map(|b| b.rate)
            .unwrap_or(0.0)
    }
}

impl Default for TaxCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exempt_band() {
        let calc = TaxCalculator::new();
        assert_eq!(calc.income_tax(0.0), 0.0);
        assert_eq!(calc.income_tax(150_000.0), 0.0);
        assert_eq!(calc.income_tax(-10.0), 0.0);
    }

    #[test]
    fn test_progressive_bands() {
        let calc = TaxCalculator::new();
        // 150k at 5%
        assert_relative_eq!(calc.income_tax(300_000.0), 7_500.0, epsilon = 1e-6);
        // 7.5k + 200k at 10% + 100k at 15%
        assert_relative_eq!(calc.income_tax(600_000.0), 42_500.0, epsilon = 1e-6);
        // 7.5k + 20k + 37.5k + 50k + 250k + 900k + 5M at 35%
        assert_relative_eq!(calc.income_tax(10_000_000.0), 3_015_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_marginal_rate() {
        let calc = TaxCalculator::new();
        assert_eq!(calc.marginal_rate(100_000.0), 0.0);
        assert_eq!(calc.marginal_rate(300_000.0), 0.05);
        assert_eq!(calc.marginal_rate(300_001.0), 0.10);
        assert_eq!(calc.marginal_rate(9_000_000.0), 0.35);
    }
}
