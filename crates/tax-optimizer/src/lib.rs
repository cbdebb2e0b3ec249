//! Tax Optimizer
//!
//! Thai personal income tax and the choice between the 10% final
//! withholding tax on dividends and claiming the corporate tax credit.

pub mod dividend_credit;
pub mod tax_calculator;

pub use dividend_credit::{optimize_dividend_tax, DividendTaxComparison, DividendTaxInput, Recommendation};
pub use tax_calculator::{TaxBracket, TaxCalculator, TaxRules};
