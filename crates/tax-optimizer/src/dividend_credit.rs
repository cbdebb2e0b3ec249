//! Final withholding tax versus the dividend tax credit.
//!
//! Option 1 keeps the dividend out of taxable income and accepts the final
//! withholding. Option 2 grosses the dividend up by the corporate tax
//! already paid (`dividend * rate / (100 - rate)`), adds it to income and
//! credits it back.

use analysis_core::{round2, AnalysisError};
use serde::{Deserialize, Serialize};

use crate::tax_calculator::TaxCalculator;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DividendTaxInput {
    pub base_net_income: f64,
    pub dividend_amount: f64,
    /// Corporate income tax rate in percent.
    pub corporate_tax_rate: f64,
}

impl DividendTaxInput {
    fn validate(&self) -> Result<(), AnalysisError> {
        if !self.base_net_income.is_finite() || self.base_net_income < 0.0 {
            return Err(AnalysisError::InvalidData("base_net_income must be non-negative".to_string()));
        }
        if !self.dividend_amount.is_finite() || self.dividend_amount < 0.0 {
            return Err(AnalysisError::InvalidData("dividend_amount must be non-negative".to_string()));
        }
        if !(0.0..100.0).contains(&self.corporate_tax_rate) {
            return Err(AnalysisError::InvalidData(format!(
                "corporate_tax_rate must be in [0, 100), got {}",
                self.corporate_tax_rate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    #[serde(rename = "Should Claim Credit")]
    ClaimCredit,
    #[serde(rename = "Final Tax")]
    FinalTax,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividendTaxComparison {
    pub dividend_received: f64,
    pub cit_rate: f64,
    #[serde(serialize_with = "round2")]
    pub tax_credit: f64,
    #[serde(serialize_with = "round2")]
    pub option1_final_tax_wealth: f64,
    #[serde(serialize_with = "round2")]
    pub option2_credit_tax_wealth: f64,
    #[serde(serialize_with = "round2")]
    pub difference: f64,
    pub recommendation: Recommendation,
}

pub fn optimize_dividend_tax(
    calculator: &TaxCalculator,
    input: &DividendTaxInput,
) -> Result<DividendTaxComparison, AnalysisError> {
    input.validate()?;

    let base = input.base_net_income;
    let dividend = input.dividend_amount;
    let withholding = dividend * calculator.rules().dividend_withholding_rate;

    let option1 = (base - calculator.income_tax(base)) + (dividend - withholding);

    let tax_credit = if input.corporate_tax_rate > 0.0 {
        dividend * input.corporate_tax_rate / (100.0 - input.corporate_tax_rate)
    } else {
        0.0
    };
    let gross_dividend = dividend + tax_credit;
    let option2 = (base + gross_dividend) - calculator.income_tax(base + gross_dividend);

    let difference = option2 - option1;
    let recommendation = if difference > 0.0 {
        Recommendation::ClaimCredit
    } else {
        Recommendation::FinalTax
    };

    tracing::debug!(
        "Dividend tax: base={} dividend={} cit={} difference={:.2}",
        base,
        dividend,
        input.corporate_tax_rate,
        difference
    );

    Ok(DividendTaxComparison {
        dividend_received: dividend,
        cit_rate: input.corporate_tax_rate,
        tax_credit,
        option1_final_tax_wealth: option1,
        option2_credit_tax_wealth: option2,
        difference,
        recommendation,
    })
}
