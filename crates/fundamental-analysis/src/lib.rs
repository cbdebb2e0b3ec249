use analysis_core::{canonical_symbol, round2, round4, AnalysisError, DividendEvent};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Upside band, in percent, treated as fairly valued.
pub const FAIR_VALUE_BAND_PCT: f64 = 2.5;

/// Longest dividend history a valuation may discount.
pub const MAX_DDM_YEARS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DdmParams {
    /// Number of discounted dividend years.
    pub years: u32,
    /// Required rate of return as a fraction (0.08 = 8%).
    pub r_expected: f64,
    /// Accepted for compatibility; historical dividends stand in for growth.
    #[serde(default)]
    pub growth_rate: f64,
}

impl Default for DdmParams {
    fn default() -> Self {
        Self {
            years: 3,
            r_expected: 0.08,
            growth_rate: 0.0,
        }
    }
}

impl DdmParams {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(1..=MAX_DDM_YEARS).contains(&self.years) {
            return Err(AnalysisError::InvalidConfig(format!(
                "years must be between 1 and {} (got {})",
                MAX_DDM_YEARS, self.years
            )));
        }
        if !self.r_expected.is_finite() || self.r_expected <= -1.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "r_expected must be greater than -1 (got {})",
                self.r_expected
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Valuation {
    #[serde(rename = "Fairly Valued")]
    FairlyValued,
    Undervalue,
    Overvalue,
}

impl Valuation {
    pub fn from_upside(upside_pct: f64) -> Self {
        if upside_pct.abs() <= FAIR_VALUE_BAND_PCT {
            Valuation::FairlyValued
        } else if upside_pct > FAIR_VALUE_BAND_PCT {
            Valuation::Undervalue
        } else {
            Valuation::Overvalue
        }
    }
}

/// Dividends paid in one historical year used as a projected cash flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DividendFlow {
    pub label: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    #[serde(serialize_with = "round4")]
    pub amount: f64,
    #[serde(serialize_with = "round4")]
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DdmValuation {
    pub symbol: String,
    #[serde(serialize_with = "round2")]
    pub current_price: f64,
    #[serde(serialize_with = "round2")]
    pub target_price: f64,
    #[serde(serialize_with = "round2")]
    pub upside_pct: f64,
    pub meaning: Valuation,
    pub dividends_flow: Vec<DividendFlow>,
}

/// Dividend-discount valuation using past dividends as a proxy for future
/// payouts and the current price as the terminal value.
pub struct DividendDiscountEngine;

impl DividendDiscountEngine {
    pub fn new() -> Self {
        Self
    }

    fn years_before(&self, today: NaiveDate, years: u32) -> NaiveDate {
        today
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN)
    }

    fn discount_factor(&self, r_expected: f64, periods: u32) -> f64 {
        (1.0 + r_expected).powi(periods as i32)
    }

    fn calculate_upside(&self, target: f64, price: f64) -> f64 {
        (target - price) / price * 100.0
    }

    /// Values one stock as of `today`.
    ///
    /// For period `i` in `1..=years` the cash flow is the dividends paid in
    /// `[today - (years - i + 2)y, today - (years - i + 1)y)`, discounted by
    /// `(1 + r)^i`. The terminal value is the current price discounted by
    /// `(1 + r)^years`.
    pub fn value(
        &self,
        symbol: &str,
        current_price: f64,
        dividends: &[DividendEvent],
        today: NaiveDate,
        params: &DdmParams,
    ) -> Result<DdmValuation, AnalysisError> {
        let symbol = canonical_symbol(symbol);
        params.validate()?;
        if !current_price.is_finite() || current_price <= 0.0 {
            return Err(AnalysisError::InvalidData(format!("No usable price for {}", symbol)));
        }
        if dividends.is_empty() {
            return Err(AnalysisError::NoData(format!("No dividend history for {}", symbol)));
        }

        let mut dividends_flow = Vec::with_capacity(params.years as usize);
        let mut pv_dividends = 0.0;
        for i in 1..=params.years {
            let offset = params.years - i + 1;
            let window_start = self.years_before(today, offset + 1);
            let window_end = self.years_before(today, offset);

            let amount: f64 = dividends
                .iter()
                .filter(|d| d.date >= window_start && d.date < window_end)
                .map(|d| d.amount)
                .sum();
            let present_value = amount / self.discount_factor(params.r_expected, i);
            pv_dividends += present_value;

            dividends_flow.push(DividendFlow {
                label: format!("Div(Y-{})", params.years - i),
                window_start,
                window_end,
                amount,
                present_value,
            });
        }

        let pv_terminal = current_price / self.discount_factor(params.r_expected, params.years);
        let target_price = pv_dividends + pv_terminal;
        let upside_pct = self.calculate_upside(target_price, current_price);

        Ok(DdmValuation {
            symbol,
            current_price,
            target_price,
            upside_pct,
            meaning: Valuation::from_upside(upside_pct),
            dividends_flow,
        })
    }

    /// Orders valuations by upside, most undervalued first.
    pub fn rank(&self, mut valuations: Vec<DdmValuation>) -> Vec<DdmValuation> {
        valuations.sort_by(|a, b| b.upside_pct.total_cmp(&a.upside_pct));
        valuations
    }
}

impl Default for DividendDiscountEngine {
    fn default() -> Self {
        Self::new()
    }
}
