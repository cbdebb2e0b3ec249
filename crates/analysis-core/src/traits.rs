use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{AnalysisError, DividendEvent, PriceBar};

/// Source of daily closes and dividend history.
///
/// Implementations return dates already normalised to exchange-day
/// granularity. Symbols are passed in provider form (e.g. `PTT.BK`).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily closes between `start` and `end` inclusive, ascending by date.
    async fn get_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError>;

    /// Full cash-dividend history keyed by ex-dividend date.
    async fn get_dividend_history(&self, symbol: &str) -> Result<Vec<DividendEvent>, AnalysisError>;

    /// Most recent close, if the provider has one.
    async fn get_latest_price(&self, symbol: &str) -> Result<Option<f64>, AnalysisError>;
}
