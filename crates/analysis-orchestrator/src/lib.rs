use analysis_core::{
    canonical_symbol, provider_symbol, AnalysisError, DividendEvent, MarketDataProvider, YearRange,
};
use chrono::{Duration, NaiveDate};
use cluster_scoring::{ScoredTable, ScoringConfig};
use dividend_analysis::{
    capture_ratio_records, dividend_seasonality, trend_return_records, CaptureRecord, Partitioned,
    PriceSeries, SeasonalityReport, StockReport, TrendParams, TrendRecord,
};
use fundamental_analysis::{DdmParams, DdmValuation, DividendDiscountEngine};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use technical_analysis::{technical_history, technical_snapshot, TechnicalRow, TechnicalSnapshot};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub mod batch;
pub mod cache;
pub mod config;
pub mod jobs;
pub mod universe;

pub use batch::{
    score_records, BatchBundle, BatchError, BatchParams, BatchRequest, FailureKind, StockFailure,
};
pub use cache::{ResultCaches, Snapshot, SnapshotCache};
pub use config::AnalysisConfig;
pub use jobs::{JobInfo, JobOutcome, JobRegistry, JobStatus, JobTicket};
pub use universe::{StockUniverse, SET50};

/// Calendar days of history behind a technical snapshot.
const SNAPSHOT_LOOKBACK_DAYS: i64 = 183;

/// Indicator history for one stock.
#[derive(Debug, Clone, Serialize)]
pub struct TechnicalReport {
    pub symbol: String,
    pub days: i64,
    pub count: usize,
    pub data: Vec<TechnicalRow>,
}

/// Records of one stock inside a batch, plus whatever went wrong for it.
struct StockOutcome {
    capture: Vec<CaptureRecord>,
    trend: Vec<TrendRecord>,
    failures: Vec<StockFailure>,
}

/// Runs dividend analyses against a market-data provider.
///
/// Cheap to clone; clones share the provider and configuration.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    provider: Arc<dyn MarketDataProvider>,
    config: Arc<AnalysisConfig>,
}

impl AnalysisOrchestrator {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            provider,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    fn ticker(&self, symbol: &str) -> String {
        provider_symbol(symbol, &self.config.ticker_suffix)
    }

    async fn with_timeout<T, F>(&self, symbol: &str, fut: F) -> Result<T, AnalysisError>
    where
        F: Future<Output = Result<T, AnalysisError>>,
    {
        match tokio::time::timeout(self.config.fetch_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(AnalysisError::Timeout {
                symbol: canonical_symbol(symbol),
                seconds: self.config.fetch_timeout_secs,
            }),
        }
    }

    async fn fetch_prices(
        &self,
        symbol: &str,
        (start, end): (NaiveDate, NaiveDate),
    ) -> Result<PriceSeries, AnalysisError> {
        let ticker = self.ticker(symbol);
        let bars = self
            .with_timeout(symbol, self.provider.get_price_history(&ticker, start, end))
            .await?;
        Ok(PriceSeries::from_bars(bars))
    }

    async fn fetch_dividends(&self, symbol: &str) -> Result<Vec<DividendEvent>, AnalysisError> {
        let ticker = self.ticker(symbol);
        self.with_timeout(symbol, self.provider.get_dividend_history(&ticker)).await
    }

    async fn fetch_prices_and_dividends(
        &self,
        symbol: &str,
        window: (NaiveDate, NaiveDate),
    ) -> Result<(PriceSeries, Vec<DividendEvent>), AnalysisError> {
        tokio::try_join!(self.fetch_prices(symbol, window), self.fetch_dividends(symbol))
    }

    /// Capture-ratio records for one stock, partitioned at `threshold`.
    pub async fn capture_report(
        &self,
        symbol: &str,
        threshold: f64,
        years: YearRange,
    ) -> Result<StockReport<CaptureRecord>, AnalysisError> {
        config::validate_years(years)?;
        config::validate_threshold("threshold", threshold)?;

        let (prices, dividends) = self
            .fetch_prices_and_dividends(symbol, years.capture_fetch_window())
            .await?;
        let records = capture_ratio_records(symbol, &prices, &dividends, years)?;

        Ok(Partitioned::new(records, threshold).into_report(canonical_symbol(symbol)))
    }

    /// Trend-return records for one stock, partitioned at `threshold`.
    pub async fn trend_report(
        &self,
        symbol: &str,
        threshold: f64,
        years: YearRange,
        params: TrendParams,
    ) -> Result<StockReport<TrendRecord>, AnalysisError> {
        config::validate_years(years)?;
        config::validate_threshold("threshold", threshold)?;

        let (prices, dividends) = self
            .fetch_prices_and_dividends(symbol, years.trend_fetch_window())
            .await?;
        let records = trend_return_records(symbol, &prices, &dividends, years, params)?;

        Ok(Partitioned::new(records, threshold).into_report(canonical_symbol(symbol)))
    }

    /// Runs `job` once per symbol, at most `max_concurrency` at a time.
    /// Results come back in input order.
    async fn fan_out<T, F, Fut>(&self, symbols: &[String], job: F) -> Vec<(String, T)>
    where
        T: Send + 'static,
        F: Fn(AnalysisOrchestrator, String) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, symbol) in symbols.iter().enumerate() {
            let this = self.clone();
            let job = job.clone();
            let semaphore = Arc::clone(&semaphore);
            let symbol = symbol.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let output = job(this, symbol.clone()).await;
                (index, symbol, output)
            });
        }

        let mut results = Vec::with_capacity(symbols.len());
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(entry) => results.push(entry),
                Err(e) => tracing::error!("Per-stock task panicked: {}", e),
            }
        }

        results.sort_by_key(|(index, _, _)| *index);
        results.into_iter().map(|(_, symbol, output)| (symbol, output)).collect()
    }

    async fn collect_stock(&self, symbol: &str, params: BatchParams) -> StockOutcome {
        let years = params.years();
        let mut outcome = StockOutcome {
            capture: Vec::new(),
            trend: Vec::new(),
            failures: Vec::new(),
        };

        // the trend window starts a year earlier and covers the capture window
        let (prices, dividends) = match self
            .fetch_prices_and_dividends(symbol, years.trend_fetch_window())
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!("⚠️  {}: fetch failed: {}", symbol, e);
                outcome.failures.push(StockFailure::from_fetch(symbol, &e));
                return outcome;
            }
        };

        // capture needs the same first session as a per-stock query
        let (capture_start, capture_end) = years.capture_fetch_window();
        let capture_prices = prices.within(capture_start, capture_end);
        match capture_ratio_records(symbol, &capture_prices, &dividends, years) {
            Ok(records) => outcome.capture = records,
            Err(e) => {
                tracing::warn!("⚠️  {}: no capture data: {}", symbol, e);
                outcome
                    .failures
                    .push(StockFailure::new(symbol, FailureKind::NoCaptureData, e.to_string()));
            }
        }

        match trend_return_records(symbol, &prices, &dividends, years, params.trend_params()) {
            Ok(records) => outcome.trend = records,
            Err(e) => {
                tracing::warn!("⚠️  {}: no trend data: {}", symbol, e);
                outcome
                    .failures
                    .push(StockFailure::new(symbol, FailureKind::NoTrendData, e.to_string()));
            }
        }

        outcome
    }

    /// Fetches and scores the whole universe. One stock failing never stops
    /// the others; the batch only fails when nothing is left to score.
    pub async fn run_batch(&self, request: BatchRequest) -> Result<BatchBundle, BatchError> {
        let params = BatchParams::resolve(&request, &self.config).map_err(BatchError::InvalidRequest)?;
        let symbols = StockUniverse::from_request(request.symbols).get_symbols();

        tracing::info!(
            "🚀 Batch start: {} stocks, years {}, window {}, thresholds capture={} trend={}",
            symbols.len(),
            params.years(),
            params.window,
            params.capture_threshold,
            params.trend_threshold
        );

        let outcomes = self
            .fan_out(&symbols, move |this, symbol| async move {
                this.collect_stock(&symbol, params).await
            })
            .await;

        let mut raw_capture = Vec::new();
        let mut raw_trend = Vec::new();
        let mut failures = Vec::new();
        for (_, outcome) in outcomes {
            raw_capture.extend(outcome.capture);
            raw_trend.extend(outcome.trend);
            failures.extend(outcome.failures);
        }

        let scoring = self.scoring_config(params.k_clusters);
        match score_records(
            &raw_capture,
            &raw_trend,
            params.capture_threshold,
            params.trend_threshold,
            &scoring,
        ) {
            Ok(table) => {
                tracing::info!(
                    "🏁 Batch complete: {} stocks scored, {} failures",
                    table.stocks.len(),
                    failures.len()
                );
                Ok(BatchBundle {
                    params,
                    universe_size: symbols.len(),
                    table,
                    raw_capture,
                    raw_trend,
                    failures,
                })
            }
            Err(source) => {
                tracing::warn!("Batch produced no table: {} ({} failures)", source, failures.len());
                Err(BatchError::Scoring {
                    source,
                    failures,
                    universe_size: symbols.len(),
                })
            }
        }
    }

    fn scoring_config(&self, k_clusters: usize) -> ScoringConfig {
        ScoringConfig {
            k_clusters,
            ..self.config.scoring_config()
        }
    }

    /// Re-partitions already fetched records under new thresholds and scores
    /// them again. No provider calls.
    pub fn score_from_raw(
        &self,
        raw_capture: &[CaptureRecord],
        raw_trend: &[TrendRecord],
        capture_threshold: f64,
        trend_threshold: f64,
        k_clusters: Option<usize>,
    ) -> Result<ScoredTable, AnalysisError> {
        config::validate_threshold("capture_threshold", capture_threshold)?;
        config::validate_threshold("outlier_threshold", trend_threshold)?;
        let k = k_clusters.unwrap_or(self.config.k_clusters);
        if k == 0 {
            return Err(AnalysisError::InvalidConfig("k_clusters must be positive".to_string()));
        }
        score_records(raw_capture, raw_trend, capture_threshold, trend_threshold, &self.scoring_config(k))
    }

    /// A copy of `bundle` re-scored with the given overrides.
    pub fn rescore_bundle(
        &self,
        bundle: &BatchBundle,
        capture_threshold: Option<f64>,
        trend_threshold: Option<f64>,
        k_clusters: Option<usize>,
    ) -> Result<BatchBundle, AnalysisError> {
        let params = BatchParams {
            capture_threshold: capture_threshold.unwrap_or(bundle.params.capture_threshold),
            trend_threshold: trend_threshold.unwrap_or(bundle.params.trend_threshold),
            k_clusters: k_clusters.unwrap_or(bundle.params.k_clusters),
            ..bundle.params
        };
        let table = self.score_from_raw(
            &bundle.raw_capture,
            &bundle.raw_trend,
            params.capture_threshold,
            params.trend_threshold,
            Some(params.k_clusters),
        )?;

        Ok(BatchBundle {
            params,
            table,
            ..bundle.clone()
        })
    }

    pub async fn seasonality(&self, symbol: &str, today: NaiveDate) -> Result<SeasonalityReport, AnalysisError> {
        let dividends = self.fetch_dividends(symbol).await?;
        dividend_seasonality(symbol, &dividends, today, self.config.seasonality_lookback_years)
    }

    pub async fn seasonality_batch(&self, symbols: Option<Vec<String>>, today: NaiveDate) -> Vec<SeasonalityReport> {
        let symbols = StockUniverse::from_request(symbols).get_symbols();
        let results = self
            .fan_out(&symbols, move |this, symbol| async move { this.seasonality(&symbol, today).await })
            .await;
        keep_successes("seasonality", results)
    }

    /// Daily indicator rows over the last `days` calendar days.
    pub async fn technical_history(
        &self,
        symbol: &str,
        today: NaiveDate,
        days: Option<i64>,
    ) -> Result<TechnicalReport, AnalysisError> {
        let days = days.unwrap_or(self.config.technical_lookback_days);
        config::validate_lookback_days(days)?;
        let prices = self.fetch_prices(symbol, (today - Duration::days(days), today)).await?;
        if prices.is_empty() {
            return Err(AnalysisError::NoData(format!("No data found for {}", canonical_symbol(symbol))));
        }

        let data = technical_history(prices.bars());
        Ok(TechnicalReport {
            symbol: canonical_symbol(symbol),
            days,
            count: data.len(),
            data,
        })
    }

    pub async fn technical_snapshot(&self, symbol: &str, today: NaiveDate) -> Result<TechnicalSnapshot, AnalysisError> {
        let prices = self
            .fetch_prices(symbol, (today - Duration::days(SNAPSHOT_LOOKBACK_DAYS), today))
            .await?;
        technical_snapshot(&canonical_symbol(symbol), prices.bars()).ok_or_else(|| {
            AnalysisError::NoData(format!("Not enough history for indicators on {}", canonical_symbol(symbol)))
        })
    }

    pub async fn technical_batch(&self, symbols: Option<Vec<String>>, today: NaiveDate) -> Vec<TechnicalSnapshot> {
        let symbols = StockUniverse::from_request(symbols).get_symbols();
        let results = self
            .fan_out(&symbols, move |this, symbol| async move {
                this.technical_snapshot(&symbol, today).await
            })
            .await;
        keep_successes("technical", results)
    }

    pub async fn ddm_valuation(
        &self,
        symbol: &str,
        params: DdmParams,
        today: NaiveDate,
    ) -> Result<DdmValuation, AnalysisError> {
        params.validate()?;
        let ticker = self.ticker(symbol);
        let (price, dividends) = tokio::try_join!(
            self.with_timeout(symbol, self.provider.get_latest_price(&ticker)),
            self.fetch_dividends(symbol)
        )?;
        let price = price
            .ok_or_else(|| AnalysisError::NoData(format!("No current price for {}", canonical_symbol(symbol))))?;

        DividendDiscountEngine::new().value(symbol, price, &dividends, today, &params)
    }

    /// Valuations for every stock that has a price and dividends, most
    /// undervalued first.
    pub async fn ddm_batch(&self, symbols: Option<Vec<String>>, params: DdmParams, today: NaiveDate) -> Vec<DdmValuation> {
        let symbols = StockUniverse::from_request(symbols).get_symbols();
        let results = self
            .fan_out(&symbols, move |this, symbol| async move {
                this.ddm_valuation(&symbol, params, today).await
            })
            .await;
        DividendDiscountEngine::new().rank(keep_successes("ddm", results))
    }
}

fn keep_successes<T>(kind: &str, results: Vec<(String, Result<T, AnalysisError>)>) -> Vec<T> {
    let total = results.len();
    let kept: Vec<T> = results
        .into_iter()
        .filter_map(|(symbol, result)| match result {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("⚠️  {} skipped for {}: {}", kind, symbol, e);
                None
            }
        })
        .collect();
    tracing::info!("📊 {} batch: {}/{} stocks", kind, kept.len(), total);
    kept
}
