use analysis_core::{AnalysisError, YearRange};
use anyhow::{Context, Result};
use cluster_scoring::ScoringConfig;
use dividend_analysis::TrendParams;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Analysis defaults shared by the API server and the batch runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub start_year: i32,
    pub end_year: i32,
    /// Trading days either side of the ex-date for trend returns.
    pub window: usize,
    /// Triple-EMA span.
    pub span: usize,
    /// Capture-ratio bound used by batch scoring.
    pub capture_threshold: f64,
    /// Trend-return bound (percent) used by batch scoring.
    pub trend_threshold: f64,
    /// Capture-ratio bound for single-stock queries.
    pub per_stock_capture_threshold: f64,
    pub k_clusters: usize,
    pub random_seed: u64,
    pub n_init: usize,
    pub fetch_timeout_secs: u64,
    pub max_concurrency: usize,
    /// Appended to canonical symbols before calling the data provider.
    pub ticker_suffix: String,
    pub seasonality_lookback_years: u32,
    /// Calendar days of history fetched for technical indicators.
    pub technical_lookback_days: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            start_year: 2022,
            end_year: 2024,
            window: 15,
            span: 15,
            capture_threshold: 20.0,
            trend_threshold: 20.0,
            per_stock_capture_threshold: 10.0,
            k_clusters: 4,
            random_seed: 42,
            n_init: 10,
            fetch_timeout_secs: 30,
            max_concurrency: 5,
            ticker_suffix: ".BK".to_string(),
            seasonality_lookback_years: 10,
            technical_lookback_days: 365,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr + ToString,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Invalid value for {}", key))
}

impl AnalysisConfig {
    /// Reads `ANALYSIS_*` variables, falling back to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let window = env_or("ANALYSIS_WINDOW", defaults.window)?;

        let config = Self {
            start_year: env_or("ANALYSIS_START_YEAR", defaults.start_year)?,
            end_year: env_or("ANALYSIS_END_YEAR", defaults.end_year)?,
            window,
            // span follows the window unless set explicitly
            span: env_or("ANALYSIS_SPAN", window)?,
            capture_threshold: env_or("ANALYSIS_CAPTURE_THRESHOLD", defaults.capture_threshold)?,
            trend_threshold: env_or("ANALYSIS_TREND_THRESHOLD", defaults.trend_threshold)?,
            per_stock_capture_threshold: env_or(
                "ANALYSIS_PER_STOCK_CAPTURE_THRESHOLD",
                defaults.per_stock_capture_threshold,
            )?,
            k_clusters: env_or("ANALYSIS_K_CLUSTERS", defaults.k_clusters)?,
            random_seed: env_or("ANALYSIS_RANDOM_SEED", defaults.random_seed)?,
            n_init: env_or("ANALYSIS_N_INIT", defaults.n_init)?,
            fetch_timeout_secs: env_or("ANALYSIS_FETCH_TIMEOUT_SECS", defaults.fetch_timeout_secs)?,
            max_concurrency: env_or("ANALYSIS_MAX_CONCURRENCY", defaults.max_concurrency)?,
            ticker_suffix: env::var("ANALYSIS_TICKER_SUFFIX").unwrap_or(defaults.ticker_suffix),
            seasonality_lookback_years: env_or(
                "ANALYSIS_SEASONALITY_LOOKBACK_YEARS",
                defaults.seasonality_lookback_years,
            )?,
            technical_lookback_days: env_or(
                "ANALYSIS_TECHNICAL_LOOKBACK_DAYS",
                defaults.technical_lookback_days,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        validate_years(self.years())?;
        if self.window == 0 || self.span == 0 {
            return Err(AnalysisError::InvalidConfig("window and span must be positive".to_string()));
        }
        if self.k_clusters == 0 {
            return Err(AnalysisError::InvalidConfig("k_clusters must be positive".to_string()));
        }
        for (name, value) in [
            ("capture_threshold", self.capture_threshold),
            ("trend_threshold", self.trend_threshold),
            ("per_stock_capture_threshold", self.per_stock_capture_threshold),
        ] {
            validate_threshold(name, value)?;
        }
        validate_lookback_days(self.technical_lookback_days)?;
        if self.max_concurrency == 0 {
            return Err(AnalysisError::InvalidConfig("max_concurrency must be positive".to_string()));
        }
        Ok(())
    }

    pub fn years(&self) -> YearRange {
        YearRange::new(self.start_year, self.end_year)
    }

    pub fn trend_params(&self) -> TrendParams {
        TrendParams::new(self.span, self.window)
    }

    /// Per-request window override. The span tracks the window, matching
    /// the batch defaults.
    pub fn trend_params_for(&self, window: Option<usize>) -> TrendParams {
        match window {
            Some(w) => TrendParams::new(w, w),
            None => self.trend_params(),
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn scoring_config(&self) -> ScoringConfig {
        ScoringConfig {
            k_clusters: self.k_clusters,
            seed: self.random_seed,
            n_init: self.n_init,
            ..ScoringConfig::default()
        }
    }
}

pub(crate) fn validate_threshold(name: &str, value: f64) -> Result<(), AnalysisError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AnalysisError::InvalidConfig(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Longest technical history a request may ask for.
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

pub(crate) fn validate_lookback_days(days: i64) -> Result<(), AnalysisError> {
    if !(1..=MAX_LOOKBACK_DAYS).contains(&days) {
        return Err(AnalysisError::InvalidConfig(format!(
            "days must be between 1 and {} (got {})",
            MAX_LOOKBACK_DAYS, days
        )));
    }
    Ok(())
}

/// Calendar years a request may name.
pub const YEAR_LIMITS: (i32, i32) = (1900, 2200);

pub(crate) fn validate_years(years: YearRange) -> Result<(), AnalysisError> {
    let (min, max) = YEAR_LIMITS;
    for year in [years.start, years.end] {
        if !(min..=max).contains(&year) {
            return Err(AnalysisError::InvalidConfig(format!(
                "year {} is outside {}..={}",
                year, min, max
            )));
        }
    }
    if years.start > years.end {
        return Err(AnalysisError::InvalidConfig(format!(
            "start_year {} is after end_year {}",
            years.start, years.end
        )));
    }
    Ok(())
}
