use analysis_core::{AnalysisError, DividendEvent, MarketDataProvider, PriceBar};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const BASE_URL: &str = "https://api.polygon.io";
const DIVIDEND_PAGE_LIMIT: u32 = 1000;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests: max_requests.max(1),
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            // Remove timestamps outside the window
            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            // Wait until the oldest request falls out of the window
            let sleep_dur = match ts.front() {
                Some(&oldest) => (oldest + self.window).duration_since(now) + Duration::from_millis(50),
                None => Duration::from_millis(50),
            };
            drop(ts);
            tracing::debug!("Rate limiter: waiting {:.1}s for Polygon API slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Connection settings for [`PolygonClient`].
#[derive(Debug, Clone)]
pub struct PolygonSettings {
    pub api_key: String,
    /// Requests per minute.
    pub rate_limit: usize,
    pub request_timeout: Duration,
}

impl PolygonSettings {
    pub fn new(api_key: String) -> Self {
        // Free tier users should set POLYGON_RATE_LIMIT=5.
        let rate_limit: usize = std::env::var("POLYGON_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);

        Self {
            api_key,
            rate_limit,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct PolygonClient {
    api_key: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl PolygonClient {
    pub fn new(api_key: String) -> Self {
        Self::with_settings(PolygonSettings::new(api_key))
    }

    pub fn with_settings(settings: PolygonSettings) -> Self {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key: settings.api_key,
            client,
            rate_limiter: RateLimiter::new(settings.rate_limit, Duration::from_secs(60)),
        }
    }

    /// Send a request with rate limiting and automatic 429 retry.
    async fn send_request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, AnalysisError> {
        let request = builder.build().map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        for attempt in 0..3u32 {
            self.rate_limiter.acquire().await;
            let req_clone = request.try_clone()
                .ok_or_else(|| AnalysisError::ApiError("Cannot clone request".to_string()))?;
            let response = self.client.execute(req_clone).await
                .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

            if response.status().as_u16() != 429 {
                return Ok(response);
            }

            let wait_secs = 15u64;
            tracing::warn!("Polygon 429 rate limited, waiting {}s before retry {}/3", wait_secs, attempt + 1);
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
        }

        Err(AnalysisError::ApiError("Rate limited by Polygon after 3 retries".to_string()))
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, AnalysisError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(AnalysisError::ApiError(format!(
            "HTTP {}: {}",
            response.status(),
            response.text().await.unwrap_or_default()
        )))
    }

    /// Get daily closes for a symbol
    pub async fn get_daily_closes(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            BASE_URL,
            symbol,
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d")
        );

        let response = self.send_request(
            self.client.get(&url).query(&[
                ("apiKey", self.api_key.as_str()),
                ("adjusted", "true"),
                ("sort", "asc"),
                ("limit", "50000"),
            ])
        ).await?;
        let response = Self::ensure_success(response).await?;

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(agg_response.into_price_bars())
    }

    /// Get cash dividend history for a symbol
    pub async fn get_dividends(&self, symbol: &str) -> Result<Vec<DividendEvent>, AnalysisError> {
        let url = format!("{}/v3/reference/dividends", BASE_URL);

        let response = self.send_request(
            self.client.get(&url).query(&[
                ("ticker", symbol),
                ("apiKey", self.api_key.as_str()),
                ("limit", &DIVIDEND_PAGE_LIMIT.to_string()),
                ("order", "desc"),
            ])
        ).await?;

        if response.status().as_u16() == 403 || response.status().as_u16() == 401 {
            tracing::warn!("Dividend data not available on this Polygon plan for {}", symbol);
            return Ok(Vec::new());
        }
        let response = Self::ensure_success(response).await?;

        let div_response: DividendResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(div_response.into_events())
    }

    /// Get the previous session's close
    pub async fn get_previous_close(&self, symbol: &str) -> Result<Option<f64>, AnalysisError> {
        let url = format!("{}/v2/aggs/ticker/{}/prev", BASE_URL, symbol);

        let response = self.send_request(
            self.client.get(&url).query(&[("apiKey", self.api_key.as_str()), ("adjusted", "true")])
        ).await?;
        let response = Self::ensure_success(response).await?;

        let agg_response: AggregateResponse = response
            .json()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        Ok(agg_response.results.last().map(|r| r.c))
    }
}

#[async_trait]
impl MarketDataProvider for PolygonClient {
    async fn get_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError> {
        self.get_daily_closes(symbol, start, end).await
    }

    async fn get_dividend_history(&self, symbol: &str) -> Result<Vec<DividendEvent>, AnalysisError> {
        self.get_dividends(symbol).await
    }

    async fn get_latest_price(&self, symbol: &str) -> Result<Option<f64>, AnalysisError> {
        self.get_previous_close(symbol).await
    }
}

// Response types

#[derive(Debug, Deserialize)]
struct AggregateResponse {
    #[serde(default)]
    results: Vec<AggregateResult>,
}

#[derive(Debug, Deserialize)]
struct AggregateResult {
    t: i64, // timestamp (ms)
    c: f64, // close
}

impl AggregateResponse {
    /// Bars normalised to their UTC calendar day, ascending, one per day.
    fn into_price_bars(self) -> Vec<PriceBar> {
        let mut bars: Vec<PriceBar> = self
            .results
            .into_iter()
            .filter_map(|r| {
                let date = DateTime::from_timestamp_millis(r.t)?.date_naive();
                Some(PriceBar::new(date, r.c))
            })
            .collect();
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        bars
    }
}

#[derive(Debug, Deserialize)]
struct DividendResponse {
    #[serde(default)]
    results: Vec<DividendInfo>,
}

#[derive(Debug, Deserialize)]
struct DividendInfo {
    cash_amount: Option<f64>,
    ex_dividend_date: Option<String>,
}

impl DividendResponse {
    fn into_events(self) -> Vec<DividendEvent> {
        let mut events: Vec<DividendEvent> = self
            .results
            .into_iter()
            .filter_map(|d| {
                let amount = d.cash_amount.filter(|a| *a > 0.0)?;
                let date = NaiveDate::parse_from_str(d.ex_dividend_date.as_deref()?, "%Y-%m-%d").ok()?;
                Some(DividendEvent::new(date, amount))
            })
            .collect();
        events.sort_by_key(|e| e.date);
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregates_normalise_to_days() {
        let json = r#"{
            "results": [
                {"t": 1672704000000, "o": 1.0, "h": 1.0, "l": 1.0, "c": 35.25, "v": 10.0},
                {"t": 1672617600000, "o": 1.0, "h": 1.0, "l": 1.0, "c": 35.00, "v": 10.0}
            ]
        }"#;
        let response: AggregateResponse = serde_json::from_str(json).unwrap();
        let bars = response.into_price_bars();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
        assert_eq!(bars[0].close, 35.00);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());
    }

    #[test]
    fn test_missing_results_is_empty() {
        let response: AggregateResponse = serde_json::from_str(r#"{"status": "OK"}"#).unwrap();
        assert!(response.into_price_bars().is_empty());
    }

    #[test]
    fn test_dividends_drop_malformed_entries() {
        let json = r#"{
            "results": [
                {"cash_amount": 0.85, "ex_dividend_date": "2024-02-26"},
                {"cash_amount": null, "ex_dividend_date": "2023-08-20"},
                {"cash_amount": 0.0, "ex_dividend_date": "2023-08-21"},
                {"cash_amount": 1.2, "ex_dividend_date": "not-a-date"},
                {"cash_amount": 1.4, "ex_dividend_date": "2023-08-22"}
            ]
        }"#;
        let response: DividendResponse = serde_json::from_str(json).unwrap();
        let events = response.into_events();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].date, NaiveDate::from_ymd_opt(2023, 8, 22).unwrap());
        assert_eq!(events[1].amount, 0.85);
    }
}
