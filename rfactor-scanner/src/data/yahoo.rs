//! Yahoo Finance chart API adapter.
//!
//! # Endpoint
//! `GET {base}/v8/finance/chart/{SYMBOL}{SUFFIX}?range=1mo&interval=1d`
//!
//! # Coverage
//! - NSE equities via the `.NS` suffix
//! - Daily bars, roughly 20 trading sessions per month window
//!
//! # Rate Limits
//! - Undocumented; bursts trigger HTTP 429
//! - Callers pace requests through [`super::RateLimiter`]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use rfactor_common::config::ScannerConfig;

use super::provider::{DataProvider, ProviderError};
use super::Bar;

// ============================================================================
// Constants
// ============================================================================

/// Chart endpoint path segments
const CHART_PATH: &[&str] = &["v8", "finance", "chart"];

/// Yahoo rejects requests without a browser-like user agent
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; rfactor-scanner/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ChartErrorBody {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series.get(index).copied().flatten()
}

// ============================================================================
// Yahoo Adapter
// ============================================================================

/// Yahoo Finance chart adapter for daily NSE bars.
pub struct YahooChartAdapter {
    /// API base URL (overridable for tests and proxies)
    base_url: String,
    /// Exchange suffix appended to bare symbols
    market_suffix: String,
    /// History window, e.g. "1mo"
    range: String,
    /// Bar interval, e.g. "1d"
    interval: String,
    /// HTTP client
    client: reqwest::Client,
}

impl YahooChartAdapter {
    /// Create an adapter with the default one-month daily window.
    pub fn new(base_url: impl Into<String>, market_suffix: impl Into<String>) -> Self {
        Self::with_window(base_url, market_suffix, "1mo", "1d", Duration::from_secs(30))
    }

    /// Create with an explicit history window and request timeout.
    pub fn with_window(
        base_url: impl Into<String>,
        market_suffix: impl Into<String>,
        range: impl Into<String>,
        interval: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into(),
            market_suffix: market_suffix.into(),
            range: range.into(),
            interval: interval.into(),
            client,
        }
    }

    /// Create from config
    pub fn from_config(config: &ScannerConfig) -> Self {
        Self::with_window(
            &config.provider_base_url,
            &config.market_suffix,
            &config.history_range,
            &config.bar_interval,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Provider-side ticker: the symbol with the market suffix appended
    /// unless it is already present.
    pub fn ticker(&self, symbol: &str) -> String {
        let symbol = symbol.trim().to_uppercase();
        if self.market_suffix.is_empty() || symbol.ends_with(&self.market_suffix.to_uppercase()) {
            symbol
        } else {
            format!("{}{}", symbol, self.market_suffix)
        }
    }

    /// Full chart URL for a symbol.
    pub fn chart_url(&self, symbol: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Unavailable(format!("Invalid base URL: {}", e)))?;

        let ticker = self.ticker(symbol);
        url.path_segments_mut()
            .map_err(|_| ProviderError::Unavailable("Base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(CHART_PATH)
            .push(&ticker);

        url.query_pairs_mut()
            .append_pair("range", &self.range)
            .append_pair("interval", &self.interval);

        Ok(url)
    }

    /// Decode a chart payload into bars sorted by time ascending.
    fn parse_chart(ticker: &str, body: &str) -> Result<Vec<Bar>, ProviderError> {
        let envelope: ChartEnvelope = serde_json::from_str(body).map_err(|e| {
            ProviderError::MalformedResponse(format!("Failed to parse response: {}", e))
        })?;

        if let Some(err) = envelope.chart.error {
            debug!(
                ticker,
                code = %err.code,
                description = err.description.as_deref().unwrap_or(""),
                "Chart API returned error"
            );
            return Err(ProviderError::SymbolNotFound(ticker.to_string()));
        }

        let result = envelope
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.swap_remove(0)) })
            .ok_or_else(|| ProviderError::MalformedResponse("Chart result missing".into()))?;

        Self::parse_bars(&result)
    }

    fn parse_bars(result: &ChartResult) -> Result<Vec<Bar>, ProviderError> {
        let empty = QuoteSeries::default();
        let quote = result.indicators.quote.first().unwrap_or(&empty);

        let mut bars = Vec::with_capacity(result.timestamp.len());

        for (i, &ts) in result.timestamp.iter().enumerate() {
            // Sessions without a close carry no usable price
            let Some(close) = value_at(&quote.close, i) else {
                continue;
            };

            let timestamp = Utc
                .timestamp_opt(ts, 0)
                .single()
                .ok_or_else(|| ProviderError::MalformedResponse(format!("Invalid timestamp: {}", ts)))?;

            bars.push(Bar {
                timestamp,
                open: value_at(&quote.open, i).unwrap_or(f64::NAN),
                high: value_at(&quote.high, i).unwrap_or(f64::NAN),
                low: value_at(&quote.low, i).unwrap_or(f64::NAN),
                close,
                volume: value_at(&quote.volume, i).unwrap_or(0.0),
            });
        }

        bars.sort_by_key(|b| b.timestamp);

        Ok(bars)
    }
}

// ============================================================================
// DataProvider Implementation
// ============================================================================

#[async_trait]
impl DataProvider for YahooChartAdapter {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn market_suffix(&self) -> &str {
        &self.market_suffix
    }

    fn lookup_hint(&self, symbol: &str) -> Option<String> {
        Some(format!("https://finance.yahoo.com/quote/{}", self.ticker(symbol)))
    }

    async fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, ProviderError> {
        let url = self.chart_url(symbol)?;
        let ticker = self.ticker(symbol);

        debug!(url = %url, symbol, "Fetching chart from Yahoo");

        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Network("Request timeout".into())
                } else if e.is_connect() {
                    ProviderError::Network("Connection failed".into())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::SymbolNotFound(ticker));
        }

        if !status.is_success() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Self::parse_chart(&ticker, &body)
    }
}

// ============================================================================
// Tests
// ============================================================================
