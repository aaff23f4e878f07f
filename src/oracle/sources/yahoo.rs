//! Yahoo Finance chart client
//!
//! Uses the v8 chart endpoint, which serves futures (GC=F), equities and FX
//! without an API key.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::oracle::CandleSource;
use crate::types::Candle;

const YAHOO_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
// Yahoo rejects requests without a browser-like agent
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) breakoutbot";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
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

#[derive(Debug, Clone)]
pub struct YahooChartClient {
    client: reqwest::Client,
    url: String,
    interval: String,
    range: String,
}

impl YahooChartClient {
    pub fn new(
        symbol: &str,
        interval: &str,
        range: &str,
        timeout_secs: u64,
        base_url: Option<&str>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: format!(
                "{}/{}",
                base_url.unwrap_or(YAHOO_CHART_URL).trim_end_matches('/'),
                symbol
            ),
            interval: interval.to_string(),
            range: range.to_string(),
        })
    }
}

/// Parse a chart response body. Rows with any missing OHLC value are dropped.
pub fn parse_chart(body: &str) -> Result<Vec<Candle>> {
    let response: ChartResponse = serde_json::from_str(body).context("Failed to parse Yahoo chart response")?;

    if let Some(err) = response.chart.error {
        bail!("Yahoo chart error {}: {}", err.code, err.description);
    }

    let result = response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| anyhow!("Yahoo chart response has no result"))?;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let candles = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
            Some(Candle {
                open_time: ts * 1000,
                open: field(&quote.open)?,
                high: field(&quote.high)?,
                low: field(&quote.low)?,
                close: field(&quote.close)?,
                volume: field(&quote.volume).unwrap_or(0.0),
            })
        })
        .collect();

    Ok(candles)
}

#[async_trait]
impl CandleSource for YahooChartClient {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_candles(&self) -> Result<Vec<Candle>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("interval", self.interval.as_str()), ("range", self.range.as_str())])
            .send()
            .await
            .context("Failed to fetch chart from Yahoo")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read Yahoo response")?;
        if !status.is_success() {
            // Error bodies still carry the chart.error envelope
            return match parse_chart(&body) {
                Err(e) => Err(e.context(format!("Yahoo API returned error: {status}"))),
                Ok(_) => bail!("Yahoo API returned error: {}", status),
            };
        }

        let candles = parse_chart(&body)?;
        tracing::debug!(url = %self.url, count = candles.len(), "📥 Chart fetched");
        Ok(candles)
    }
}
