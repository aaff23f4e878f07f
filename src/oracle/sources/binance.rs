//! Binance REST client for kline history
//!
//! Polls the spot klines endpoint; the last kline is the one still forming.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::oracle::CandleSource;
use crate::types::Candle;

const BINANCE_REST_URL: &str = "https://api.binance.com/api/v3/klines";

#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    url: String,
    symbol: String,
    interval: String,
    limit: u32,
}

impl BinanceClient {
    pub fn new(
        symbol: &str,
        interval: &str,
        limit: u32,
        timeout_secs: u64,
        base_url: Option<&str>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: base_url.unwrap_or(BINANCE_REST_URL).to_string(),
            symbol: symbol.to_uppercase(),
            interval: interval.to_string(),
            // Binance caps klines at 1000 per request
            limit: limit.clamp(1, 1000),
        })
    }
}

/// Parse a klines response body
///
/// `[[open_time, "open", "high", "low", "close", "volume", close_time, ...], ...]`
pub fn parse_klines(klines: Vec<Vec<serde_json::Value>>) -> Vec<Candle> {
    klines
        .into_iter()
        .filter_map(|kline| {
            if kline.len() < 6 {
                return None;
            }

            let open_time = kline[0].as_i64()?;
            let open: f64 = kline[1].as_str()?.parse().ok()?;
            let high: f64 = kline[2].as_str()?.parse().ok()?;
            let low: f64 = kline[3].as_str()?.parse().ok()?;
            let close: f64 = kline[4].as_str()?.parse().ok()?;
            let volume: f64 = kline[5].as_str()?.parse().ok()?;

            Some(Candle {
                open_time,
                open,
                high,
                low,
                close,
                volume,
            })
        })
        .collect()
}

#[async_trait]
impl CandleSource for BinanceClient {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn fetch_candles(&self) -> Result<Vec<Candle>> {
        let limit = self.limit.to_string();
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("symbol", self.symbol.as_str()),
                ("interval", self.interval.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("Failed to fetch klines from Binance")?;

        if !response.status().is_success() {
            bail!("Binance API returned error: {}", response.status());
        }

        let klines: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .context("Failed to parse Binance klines response")?;

        let candles = parse_klines(klines);

        tracing::debug!(
            symbol = %self.symbol,
            interval = %self.interval,
            count = candles.len(),
            "📥 Klines fetched"
        );

        Ok(candles)
    }
}
