//! Oracle module - candle history for the configured instrument
//!
//! The run loop polls a single `CandleSource` each tick and feeds the full
//! window to the indicator calculator.

pub mod sources;

pub use sources::{BinanceClient, YahooChartClient};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{AppConfig, MarketDataProvider};
use crate::types::Candle;

/// Provider of recent candles, ordered oldest to newest
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Fetch the recent candle window. The last candle may still be forming.
    async fn fetch_candles(&self) -> Result<Vec<Candle>>;
}

#[async_trait]
impl CandleSource for Box<dyn CandleSource> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch_candles(&self) -> Result<Vec<Candle>> {
        (**self).fetch_candles().await
    }
}

#[async_trait]
impl<T: CandleSource + ?Sized> CandleSource for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn fetch_candles(&self) -> Result<Vec<Candle>> {
        (**self).fetch_candles().await
    }
}

/// Build the configured provider
pub fn build_source(config: &AppConfig) -> Result<Box<dyn CandleSource>> {
    let md = &config.market_data;
    let source: Box<dyn CandleSource> = match md.provider {
        MarketDataProvider::Yahoo => Box::new(YahooChartClient::new(
            &config.bot.symbol,
            &config.bot.interval,
            &md.range,
            md.timeout_secs,
            md.base_url.as_deref(),
        )?),
        MarketDataProvider::Binance => Box::new(BinanceClient::new(
            &config.bot.symbol,
            &config.bot.interval,
            md.limit,
            md.timeout_secs,
            md.base_url.as_deref(),
        )?),
    };
    Ok(source)
}
