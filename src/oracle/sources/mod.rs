//! Candle source implementations (Yahoo Finance, Binance)

mod binance;
mod yahoo;

pub use binance::BinanceClient;
pub use yahoo::YahooChartClient;
