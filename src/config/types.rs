//! Configuration enums

use serde::Deserialize;
use std::fmt;

use crate::indicators::IndicatorParams;

/// Strategy preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyVariant {
    /// Same lookback for entry and exit channels
    #[default]
    Symmetric,
    /// Shorter exit channel, so the trailing stop follows price more tightly
    Asymmetric,
}

impl StrategyVariant {
    pub fn preset(&self) -> IndicatorParams {
        match self {
            StrategyVariant::Symmetric => IndicatorParams {
                entry_lookback: 20,
                exit_lookback: 20,
                trend_span: 200,
            },
            StrategyVariant::Asymmetric => IndicatorParams {
                entry_lookback: 20,
                exit_lookback: 10,
                trend_span: 200,
            },
        }
    }
}

impl fmt::Display for StrategyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyVariant::Symmetric => write!(f, "symmetric"),
            StrategyVariant::Asymmetric => write!(f, "asymmetric"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketDataProvider {
    Yahoo,
    Binance,
}

impl fmt::Display for MarketDataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketDataProvider::Yahoo => write!(f, "yahoo"),
            MarketDataProvider::Binance => write!(f, "binance"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    File,
    Remote,
    /// Nothing survives a restart
    Memory,
}

impl fmt::Display for PersistenceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceBackend::File => write!(f, "file"),
            PersistenceBackend::Remote => write!(f, "remote"),
            PersistenceBackend::Memory => write!(f, "memory"),
        }
    }
}
