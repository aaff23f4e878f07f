//! Configuration management for BreakoutBot
//!
//! Built-in defaults, then `config/default.*` and `config/local.*`, then
//! `BREAKOUTBOT__SECTION__KEY` environment variables (`.env` is honored).

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use tracing::warn;

use crate::indicators::IndicatorParams;
use crate::risk::SizingParams;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub runner: RunnerConfig,
    pub market_data: MarketDataConfig,
    pub persistence: PersistenceConfig,
    pub keepalive: KeepaliveConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Bot version tag for logging
    pub tag: String,
    /// Instrument to trade (provider symbol, e.g. GC=F or PAXGUSDT)
    pub symbol: String,
    /// Candle interval (1h, 15m, ...)
    pub interval: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub variant: StrategyVariant,
    /// Overrides the preset entry lookback
    pub entry_lookback: Option<usize>,
    /// Overrides the preset exit lookback
    pub exit_lookback: Option<usize>,
    /// Overrides the preset EMA span
    pub trend_span: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Starting balance of a new wallet
    pub initial_capital: f64,
    /// Fraction of balance risked per trade
    pub risk_fraction: f64,
    /// Units per lot
    pub contract_multiplier: f64,
    /// Floor for the stop distance used in sizing
    pub min_stop_distance: f64,
    pub min_quantity: f64,
    pub quantity_decimals: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Sleep between ticks
    pub refresh_secs: u64,
    /// Sleep after a failed or skipped tick
    pub backoff_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataConfig {
    pub provider: MarketDataProvider,
    /// History range requested from Yahoo (1mo, 3mo, ...)
    pub range: String,
    /// Number of klines requested from Binance
    pub limit: u32,
    pub timeout_secs: u64,
    /// Overrides the provider's API root
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
    /// JSON document path for the file backend
    pub state_file: String,
    /// Optional CSV export of closed trades
    pub journal_file: Option<String>,
    pub remote: RemoteStoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteStoreConfig {
    pub base_url: Option<String>,
    pub key: String,
    /// Appended to the key, e.g. ".json" for Firebase
    pub suffix: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeepaliveConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::defaults()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (BREAKOUTBOT__*)
            .add_source(Environment::with_prefix("BREAKOUTBOT").separator("__"))
            // Hosting platforms hand out the listen port as PORT
            .set_override_option("keepalive.port", std::env::var("PORT").ok())?
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Builder holding only the built-in defaults
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            .set_default("bot.tag", env!("CARGO_PKG_VERSION"))?
            .set_default("bot.symbol", "GC=F")?
            .set_default("bot.interval", "1h")?
            // Strategy defaults
            .set_default("strategy.variant", "symmetric")?
            // Risk defaults
            .set_default("risk.initial_capital", 10_000.0)?
            .set_default("risk.risk_fraction", 0.01)?
            .set_default("risk.contract_multiplier", 100.0)?
            .set_default("risk.min_stop_distance", 1.0)?
            .set_default("risk.min_quantity", 0.01)?
            .set_default("risk.quantity_decimals", 2)?
            // Runner defaults
            .set_default("runner.refresh_secs", 60)?
            .set_default("runner.backoff_secs", 10)?
            // Market data defaults
            .set_default("market_data.provider", "yahoo")?
            .set_default("market_data.range", "1mo")?
            .set_default("market_data.limit", 500)?
            .set_default("market_data.timeout_secs", 30)?
            // Persistence defaults
            .set_default("persistence.backend", "file")?
            .set_default("persistence.state_file", "bot_state.json")?
            .set_default("persistence.remote.key", "bot_state")?
            .set_default("persistence.remote.suffix", "")?
            .set_default("persistence.remote.timeout_secs", 15)?
            // Keep-alive defaults
            .set_default("keepalive.enabled", true)?
            .set_default("keepalive.host", "0.0.0.0")?
            .set_default("keepalive.port", 8080)?;
        Ok(builder)
    }

    /// Lookbacks after applying overrides to the variant preset
    pub fn indicator_params(&self) -> IndicatorParams {
        let preset = self.strategy.variant.preset();
        IndicatorParams {
            entry_lookback: self.strategy.entry_lookback.unwrap_or(preset.entry_lookback),
            exit_lookback: self.strategy.exit_lookback.unwrap_or(preset.exit_lookback),
            trend_span: self.strategy.trend_span.unwrap_or(preset.trend_span),
        }
    }

    pub fn sizing_params(&self) -> SizingParams {
        SizingParams {
            contract_multiplier: self.risk.contract_multiplier,
            min_stop_distance: self.risk.min_stop_distance,
            min_quantity: self.risk.min_quantity,
            quantity_decimals: self.risk.quantity_decimals,
        }
    }

    /// Reject settings the bot cannot trade with
    pub fn validate(&self) -> Result<()> {
        let params = self.indicator_params();
        if params.entry_lookback == 0 || params.exit_lookback == 0 || params.trend_span == 0 {
            bail!(
                "lookbacks must be positive (entry={}, exit={}, trend={})",
                params.entry_lookback,
                params.exit_lookback,
                params.trend_span
            );
        }
        if params.exit_lookback > params.entry_lookback {
            warn!(
                entry = params.entry_lookback,
                exit = params.exit_lookback,
                "Exit channel is longer than the entry channel"
            );
        }

        let risk = &self.risk;
        if !(risk.risk_fraction > 0.0 && risk.risk_fraction <= 1.0) {
            bail!("risk.risk_fraction must be in (0, 1], got {}", risk.risk_fraction);
        }
        if !(risk.initial_capital > 0.0) {
            bail!("risk.initial_capital must be positive, got {}", risk.initial_capital);
        }
        if !(risk.contract_multiplier > 0.0) {
            bail!("risk.contract_multiplier must be positive, got {}", risk.contract_multiplier);
        }
        if !(risk.min_stop_distance > 0.0) {
            bail!("risk.min_stop_distance must be positive, got {}", risk.min_stop_distance);
        }
        if !(risk.min_quantity > 0.0) {
            bail!("risk.min_quantity must be positive, got {}", risk.min_quantity);
        }
        if risk.quantity_decimals > 8 {
            bail!("risk.quantity_decimals must be at most 8, got {}", risk.quantity_decimals);
        }

        if self.runner.refresh_secs == 0 {
            bail!("runner.refresh_secs must be positive");
        }

        if self.persistence.backend == PersistenceBackend::Remote
            && self
                .persistence
                .remote
                .base_url
                .as_deref()
                .map_or(true, |u| u.trim().is_empty())
        {
            bail!("persistence.remote.base_url is required when backend = remote");
        }

        Ok(())
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        let params = self.indicator_params();
        format!(
            "bot={} symbol={} interval={} variant={} entry={} exit={} ema={} risk={:.2}% source={} store={}",
            self.bot.tag,
            self.bot.symbol,
            self.bot.interval,
            self.strategy.variant,
            params.entry_lookback,
            params.exit_lookback,
            params.trend_span,
            self.risk.risk_fraction * 100.0,
            self.market_data.provider,
            self.persistence.backend
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
