//! Run loop - one decision tick per refresh interval
//!
//! Each tick fetches candles, computes the indicator snapshot and drives the
//! strategy engine once. Retrieval errors, insufficient data, strategy errors
//! and panics all end the tick early and wait `backoff` before the next one;
//! nothing short of the shutdown signal stops the loop.

use anyhow::Result;
use futures_util::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::RunnerConfig;
use crate::indicators::{IndicatorCalculator, IndicatorError};
use crate::ledger::TradeLedger;
use crate::oracle::CandleSource;
use crate::persistence::StateStore;
use crate::strategy::{StrategyEngine, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    /// Sleep after an evaluated tick
    pub refresh: Duration,
    /// Sleep after a skipped or failed tick
    pub backoff: Duration,
}

impl From<&RunnerConfig> for RunnerSettings {
    fn from(config: &RunnerConfig) -> Self {
        Self {
            refresh: Duration::from_secs(config.refresh_secs),
            backoff: Duration::from_secs(config.backoff_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Evaluated(Transition),
    Skipped { required: usize, available: usize },
}

pub struct Runner<C: CandleSource, S: StateStore> {
    source: C,
    calculator: IndicatorCalculator,
    engine: StrategyEngine,
    ledger: TradeLedger<S>,
    settings: RunnerSettings,
}

impl<C: CandleSource, S: StateStore> Runner<C, S> {
    pub fn new(
        source: C,
        calculator: IndicatorCalculator,
        engine: StrategyEngine,
        ledger: TradeLedger<S>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            source,
            calculator,
            engine,
            ledger,
            settings,
        }
    }

    pub fn ledger(&self) -> &TradeLedger<S> {
        &self.ledger
    }

    /// Run a single tick
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let candles = self.source.fetch_candles().await?;

        let snapshot = match self.calculator.compute(&candles) {
            Ok(snapshot) => snapshot,
            Err(IndicatorError::InsufficientData { required, available }) => {
                return Ok(TickOutcome::Skipped { required, available });
            }
        };

        let transition = self.engine.on_snapshot(&mut self.ledger, &snapshot).await?;
        Ok(TickOutcome::Evaluated(transition))
    }

    /// Tick until `shutdown` resolves, then hand back the ledger. A tick in
    /// progress always completes (including its save) before the loop exits.
    pub async fn run<F>(mut self, shutdown: F) -> TradeLedger<S>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(source = self.source.name(), "🚀 Run loop started");

        loop {
            let delay = match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(Ok(TickOutcome::Evaluated(transition))) => {
                    if matches!(transition, Transition::Close { .. }) {
                        info!("{}", self.ledger.summary());
                    }
                    self.settings.refresh
                }
                Ok(Ok(TickOutcome::Skipped { required, available })) => {
                    warn!(required, available, "Not enough data yet, skipping tick");
                    self.settings.backoff
                }
                Ok(Err(e)) => {
                    warn!(source = self.source.name(), error = %format!("{e:#}"), "Tick failed");
                    self.settings.backoff
                }
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(panic = %msg, "Tick panicked");
                    self.settings.backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = &mut shutdown => {
                    info!("🛑 Shutdown requested, stopping run loop");
                    break;
                }
            }
        }

        self.ledger
    }
}
