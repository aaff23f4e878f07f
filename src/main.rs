//! BreakoutBot - live paper trader entry point

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use breakoutbot::config::AppConfig;
use breakoutbot::indicators::IndicatorCalculator;
use breakoutbot::ledger::TradeLedger;
use breakoutbot::oracle::build_source;
use breakoutbot::persistence::{build_store, TradeJournal};
use breakoutbot::risk::PositionSizer;
use breakoutbot::runner::{Runner, RunnerSettings};
use breakoutbot::strategy::{LogObserver, StrategyEngine};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("breakoutbot=info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::load()?;
    config.validate()?;

    info!("--- Live Paper Trader Started ({}) ---", config.bot.symbol);
    info!("⚙️  {}", config.digest());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    #[cfg(feature = "keepalive")]
    let keepalive = if config.keepalive.enabled {
        match breakoutbot::keepalive::spawn(&config.keepalive, stopped(shutdown_rx.clone())).await {
            Ok((_, handle)) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "Keep-alive endpoint disabled");
                None
            }
        }
    } else {
        None
    };

    let source = build_source(&config)?;
    let store = build_store(&config.persistence)?;

    let mut ledger = TradeLedger::load(store, config.risk.initial_capital).await;
    if let Some(path) = &config.persistence.journal_file {
        ledger = ledger.with_journal(TradeJournal::new(path), config.bot.symbol.clone());
    }
    info!("{}", ledger.summary());

    let engine = StrategyEngine::new(
        PositionSizer::new(config.sizing_params()),
        config.risk.risk_fraction,
    )
    .with_observer(Arc::new(LogObserver::new(config.risk.contract_multiplier)));

    let runner = Runner::new(
        source,
        IndicatorCalculator::new(config.indicator_params()),
        engine,
        ledger,
        RunnerSettings::from(&config.runner),
    );

    info!("Press Ctrl+C to stop. Wallet saved automatically.");
    let ledger = runner.run(stopped(shutdown_rx)).await;

    #[cfg(feature = "keepalive")]
    if let Some(handle) = keepalive {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "Keep-alive task ended abnormally");
        }
    }

    info!("{}", ledger.summary());
    info!("Bot stopped.");
    Ok(())
}
