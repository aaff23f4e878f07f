//! Account report
//!
//! Usage: cargo run --bin ledger_report [-- --csv]
//!
//! Loads the configured state store and prints the account summary and the
//! closed-trade history. `--csv` prints the history as CSV instead.

use anyhow::{Context, Result};
use breakoutbot::config::AppConfig;
use breakoutbot::ledger::TradeLedger;
use breakoutbot::persistence::{build_store, StateStore};
use tracing::{info, warn};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "breakoutbot=warn".into()),
        )
        .init();

    let csv_output = std::env::args().any(|a| a == "--csv");

    let config = AppConfig::load()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let ledger = runtime.block_on(async {
        let store = build_store(&config.persistence)?;
        anyhow::Ok(TradeLedger::load(store, config.risk.initial_capital).await)
    })?;
    info!(store = %ledger.store().describe(), "📥 Ledger loaded");

    let state = ledger.state();
    if csv_output {
        let mut writer = csv::Writer::from_writer(std::io::stdout());
        writer.write_record(["closed_at", "exit_price", "pnl"])?;
        for record in state.trades() {
            writer.write_record([
                record.closed_at.to_rfc3339(),
                format!("{:.2}", record.exit_price),
                format!("{:.2}", record.pnl),
            ])?;
        }
        writer.flush()?;
        let unreadable = state.trade_history.len() - state.trades().count();
        if unreadable > 0 {
            warn!(lines = unreadable, "Skipped history lines in an unknown format");
        }
        return Ok(());
    }

    println!("{}", ledger.summary());
    if let Some(side) = state.position.side() {
        println!(
            "{} open {} @ {:.2} (Lots: {})",
            state.position.glyph(),
            side,
            state.entry_price,
            state.quantity
        );
    }
    println!("--- {} closed trades ---", state.trade_history.len());
    for record in &state.trade_history {
        println!("{}", record);
    }

    Ok(())
}
