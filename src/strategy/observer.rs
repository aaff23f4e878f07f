//! Side channel for status output

use tracing::info;

use super::Transition;
use crate::ledger::AccountState;
use crate::types::{IndicatorSnapshot, Side};

/// Notified by the engine after each evaluated tick. Observers must not
/// mutate trading state.
pub trait TradeObserver: Send + Sync {
    /// Called once per evaluated tick with the post-transition state
    fn on_tick(&self, _state: &AccountState, _snapshot: &IndicatorSnapshot) {}

    /// Called when a tick opened or closed a position
    fn on_transition(&self, _transition: &Transition, _state: &AccountState) {}
}

/// Writes the status line and trade events to the log
#[derive(Debug, Clone)]
pub struct LogObserver {
    contract_multiplier: f64,
}

impl LogObserver {
    pub fn new(contract_multiplier: f64) -> Self {
        Self { contract_multiplier }
    }

    fn status_line(&self, state: &AccountState, snap: &IndicatorSnapshot) -> String {
        let mut line = format!(
            "{} Price: {:.2} | Ch: {:.1}-{:.1} | EMA: {:.1} | Bal: ${:.0}",
            state.position.glyph(),
            snap.price,
            snap.entry_lower,
            snap.entry_upper,
            snap.trend_filter,
            state.balance
        );
        if !state.is_flat() {
            let upnl = state.unrealized_pnl(snap.price, self.contract_multiplier);
            line.push_str(&format!(" | uPnL: ${:+.2}", upnl));
        }
        line
    }
}

impl TradeObserver for LogObserver {
    fn on_tick(&self, state: &AccountState, snap: &IndicatorSnapshot) {
        info!(
            price = %format!("{:.2}", snap.price),
            upper = %format!("{:.1}", snap.entry_upper),
            lower = %format!("{:.1}", snap.entry_lower),
            stop = %format!("{:.1}", snap.exit_stop_line),
            ema = %format!("{:.1}", snap.trend_filter),
            balance = %format!("{:.0}", state.balance),
            "{}",
            self.status_line(state, snap)
        );
    }

    fn on_transition(&self, transition: &Transition, state: &AccountState) {
        match transition {
            Transition::Hold => {}
            Transition::Open { side, price, quantity } => {
                info!(
                    side = %side,
                    price = %format!("{:.2}", price),
                    lots = quantity,
                    "{} OPEN {} @ {:.2} (Lots: {})",
                    match side {
                        Side::Long => "🟢",
                        Side::Short => "🔴",
                    },
                    side,
                    price,
                    quantity
                );
            }
            Transition::Close { pnl, .. } => {
                if let Some(record) = state.trade_history.last() {
                    info!(pnl = %format!("{:.2}", pnl), "{}", record);
                }
                info!(balance = %format!("{:.2}", state.balance), "New Balance: ${:.2}", state.balance);
            }
        }
    }
}
