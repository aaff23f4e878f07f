//! Trade Ledger - owner of the account state
//!
//! Every mutation is write-through: the new state replaces the old one in
//! memory, then exactly one save is attempted. A failed save is logged and the
//! in-memory state stays authoritative until the next successful one.

mod state;

pub use state::{AccountState, HistoryEntry, TradeRecord, TradeRecordParseError};

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info, warn};

use crate::persistence::{JournalRow, StateStore, TradeJournal};
use crate::types::Side;

/// Result of a persistence attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Failed,
}

/// Aggregate view of the closed trades
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    pub balance: f64,
    pub initial_capital: f64,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub realized_pnl: f64,
    pub position: crate::types::Position,
}

impl AccountSummary {
    pub fn win_rate(&self) -> f64 {
        if self.trades > 0 {
            self.wins as f64 / self.trades as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn return_pct(&self) -> f64 {
        if self.initial_capital > 0.0 {
            (self.balance - self.initial_capital) / self.initial_capital * 100.0
        } else {
            0.0
        }
    }
}

impl fmt::Display for AccountSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "📋 Paper: ${:.2} bal ({:+.2}%) | {}/{} ({:.0}% WR) | P&L: ${:+.2} | {}",
            self.balance,
            self.return_pct(),
            self.wins,
            self.trades,
            self.win_rate(),
            self.realized_pnl,
            self.position
        )
    }
}

pub struct TradeLedger<S: StateStore> {
    store: S,
    state: AccountState,
    initial_capital: f64,
    journal: Option<TradeJournal>,
    symbol: String,
}

impl<S: StateStore> TradeLedger<S> {
    /// Load the last saved state, or start a fresh account when there is none
    /// or it cannot be read.
    pub async fn load(store: S, initial_capital: f64) -> Self {
        let state = match store.read().await {
            Ok(Some(mut state)) => {
                if state.normalize() {
                    warn!(store = %store.describe(), "💾 Loaded state broke the flat invariant, position cleared");
                }
                info!(
                    store = %store.describe(),
                    balance = %format!("${:.2}", state.balance),
                    position = %state.position,
                    trades = state.trade_history.len(),
                    "💾 Loaded wallet"
                );
                state
            }
            Ok(None) => {
                info!(
                    store = %store.describe(),
                    balance = %format!("${:.2}", initial_capital),
                    "💾 Created new wallet"
                );
                AccountState::new(initial_capital)
            }
            Err(e) => {
                error!(
                    store = %store.describe(),
                    error = %format!("{e:#}"),
                    "💾 Failed to load state, starting from a new wallet"
                );
                AccountState::new(initial_capital)
            }
        };

        Self {
            store,
            state,
            initial_capital,
            journal: None,
            symbol: String::new(),
        }
    }

    /// Also append closed trades to a CSV journal
    pub fn with_journal(mut self, journal: TradeJournal, symbol: impl Into<String>) -> Self {
        self.journal = Some(journal);
        self.symbol = symbol.into();
        self
    }

    pub fn state(&self) -> &AccountState {
        &self.state
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist the current state
    pub async fn save(&self) -> SaveOutcome {
        match self.store.write(&self.state).await {
            Ok(()) => {
                info!(store = %self.store.describe(), "💾 State saved");
                SaveOutcome::Saved
            }
            Err(e) => {
                error!(
                    store = %self.store.describe(),
                    error = %format!("{e:#}"),
                    "💾 Failed to save state, keeping in-memory copy"
                );
                SaveOutcome::Failed
            }
        }
    }

    /// Open a position. Nothing is appended to history.
    pub async fn open_position(&mut self, side: Side, price: f64, quantity: f64) -> SaveOutcome {
        let current = std::mem::replace(&mut self.state, AccountState::new(0.0));
        self.state = current.opened(side, price, quantity);
        self.save().await
    }

    /// Close the open position now
    pub async fn close_position(&mut self, exit_price: f64, pnl: f64) -> SaveOutcome {
        self.close_position_at(exit_price, pnl, Utc::now()).await
    }

    /// Close the open position, booking `pnl` and recording the trade at `at`
    pub async fn close_position_at(&mut self, exit_price: f64, pnl: f64, at: DateTime<Utc>) -> SaveOutcome {
        let side = self.state.position.side();
        let entry_price = self.state.entry_price;
        let lots = self.state.quantity;

        let current = std::mem::replace(&mut self.state, AccountState::new(0.0));
        self.state = current.closed(exit_price, pnl, at);
        let outcome = self.save().await;

        if let Some(journal) = &self.journal {
            let row = JournalRow {
                timestamp: at.timestamp_millis(),
                symbol: self.symbol.clone(),
                side: side.map(|s| s.to_string()).unwrap_or_default(),
                entry_price,
                exit_price,
                lots,
                pnl: self.state.trades().last().map_or(pnl, |r| r.pnl),
                balance_after: self.state.balance,
            };
            if let Err(e) = journal.append(&row) {
                warn!(path = %journal.path().display(), error = %format!("{e:#}"), "Failed to append trade journal");
            }
        }

        outcome
    }

    pub fn summary(&self) -> AccountSummary {
        let trades = || self.state.trades();
        AccountSummary {
            balance: self.state.balance,
            initial_capital: self.initial_capital,
            trades: trades().count(),
            wins: trades().filter(|r| r.is_win()).count(),
            losses: trades().filter(|r| r.pnl < 0.0).count(),
            realized_pnl: trades().map(|r| r.pnl).sum(),
            position: self.state.position,
        }
    }
}
