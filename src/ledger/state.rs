//! Account state and closed-trade records
//!
//! `AccountState` doubles as the persisted document:
//!
//! ```json
//! {"balance": 9910.0, "position": null, "entry_price": 0.0, "lots": 0.0,
//!  "trade_history": ["[2024-05-01 13:00:00] ✖ CLOSE TRADE @ 96.00 | PnL: $-90.00"]}
//! ```

use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::types::{Position, Side};

const RECORD_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RECORD_MARKER: &str = "✖ CLOSE TRADE @ ";
const RECORD_PNL_MARKER: &str = " | PnL: $";

/// One closed trade. Amounts are kept to the cent and the timestamp to the
/// second, which is exactly what the history line can carry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TradeRecord {
    pub closed_at: DateTime<Utc>,
    pub exit_price: f64,
    pub pnl: f64,
}

impl TradeRecord {
    pub fn new(closed_at: DateTime<Utc>, exit_price: f64, pnl: f64) -> Self {
        Self {
            closed_at: closed_at.with_nanosecond(0).unwrap_or(closed_at),
            exit_price: round_cents(exit_price),
            pnl: round_cents(pnl),
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}{:.2}{}{:.2}",
            self.closed_at.format(RECORD_TS_FORMAT),
            RECORD_MARKER,
            self.exit_price,
            RECORD_PNL_MARKER,
            self.pnl
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed trade record {line:?}: {reason}")]
pub struct TradeRecordParseError {
    pub line: String,
    pub reason: &'static str,
}

impl FromStr for TradeRecord {
    type Err = TradeRecordParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fail = |reason| TradeRecordParseError {
            line: line.to_string(),
            reason,
        };

        let rest = line.strip_prefix('[').ok_or_else(|| fail("missing timestamp"))?;
        let (ts, rest) = rest.split_once("] ").ok_or_else(|| fail("missing timestamp"))?;
        let naive = NaiveDateTime::parse_from_str(ts, RECORD_TS_FORMAT)
            .map_err(|_| fail("bad timestamp"))?;
        let rest = rest
            .strip_prefix(RECORD_MARKER)
            .ok_or_else(|| fail("missing close marker"))?;
        let (price, pnl) = rest
            .split_once(RECORD_PNL_MARKER)
            .ok_or_else(|| fail("missing pnl"))?;

        Ok(Self {
            closed_at: Utc.from_utc_datetime(&naive),
            exit_price: price.trim().parse().map_err(|_| fail("bad exit price"))?,
            pnl: pnl.trim().parse().map_err(|_| fail("bad pnl"))?,
        })
    }
}

impl TryFrom<String> for TradeRecord {
    type Error = TradeRecordParseError;

    /// Only lines that render back to exactly the same text are accepted, so
    /// a stored line is never rewritten on save.
    fn try_from(line: String) -> Result<Self, Self::Error> {
        let record: TradeRecord = line.parse()?;
        if record.to_string() != line {
            return Err(TradeRecordParseError {
                line,
                reason: "not in canonical form",
            });
        }
        Ok(record)
    }
}

impl From<TradeRecord> for String {
    fn from(record: TradeRecord) -> Self {
        record.to_string()
    }
}

/// One line of `trade_history`. Lines this bot did not write, or wrote in
/// an older layout, are carried as raw text and saved back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryEntry {
    Trade(TradeRecord),
    Raw(String),
}

impl HistoryEntry {
    pub fn record(&self) -> Option<&TradeRecord> {
        match self {
            HistoryEntry::Trade(record) => Some(record),
            HistoryEntry::Raw(_) => None,
        }
    }
}

impl From<TradeRecord> for HistoryEntry {
    fn from(record: TradeRecord) -> Self {
        HistoryEntry::Trade(record)
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryEntry::Trade(record) => fmt::Display::fmt(record, f),
            HistoryEntry::Raw(line) => f.write_str(line),
        }
    }
}

/// Durable account state: cash, the single open position and closed trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    pub balance: f64,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub entry_price: f64,
    #[serde(rename = "lots", default)]
    pub quantity: f64,
    #[serde(default)]
    pub trade_history: Vec<HistoryEntry>,
}

impl AccountState {
    /// Fresh flat account
    pub fn new(initial_capital: f64) -> Self {
        Self {
            balance: initial_capital,
            position: Position::Flat,
            entry_price: 0.0,
            quantity: 0.0,
            trade_history: Vec::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_flat()
    }

    /// Closed trades this bot can read back
    pub fn trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trade_history.iter().filter_map(HistoryEntry::record)
    }

    /// Flat ⇔ no entry price and no quantity
    pub fn is_consistent(&self) -> bool {
        let empty = self.entry_price == 0.0 && self.quantity == 0.0;
        if self.is_flat() {
            empty
        } else {
            self.entry_price > 0.0 && self.quantity > 0.0
        }
    }

    /// State after opening `side`. History is untouched.
    pub fn opened(self, side: Side, entry_price: f64, quantity: f64) -> Self {
        Self {
            position: side.into(),
            entry_price,
            quantity,
            ..self
        }
    }

    /// State after closing the open position at `exit_price` for `pnl`. The
    /// balance moves by the recorded (cent-rounded) PnL.
    pub fn closed(mut self, exit_price: f64, pnl: f64, at: DateTime<Utc>) -> Self {
        let record = TradeRecord::new(at, exit_price, pnl);
        self.trade_history.push(record.into());
        Self {
            balance: self.balance + record.pnl,
            position: Position::Flat,
            entry_price: 0.0,
            quantity: 0.0,
            ..self
        }
    }

    /// Mark-to-market PnL of the open position at `price`
    pub fn unrealized_pnl(&self, price: f64, contract_multiplier: f64) -> f64 {
        match self.position.side() {
            Some(side) => side.sign() * (price - self.entry_price) * self.quantity * contract_multiplier,
            None => 0.0,
        }
    }

    /// Repair a loaded document that breaks the flat invariant. Balance and
    /// history are always kept. Returns `true` when something was changed.
    pub fn normalize(&mut self) -> bool {
        if self.is_consistent() {
            return false;
        }
        self.position = Position::Flat;
        self.entry_price = 0.0;
        self.quantity = 0.0;
        true
    }
}
