//! Core types used throughout BreakoutBot
//!
//! Defines candles, trade sides, the position state and the per-tick
//! indicator snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an open trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Position state of the account.
///
/// Serialized as `null`, `"LONG"` or `"SHORT"` so the persisted document keeps
/// its flat shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<Side>", into = "Option<Side>")]
pub enum Position {
    #[default]
    Flat,
    Long,
    Short,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        matches!(self, Position::Flat)
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Position::Flat => None,
            Position::Long => Some(Side::Long),
            Position::Short => Some(Side::Short),
        }
    }

    /// Status bar glyph
    pub fn glyph(&self) -> &'static str {
        match self {
            Position::Flat => "⬜",
            Position::Long => "🟩",
            Position::Short => "🟥",
        }
    }
}

impl From<Side> for Position {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => Position::Long,
            Side::Short => Position::Short,
        }
    }
}

impl From<Option<Side>> for Position {
    fn from(side: Option<Side>) -> Self {
        side.map(Position::from).unwrap_or(Position::Flat)
    }
}

impl From<Position> for Option<Side> {
    fn from(position: Position) -> Self {
        position.side()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Flat => write!(f, "FLAT"),
            Position::Long => write!(f, "LONG"),
            Position::Short => write!(f, "SHORT"),
        }
    }
}

/// Candlestick data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time (start of period, Unix milliseconds)
    pub open_time: i64,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume in base units (0 when the provider does not report it)
    pub volume: f64,
}

impl Candle {
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume: 0.0,
        }
    }
}

/// Indicator values for the most recent candle.
///
/// Channel values are computed from the candles *before* the most recent one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    /// Open time of the most recent candle (Unix milliseconds)
    pub candle_time: i64,
    /// Latest close
    pub price: f64,
    /// Highest high over the entry lookback
    pub entry_upper: f64,
    /// Lowest low over the entry lookback
    pub entry_lower: f64,
    /// Midpoint of the exit-lookback channel
    pub exit_stop_line: f64,
    /// EMA of close over the trend span
    pub trend_filter: f64,
}

impl IndicatorSnapshot {
    /// Name of the first non-finite field, if any
    pub fn first_non_finite(&self) -> Option<&'static str> {
        [
            ("price", self.price),
            ("entry_upper", self.entry_upper),
            ("entry_lower", self.entry_lower),
            ("exit_stop_line", self.exit_stop_line),
            ("trend_filter", self.trend_filter),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(name, _)| name)
    }
}
