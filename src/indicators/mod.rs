//! Indicator Calculator - channel bounds, stop line and trend filter
//!
//! Computes, for the most recent candle of a window:
//! - Entry channel (highest high / lowest low over the entry lookback)
//! - Exit stop line (midpoint of the exit-lookback channel)
//! - Trend filter (EMA of close)
//!
//! Channels only look at candles *before* the most recent one, so the
//! current candle can never trigger a breakout of its own range.

use thiserror::Error;

use crate::types::{Candle, IndicatorSnapshot};

/// Lookback lengths for the calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorParams {
    /// Candles in the entry channel
    pub entry_lookback: usize,
    /// Candles in the exit channel
    pub exit_lookback: usize,
    /// EMA span of the trend filter
    pub trend_span: usize,
}

impl IndicatorParams {
    /// Minimum window length for a snapshot (channels need one extra candle,
    /// the current one, which they exclude).
    pub fn required_candles(&self) -> usize {
        (self.entry_lookback + 1)
            .max(self.exit_lookback + 1)
            .max(self.trend_span)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    #[error("insufficient data: need {required} candles, have {available}")]
    InsufficientData { required: usize, available: usize },
}

/// Stateless calculator; every call is a pure function of its window.
#[derive(Debug, Clone)]
pub struct IndicatorCalculator {
    params: IndicatorParams,
}

impl IndicatorCalculator {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    /// Compute the snapshot for the last candle of `candles` (oldest first).
    pub fn compute(&self, candles: &[Candle]) -> Result<IndicatorSnapshot, IndicatorError> {
        let required = self.params.required_candles();
        let insufficient = IndicatorError::InsufficientData {
            required,
            available: candles.len(),
        };
        if candles.len() < required {
            return Err(insufficient);
        }

        let (entry_upper, entry_lower) =
            prior_channel(candles, self.params.entry_lookback).ok_or(insufficient.clone())?;
        let (exit_high, exit_low) =
            prior_channel(candles, self.params.exit_lookback).ok_or(insufficient.clone())?;
        let trend_filter =
            ema(candles.iter().map(|c| c.close), self.params.trend_span).ok_or(insufficient)?;

        let last = &candles[candles.len() - 1];
        Ok(IndicatorSnapshot {
            candle_time: last.open_time,
            price: last.close,
            entry_upper,
            entry_lower,
            exit_stop_line: (exit_high + exit_low) / 2.0,
            trend_filter,
        })
    }
}

/// Highest high and lowest low over the `lookback` candles preceding the
/// last one. `None` when the window is too short or `lookback` is zero.
pub fn prior_channel(candles: &[Candle], lookback: usize) -> Option<(f64, f64)> {
    if lookback == 0 || candles.len() < lookback + 1 {
        return None;
    }
    let end = candles.len() - 1;
    let window = &candles[end - lookback..end];

    let high = window
        .iter()
        .map(|c| c.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    Some((high, low))
}

/// Exponential moving average, `alpha = 2 / (span + 1)`, seeded from the
/// first value and run over every value. `None` for an empty input or a zero
/// span.
pub fn ema<I>(values: I, span: usize) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    if span == 0 {
        return None;
    }
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut iter = values.into_iter();
    let seed = iter.next()?;
    Some(iter.fold(seed, |prev, v| alpha * v + (1.0 - alpha) * prev))
}
