//! Position Sizer - fixed-fractional risk sizing
//!
//! Quantity is chosen so that a move from entry to the stop line loses
//! `balance × risk_fraction`:
//!
//! `quantity = balance × risk_fraction / (|entry − stop| × contract_multiplier)`
//!
//! The stop distance is clamped to a floor so a stop sitting on (or very near)
//! the entry price cannot blow up the quantity.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Sizing configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingParams {
    /// Units of the instrument per lot (e.g. 100 oz per gold contract)
    pub contract_multiplier: f64,
    /// Smallest stop distance used in the sizing division
    pub min_stop_distance: f64,
    /// Smallest tradable quantity
    pub min_quantity: f64,
    /// Decimal places the quantity is rounded to
    pub quantity_decimals: u32,
}

impl Default for SizingParams {
    fn default() -> Self {
        Self {
            contract_multiplier: 100.0,
            min_stop_distance: 1.0,
            min_quantity: 0.01,
            quantity_decimals: 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    params: SizingParams,
}

impl PositionSizer {
    pub fn new(params: SizingParams) -> Self {
        Self { params }
    }

    pub fn contract_multiplier(&self) -> f64 {
        self.params.contract_multiplier
    }

    /// Quantity for a trade entered at `entry_price` with its stop at
    /// `stop_price`. Always finite and at least `min_quantity`.
    pub fn size(&self, balance: f64, risk_fraction: f64, entry_price: f64, stop_price: f64) -> f64 {
        let risk_amount = balance * risk_fraction;

        let mut stop_distance = (entry_price - stop_price).abs();
        // Negated comparison also catches NaN
        if !(stop_distance >= self.params.min_stop_distance) {
            stop_distance = self.params.min_stop_distance;
        }

        let raw = risk_amount / (stop_distance * self.params.contract_multiplier);
        let floored = raw.max(self.params.min_quantity);

        self.round_quantity(floored)
            .max(self.params.min_quantity)
    }

    /// Round half-to-even at the configured granularity.
    fn round_quantity(&self, quantity: f64) -> f64 {
        Decimal::from_f64(quantity)
            .map(|d| d.round_dp(self.params.quantity_decimals))
            .and_then(|d| d.to_f64())
            .unwrap_or(self.params.min_quantity)
    }
}
