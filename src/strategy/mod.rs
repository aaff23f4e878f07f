//! Strategy Engine - channel breakout state machine
//!
//! Evaluated once per tick, in fixed priority:
//! 1. Exit: an open position closes when price crosses the exit stop line
//!    (long below, short above). The fill is booked at the stop line.
//! 2. Entry: only when the tick *started* flat. Long on a close above the
//!    entry channel and the trend filter, short on a close below both.
//!
//! A tick produces at most one transition, so a position closed by the exit
//! check is never reopened in the same tick.

mod observer;

pub use observer::{LogObserver, TradeObserver};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::ledger::{AccountState, TradeLedger};
use crate::persistence::StateStore;
use crate::risk::PositionSizer;
use crate::types::{IndicatorSnapshot, Side};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("invalid snapshot: {0} is not finite")]
    InvalidSnapshot(&'static str),
}

/// Outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    Hold,
    Open {
        side: Side,
        price: f64,
        quantity: f64,
    },
    Close {
        side: Side,
        entry_price: f64,
        exit_price: f64,
        quantity: f64,
        pnl: f64,
    },
}

impl Transition {
    pub fn is_hold(&self) -> bool {
        matches!(self, Transition::Hold)
    }
}

pub struct StrategyEngine {
    sizer: PositionSizer,
    risk_fraction: f64,
    observers: Vec<Arc<dyn TradeObserver>>,
}

impl StrategyEngine {
    pub fn new(sizer: PositionSizer, risk_fraction: f64) -> Self {
        Self {
            sizer,
            risk_fraction,
            observers: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn TradeObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Pure decision for `state` at `snap`
    pub fn decide(&self, state: &AccountState, snap: &IndicatorSnapshot) -> Result<Transition, StrategyError> {
        if let Some(field) = snap.first_non_finite() {
            return Err(StrategyError::InvalidSnapshot(field));
        }

        let price = snap.price;
        let stop = snap.exit_stop_line;

        if let Some(side) = state.position.side() {
            let crossed = match side {
                Side::Long => price < stop,
                Side::Short => price > stop,
            };
            if !crossed {
                return Ok(Transition::Hold);
            }
            let pnl = side.sign() * (stop - state.entry_price) * state.quantity * self.sizer.contract_multiplier();
            return Ok(Transition::Close {
                side,
                entry_price: state.entry_price,
                exit_price: stop,
                quantity: state.quantity,
                pnl,
            });
        }

        let side = if price > snap.entry_upper && price > snap.trend_filter {
            Side::Long
        } else if price < snap.entry_lower && price < snap.trend_filter {
            Side::Short
        } else {
            return Ok(Transition::Hold);
        };

        let quantity = self.sizer.size(state.balance, self.risk_fraction, price, stop);
        Ok(Transition::Open { side, price, quantity })
    }

    /// Pure state transition; closed trades are stamped with `at`
    pub fn step(
        &self,
        state: AccountState,
        snap: &IndicatorSnapshot,
        at: DateTime<Utc>,
    ) -> Result<(AccountState, Transition), StrategyError> {
        let transition = self.decide(&state, snap)?;
        let next = match transition {
            Transition::Hold => state,
            Transition::Open { side, price, quantity } => state.opened(side, price, quantity),
            Transition::Close { exit_price, pnl, .. } => state.closed(exit_price, pnl, at),
        };
        Ok((next, transition))
    }

    /// Evaluate `snap` and apply the resulting transition through the ledger
    pub async fn on_snapshot<S: StateStore>(
        &self,
        ledger: &mut TradeLedger<S>,
        snap: &IndicatorSnapshot,
    ) -> Result<Transition, StrategyError> {
        let transition = self.decide(ledger.state(), snap)?;

        match transition {
            Transition::Hold => {}
            Transition::Open { side, price, quantity } => {
                debug!(side = %side, price, upper = snap.entry_upper, lower = snap.entry_lower, ema = snap.trend_filter, "Entry signal detected (breakout)");
                ledger.open_position(side, price, quantity).await;
            }
            Transition::Close { exit_price, pnl, .. } => {
                debug!(price = snap.price, stop = exit_price, "Exit signal detected (price crossed mid band)");
                ledger.close_position(exit_price, pnl).await;
            }
        }

        for observer in &self.observers {
            if !transition.is_hold() {
                observer.on_transition(&transition, ledger.state());
            }
            observer.on_tick(ledger.state(), snap);
        }

        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStateStore;
    use crate::risk::SizingParams;
    use crate::types::Position;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn engine() -> StrategyEngine {
        StrategyEngine::new(PositionSizer::new(SizingParams::default()), 0.01)
    }

    fn snap(price: f64, upper: f64, lower: f64, stop: f64, trend: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            candle_time: 0,
            price,
            entry_upper: upper,
            entry_lower: lower,
            exit_stop_line: stop,
            trend_filter: trend,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    #[test]
    fn breakout_above_trend_opens_long() {
        let state = AccountState::new(10_000.0);
        let (next, transition) = engine()
            .step(state, &snap(105.0, 100.0, 90.0, 95.0, 101.0), t0())
            .unwrap();

        assert_eq!(
            transition,
            Transition::Open {
                side: Side::Long,
                price: 105.0,
                quantity: 0.10
            }
        );
        assert_eq!(next.position, Position::Long);
        assert_eq!(next.entry_price, 105.0);
        assert_eq!(next.quantity, 0.10);
        assert!(next.trade_history.is_empty());
    }

    #[test]
    fn stop_cross_closes_long_at_stop_line() {
        let state = AccountState::new(10_000.0).opened(Side::Long, 105.0, 0.10);
        let (next, transition) = engine()
            .step(state, &snap(94.0, 110.0, 90.0, 96.0, 100.0), t0())
            .unwrap();

        match transition {
            Transition::Close { exit_price, pnl, .. } => {
                assert_eq!(exit_price, 96.0);
                assert!((pnl + 90.0).abs() < 1e-9);
            }
            other => panic!("expected close, got {other:?}"),
        }
        assert!(next.is_flat());
        assert!((next.balance - 9_910.0).abs() < 1e-9);
        assert_eq!(next.trade_history.len(), 1);
        assert_eq!(next.trades().next().unwrap().pnl, -90.0);
    }

    #[test]
    fn short_leg_mirrors_long() {
        let state = AccountState::new(10_000.0);
        let (next, transition) = engine()
            .step(state, &snap(85.0, 100.0, 90.0, 95.0, 99.0), t0())
            .unwrap();
        assert!(matches!(transition, Transition::Open { side: Side::Short, .. }));
        assert_eq!(next.position, Position::Short);
        // distance 10, risk 100, multiplier 100
        assert_eq!(next.quantity, 0.10);

        let (flat, transition) = engine()
            .step(next, &snap(82.0, 100.0, 70.0, 80.0, 99.0), t0())
            .unwrap();
        match transition {
            Transition::Close { side, exit_price, pnl, .. } => {
                assert_eq!(side, Side::Short);
                assert_eq!(exit_price, 80.0);
                assert!((pnl - 50.0).abs() < 1e-9);
            }
            other => panic!("expected close, got {other:?}"),
        }
        assert!(flat.is_flat());
    }

    #[test]
    fn trend_filter_blocks_counter_trend_breakouts() {
        let flat = AccountState::new(10_000.0);
        // Above the channel but below the EMA
        let t = engine().decide(&flat, &snap(105.0, 100.0, 90.0, 95.0, 110.0)).unwrap();
        assert_eq!(t, Transition::Hold);
        // Below the channel but above the EMA
        let t = engine().decide(&flat, &snap(85.0, 100.0, 90.0, 95.0, 80.0)).unwrap();
        assert_eq!(t, Transition::Hold);
        // Touching the bound is not a breakout
        let t = engine().decide(&flat, &snap(100.0, 100.0, 90.0, 95.0, 50.0)).unwrap();
        assert_eq!(t, Transition::Hold);
    }

    #[test]
    fn exit_tick_never_reenters() {
        // Short stop is crossed and price is also a long breakout
        let state = AccountState::new(10_000.0).opened(Side::Short, 90.0, 0.2);
        let (next, transition) = engine()
            .step(state, &snap(120.0, 100.0, 80.0, 95.0, 100.0), t0())
            .unwrap();
        assert!(matches!(transition, Transition::Close { .. }));
        assert!(next.is_flat());
    }

    #[test]
    fn open_position_holds_while_inside_stop() {
        let state = AccountState::new(10_000.0).opened(Side::Long, 105.0, 0.10);
        let (next, transition) = engine()
            .step(state.clone(), &snap(130.0, 120.0, 90.0, 110.0, 100.0), t0())
            .unwrap();
        assert_eq!(transition, Transition::Hold);
        assert_eq!(next, state);
    }

    #[test]
    fn invalid_snapshot_is_rejected() {
        let state = AccountState::new(10_000.0);
        let err = engine()
            .decide(&state, &snap(f64::NAN, 100.0, 90.0, 95.0, 101.0))
            .unwrap_err();
        assert_eq!(err, StrategyError::InvalidSnapshot("price"));
    }

    #[derive(Default)]
    struct Recorder {
        ticks: Mutex<usize>,
        transitions: Mutex<Vec<Transition>>,
    }

    impl TradeObserver for Recorder {
        fn on_tick(&self, _state: &AccountState, _snapshot: &IndicatorSnapshot) {
            *self.ticks.lock().unwrap() += 1;
        }

        fn on_transition(&self, transition: &Transition, _state: &AccountState) {
            self.transitions.lock().unwrap().push(*transition);
        }
    }

    #[tokio::test]
    async fn on_snapshot_applies_through_ledger_and_notifies() {
        let recorder = Arc::new(Recorder::default());
        let engine = engine().with_observer(recorder.clone());
        let mut ledger = TradeLedger::load(MemoryStateStore::new(), 10_000.0).await;

        let t = engine
            .on_snapshot(&mut ledger, &snap(105.0, 100.0, 90.0, 95.0, 101.0))
            .await
            .unwrap();
        assert!(matches!(t, Transition::Open { .. }));
        assert_eq!(ledger.state().position, Position::Long);
        assert_eq!(ledger.store().read().await.unwrap().as_ref(), Some(ledger.state()));

        let t = engine
            .on_snapshot(&mut ledger, &snap(104.0, 106.0, 90.0, 98.0, 101.0))
            .await
            .unwrap();
        assert_eq!(t, Transition::Hold);

        engine
            .on_snapshot(&mut ledger, &snap(94.0, 106.0, 90.0, 96.0, 101.0))
            .await
            .unwrap();
        assert!(ledger.state().is_flat());
        assert_eq!(ledger.state().balance, 9_910.0);

        assert_eq!(*recorder.ticks.lock().unwrap(), 3);
        assert_eq!(recorder.transitions.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalid_snapshot_leaves_ledger_untouched() {
        let mut ledger = TradeLedger::load(MemoryStateStore::new(), 10_000.0).await;
        let result = engine()
            .on_snapshot(&mut ledger, &snap(105.0, f64::INFINITY, 90.0, 95.0, 101.0))
            .await;
        assert!(result.is_err());
        assert_eq!(ledger.state(), &AccountState::new(10_000.0));
        assert!(ledger.store().raw().is_none());
    }
}
