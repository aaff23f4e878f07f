//! BreakoutBot Library
//!
//! Channel-breakout paper trader with an EMA trend filter, fixed-fractional
//! sizing and a persistent ledger.

pub mod config;
pub mod indicators;
pub mod ledger;
pub mod oracle;
pub mod persistence;
pub mod risk;
pub mod runner;
pub mod strategy;
pub mod types;

#[cfg(feature = "keepalive")]
pub mod keepalive;
