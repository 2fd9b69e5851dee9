//! Core domain types and logic.

pub mod ohlcv;
pub mod symbol;
pub mod position;
pub mod portfolio;
pub mod decision;
pub mod execution;
pub mod indicator;
pub mod indicator_helpers;
pub mod snapshot;
pub mod backtest;
pub mod config_validation;
pub mod error;
