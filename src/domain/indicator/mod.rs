//! Technical indicator implementations.
//!
//! Every calculator is a pure function over an oldest-first bar window and
//! returns an [`IndicatorSeries`] with one point per input bar. Points inside
//! the warm-up window carry `valid: false`. That flag is the "undefined"
//! sentinel. Calculators never panic or return an error on short input.
//!
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as map key)
//! - `IndicatorSeries`: A time series of indicator values

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;

pub use atr::calculate_atr;
pub use ema::calculate_ema;
pub use macd::{calculate_macd, calculate_macd_default};
pub use rsi::calculate_rsi;

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: i64,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

impl IndicatorType {
    /// Number of bars needed before the latest point is defined.
    pub fn min_bars(&self) -> usize {
        match *self {
            IndicatorType::Ema(period) | IndicatorType::Atr(period) => period.max(1),
            IndicatorType::Rsi(period) => period.max(1) + 1,
            IndicatorType::Macd { slow, signal, .. } => slow.max(1) + signal.max(1),
        }
    }

    pub fn calculate(&self, bars: &[crate::domain::ohlcv::OhlcvBar]) -> IndicatorSeries {
        match *self {
            IndicatorType::Ema(period) => calculate_ema(bars, period),
            IndicatorType::Rsi(period) => calculate_rsi(bars, period),
            IndicatorType::Atr(period) => calculate_atr(bars, period),
            IndicatorType::Macd { fast, slow, signal } => calculate_macd(bars, fast, slow, signal),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    pub fn empty(indicator_type: IndicatorType) -> Self {
        Self {
            indicator_type,
            values: Vec::new(),
        }
    }

    /// Value at the most recent bar, `None` while still warming up.
    pub fn latest(&self) -> Option<&IndicatorValue> {
        self.values
            .last()
            .filter(|p| p.valid)
            .map(|p| &p.value)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}
