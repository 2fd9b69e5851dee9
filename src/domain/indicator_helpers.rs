//! Shared helpers that turn a bar window into named indicator readings.

use std::collections::BTreeMap;

use crate::domain::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

/// Named indicator values at the latest bar; `None` while undefined.
pub type IndicatorReadings = BTreeMap<String, Option<f64>>;

/// The indicators computed for every market snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSet {
    pub types: Vec<IndicatorType>,
}

impl Default for IndicatorSet {
    fn default() -> Self {
        IndicatorSet {
            types: vec![
                IndicatorType::Ema(20),
                IndicatorType::Ema(50),
                IndicatorType::Rsi(7),
                IndicatorType::Rsi(14),
                IndicatorType::Atr(3),
                IndicatorType::Atr(14),
                IndicatorType::Macd {
                    fast: DEFAULT_FAST,
                    slow: DEFAULT_SLOW,
                    signal: DEFAULT_SIGNAL,
                },
            ],
        }
    }
}

impl IndicatorSet {
    pub fn new(types: Vec<IndicatorType>) -> Self {
        Self { types }
    }

    /// Bars of history needed before every indicator in the set is defined.
    pub fn warmup_bars(&self) -> usize {
        self.types.iter().map(IndicatorType::min_bars).max().unwrap_or(1)
    }

    pub fn compute(&self, bars: &[OhlcvBar]) -> BTreeMap<IndicatorType, IndicatorSeries> {
        compute_indicators(bars, &self.types)
    }

    /// Latest value of every indicator, flattened into snapshot names.
    pub fn readings(&self, bars: &[OhlcvBar]) -> IndicatorReadings {
        let mut readings = IndicatorReadings::new();
        for (indicator_type, series) in self.compute(bars) {
            insert_reading(&mut readings, indicator_type, series.latest());
        }
        readings
    }
}

pub fn compute_indicators(
    bars: &[OhlcvBar],
    types: &[IndicatorType],
) -> BTreeMap<IndicatorType, IndicatorSeries> {
    types.iter().map(|t| (*t, t.calculate(bars))).collect()
}

/// Snapshot key for a single-valued indicator, e.g. `ema_20`.
pub fn reading_name(indicator_type: IndicatorType) -> String {
    match indicator_type {
        IndicatorType::Ema(period) => format!("ema_{period}"),
        IndicatorType::Rsi(period) => format!("rsi_{period}"),
        IndicatorType::Atr(period) => format!("atr_{period}"),
        IndicatorType::Macd { .. } => "macd".to_string(),
    }
}

fn insert_reading(
    readings: &mut IndicatorReadings,
    indicator_type: IndicatorType,
    latest: Option<&IndicatorValue>,
) {
    match (indicator_type, latest) {
        (IndicatorType::Macd { .. }, Some(IndicatorValue::Macd { line, signal, histogram })) => {
            readings.insert("macd".into(), Some(*line));
            readings.insert("macd_signal".into(), Some(*signal));
            readings.insert("macd_histogram".into(), Some(*histogram));
        }
        (IndicatorType::Macd { .. }, _) => {
            readings.insert("macd".into(), None);
            readings.insert("macd_signal".into(), None);
            readings.insert("macd_histogram".into(), None);
        }
        (t, Some(IndicatorValue::Simple(v))) => {
            readings.insert(reading_name(t), Some(*v));
        }
        (t, _) => {
            readings.insert(reading_name(t), None);
        }
    }
}
