//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! Warmup: a point is valid once slow + signal bars are available.

use crate::domain::indicator::ema::ema_values;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub fn calculate_macd(
    bars: &[OhlcvBar],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> IndicatorSeries {
    let indicator_type = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    if bars.is_empty() || fast == 0 || slow == 0 || signal_period == 0 {
        return IndicatorSeries::empty(indicator_type);
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast = ema_values(&closes, fast);
    let ema_slow = ema_values(&closes, slow);

    let macd_line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    // The signal EMA runs over the defined part of the MACD line only.
    let macd_warmup = fast.max(slow) - 1;
    let mut signal_line: Vec<Option<f64>> = vec![None; bars.len()];
    if bars.len() > macd_warmup {
        let defined: Vec<f64> = macd_line[macd_warmup..].iter().map(|v| v.unwrap_or(0.0)).collect();
        for (offset, value) in ema_values(&defined, signal_period).into_iter().enumerate() {
            signal_line[macd_warmup + offset] = value;
        }
    }

    let min_bars = indicator_type.min_bars();
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let line = macd_line[i].unwrap_or(0.0);
            let signal = signal_line[i].unwrap_or(0.0);
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: i + 1 >= min_bars && signal_line[i].is_some(),
                value: IndicatorValue::Macd {
                    line,
                    signal,
                    histogram: line - signal,
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_macd_default(bars: &[OhlcvBar]) -> IndicatorSeries {
    calculate_macd(bars, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::calculate_ema;

    fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                timestamp: 1_700_000_000 + i as i64 * 180,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect()
    }

    fn trending(n: usize) -> Vec<OhlcvBar> {
        let prices: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.5 + (i % 3) as f64).collect();
        make_bars(&prices)
    }

    fn macd_parts(value: &IndicatorValue) -> (f64, f64, f64) {
        match *value {
            IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } => (line, signal, histogram),
            _ => panic!("Expected Macd value"),
        }
    }

    #[test]
    fn macd_undefined_below_slow_plus_signal() {
        let series = calculate_macd_default(&trending(34));
        assert_eq!(series.values.len(), 34);
        assert!(series.latest().is_none());
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn macd_defined_at_slow_plus_signal() {
        let series = calculate_macd_default(&trending(35));
        assert!(series.latest().is_some());
        assert!(!series.values[33].valid);
        assert!(series.values[34].valid);
    }

    #[test]
    fn macd_line_is_ema_difference() {
        let bars = trending(40);
        let series = calculate_macd(&bars, 3, 6, 2);
        let fast = calculate_ema(&bars, 3);
        let slow = calculate_ema(&bars, 6);

        let (line, _, _) = macd_parts(&series.values[39].value);
        let f = match fast.values[39].value {
            IndicatorValue::Simple(v) => v,
            _ => unreachable!(),
        };
        let s = match slow.values[39].value {
            IndicatorValue::Simple(v) => v,
            _ => unreachable!(),
        };
        assert!((line - (f - s)).abs() < 1e-9);
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let series = calculate_macd(&trending(30), 3, 6, 2);
        for point in series.values.iter().filter(|p| p.valid) {
            let (line, signal, histogram) = macd_parts(&point.value);
            assert!((histogram - (line - signal)).abs() < 1e-12);
        }
    }

    #[test]
    fn macd_signal_seed_is_average_of_first_lines() {
        let bars = trending(20);
        let series = calculate_macd(&bars, 2, 4, 3);
        // MACD line defined from index 3; signal seeded at index 5.
        let lines: Vec<f64> = (3..=5).map(|i| macd_parts(&series.values[i].value).0).collect();
        let (_, signal, _) = macd_parts(&series.values[5].value);
        assert!((signal - lines.iter().sum::<f64>() / 3.0).abs() < 1e-12);
        // flagged valid one bar after the seed
        assert!(!series.values[5].valid);
        assert!(series.values[6].valid);
    }

    #[test]
    fn macd_constant_prices_is_zero() {
        let series = calculate_macd_default(&make_bars(&[50.0; 40]));
        let (line, signal, histogram) = macd_parts(series.latest().unwrap());
        assert!(line.abs() < 1e-12);
        assert!(signal.abs() < 1e-12);
        assert!(histogram.abs() < 1e-12);
    }

    #[test]
    fn macd_empty_and_zero_periods() {
        assert!(calculate_macd_default(&[]).values.is_empty());
        assert!(calculate_macd(&trending(10), 0, 26, 9).values.is_empty());
        assert!(calculate_macd(&trending(10), 12, 26, 0).values.is_empty());
    }

    #[test]
    fn macd_indicator_type() {
        let series = calculate_macd_default(&trending(5));
        assert_eq!(
            series.indicator_type,
            IndicatorType::Macd {
                fast: 12,
                slow: 26,
                signal: 9
            }
        );
    }
}
