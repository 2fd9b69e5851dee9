//! Point-in-time market view handed to the decision function.

use serde::Serialize;

use crate::domain::error::TraderError;
use crate::domain::indicator_helpers::{IndicatorReadings, IndicatorSet};
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::SymbolDataProvider;

/// A kline enriched with derived fields. Chronological (oldest-first) in
/// every snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kline {
    pub timestamp: i64,
    pub datetime: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
    pub change: f64,
    pub percent: f64,
}

impl From<&OhlcvBar> for Kline {
    fn from(bar: &OhlcvBar) -> Self {
        Kline {
            timestamp: bar.timestamp,
            datetime: bar.datetime_str(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            amount: bar.amount(),
            change: bar.change(),
            percent: bar.percent(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub period: String,
    pub timestamp: i64,
    pub current_price: f64,
    pub current_volume: f64,
    pub average_volume: f64,
    pub mid_prices: Vec<f64>,
    pub recent_klines: Vec<Kline>,
    pub indicators: IndicatorReadings,
}

impl MarketSnapshot {
    /// True once every configured indicator has a defined value.
    pub fn is_warmed_up(&self) -> bool {
        self.indicators.values().all(Option::is_some)
    }

    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied().flatten()
    }
}

/// Build a snapshot for one symbol at the provider's current cursor.
///
/// Indicators are computed over `max(kline_count, warmup)` bars so that the
/// visible window can be shorter than the indicator look-back.
pub fn build_snapshot(
    provider: &dyn SymbolDataProvider,
    symbol: &str,
    period: &str,
    kline_count: usize,
    indicators: &IndicatorSet,
) -> Result<MarketSnapshot, TraderError> {
    let current_price = provider.get_last_price(symbol)?;
    let lookback = kline_count.max(indicators.warmup_bars());
    let history = provider.get_kline_data(symbol, period, lookback)?;
    let Some(latest) = history.last() else {
        return Err(TraderError::NoDataAtCursor {
            symbol: symbol.to_string(),
            cursor: 0,
        });
    };

    let recent = &history[history.len().saturating_sub(kline_count)..];
    let average_volume = if recent.is_empty() {
        0.0
    } else {
        recent.iter().map(|b| b.volume).sum::<f64>() / recent.len() as f64
    };

    Ok(MarketSnapshot {
        symbol: symbol.to_string(),
        period: period.to_string(),
        timestamp: latest.timestamp,
        current_price,
        current_volume: latest.volume,
        average_volume,
        mid_prices: recent.iter().map(OhlcvBar::mid_price).collect(),
        recent_klines: recent.iter().map(Kline::from).collect(),
        indicators: indicators.readings(&history),
    })
}
