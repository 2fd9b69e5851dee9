//! OHLCV bar representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One time bucket of market activity. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    /// Unix seconds at the start of the bucket.
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// (high + low) / 2
    pub fn mid_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Quote-currency turnover: volume * close.
    pub fn amount(&self) -> f64 {
        self.volume * self.close
    }

    /// close - open
    pub fn change(&self) -> f64 {
        self.close - self.open
    }

    /// Percentage move from open to close, 0 when open is 0.
    pub fn percent(&self) -> f64 {
        if self.open == 0.0 {
            0.0
        } else {
            self.change() / self.open * 100.0
        }
    }

    /// `low <= open,close <= high`, all fields finite, volume non-negative.
    pub fn check_consistency(&self) -> Result<(), String> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err("non-finite price or volume".into());
        }
        if self.volume < 0.0 {
            return Err(format!("negative volume {}", self.volume));
        }
        if self.low > self.open.min(self.close) || self.high < self.open.max(self.close) {
            return Err(format!(
                "prices out of range: open={} high={} low={} close={}",
                self.open, self.high, self.low, self.close
            ));
        }
        Ok(())
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    /// ISO-8601 UTC rendering of the timestamp, empty if out of range.
    pub fn datetime_str(&self) -> String {
        self.datetime().map(|dt| dt.to_rfc3339()).unwrap_or_default()
    }
}
