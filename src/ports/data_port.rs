//! Symbol Data Provider port.
//!
//! Live exchange feeds and historical file replay both implement this trait,
//! so the replay loop never knows which one it is driving.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::OhlcvBar;

pub trait SymbolDataProvider {
    /// Close of the bar at the current cursor.
    fn get_last_price(&self, symbol: &str) -> Result<f64, TraderError>;

    /// Up to `count` bars ending at the current cursor, oldest-first.
    ///
    /// `period` is a timeframe label; providers that cannot resample treat
    /// it as informational.
    fn get_kline_data(
        &self,
        symbol: &str,
        period: &str,
        count: usize,
    ) -> Result<Vec<OhlcvBar>, TraderError>;

    fn get_current_timestamp(&self) -> Result<i64, TraderError>;

    /// Step forward one bar. `false` means end-of-data; the cursor stays put.
    fn advance(&mut self) -> bool;

    fn reset(&mut self);
}
