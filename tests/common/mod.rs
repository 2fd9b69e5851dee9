#![allow(dead_code)]

use replaytrader::domain::decision::Decision;
use replaytrader::domain::error::{TraderError, TransportError};
pub use replaytrader::domain::ohlcv::OhlcvBar;
use replaytrader::domain::portfolio::{Portfolio, PortfolioSummary};
use replaytrader::domain::snapshot::MarketSnapshot;
use replaytrader::ports::data_port::SymbolDataProvider;
use replaytrader::ports::decision_port::DecisionPort;
use replaytrader::ports::portfolio_store_port::PortfolioStorePort;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

pub const START_TS: i64 = 1_700_000_000;
pub const STEP_SECS: i64 = 180;

/// Flat-bodied bar with a 1.0 wick either side.
pub fn make_bar(timestamp: i64, close: f64) -> OhlcvBar {
    OhlcvBar {
        timestamp,
        open: close,
        high: close + 1.0,
        low: (close - 1.0).max(0.0),
        close,
        volume: 100.0,
    }
}

pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(START_TS + i as i64 * STEP_SECS, c))
        .collect()
}

/// Linear ramp from `start` by `step` per bar.
pub fn ramp(count: usize, start: f64, step: f64) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

pub fn write_symbol_csv(dir: &Path, symbol: &str, bars: &[OhlcvBar]) {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    std::fs::write(dir.join(format!("{symbol}_historical.csv")), out).unwrap();
}

/// In-memory provider with the same shared-cursor semantics as the file
/// provider.
pub struct MockDataProvider {
    pub symbols: Vec<String>,
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub cursor: usize,
}

impl MockDataProvider {
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            data: HashMap::new(),
            cursor: 0,
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.symbols.push(symbol.to_string());
        self.data.insert(symbol.to_string(), bars);
        self
    }

    fn bar(&self, symbol: &str) -> Result<&OhlcvBar, TraderError> {
        let bars = self.data.get(symbol).ok_or_else(|| TraderError::NotFound {
            symbol: symbol.to_string(),
        })?;
        bars.get(self.cursor).ok_or_else(|| TraderError::NoDataAtCursor {
            symbol: symbol.to_string(),
            cursor: self.cursor,
        })
    }
}

impl SymbolDataProvider for MockDataProvider {
    fn get_last_price(&self, symbol: &str) -> Result<f64, TraderError> {
        Ok(self.bar(symbol)?.close)
    }

    fn get_kline_data(
        &self,
        symbol: &str,
        _period: &str,
        count: usize,
    ) -> Result<Vec<OhlcvBar>, TraderError> {
        self.bar(symbol)?;
        let end = self.cursor + 1;
        Ok(self.data[symbol][end.saturating_sub(count)..end].to_vec())
    }

    fn get_current_timestamp(&self) -> Result<i64, TraderError> {
        let symbol = self.symbols.first().ok_or_else(|| TraderError::NotFound {
            symbol: String::new(),
        })?;
        Ok(self.bar(symbol)?.timestamp)
    }

    fn advance(&mut self) -> bool {
        if self.data.values().any(|bars| self.cursor + 1 >= bars.len()) {
            return false;
        }
        self.cursor += 1;
        true
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Replays a fixed script of responses, then HOLDs. Records every snapshot
/// it was shown.
pub struct ScriptedDecider {
    script: RefCell<VecDeque<Result<Decision, TransportError>>>,
    pub seen: RefCell<Vec<MarketSnapshot>>,
    pub timeouts: RefCell<Vec<Duration>>,
}

impl ScriptedDecider {
    pub fn new(script: Vec<Result<Decision, TransportError>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            seen: RefCell::new(Vec::new()),
            timeouts: RefCell::new(Vec::new()),
        }
    }

    pub fn holding() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.seen.borrow().len()
    }
}

impl DecisionPort for ScriptedDecider {
    fn decide(
        &self,
        snapshot: &MarketSnapshot,
        _portfolio: &PortfolioSummary,
        timeout: Duration,
    ) -> Result<Decision, TransportError> {
        self.seen.borrow_mut().push(snapshot.clone());
        self.timeouts.borrow_mut().push(timeout);
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(Decision::hold(&snapshot.symbol)))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub saves: RefCell<Vec<Portfolio>>,
}

impl PortfolioStorePort for MemoryStore {
    fn load(&self) -> Result<Option<Portfolio>, TraderError> {
        Ok(self.saves.borrow().last().cloned())
    }

    fn save(&self, portfolio: &Portfolio) -> Result<(), TraderError> {
        self.saves.borrow_mut().push(portfolio.clone());
        Ok(())
    }
}
