//! CSV historical data provider.
//!
//! Loads one `{SYMBOL}_historical.csv` per symbol into memory and replays it
//! through a single cursor shared by every symbol.

use crate::domain::error::TraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::symbol::validate_symbol;
use crate::ports::data_port::SymbolDataProvider;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const FILE_SUFFIX: &str = "_historical.csv";
pub const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

pub struct FileDataProvider {
    data_dir: PathBuf,
    symbols: Vec<String>,
    series: HashMap<String, Vec<OhlcvBar>>,
    cursor: usize,
}

impl FileDataProvider {
    /// Load every symbol's series. The list must be non-empty, and all
    /// symbols are validated before any filesystem access.
    pub fn load(data_dir: impl Into<PathBuf>, symbols: &[String]) -> Result<Self, TraderError> {
        let data_dir = data_dir.into();
        if symbols.is_empty() {
            return Err(TraderError::ConfigMissing {
                section: "replay".into(),
                key: "symbols".into(),
            });
        }
        for symbol in symbols {
            validate_symbol(symbol)?;
        }

        let mut series = HashMap::with_capacity(symbols.len());
        for symbol in symbols {
            let path = resolve_data_file(&data_dir, symbol)?;
            let bars = read_series(&path)?;
            info!(
                symbol = %symbol,
                path = %path.display(),
                bars = bars.len(),
                "loaded historical data"
            );
            series.insert(symbol.clone(), bars);
        }

        Ok(Self {
            data_dir,
            symbols: symbols.to_vec(),
            series,
            cursor: 0,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of steps the shared cursor can visit (the shortest series).
    pub fn len(&self) -> usize {
        self.series.values().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn series(&self, symbol: &str) -> Option<&[OhlcvBar]> {
        self.series.get(symbol).map(Vec::as_slice)
    }

    /// `(first_timestamp, last_timestamp, bar_count)` for a loaded symbol.
    pub fn data_range(&self, symbol: &str) -> Option<(i64, i64, usize)> {
        let bars = self.series.get(symbol)?;
        let first = bars.first()?;
        let last = bars.last()?;
        Some((first.timestamp, last.timestamp, bars.len()))
    }

    fn bars_for(&self, symbol: &str) -> Result<&[OhlcvBar], TraderError> {
        self.series
            .get(symbol)
            .map(Vec::as_slice)
            .ok_or_else(|| TraderError::NotFound {
                symbol: symbol.to_string(),
            })
    }

    fn bar_at_cursor(&self, symbol: &str) -> Result<&OhlcvBar, TraderError> {
        self.bars_for(symbol)?
            .get(self.cursor)
            .ok_or_else(|| TraderError::NoDataAtCursor {
                symbol: symbol.to_string(),
                cursor: self.cursor,
            })
    }
}

impl SymbolDataProvider for FileDataProvider {
    fn get_last_price(&self, symbol: &str) -> Result<f64, TraderError> {
        Ok(self.bar_at_cursor(symbol)?.close)
    }

    fn get_kline_data(
        &self,
        symbol: &str,
        _period: &str,
        count: usize,
    ) -> Result<Vec<OhlcvBar>, TraderError> {
        let bars = self.bars_for(symbol)?;
        if self.cursor >= bars.len() {
            return Err(TraderError::NoDataAtCursor {
                symbol: symbol.to_string(),
                cursor: self.cursor,
            });
        }
        let end = self.cursor + 1;
        let start = end.saturating_sub(count);
        Ok(bars[start..end].to_vec())
    }

    fn get_current_timestamp(&self) -> Result<i64, TraderError> {
        let Some(symbol) = self.symbols.first() else {
            return Err(TraderError::NotFound {
                symbol: String::new(),
            });
        };
        Ok(self.bar_at_cursor(symbol)?.timestamp)
    }

    fn advance(&mut self) -> bool {
        let next = self.cursor + 1;
        if let Some((symbol, _)) = self.series.iter().find(|(_, bars)| next >= bars.len()) {
            debug!(symbol = %symbol, cursor = self.cursor, "series exhausted");
            return false;
        }
        self.cursor = next;
        true
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

/// Build `{data_dir}/{SYMBOL}_historical.csv` and confirm it resolves inside
/// `data_dir`.
pub fn resolve_data_file(data_dir: &Path, symbol: &str) -> Result<PathBuf, TraderError> {
    validate_symbol(symbol)?;
    let path = data_dir.join(format!("{symbol}{FILE_SUFFIX}"));
    if !path.is_file() {
        return Err(TraderError::DataFileNotFound {
            symbol: symbol.to_string(),
            path,
        });
    }

    let root = data_dir.canonicalize()?;
    let resolved = path.canonicalize()?;
    if !resolved.starts_with(&root) {
        return Err(TraderError::InvalidSymbolFormat {
            symbol: symbol.to_string(),
            reason: format!("{} resolves outside the data directory", path.display()),
        });
    }
    Ok(resolved)
}

/// Parse one historical CSV file, failing fast on the first bad row.
pub fn read_series(path: &Path) -> Result<Vec<OhlcvBar>, TraderError> {
    let malformed = |line: u64, reason: String| TraderError::MalformedHistoricalData {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let file = File::open(path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = rdr
        .headers()
        .map_err(|e| malformed(1, format!("unreadable header: {e}")))?
        .clone();
    let mut index = [0usize; 6];
    for (slot, column) in index.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(column))
            .ok_or_else(|| malformed(1, format!("missing column {column:?}")))?;
    }

    let mut bars: Vec<OhlcvBar> = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| {
            let line = e.position().map_or(0, |p| p.line());
            malformed(line, e.to_string())
        })?;
        let line = record.position().map_or(0, |p| p.line());

        let field = |i: usize| -> Result<&str, TraderError> {
            record
                .get(index[i])
                .ok_or_else(|| malformed(line, format!("missing {} value", COLUMNS[i])))
        };
        let number = |i: usize| -> Result<f64, TraderError> {
            let raw = field(i)?;
            raw.parse::<f64>()
                .map_err(|_| malformed(line, format!("non-numeric {} value {raw:?}", COLUMNS[i])))
        };

        let raw_ts = field(0)?;
        let timestamp = raw_ts
            .parse::<i64>()
            .map_err(|_| malformed(line, format!("non-integer timestamp {raw_ts:?}")))?;

        let bar = OhlcvBar {
            timestamp,
            open: number(1)?,
            high: number(2)?,
            low: number(3)?,
            close: number(4)?,
            volume: number(5)?,
        };
        bar.check_consistency().map_err(|reason| malformed(line, reason))?;

        if let Some(prev) = bars.last() {
            if bar.timestamp <= prev.timestamp {
                return Err(malformed(
                    line,
                    format!(
                        "timestamp {} is not after previous {}",
                        bar.timestamp, prev.timestamp
                    ),
                ));
            }
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(malformed(1, "no data rows".into()));
    }
    Ok(bars)
}
