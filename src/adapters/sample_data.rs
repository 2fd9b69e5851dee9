//! Synthetic historical data generator.
//!
//! Produces `{SYMBOL}_historical.csv` files with a log-normal random walk and
//! a small upward drift, for trying the replay loop without real market data.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::info;

use crate::adapters::csv_adapter::FILE_SUFFIX;
use crate::domain::error::TraderError;
use crate::domain::ohlcv::OhlcvBar;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleAsset {
    pub symbol: String,
    pub start_price: f64,
    /// Standard deviation of per-bar log returns.
    pub volatility: f64,
}

impl SampleAsset {
    pub fn new(symbol: &str, start_price: f64, volatility: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            start_price,
            volatility,
        }
    }
}

pub fn default_assets() -> Vec<SampleAsset> {
    vec![
        SampleAsset::new("BTC", 45_000.0, 0.02),
        SampleAsset::new("ETH", 3_000.0, 0.025),
        SampleAsset::new("SOL", 100.0, 0.03),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub days: u32,
    pub interval_minutes: u32,
    pub seed: u64,
    pub start_timestamp: i64,
    /// Total log drift spread over the whole series.
    pub total_drift: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            days: 30,
            interval_minutes: 3,
            seed: 42,
            start_timestamp: 1_700_000_000,
            total_drift: 0.1,
        }
    }
}

/// Upper bound on bars per series; larger requests are almost certainly typos.
pub const MAX_BARS: usize = 10_000_000;
const MINUTES_PER_DAY: u32 = 24 * 60;

impl GeneratorConfig {
    /// Bars per series, `None` when the interval is zero or the count
    /// overflows.
    pub fn bar_count(&self) -> Option<usize> {
        if self.interval_minutes == 0 {
            return None;
        }
        let per_day = usize::try_from(MINUTES_PER_DAY / self.interval_minutes).ok()?;
        usize::try_from(self.days).ok()?.checked_mul(per_day)
    }

    /// Bar count of a usable config: at least one bar, an interval of at
    /// most one day and no more than [`MAX_BARS`].
    pub fn validate(&self) -> Result<usize, TraderError> {
        let invalid = |key: &str, reason: String| TraderError::ConfigInvalid {
            section: "generate".into(),
            key: key.into(),
            reason,
        };
        if self.days == 0 {
            return Err(invalid("days", "must be at least 1".into()));
        }
        if self.interval_minutes == 0 || self.interval_minutes > MINUTES_PER_DAY {
            return Err(invalid(
                "interval_minutes",
                format!("must be between 1 and {MINUTES_PER_DAY}, got {}", self.interval_minutes),
            ));
        }
        match self.bar_count() {
            Some(count) if count <= MAX_BARS => Ok(count),
            _ => Err(invalid(
                "days",
                format!(
                    "{} days at {} minute bars exceeds {MAX_BARS} bars",
                    self.days, self.interval_minutes
                ),
            )),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Log-normal walk: per-bar log returns are drawn from
/// `Normal(total_drift / count, volatility)`.
pub fn generate_series(
    asset: &SampleAsset,
    config: &GeneratorConfig,
    rng: &mut StdRng,
) -> Result<Vec<OhlcvBar>, TraderError> {
    let count = config.validate()?;
    let step = i64::from(config.interval_minutes) * 60;
    let drift = config.total_drift / count as f64;
    let returns = Normal::new(drift, asset.volatility).map_err(|e| TraderError::ConfigInvalid {
        section: "generate".into(),
        key: format!("{}.volatility", asset.symbol),
        reason: e.to_string(),
    })?;

    let mut bars = Vec::with_capacity(count);
    let mut prev_close = round2(asset.start_price);
    let mut timestamp = config.start_timestamp;
    for _ in 0..count {
        let ret: f64 = returns.sample(rng);
        let open = prev_close;
        let close = round2(open * ret.exp()).max(0.01);
        let wick = rng.gen_range(0.005..0.015);
        let high = round2(open.max(close) * (1.0 + wick));
        let low = round2(open.min(close) * (1.0 - wick)).max(0.01).min(open.min(close));
        let volume = round2(rng.gen_range(50.0..200.0));

        bars.push(OhlcvBar {
            timestamp,
            open,
            high: high.max(open.max(close)),
            low,
            close,
            volume,
        });
        prev_close = close;
        timestamp += step;
    }
    Ok(bars)
}

pub fn write_series(path: &Path, bars: &[OhlcvBar]) -> Result<(), TraderError> {
    let mut wtr = csv::Writer::from_path(path).map_err(io::Error::from)?;
    for bar in bars {
        wtr.serialize(bar).map_err(io::Error::from)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write one CSV per asset into `output_dir`. Each asset gets its own
/// generator seeded from `config.seed`, so output is reproducible.
pub fn generate_sample_data(
    output_dir: &Path,
    assets: &[SampleAsset],
    config: &GeneratorConfig,
) -> Result<Vec<PathBuf>, TraderError> {
    config.validate()?;
    fs::create_dir_all(output_dir)?;
    let mut written = Vec::with_capacity(assets.len());
    for (i, asset) in assets.iter().enumerate() {
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
        let bars = generate_series(asset, config, &mut rng)?;
        let path = output_dir.join(format!("{}{FILE_SUFFIX}", asset.symbol));
        write_series(&path, &bars)?;
        info!(symbol = %asset.symbol, bars = bars.len(), path = %path.display(), "sample data written");
        written.push(path);
    }
    Ok(written)
}
