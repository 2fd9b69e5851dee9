//! Configuration validation.
//!
//! Validates all config fields before a replay runs.

use crate::domain::error::TraderError;
use crate::domain::symbol::parse_symbols;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_SYMBOLS: &str = "BTC,ETH,SOL";
pub const DEFAULT_EMA_PERIODS: &str = "20,50";
pub const DEFAULT_RSI_PERIODS: &str = "7,14";
pub const DEFAULT_ATR_PERIODS: &str = "3,14";

pub fn validate_replay_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    validate_initial_cash(config)?;
    validate_at_least_one(config, "replay", "kline_count", 10)?;
    validate_at_least_one(config, "replay", "persist_interval", 1)?;
    validate_at_least_one(config, "replay", "display_interval", 100)?;
    validate_at_least_one(config, "replay", "decision_timeout_secs", 30)?;
    validate_symbols(config)?;
    validate_indicator_config(config)?;
    Ok(())
}

pub fn validate_indicator_config(config: &dyn ConfigPort) -> Result<(), TraderError> {
    parse_periods(config, "ema_periods", DEFAULT_EMA_PERIODS)?;
    parse_periods(config, "rsi_periods", DEFAULT_RSI_PERIODS)?;
    parse_periods(config, "atr_periods", DEFAULT_ATR_PERIODS)?;
    macd_params(config)?;
    Ok(())
}

/// Comma-separated period list from `[indicators]`; every entry must be >= 1.
/// An explicitly empty value disables that indicator family.
pub fn parse_periods(
    config: &dyn ConfigPort,
    key: &str,
    default: &str,
) -> Result<Vec<usize>, TraderError> {
    let raw = config
        .get_string("indicators", key)
        .unwrap_or_else(|| default.to_string());
    let mut periods = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<usize>() {
            Ok(p) if p >= 1 => {
                if !periods.contains(&p) {
                    periods.push(p);
                }
            }
            _ => {
                return Err(TraderError::ConfigInvalid {
                    section: "indicators".to_string(),
                    key: key.to_string(),
                    reason: format!("invalid period {token:?}, expected a positive integer"),
                });
            }
        }
    }
    Ok(periods)
}

/// `(fast, slow, signal)` from `[indicators]`.
pub fn macd_params(config: &dyn ConfigPort) -> Result<(usize, usize, usize), TraderError> {
    let fast = config.get_int("indicators", "macd_fast", 12);
    let slow = config.get_int("indicators", "macd_slow", 26);
    let signal = config.get_int("indicators", "macd_signal", 9);

    for (key, value) in [("macd_fast", fast), ("macd_slow", slow), ("macd_signal", signal)] {
        if value < 1 {
            return Err(TraderError::ConfigInvalid {
                section: "indicators".to_string(),
                key: key.to_string(),
                reason: format!("{key} must be at least 1"),
            });
        }
    }
    if fast >= slow {
        return Err(TraderError::ConfigInvalid {
            section: "indicators".to_string(),
            key: "macd_fast".to_string(),
            reason: "macd_fast must be less than macd_slow".to_string(),
        });
    }
    Ok((fast as usize, slow as usize, signal as usize))
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), TraderError> {
    let value = config.get_double("portfolio", "initial_cash", 10_000.0);
    if !value.is_finite() || value <= 0.0 {
        return Err(TraderError::ConfigInvalid {
            section: "portfolio".to_string(),
            key: "initial_cash".to_string(),
            reason: "initial_cash must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_at_least_one(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), TraderError> {
    if config.get_int(section, key, default) < 1 {
        return Err(TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{key} must be at least 1"),
        });
    }
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), TraderError> {
    match config.get_string("replay", "symbols") {
        Some(s) if s.trim().is_empty() => Err(TraderError::ConfigMissing {
            section: "replay".to_string(),
            key: "symbols".to_string(),
        }),
        Some(s) => parse_symbols(&s).map(|_| ()),
        None => Ok(()),
    }
}
