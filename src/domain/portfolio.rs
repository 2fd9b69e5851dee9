//! Portfolio state: cash, open positions and the trade history.
//!
//! The portfolio is owned by the caller and threaded through the replay loop
//! by reference. Only [`crate::domain::execution`] mutates cash and
//! positions; trade records are append-only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::position::{Position, TradeRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    #[serde(default)]
    pub initial_cash: f64,
    pub cash: f64,
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
    #[serde(default)]
    pub trade_history: Vec<TradeRecord>,
    /// Last marked price per symbol, used for valuation.
    #[serde(default)]
    pub last_prices: BTreeMap<String, f64>,
    /// Timestamp of the last replayed bar. A resumed replay starts after it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<i64>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Portfolio {
            initial_cash,
            cash: initial_cash,
            positions: BTreeMap::new(),
            trade_history: Vec::new(),
            last_prices: BTreeMap::new(),
            as_of: None,
        }
    }

    /// Reject state no sequence of executed decisions could produce.
    pub fn check_invariants(&self) -> Result<(), String> {
        if !self.cash.is_finite() || self.cash < 0.0 {
            return Err(format!("cash must be finite and non-negative, got {}", self.cash));
        }
        if !self.initial_cash.is_finite() || self.initial_cash < 0.0 {
            return Err(format!(
                "initial_cash must be finite and non-negative, got {}",
                self.initial_cash
            ));
        }
        for (symbol, pos) in &self.positions {
            if !pos.quantity.is_finite() || pos.quantity <= 0.0 {
                return Err(format!("{symbol}: quantity must be positive, got {}", pos.quantity));
            }
            if !pos.entry_price.is_finite() || pos.entry_price <= 0.0 {
                return Err(format!(
                    "{symbol}: entry_price must be positive, got {}",
                    pos.entry_price
                ));
            }
        }
        Ok(())
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn held_quantity(&self, symbol: &str) -> f64 {
        self.positions.get(symbol).map_or(0.0, |p| p.quantity)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn record_trade(&mut self, trade: TradeRecord) {
        self.trade_history.push(trade);
    }

    pub fn mark_price(&mut self, symbol: &str, price: f64) {
        self.last_prices.insert(symbol.to_string(), price);
    }

    /// Marked price for a symbol, falling back to the position's entry price.
    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        self.last_prices
            .get(symbol)
            .copied()
            .or_else(|| self.positions.get(symbol).map(|p| p.entry_price))
    }

    pub fn positions_value(&self) -> f64 {
        self.positions
            .iter()
            .map(|(symbol, pos)| pos.market_value(self.price_of(symbol).unwrap_or(pos.entry_price)))
            .sum()
    }

    pub fn total_value(&self) -> f64 {
        self.cash + self.positions_value()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions
            .iter()
            .map(|(symbol, pos)| pos.unrealized_pnl(self.price_of(symbol).unwrap_or(pos.entry_price)))
            .sum()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.trade_history.iter().filter_map(|t| t.realized_pnl).sum()
    }

    /// (total value - initial cash) / initial cash * 100, 0 without initial cash.
    pub fn total_return_pct(&self) -> f64 {
        if self.initial_cash > 0.0 {
            (self.total_value() - self.initial_cash) / self.initial_cash * 100.0
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> PortfolioSummary {
        let positions = self
            .positions
            .iter()
            .map(|(symbol, pos)| {
                let current_price = self.price_of(symbol).unwrap_or(pos.entry_price);
                PositionSummary {
                    symbol: symbol.clone(),
                    quantity: pos.quantity,
                    entry_price: pos.entry_price,
                    current_price,
                    unrealized_pnl: pos.unrealized_pnl(current_price),
                    notional: pos.market_value(current_price),
                }
            })
            .collect();

        PortfolioSummary {
            initial_cash: self.initial_cash,
            available_cash: self.cash,
            total_value: self.total_value(),
            unrealized_pnl: self.unrealized_pnl(),
            total_return_pct: self.total_return_pct(),
            positions,
        }
    }
}

/// Read-only view of the portfolio handed to the decision function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub initial_cash: f64,
    pub available_cash: f64,
    pub total_value: f64,
    pub unrealized_pnl: f64,
    pub total_return_pct: f64,
    pub positions: Vec<PositionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSummary {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub unrealized_pnl: f64,
    pub notional: f64,
}
