//! Open positions and the append-only trade record.

use serde::{Deserialize, Serialize};

use crate::domain::decision::Action;

/// A long spot holding. Quantities are fractional coin amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    pub entry_price: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }

    /// Merge an additional fill, keeping a quantity-weighted entry price.
    pub fn add(&mut self, quantity: f64, price: f64) {
        let total = self.quantity + quantity;
        if total > 0.0 {
            self.entry_price = (self.quantity * self.entry_price + quantity * price) / total;
        }
        self.quantity = total;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: i64,
    pub symbol: String,
    pub action: Action,
    pub quantity: f64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<f64>,
    /// Why a decision was degraded to HOLD; absent for executed trades.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TradeRecord {
    pub fn is_rejection(&self) -> bool {
        self.note.is_some()
    }
}
