//! Trade decisions returned by the decision function.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Hold,
    Buy,
    Sell,
    /// Sell the entire held quantity.
    Close,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Hold => "HOLD",
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Close => "CLOSE",
        };
        f.write_str(s)
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hold" => Ok(Action::Hold),
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            "close" => Ok(Action::Close),
            other => Err(format!("unknown trade signal {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub symbol: String,
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl Decision {
    pub fn new(action: Action, symbol: &str, quantity: f64) -> Self {
        Decision {
            action,
            symbol: symbol.to_string(),
            quantity,
            confidence: None,
            rationale: None,
        }
    }

    pub fn hold(symbol: &str) -> Self {
        Decision::new(Action::Hold, symbol, 0.0)
    }

    pub fn buy(symbol: &str, quantity: f64) -> Self {
        Decision::new(Action::Buy, symbol, quantity)
    }

    pub fn sell(symbol: &str, quantity: f64) -> Self {
        Decision::new(Action::Sell, symbol, quantity)
    }

    pub fn close(symbol: &str) -> Self {
        Decision::new(Action::Close, symbol, 0.0)
    }
}
