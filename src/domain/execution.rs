//! Decision validation and fill simulation.
//!
//! Fills happen at the snapshot's current price. A decision that would
//! overdraw cash or sell more than is held is rejected before anything is
//! mutated, so the portfolio invariants (`cash >= 0`, no negative holdings)
//! always hold.

use super::decision::{Action, Decision};
use super::error::TraderError;
use super::portfolio::Portfolio;
use super::position::{Position, TradeRecord};

/// Tolerance for float comparisons of cash and quantities.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Check a decision against the portfolio without mutating it.
///
/// Returns the quantity that would actually trade (the full holding for CLOSE).
pub fn validate_decision(
    portfolio: &Portfolio,
    decision: &Decision,
    price: f64,
) -> Result<f64, TraderError> {
    let invalid = |reason: String| TraderError::InvalidDecision {
        symbol: decision.symbol.clone(),
        reason,
    };

    if decision.action == Action::Hold {
        return Ok(0.0);
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(invalid(format!("no tradable price ({price})")));
    }

    match decision.action {
        Action::Hold => Ok(0.0),
        Action::Buy | Action::Sell if !decision.quantity.is_finite() || decision.quantity <= 0.0 => {
            Err(invalid(format!(
                "{} quantity must be positive, got {}",
                decision.action, decision.quantity
            )))
        }
        Action::Buy => {
            let cost = decision.quantity * price;
            if cost > portfolio.cash + QUANTITY_EPSILON {
                return Err(invalid(format!(
                    "buy of {} at {:.2} costs {:.2}, only {:.2} cash available",
                    decision.quantity, price, cost, portfolio.cash
                )));
            }
            Ok(decision.quantity)
        }
        Action::Sell => {
            let held = portfolio.held_quantity(&decision.symbol);
            if decision.quantity > held + QUANTITY_EPSILON {
                return Err(invalid(format!(
                    "sell of {} exceeds held quantity {}",
                    decision.quantity, held
                )));
            }
            Ok(decision.quantity.min(held))
        }
        Action::Close => {
            let held = portfolio.held_quantity(&decision.symbol);
            if held <= QUANTITY_EPSILON {
                return Err(invalid("close requested with no open position".to_string()));
            }
            Ok(held)
        }
    }
}

/// Validate and apply a decision.
///
/// HOLD yields `Ok(None)` and touches nothing. An executed trade is appended
/// to the trade history and returned. On error the portfolio is unchanged.
pub fn execute_decision(
    portfolio: &mut Portfolio,
    decision: &Decision,
    price: f64,
    timestamp: i64,
) -> Result<Option<TradeRecord>, TraderError> {
    let quantity = validate_decision(portfolio, decision, price)?;

    let record = match decision.action {
        Action::Hold => return Ok(None),
        Action::Buy => {
            let cost = quantity * price;
            portfolio.cash = (portfolio.cash - cost).max(0.0);
            portfolio
                .positions
                .entry(decision.symbol.clone())
                .and_modify(|p| p.add(quantity, price))
                .or_insert(Position {
                    quantity,
                    entry_price: price,
                });
            TradeRecord {
                timestamp,
                symbol: decision.symbol.clone(),
                action: Action::Buy,
                quantity,
                price,
                realized_pnl: None,
                note: None,
            }
        }
        Action::Sell | Action::Close => {
            let realized_pnl = reduce_position(portfolio, &decision.symbol, quantity, price);
            TradeRecord {
                timestamp,
                symbol: decision.symbol.clone(),
                action: decision.action,
                quantity,
                price,
                realized_pnl: Some(realized_pnl),
                note: None,
            }
        }
    };

    portfolio.record_trade(record.clone());
    Ok(Some(record))
}

/// Append a HOLD record explaining why a decision was not applied.
pub fn record_rejection(
    portfolio: &mut Portfolio,
    symbol: &str,
    price: f64,
    timestamp: i64,
    reason: &str,
) -> TradeRecord {
    let record = TradeRecord {
        timestamp,
        symbol: symbol.to_string(),
        action: Action::Hold,
        quantity: 0.0,
        price,
        realized_pnl: None,
        note: Some(reason.to_string()),
    };
    portfolio.record_trade(record.clone());
    record
}

fn reduce_position(portfolio: &mut Portfolio, symbol: &str, quantity: f64, price: f64) -> f64 {
    let Some(position) = portfolio.positions.get_mut(symbol) else {
        return 0.0;
    };
    let realized = quantity * (price - position.entry_price);
    position.quantity -= quantity;
    if position.quantity <= QUANTITY_EPSILON {
        portfolio.positions.remove(symbol);
    }
    portfolio.cash += quantity * price;
    realized
}
