//! Trading symbol identifiers.
//!
//! Symbols become part of a filename, so they are checked against an
//! alphanumeric allow-list before anything touches the filesystem.

use crate::domain::error::TraderError;
use std::collections::HashSet;

pub const MAX_SYMBOL_LEN: usize = 20;

/// Accept only non-empty ASCII alphanumeric identifiers.
pub fn validate_symbol(symbol: &str) -> Result<(), TraderError> {
    let invalid = |reason: &str| TraderError::InvalidSymbolFormat {
        symbol: symbol.to_string(),
        reason: reason.to_string(),
    };

    if symbol.is_empty() {
        return Err(invalid("symbol is empty"));
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(invalid("symbol is too long"));
    }
    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid("only ASCII letters and digits are allowed"));
    }
    Ok(())
}

/// Parse a comma-separated symbol list, upper-casing and validating each entry.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, TraderError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(TraderError::InvalidSymbolFormat {
                symbol: input.to_string(),
                reason: "empty entry in symbol list".into(),
            });
        }
        let symbol = trimmed.to_uppercase();
        validate_symbol(&symbol)?;
        if !seen.insert(symbol.clone()) {
            return Err(TraderError::InvalidSymbolFormat {
                symbol,
                reason: "duplicate symbol".into(),
            });
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_alphanumeric() {
        assert!(validate_symbol("BTC").is_ok());
        assert!(validate_symbol("1INCH").is_ok());
    }

    #[test]
    fn rejects_traversal() {
        for bad in ["../../etc/passwd", "..", "BTC/ETH", "a\\b", "./BTC", "BTC.csv"] {
            let err = validate_symbol(bad).unwrap_err();
            assert!(
                matches!(err, TraderError::InvalidSymbolFormat { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_empty_and_whitespace() {
        assert!(validate_symbol("").is_err());
        assert!(validate_symbol("BT C").is_err());
    }

    #[test]
    fn rejects_non_ascii() {
        assert!(validate_symbol("ВТС").is_err());
    }

    #[test]
    fn rejects_overlong() {
        assert!(validate_symbol(&"A".repeat(MAX_SYMBOL_LEN + 1)).is_err());
    }

    #[test]
    fn parse_symbols_uppercases_and_trims() {
        let symbols = parse_symbols(" btc, Eth ,SOL").unwrap();
        assert_eq!(symbols, vec!["BTC", "ETH", "SOL"]);
    }

    #[test]
    fn parse_symbols_rejects_duplicate() {
        assert!(parse_symbols("BTC,btc").is_err());
    }

    #[test]
    fn parse_symbols_rejects_empty_token() {
        assert!(parse_symbols("BTC,,ETH").is_err());
    }

    #[test]
    fn parse_symbols_rejects_unsafe_entry() {
        assert!(parse_symbols("BTC,../ETH").is_err());
    }
}
