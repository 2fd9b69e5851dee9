//! Domain error types.

use std::path::PathBuf;

/// Failure of the decision function's external call.
///
/// Kept separate from [`TraderError`] so the decision boundary reads
/// `Result<Decision, TransportError>`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("decision transport failed for {symbol}: {reason}")]
pub struct TransportError {
    pub symbol: String,
    pub reason: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(symbol: &str, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            reason: reason.into(),
            timed_out: false,
        }
    }

    pub fn timeout(symbol: &str, reason: impl Into<String>) -> Self {
        Self {
            timed_out: true,
            ..Self::new(symbol, reason)
        }
    }
}

/// Top-level error type for replaytrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("historical data file for {symbol} not found: {}", path.display())]
    DataFileNotFound { symbol: String, path: PathBuf },

    #[error("invalid symbol {symbol:?}: {reason}")]
    InvalidSymbolFormat { symbol: String, reason: String },

    #[error("malformed historical data in {} at line {line}: {reason}", path.display())]
    MalformedHistoricalData {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("symbol {symbol} is not loaded")]
    NotFound { symbol: String },

    #[error("no data for {symbol} at cursor {cursor}")]
    NoDataAtCursor { symbol: String, cursor: usize },

    #[error(transparent)]
    DecisionTransport(#[from] TransportError),

    #[error("invalid decision for {symbol}: {reason}")]
    InvalidDecision { symbol: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("portfolio snapshot {}: {reason}", path.display())]
    Snapshot { path: PathBuf, reason: String },

    #[error("snapshot already replayed through {as_of}, data ends at {last}; start fresh to replay again")]
    ResumeBeyondData { as_of: i64, last: i64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    /// Per-step errors the replay loop degrades to HOLD instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TraderError::DecisionTransport(_) | TraderError::InvalidDecision { .. }
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::DataFileNotFound { .. }
            | TraderError::InvalidSymbolFormat { .. }
            | TraderError::MalformedHistoricalData { .. }
            | TraderError::NotFound { .. }
            | TraderError::NoDataAtCursor { .. } => 3,
            TraderError::Snapshot { .. } | TraderError::ResumeBeyondData { .. } => 4,
            TraderError::DecisionTransport(_) | TraderError::InvalidDecision { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
