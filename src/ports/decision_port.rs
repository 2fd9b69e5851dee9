//! Decision function port.

use std::time::Duration;

use crate::domain::decision::Decision;
use crate::domain::error::TransportError;
use crate::domain::portfolio::PortfolioSummary;
use crate::domain::snapshot::MarketSnapshot;

/// Blocking decision call with an explicit deadline.
///
/// Implementations must give up after `timeout` and report it as a
/// [`TransportError`]; the replay loop degrades that step to HOLD.
pub trait DecisionPort {
    fn decide(
        &self,
        snapshot: &MarketSnapshot,
        portfolio: &PortfolioSummary,
        timeout: Duration,
    ) -> Result<Decision, TransportError>;
}

impl<F> DecisionPort for F
where
    F: Fn(&MarketSnapshot, &PortfolioSummary) -> Result<Decision, TransportError>,
{
    fn decide(
        &self,
        snapshot: &MarketSnapshot,
        portfolio: &PortfolioSummary,
        _timeout: Duration,
    ) -> Result<Decision, TransportError> {
        self(snapshot, portfolio)
    }
}
