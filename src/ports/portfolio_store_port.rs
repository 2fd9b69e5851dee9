//! Portfolio snapshot persistence port.

use crate::domain::error::TraderError;
use crate::domain::portfolio::Portfolio;

pub trait PortfolioStorePort {
    /// `Ok(None)` when no snapshot has been written yet.
    fn load(&self) -> Result<Option<Portfolio>, TraderError>;

    fn save(&self, portfolio: &Portfolio) -> Result<(), TraderError>;
}
