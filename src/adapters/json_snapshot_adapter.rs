//! JSON portfolio snapshot store.
//!
//! Writes go to a temp file in the destination directory which is then
//! renamed over the target, so readers only ever see a complete snapshot.

use crate::domain::error::TraderError;
use crate::domain::portfolio::Portfolio;
use crate::ports::portfolio_store_port::PortfolioStorePort;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn snapshot_error(&self, reason: impl ToString) -> TraderError {
        TraderError::Snapshot {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}

impl PortfolioStorePort for JsonSnapshotStore {
    fn load(&self) -> Result<Option<Portfolio>, TraderError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path)?;
        let mut portfolio: Portfolio = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| self.snapshot_error(e))?;
        if portfolio.initial_cash <= 0.0 {
            portfolio.initial_cash = portfolio.cash;
        }
        portfolio
            .check_invariants()
            .map_err(|reason| self.snapshot_error(reason))?;
        debug!(path = %self.path.display(), "portfolio snapshot loaded");
        Ok(Some(portfolio))
    }

    fn save(&self, portfolio: &Portfolio) -> Result<(), TraderError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, portfolio)
                .map_err(|e| self.snapshot_error(e))?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| self.snapshot_error(e.error))?;
        debug!(path = %self.path.display(), "portfolio snapshot written");
        Ok(())
    }
}
