//! Backtest replay loop.
//!
//! Each step is strictly sequential: snapshot → decide → apply → persist →
//! advance. A decision is only ever computed from bars up to and including
//! the current cursor.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::TraderError;
use super::execution::{execute_decision, record_rejection};
use super::indicator_helpers::IndicatorSet;
use super::portfolio::Portfolio;
use super::snapshot::{MarketSnapshot, build_snapshot};
use crate::ports::data_port::SymbolDataProvider;
use crate::ports::decision_port::DecisionPort;
use crate::ports::portfolio_store_port::PortfolioStorePort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub data_dir: PathBuf,
    pub symbols: Vec<String>,
    pub period: String,
    pub kline_count: usize,
    /// Persist the portfolio every N steps.
    pub persist_interval: usize,
    /// Log prices and portfolio metrics every N steps.
    pub display_interval: usize,
    pub decision_timeout: Duration,
    pub snapshot_path: PathBuf,
    pub initial_cash: f64,
    pub indicators: IndicatorSet,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            data_dir: PathBuf::from("historical_data"),
            symbols: vec!["BTC".into(), "ETH".into(), "SOL".into()],
            period: "3m".into(),
            kline_count: 10,
            persist_interval: 1,
            display_interval: 100,
            decision_timeout: Duration::from_secs(30),
            snapshot_path: PathBuf::from("backtest_portfolio.json"),
            initial_cash: 10_000.0,
            indicators: IndicatorSet::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    /// Not enough history for every configured indicator; no decisions.
    WarmingUp,
    Active,
    /// End-of-data or stop requested. Terminal.
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSummary {
    pub steps: usize,
    pub decision_steps: usize,
    pub trades_executed: usize,
    pub rejections: usize,
    pub initial_cash: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub last_timestamp: Option<i64>,
}

pub struct Orchestrator<'a> {
    config: &'a BacktestConfig,
    provider: &'a mut dyn SymbolDataProvider,
    decider: &'a dyn DecisionPort,
    store: Option<&'a dyn PortfolioStorePort>,
    stop: Option<Arc<AtomicBool>>,
    state: ReplayState,
    steps: usize,
    decision_steps: usize,
    trades_executed: usize,
    rejections: usize,
    last_timestamp: Option<i64>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a BacktestConfig,
        provider: &'a mut dyn SymbolDataProvider,
        decider: &'a dyn DecisionPort,
    ) -> Self {
        Orchestrator {
            config,
            provider,
            decider,
            store: None,
            stop: None,
            state: ReplayState::WarmingUp,
            steps: 0,
            decision_steps: 0,
            trades_executed: 0,
            rejections: 0,
            last_timestamp: None,
        }
    }

    pub fn with_store(mut self, store: &'a dyn PortfolioStorePort) -> Self {
        self.store = Some(store);
        self
    }

    /// Checked between steps; once set the loop finishes as at end-of-data.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Run until FINISHED and return the summary.
    pub fn run(&mut self, portfolio: &mut Portfolio) -> Result<BacktestSummary, TraderError> {
        info!(
            symbols = ?self.config.symbols,
            warmup_bars = self.config.indicators.warmup_bars(),
            "starting replay"
        );
        if self.steps == 0 {
            self.resume(portfolio)?;
        }
        while self.state != ReplayState::Finished {
            self.step(portfolio)?;
        }
        let summary = self.summary(portfolio);
        info!(
            steps = summary.steps,
            trades = summary.trades_executed,
            rejections = summary.rejections,
            final_value = summary.final_value,
            total_return_pct = summary.total_return_pct,
            "replay finished"
        );
        Ok(summary)
    }

    /// Move the provider past the bar a resumed portfolio was last replayed
    /// at. Returns the number of bars skipped.
    pub fn resume(&mut self, portfolio: &Portfolio) -> Result<usize, TraderError> {
        let Some(as_of) = portfolio.as_of else {
            return Ok(0);
        };
        let mut skipped = 0;
        loop {
            let timestamp = self.provider.get_current_timestamp()?;
            if timestamp > as_of {
                break;
            }
            if !self.provider.advance() {
                return Err(TraderError::ResumeBeyondData {
                    as_of,
                    last: timestamp,
                });
            }
            skipped += 1;
        }
        info!(as_of, skipped, "resuming after snapshot position");
        Ok(skipped)
    }

    /// Process the bar at the current cursor, then advance.
    pub fn step(&mut self, portfolio: &mut Portfolio) -> Result<ReplayState, TraderError> {
        if self.state == ReplayState::Finished {
            return Ok(self.state);
        }
        self.steps += 1;
        let timestamp = self.provider.get_current_timestamp()?;
        self.last_timestamp = Some(timestamp);

        let mut snapshots = Vec::with_capacity(self.config.symbols.len());
        for symbol in &self.config.symbols {
            let snapshot = build_snapshot(
                &*self.provider,
                symbol,
                &self.config.period,
                self.config.kline_count,
                &self.config.indicators,
            )?;
            portfolio.mark_price(symbol, snapshot.current_price);
            snapshots.push(snapshot);
        }

        self.state = if snapshots.iter().all(MarketSnapshot::is_warmed_up) {
            ReplayState::Active
        } else {
            ReplayState::WarmingUp
        };

        if self.state == ReplayState::Active {
            self.decision_steps += 1;
            for snapshot in &snapshots {
                self.decide_and_apply(snapshot, portfolio)?;
            }
        } else {
            debug!(step = self.steps, timestamp, "warming up, no decision");
        }
        portfolio.as_of = Some(timestamp);

        if self.steps % self.config.persist_interval.max(1) == 0 {
            if let Err(e) = self.persist(portfolio) {
                warn!(error = %e, "periodic portfolio persist failed");
            }
        }
        if self.steps == 1 || self.steps % self.config.display_interval.max(1) == 0 {
            self.display(&snapshots, portfolio, timestamp);
        }

        let stop_requested = self
            .stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst));
        if stop_requested {
            info!(step = self.steps, "stop requested");
            self.finish(portfolio)?;
        } else if !self.provider.advance() {
            debug!(step = self.steps, timestamp, "end of historical data");
            self.finish(portfolio)?;
        }

        Ok(self.state)
    }

    /// Rewind the provider for another pass over the same data.
    pub fn rewind(&mut self) {
        self.provider.reset();
        self.state = ReplayState::WarmingUp;
        self.steps = 0;
        self.decision_steps = 0;
        self.trades_executed = 0;
        self.rejections = 0;
        self.last_timestamp = None;
    }

    pub fn summary(&self, portfolio: &Portfolio) -> BacktestSummary {
        BacktestSummary {
            steps: self.steps,
            decision_steps: self.decision_steps,
            trades_executed: self.trades_executed,
            rejections: self.rejections,
            initial_cash: portfolio.initial_cash,
            final_value: portfolio.total_value(),
            total_return_pct: portfolio.total_return_pct(),
            realized_pnl: portfolio.realized_pnl(),
            unrealized_pnl: portfolio.unrealized_pnl(),
            last_timestamp: self.last_timestamp,
        }
    }

    fn decide_and_apply(
        &mut self,
        snapshot: &MarketSnapshot,
        portfolio: &mut Portfolio,
    ) -> Result<(), TraderError> {
        let summary = portfolio.summary();
        let outcome = self
            .decider
            .decide(snapshot, &summary, self.config.decision_timeout)
            .map_err(TraderError::from)
            .and_then(|decision| {
                if decision.symbol != snapshot.symbol {
                    return Err(TraderError::InvalidDecision {
                        symbol: snapshot.symbol.clone(),
                        reason: format!("decision names {:?}", decision.symbol),
                    });
                }
                execute_decision(portfolio, &decision, snapshot.current_price, snapshot.timestamp)
            });

        match outcome {
            Ok(Some(trade)) => {
                self.trades_executed += 1;
                info!(
                    symbol = %trade.symbol,
                    action = %trade.action,
                    quantity = trade.quantity,
                    price = trade.price,
                    "trade executed"
                );
            }
            Ok(None) => {}
            Err(e) if e.is_recoverable() => {
                warn!(symbol = %snapshot.symbol, error = %e, "decision degraded to HOLD");
                self.rejections += 1;
                record_rejection(
                    portfolio,
                    &snapshot.symbol,
                    snapshot.current_price,
                    snapshot.timestamp,
                    &e.to_string(),
                );
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn persist(&self, portfolio: &Portfolio) -> Result<(), TraderError> {
        match self.store {
            Some(store) => store.save(portfolio),
            None => Ok(()),
        }
    }

    fn finish(&mut self, portfolio: &Portfolio) -> Result<(), TraderError> {
        self.state = ReplayState::Finished;
        self.persist(portfolio)
    }

    fn display(&self, snapshots: &[MarketSnapshot], portfolio: &Portfolio, timestamp: i64) {
        for snapshot in snapshots {
            info!(
                step = self.steps,
                timestamp,
                symbol = %snapshot.symbol,
                price = snapshot.current_price,
                rsi_7 = ?snapshot.indicator("rsi_7"),
                macd = ?snapshot.indicator("macd"),
                "market"
            );
        }
        info!(
            step = self.steps,
            cash = portfolio.cash,
            total_value = portfolio.total_value(),
            unrealized_pnl = portfolio.unrealized_pnl(),
            total_return_pct = portfolio.total_return_pct(),
            "portfolio"
        );
    }
}

/// Run a full replay against `portfolio`.
pub fn run_backtest(
    config: &BacktestConfig,
    provider: &mut dyn SymbolDataProvider,
    decider: &dyn DecisionPort,
    store: Option<&dyn PortfolioStorePort>,
    portfolio: &mut Portfolio,
) -> Result<BacktestSummary, TraderError> {
    let mut orchestrator = Orchestrator::new(config, provider, decider);
    if let Some(store) = store {
        orchestrator = orchestrator.with_store(store);
    }
    orchestrator.run(portfolio)
}
