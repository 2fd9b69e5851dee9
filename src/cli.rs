//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{error, info};

use crate::adapters::csv_adapter::FileDataProvider;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_snapshot_adapter::JsonSnapshotStore;
use crate::adapters::sample_data::{self, GeneratorConfig};
use crate::domain::backtest::{BacktestConfig, BacktestSummary, Orchestrator};
use crate::domain::config_validation::{
    DEFAULT_ATR_PERIODS, DEFAULT_EMA_PERIODS, DEFAULT_RSI_PERIODS, DEFAULT_SYMBOLS, macd_params,
    parse_periods, validate_replay_config,
};
use crate::domain::error::TraderError;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_helpers::IndicatorSet;
use crate::domain::portfolio::Portfolio;
use crate::domain::symbol::parse_symbols;
use crate::ports::config_port::ConfigPort;
use crate::ports::decision_port::DecisionPort;
use crate::ports::portfolio_store_port::PortfolioStorePort;

#[derive(Parser, Debug)]
#[command(name = "replaytrader", about = "Replay historical klines through an LLM trading advisor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest replay
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Portfolio snapshot file (overrides [replay] snapshot_path)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
        /// Ignore any existing snapshot and start from initial cash
        #[arg(long)]
        fresh: bool,
    },
    /// Validate config and historical data files without deciding anything
    Check {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Write synthetic BTC/ETH/SOL historical data
    Generate {
        #[arg(short, long, default_value = "historical_data")]
        output_dir: PathBuf,
        #[arg(long, default_value_t = 30)]
        days: u32,
        #[arg(long, default_value_t = 3)]
        interval_minutes: u32,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// First bar's Unix timestamp (default: `days` before now)
        #[arg(long)]
        start: Option<i64>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            snapshot,
            fresh,
        } => run_backtest(&config, snapshot.as_deref(), fresh),
        Command::Check { config } => run_check(&config),
        Command::Generate {
            output_dir,
            days,
            interval_minutes,
            seed,
            start,
        } => run_generate(&output_dir, days, interval_minutes, seed, start),
    }
}

fn fail(err: &TraderError) -> ExitCode {
    error!(error = %err, "fatal");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

/// Validate and build the run config from `[replay]`, `[portfolio]` and `[indicators]`.
pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TraderError> {
    validate_replay_config(adapter)?;

    let symbols_str = adapter
        .get_string("replay", "symbols")
        .unwrap_or_else(|| DEFAULT_SYMBOLS.to_string());
    let defaults = BacktestConfig::default();
    let string_or = |key: &str, default: &str| {
        adapter
            .get_string("replay", key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    Ok(BacktestConfig {
        data_dir: PathBuf::from(string_or("data_dir", "historical_data")),
        symbols: parse_symbols(&symbols_str)?,
        period: string_or("period", &defaults.period),
        kline_count: adapter.get_int("replay", "kline_count", 10) as usize,
        persist_interval: adapter.get_int("replay", "persist_interval", 1) as usize,
        display_interval: adapter.get_int("replay", "display_interval", 100) as usize,
        decision_timeout: Duration::from_secs(
            adapter.get_int("replay", "decision_timeout_secs", 30) as u64,
        ),
        snapshot_path: PathBuf::from(string_or("snapshot_path", "backtest_portfolio.json")),
        initial_cash: adapter.get_double("portfolio", "initial_cash", defaults.initial_cash),
        indicators: build_indicator_set(adapter)?,
    })
}

pub fn build_indicator_set(adapter: &dyn ConfigPort) -> Result<IndicatorSet, TraderError> {
    let mut types = Vec::new();
    for p in parse_periods(adapter, "ema_periods", DEFAULT_EMA_PERIODS)? {
        types.push(IndicatorType::Ema(p));
    }
    for p in parse_periods(adapter, "rsi_periods", DEFAULT_RSI_PERIODS)? {
        types.push(IndicatorType::Rsi(p));
    }
    for p in parse_periods(adapter, "atr_periods", DEFAULT_ATR_PERIODS)? {
        types.push(IndicatorType::Atr(p));
    }
    let (fast, slow, signal) = macd_params(adapter)?;
    types.push(IndicatorType::Macd { fast, slow, signal });
    Ok(IndicatorSet::new(types))
}

/// Resume from the store unless `fresh`, otherwise start with `initial_cash`.
pub fn load_portfolio(
    store: &dyn PortfolioStorePort,
    initial_cash: f64,
    fresh: bool,
) -> Result<Portfolio, TraderError> {
    if !fresh {
        if let Some(portfolio) = store.load()? {
            info!(
                cash = portfolio.cash,
                positions = portfolio.position_count(),
                trades = portfolio.trade_history.len(),
                "resuming from portfolio snapshot"
            );
            return Ok(portfolio);
        }
    }
    Ok(Portfolio::new(initial_cash))
}

/// Load the data files and replay them through `decider`.
pub fn run_backtest_pipeline(
    config: &BacktestConfig,
    decider: &dyn DecisionPort,
    store: &dyn PortfolioStorePort,
    portfolio: &mut Portfolio,
    stop: Option<Arc<AtomicBool>>,
) -> Result<BacktestSummary, TraderError> {
    let mut provider = FileDataProvider::load(&config.data_dir, &config.symbols)?;
    let mut orchestrator = Orchestrator::new(config, &mut provider, decider).with_store(store);
    if let Some(stop) = stop {
        orchestrator = orchestrator.with_stop_flag(stop);
    }
    orchestrator.run(portfolio)
}

fn run_backtest(config_path: &Path, snapshot: Option<&Path>, fresh: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let mut config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    if let Some(path) = snapshot {
        config.snapshot_path = path.to_path_buf();
    }
    let fresh = fresh || !adapter.get_bool("replay", "resume", true);

    #[cfg(feature = "llm")]
    {
        use crate::adapters::llm_adapter::{LlmDecisionAdapter, LlmSettings};

        let decider = match LlmSettings::from_env(&adapter).and_then(LlmDecisionAdapter::new) {
            Ok(d) => d,
            Err(e) => return fail(&e),
        };
        eprintln!(
            "Using {} model {}",
            decider.settings().provider,
            decider.settings().model
        );

        let store = JsonSnapshotStore::new(&config.snapshot_path);
        let mut portfolio = match load_portfolio(&store, config.initial_cash, fresh) {
            Ok(p) => p,
            Err(e) => return fail(&e),
        };
        eprintln!(
            "Replaying {} from {} ({} bars warm-up)",
            config.symbols.join(", "),
            config.data_dir.display(),
            config.indicators.warmup_bars()
        );

        match run_backtest_pipeline(&config, &decider, &store, &mut portfolio, None) {
            Ok(summary) => {
                print_summary(&summary, &config);
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        }
    }

    #[cfg(not(feature = "llm"))]
    {
        let _ = (config, fresh);
        eprintln!("error: llm feature is required for backtest");
        ExitCode::from(1)
    }
}

pub fn print_summary(summary: &BacktestSummary, config: &BacktestConfig) {
    println!("=== Backtest summary ===");
    println!("Steps:            {}", summary.steps);
    println!("Decision steps:   {}", summary.decision_steps);
    println!("Trades executed:  {}", summary.trades_executed);
    println!("Rejected/failed:  {}", summary.rejections);
    println!("Initial cash:     {:.2}", summary.initial_cash);
    println!("Final value:      {:.2}", summary.final_value);
    println!("Realized PnL:     {:.2}", summary.realized_pnl);
    println!("Unrealized PnL:   {:.2}", summary.unrealized_pnl);
    println!("Total return:     {:.2}%", summary.total_return_pct);
    println!("Snapshot:         {}", config.snapshot_path.display());
}

fn run_check(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    eprintln!("Config validated successfully");

    let provider = match FileDataProvider::load(&config.data_dir, &config.symbols) {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };

    let indicators: Vec<String> = config.indicators.types.iter().map(|t| t.to_string()).collect();
    println!("Indicators: {}", indicators.join(", "));
    println!("Warm-up bars: {}", config.indicators.warmup_bars());
    println!("Data directory: {}", provider.data_dir().display());
    for symbol in provider.symbols() {
        if let Some((first, last, count)) = provider.data_range(symbol) {
            println!("{symbol}: {count} bars, {first} to {last}");
        }
    }
    println!("Replay steps: {}", provider.len());
    if provider.len() < config.indicators.warmup_bars() {
        eprintln!("warning: not enough bars to finish warm-up, no decisions would be made");
    }
    ExitCode::SUCCESS
}

fn run_generate(
    output_dir: &Path,
    days: u32,
    interval_minutes: u32,
    seed: u64,
    start: Option<i64>,
) -> ExitCode {
    let mut config = GeneratorConfig {
        days,
        interval_minutes,
        seed,
        ..GeneratorConfig::default()
    };
    let bars = match config.validate() {
        Ok(n) => n,
        Err(e) => return fail(&e),
    };
    let step = i64::from(interval_minutes) * 60;
    config.start_timestamp = start.unwrap_or_else(|| {
        let begin = chrono::Utc::now().timestamp() - i64::from(days) * 86_400;
        begin - begin.rem_euclid(step)
    });

    match sample_data::generate_sample_data(output_dir, &sample_data::default_assets(), &config) {
        Ok(paths) => {
            for path in &paths {
                println!("Wrote {} ({bars} bars)", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}
