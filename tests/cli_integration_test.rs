//! CLI integration tests.
//!
//! Tests cover:
//! - Config parsing (build_backtest_config, build_indicator_set)
//! - Portfolio resume logic (load_portfolio)
//! - `check` and `generate` subcommands against real files on disk
//! - Full pipeline over generated sample data with a rule-based decider

mod common;

use clap::Parser;
use common::*;
use replaytrader::adapters::csv_adapter::FileDataProvider;
use replaytrader::adapters::file_config_adapter::FileConfigAdapter;
use replaytrader::adapters::json_snapshot_adapter::JsonSnapshotStore;
use replaytrader::adapters::sample_data::{GeneratorConfig, default_assets, generate_sample_data};
use replaytrader::cli::{self, Cli};
use replaytrader::domain::decision::Decision;
use replaytrader::domain::error::{TraderError, TransportError};
use replaytrader::domain::indicator::IndicatorType;
use replaytrader::domain::portfolio::{Portfolio, PortfolioSummary};
use replaytrader::domain::snapshot::MarketSnapshot;
use replaytrader::ports::portfolio_store_port::PortfolioStorePort;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn is_success(code: ExitCode) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
}

fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

const VALID_INI: &str = r#"
[replay]
data_dir = data
symbols = btc, eth
period = 1h
kline_count = 20
persist_interval = 5
display_interval = 50
decision_timeout_secs = 12
snapshot_path = state/portfolio.json

[portfolio]
initial_cash = 2500.0

[indicators]
ema_periods = 9,21
rsi_periods = 14
atr_periods = 14
macd_fast = 8
macd_slow = 17
macd_signal = 9

[llm]
provider = deepseek
"#;

mod config_loading {
    use super::*;

    #[test]
    fn build_backtest_config_valid_full() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.symbols, vec!["BTC".to_string(), "ETH".to_string()]);
        assert_eq!(config.period, "1h");
        assert_eq!(config.kline_count, 20);
        assert_eq!(config.persist_interval, 5);
        assert_eq!(config.display_interval, 50);
        assert_eq!(config.decision_timeout, Duration::from_secs(12));
        assert_eq!(config.snapshot_path, PathBuf::from("state/portfolio.json"));
        assert_eq!(config.initial_cash, 2500.0);
    }

    #[test]
    fn build_backtest_config_uses_defaults() {
        let adapter = FileConfigAdapter::from_string("[replay]\n").unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("historical_data"));
        assert_eq!(config.symbols, vec!["BTC", "ETH", "SOL"]);
        assert_eq!(config.period, "3m");
        assert_eq!(config.kline_count, 10);
        assert_eq!(config.persist_interval, 1);
        assert_eq!(config.display_interval, 100);
        assert_eq!(config.decision_timeout, Duration::from_secs(30));
        assert_eq!(config.snapshot_path, PathBuf::from("backtest_portfolio.json"));
        assert_eq!(config.initial_cash, 10_000.0);
        assert_eq!(config.indicators.warmup_bars(), 50);
    }

    #[test]
    fn build_backtest_config_rejects_traversal_symbol() {
        let adapter =
            FileConfigAdapter::from_string("[replay]\nsymbols = BTC,../../etc/passwd\n").unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, TraderError::InvalidSymbolFormat { .. }));
    }

    #[test]
    fn build_backtest_config_rejects_bad_interval() {
        let adapter = FileConfigAdapter::from_string("[replay]\npersist_interval = 0\n").unwrap();
        let err = cli::build_backtest_config(&adapter).unwrap_err();
        assert!(matches!(err, TraderError::ConfigInvalid { key, .. } if key == "persist_interval"));
    }

    #[test]
    fn build_indicator_set_from_config() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let set = cli::build_indicator_set(&adapter).unwrap();
        assert_eq!(
            set.types,
            vec![
                IndicatorType::Ema(9),
                IndicatorType::Ema(21),
                IndicatorType::Rsi(14),
                IndicatorType::Atr(14),
                IndicatorType::Macd {
                    fast: 8,
                    slow: 17,
                    signal: 9
                },
            ]
        );
        assert_eq!(set.warmup_bars(), 26);
    }

    #[test]
    fn build_indicator_set_can_disable_families() {
        let adapter = FileConfigAdapter::from_string(
            "[indicators]\nema_periods =\nrsi_periods =\natr_periods = 5\n",
        )
        .unwrap();
        let set = cli::build_indicator_set(&adapter).unwrap();
        assert_eq!(set.types.len(), 2);
        assert_eq!(set.types[0], IndicatorType::Atr(5));
    }
}

mod portfolio_resume {
    use super::*;

    #[test]
    fn fresh_ignores_existing_snapshot() {
        let store = MemoryStore::default();
        let mut saved = Portfolio::new(100.0);
        saved.cash = 42.0;
        store.save(&saved).unwrap();

        assert_eq!(cli::load_portfolio(&store, 500.0, false).unwrap(), saved);
        assert_eq!(cli::load_portfolio(&store, 500.0, true).unwrap(), Portfolio::new(500.0));
    }

    #[test]
    fn missing_snapshot_starts_new() {
        let dir = TempDir::new().unwrap();
        let store = JsonSnapshotStore::new(dir.path().join("none.json"));
        assert_eq!(cli::load_portfolio(&store, 750.0, false).unwrap(), Portfolio::new(750.0));
    }
}

mod subcommands {
    use super::*;

    fn ini_for(data_dir: &Path) -> String {
        format!(
            "[replay]\ndata_dir = {}\nsymbols = BTC,ETH,SOL\n",
            data_dir.display()
        )
    }

    #[test]
    fn generate_then_check_succeeds() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("historical_data");
        let out = data_dir.to_string_lossy().to_string();

        let code = cli::run(Cli::parse_from([
            "replaytrader",
            "generate",
            "--output-dir",
            out.as_str(),
            "--days",
            "1",
            "--interval-minutes",
            "15",
            "--seed",
            "7",
            "--start",
            "1700000000",
        ]));
        assert!(is_success(code));
        for symbol in ["BTC", "ETH", "SOL"] {
            assert!(data_dir.join(format!("{symbol}_historical.csv")).exists());
        }

        let ini = write_temp_ini(&ini_for(&data_dir));
        let config_path = ini.path().to_string_lossy().to_string();
        let code = cli::run(Cli::parse_from(["replaytrader", "check", "--config", config_path.as_str()]));
        assert!(is_success(code));
    }

    #[test]
    fn check_missing_data_reports_data_error() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(&ini_for(dir.path()));
        let config_path = ini.path().to_string_lossy().to_string();
        let code = cli::run(Cli::parse_from(["replaytrader", "check", "--config", config_path.as_str()]));
        assert!(same_code(code, ExitCode::from(3)));
    }

    #[test]
    fn check_missing_config_reports_config_error() {
        let code = cli::run(Cli::parse_from([
            "replaytrader",
            "check",
            "--config",
            "/nonexistent/path/config.ini",
        ]));
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn generate_rejects_zero_days() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().to_string_lossy().to_string();
        let code = cli::run(Cli::parse_from([
            "replaytrader",
            "generate",
            "--output-dir",
            out.as_str(),
            "--days",
            "0",
        ]));
        assert!(same_code(code, ExitCode::from(2)));
    }

    #[test]
    fn generate_rejects_interval_longer_than_a_day() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let out_str = out.to_string_lossy().to_string();
        let code = cli::run(Cli::parse_from([
            "replaytrader",
            "generate",
            "--output-dir",
            out_str.as_str(),
            "--interval-minutes",
            "2000",
        ]));
        assert!(same_code(code, ExitCode::from(2)));
        assert!(!out.exists());
    }

    #[test]
    fn backtest_args_parse() {
        let cli = Cli::parse_from([
            "replaytrader",
            "backtest",
            "--config",
            "replay.ini",
            "--snapshot",
            "out.json",
            "--fresh",
        ]);
        match cli.command {
            cli::Command::Backtest {
                config,
                snapshot,
                fresh,
            } => {
                assert_eq!(config, PathBuf::from("replay.ini"));
                assert_eq!(snapshot, Some(PathBuf::from("out.json")));
                assert!(fresh);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}

mod pipeline_sample_data {
    use super::*;

    /// Buys a small clip when RSI(14) is oversold, closes when overbought.
    fn rsi_decider(
        snapshot: &MarketSnapshot,
        portfolio: &PortfolioSummary,
    ) -> Result<Decision, TransportError> {
        let held = portfolio.positions.iter().any(|p| p.symbol == snapshot.symbol);
        match snapshot.indicator("rsi_14") {
            Some(rsi) if rsi < 35.0 && !held => {
                let quantity = (portfolio.available_cash * 0.1) / snapshot.current_price;
                Ok(Decision::buy(&snapshot.symbol, quantity))
            }
            Some(rsi) if rsi > 65.0 && held => Ok(Decision::close(&snapshot.symbol)),
            _ => Ok(Decision::hold(&snapshot.symbol)),
        }
    }

    #[test]
    fn full_replay_over_generated_data() {
        let dir = TempDir::new().unwrap();
        let gen_config = GeneratorConfig {
            days: 2,
            interval_minutes: 30,
            seed: 11,
            ..GeneratorConfig::default()
        };
        generate_sample_data(dir.path(), &default_assets(), &gen_config).unwrap();

        let adapter = FileConfigAdapter::from_string(&format!(
            "[replay]\ndata_dir = {}\nsnapshot_path = {}\npersist_interval = 10\n",
            dir.path().display(),
            dir.path().join("portfolio.json").display()
        ))
        .unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();
        let store = JsonSnapshotStore::new(&config.snapshot_path);
        let mut portfolio = cli::load_portfolio(&store, config.initial_cash, false).unwrap();
        let decider = rsi_decider;

        let summary =
            cli::run_backtest_pipeline(&config, &decider, &store, &mut portfolio, None).unwrap();

        let provider = FileDataProvider::load(&config.data_dir, &config.symbols).unwrap();
        assert_eq!(summary.steps, provider.len());
        assert_eq!(Some(summary.steps), gen_config.bar_count());
        assert_eq!(summary.decision_steps, summary.steps - 50 + 1);
        assert!(portfolio.cash >= 0.0);
        assert!((summary.final_value - portfolio.total_value()).abs() < 1e-9);
        assert_eq!(store.load().unwrap().unwrap(), portfolio);
    }
}
