//! OpenAI-compatible chat-completion decision function.
//!
//! Works against OpenRouter or DeepSeek. The model is asked for a single
//! `{"trade_signal_args": {...}}` object per symbol; every failure on the way
//! (HTTP, timeout, status, JSON) surfaces as a [`TransportError`].

use std::fmt::{self, Write as _};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::decision::{Action, Decision};
use crate::domain::error::{TraderError, TransportError};
use crate::domain::portfolio::PortfolioSummary;
use crate::domain::snapshot::MarketSnapshot;
use crate::ports::config_port::ConfigPort;
use crate::ports::decision_port::DecisionPort;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const OPENROUTER_DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEEPSEEK_MODEL: &str = "deepseek-chat";

const OPENROUTER_KEY_VAR: &str = "OPENROUTER_API_KEY";
const OPENROUTER_MODEL_VAR: &str = "OPENROUTER_MODEL";
const DEEPSEEK_KEY_VAR: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenRouter,
    DeepSeek,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::OpenRouter => f.write_str("openrouter"),
            LlmProvider::DeepSeek => f.write_str("deepseek"),
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl LlmSettings {
    /// Resolve settings from `[llm]` and the process environment.
    pub fn from_env(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    /// Resolve settings with an explicit environment lookup.
    ///
    /// Without an explicit `[llm] provider`, OpenRouter wins whenever its key
    /// is non-blank. `[llm] model` beats `OPENROUTER_MODEL`, which beats the
    /// provider default.
    pub fn resolve(
        config: &dyn ConfigPort,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, TraderError> {
        let non_blank = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        let missing = |key: &str| TraderError::ConfigMissing {
            section: "env".to_string(),
            key: key.to_string(),
        };

        let requested = config
            .get_string("llm", "provider")
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty());

        let (provider, api_key) = match requested.as_deref() {
            Some("openrouter") => (
                LlmProvider::OpenRouter,
                non_blank(OPENROUTER_KEY_VAR).ok_or_else(|| missing(OPENROUTER_KEY_VAR))?,
            ),
            Some("deepseek") => (
                LlmProvider::DeepSeek,
                non_blank(DEEPSEEK_KEY_VAR).ok_or_else(|| missing(DEEPSEEK_KEY_VAR))?,
            ),
            Some(other) => {
                return Err(TraderError::ConfigInvalid {
                    section: "llm".to_string(),
                    key: "provider".to_string(),
                    reason: format!("unknown provider {other:?}, expected openrouter or deepseek"),
                });
            }
            None => match (non_blank(OPENROUTER_KEY_VAR), non_blank(DEEPSEEK_KEY_VAR)) {
                (Some(key), _) => (LlmProvider::OpenRouter, key),
                (None, Some(key)) => (LlmProvider::DeepSeek, key),
                (None, None) => {
                    return Err(missing(&format!("{OPENROUTER_KEY_VAR} or {DEEPSEEK_KEY_VAR}")));
                }
            },
        };

        let configured = |key: &str| {
            config
                .get_string("llm", key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let (default_url, default_model) = match provider {
            LlmProvider::OpenRouter => (
                OPENROUTER_BASE_URL,
                non_blank(OPENROUTER_MODEL_VAR).unwrap_or_else(|| OPENROUTER_DEFAULT_MODEL.into()),
            ),
            LlmProvider::DeepSeek => (DEEPSEEK_BASE_URL, DEEPSEEK_MODEL.to_string()),
        };

        Ok(LlmSettings {
            provider,
            api_key: api_key.trim().to_string(),
            base_url: configured("base_url").unwrap_or_else(|| default_url.to_string()),
            model: configured("model").unwrap_or(default_model),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct SignalEnvelope {
    trade_signal_args: TradeSignalArgs,
}

#[derive(Debug, Deserialize)]
struct TradeSignalArgs {
    #[serde(default)]
    coin: String,
    signal: String,
    #[serde(default)]
    quantity: f64,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    invalidation_condition: Option<String>,
}

pub struct LlmDecisionAdapter {
    settings: LlmSettings,
    client: Client,
}

impl LlmDecisionAdapter {
    pub fn new(settings: LlmSettings) -> Result<Self, TraderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TraderError::ConfigInvalid {
                section: "llm".to_string(),
                key: "base_url".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }
}

impl DecisionPort for LlmDecisionAdapter {
    fn decide(
        &self,
        snapshot: &MarketSnapshot,
        portfolio: &PortfolioSummary,
        timeout: Duration,
    ) -> Result<Decision, TransportError> {
        let symbol = snapshot.symbol.as_str();
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(snapshot, portfolio),
            }],
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        };

        debug!(symbol, model = %self.settings.model, "requesting decision");
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .timeout(timeout)
            .json(&request)
            .send()
            .map_err(|e| transport_error(symbol, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(TransportError::new(
                symbol,
                format!("HTTP {status}: {excerpt}"),
            ));
        }

        let chat: ChatResponse = response.json().map_err(|e| transport_error(symbol, e))?;
        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| TransportError::new(symbol, "response has no choices"))?;
        parse_decision(content, symbol)
    }
}

fn transport_error(symbol: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::timeout(symbol, e.to_string())
    } else {
        TransportError::new(symbol, e.to_string())
    }
}

/// Parse the model's `trade_signal_args` object into a [`Decision`].
///
/// A missing `coin` defaults to `symbol`. A differing `coin` is passed
/// through so the replay loop can reject it.
pub fn parse_decision(content: &str, symbol: &str) -> Result<Decision, TransportError> {
    let body = strip_code_fence(content);
    let envelope: SignalEnvelope = serde_json::from_str(body)
        .map_err(|e| TransportError::new(symbol, format!("unparseable decision: {e}")))?;
    let args = envelope.trade_signal_args;

    let action: Action = args
        .signal
        .parse()
        .map_err(|e: String| TransportError::new(symbol, e))?;
    let coin = args.coin.trim().to_uppercase();

    Ok(Decision {
        action,
        symbol: if coin.is_empty() { symbol.to_string() } else { coin },
        quantity: args.quantity,
        confidence: args.confidence,
        rationale: args.invalidation_condition,
    })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.decimals$}"),
        _ => "N/A".to_string(),
    }
}

fn fmt_series(values: impl Iterator<Item = f64>, decimals: usize) -> String {
    values
        .map(|v| format!("{v:.decimals$}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn interval_description(period: &str) -> &str {
    match period {
        "1m" => "1-minute",
        "3m" => "3-minute",
        "5m" => "5-minute",
        "15m" => "15-minute",
        "30m" => "30-minute",
        "1h" => "hourly",
        "4h" => "4-hour",
        "1d" => "daily",
        other => other,
    }
}

/// Human-readable prompt for one symbol.
pub fn build_prompt(snapshot: &MarketSnapshot, portfolio: &PortfolioSummary) -> String {
    let symbol = &snapshot.symbol;
    let mut out = String::new();

    let _ = writeln!(out, "You are a trading agent. Here is the market data for {symbol}:");
    let _ = writeln!(out, "ALL {symbol} DATA");
    let _ = writeln!(
        out,
        "current_price = {}, current_volume = {}, average_volume = {}",
        fmt_opt(Some(snapshot.current_price), 3),
        fmt_opt(Some(snapshot.current_volume), 3),
        fmt_opt(Some(snapshot.average_volume), 3),
    );
    for (name, value) in &snapshot.indicators {
        let _ = writeln!(out, "{name} = {}", fmt_opt(*value, 3));
    }
    let _ = writeln!(
        out,
        "Intraday series ({} intervals, oldest to latest):",
        interval_description(&snapshot.period)
    );
    let _ = writeln!(
        out,
        "{symbol} mid prices: [{}]",
        fmt_series(snapshot.mid_prices.iter().copied(), 2)
    );
    let _ = writeln!(
        out,
        "{symbol} closes: [{}]",
        fmt_series(snapshot.recent_klines.iter().map(|k| k.close), 2)
    );

    let _ = writeln!(out, "\nHERE IS YOUR ACCOUNT INFORMATION & PERFORMANCE");
    let _ = writeln!(
        out,
        "Current Total Return (percent): {}%",
        fmt_opt(Some(portfolio.total_return_pct), 2)
    );
    let _ = writeln!(out, "Available Cash: ${}", fmt_opt(Some(portfolio.available_cash), 2));
    let _ = writeln!(out, "Current Account Value: ${}", fmt_opt(Some(portfolio.total_value), 2));
    let _ = writeln!(out, "Total Unrealized PnL: ${}", fmt_opt(Some(portfolio.unrealized_pnl), 2));
    if portfolio.positions.is_empty() {
        let _ = writeln!(out, "(No open positions)");
    }
    for p in &portfolio.positions {
        let _ = writeln!(
            out,
            "Symbol: {}, Qty: {:.4}, Entry: ${:.2}, Current: ${:.2}, PnL: ${:.2}, Notional: ${:.2}",
            p.symbol, p.quantity, p.entry_price, p.current_price, p.unrealized_pnl, p.notional
        );
    }

    let _ = writeln!(
        out,
        r#"
INSTRUCTIONS:
Generate a trading decision for the symbol {symbol} only.
The quantity is in coins and its cost should stay within 30% of the available cash.
Respond ONLY with a single JSON object of this shape, no text or explanation:
{{"trade_signal_args": {{"coin": "{symbol}", "signal": "buy" | "sell" | "hold" | "close", "quantity": <number>, "confidence": <number between 0 and 1>, "invalidation_condition": <string>}}}}
If you have no trading signal, set "signal" to "hold" and "quantity" to 0."#
    );
    out
}
