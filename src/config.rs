//! Process-wide configuration, loaded once from the environment.

use crate::model::Symbol;

/// Application configuration. Passed by reference/`Arc` into every
/// component — never a process-wide singleton.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub orderbook_stale_ms: i64,
    pub orderbook_depth: usize,
    pub rest_poll_sec: f64,
    pub stream_exchanges: Vec<String>,
    pub stream_symbols: Vec<Symbol>,

    pub strat_budget_quote: f64,
    pub strat_withdraw_fee_base: f64,
    pub strat_min_net_quote: f64,
    pub strat_min_roi_pct: f64,
    pub strat_interval_ms: u64,
    pub strat_topn: usize,

    pub publish_channel: String,
    pub publish_stream: String,
    pub publish_fallback_when_empty: bool,

    pub paper_stream: String,
    pub paper_min_net_quote: f64,
    pub paper_min_roi_pct: f64,
    pub paper_slippage_bps: f64,
    pub paper_dedup_cooldown_ms: i64,
    pub allow_no_profit: bool,

    pub adapter_timeout_ms: u64,
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.as_str(), "1" | "true" | "True" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let stream_symbols = env_list("STREAM_SYMBOLS", "BTC/EUR,ETH/EUR")
            .into_iter()
            .map(|s| Symbol::new(s).map_err(|e| anyhow::anyhow!(e)))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            redis_url: env_string("REDIS_URL", "redis://127.0.0.1:6379/0"),
            orderbook_stale_ms: env_parsed("ORDERBOOK_STALE_MS", 5000),
            orderbook_depth: env_parsed("ORDERBOOK_DEPTH", 50),
            rest_poll_sec: env_parsed("REST_POLL_SEC", 2.0),
            stream_exchanges: env_list("STREAM_EXCHANGES", "bitvavo,coinbase,kraken")
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect(),
            stream_symbols,

            strat_budget_quote: env_parsed("STRAT_BUDGET_QUOTE", 250.0),
            strat_withdraw_fee_base: env_parsed("STRAT_WITHDRAW_FEE_BASE", 0.0),
            strat_min_net_quote: env_parsed("STRAT_MIN_NET_QUOTE", 0.0),
            strat_min_roi_pct: env_parsed("STRAT_MIN_ROI_PCT", 0.0),
            strat_interval_ms: env_parsed("STRAT_INTERVAL_MS", 1500),
            strat_topn: env_parsed("STRAT_TOPN", 5),

            publish_channel: env_string("PUBLISH_CHANNEL", "opps"),
            publish_stream: env_string("PUBLISH_STREAM", "opps_stream"),
            publish_fallback_when_empty: env_bool("PUBLISH_FALLBACK_WHEN_EMPTY", true),

            paper_stream: env_string("PAPER_STREAM", "paper_trades"),
            paper_min_net_quote: env_parsed("PAPER_MIN_NET_QUOTE", 0.0),
            paper_min_roi_pct: env_parsed("PAPER_MIN_ROI_PCT", 0.0),
            paper_slippage_bps: env_parsed("PAPER_SLIPPAGE_BPS", 2.0),
            paper_dedup_cooldown_ms: env_parsed("PAPER_DEDUP_COOLDOWN_MS", 4000),
            allow_no_profit: env_bool("ALLOW_NO_PROFIT", true),

            adapter_timeout_ms: env_parsed("ADAPTER_TIMEOUT_MS", 20_000),
        })
    }
}
