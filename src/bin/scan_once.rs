//! Diagnostic binary: runs a single scan tick against the configured
//! symbols and exchanges and prints the resulting blocks as JSON.
//!
//! Does not publish or record paper fills; for that, run the `arb-scanner`
//! binary. Uses `InMemoryStore` unless `--redis-url` is given.

use arb_core::exchange::mock::MockAdapter;
use arb_core::exchange::{ExchangeAdapter, ExchangeId};
use arb_core::model::Symbol;
use arb_core::scanner::{scan_symbol, ScanSettings};
use arb_core::store::memory::InMemoryStore;
use arb_core::store::redis_store::RedisStore;
use arb_core::store::Store;
use arb_core::Config;
use clap::Parser;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(about = "Run a single arbitrage scan tick and print the result")]
struct Args {
    /// Symbol to scan, e.g. BTC/EUR. Defaults to the first configured symbol.
    #[arg(long)]
    symbol: Option<String>,

    /// Override STRAT_BUDGET_QUOTE for this run.
    #[arg(long)]
    budget_quote: Option<f64>,

    /// Connect to this Redis URL instead of using the in-memory store.
    #[arg(long)]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("warn"))
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(budget) = args.budget_quote {
        config.strat_budget_quote = budget;
    }

    let symbol = match args.symbol {
        Some(s) => Symbol::new(s)?,
        None => config
            .stream_symbols
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no symbols configured"))?,
    };

    let store: Arc<dyn Store> = match args.redis_url.as_deref() {
        Some(url) => Arc::new(RedisStore::connect(url).await?),
        None => InMemoryStore::new(),
    };

    let adapters: Vec<Arc<dyn ExchangeAdapter>> = config
        .stream_exchanges
        .iter()
        .filter_map(|name| ExchangeId::from_str(name).ok())
        .map(|id| Arc::new(MockAdapter::new(id)) as Arc<dyn ExchangeAdapter>)
        .collect();
    if adapters.is_empty() {
        anyhow::bail!("no usable exchange adapters configured (STREAM_EXCHANGES)");
    }

    let settings = ScanSettings {
        budget_quote: config.strat_budget_quote,
        withdraw_fee_base: config.strat_withdraw_fee_base,
        depth_levels: config.orderbook_depth,
        stale_ms: config.orderbook_stale_ms,
    };

    let results = scan_symbol(store.as_ref(), &adapters, &symbol, settings).await;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
