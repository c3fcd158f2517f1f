//! Process entry point: wires the streamer tasks (C3), the strategy loop
//! (C6), and the paper executor (C8) around a shared store, then waits
//! for Ctrl-C to cancel everything.

use arb_core::exchange::mock::MockAdapter;
use arb_core::exchange::{ExchangeAdapter, ExchangeId};
use arb_core::store::memory::InMemoryStore;
use arb_core::store::redis_store::RedisStore;
use arb_core::store::Store;
use arb_core::strategy::StrategyLoop;
use arb_core::{paper, streamer, Config};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

async fn build_store(config: &Config) -> Arc<dyn Store> {
    match RedisStore::connect(&config.redis_url).await {
        Ok(store) => {
            info!(redis_url = %config.redis_url, "connected to redis store");
            Arc::new(store)
        }
        Err(e) => {
            warn!(error = %e, "redis unavailable, falling back to in-memory store");
            InMemoryStore::new()
        }
    }
}

fn build_adapters(config: &Config) -> Vec<Arc<dyn ExchangeAdapter>> {
    config
        .stream_exchanges
        .iter()
        .filter_map(|name| match ExchangeId::from_str(name) {
            Ok(id) => Some(Arc::new(MockAdapter::new(id)) as Arc<dyn ExchangeAdapter>),
            Err(e) => {
                warn!(exchange = %name, error = %e, "skipping unconfigured exchange");
                None
            }
        })
        .collect()
}

/// Supervises one streamer task, restarting it with backoff if it ever
/// exits on its own while the process hasn't been asked to shut down.
async fn supervise_streamer(
    adapter: Arc<dyn ExchangeAdapter>,
    store: Arc<dyn Store>,
    symbol: arb_core::model::Symbol,
    depth: usize,
    cancel: CancellationToken,
) {
    let mut backoff = Duration::from_secs(1);
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(streamer::run(
            adapter.clone(),
            store.clone(),
            symbol.clone(),
            depth,
            task_cancel,
        ));

        if let Err(e) = handle.await {
            error!(exchange = %adapter.id(), symbol = %symbol, error = %e, "streamer task panicked, restarting");
        }

        if cancel.is_cancelled() {
            return;
        }

        warn!(exchange = %adapter.id(), symbol = %symbol, backoff_ms = backoff.as_millis(), "streamer exited, restarting");
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(Duration::from_secs(30));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(
        exchanges = ?config.stream_exchanges,
        symbols = ?config.stream_symbols.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        "starting arb-scanner"
    );

    let store = build_store(&config).await;
    let adapters = build_adapters(&config);
    if adapters.is_empty() {
        anyhow::bail!("no usable exchange adapters configured (STREAM_EXCHANGES)");
    }

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    for adapter in &adapters {
        for symbol in &config.stream_symbols {
            tasks.push(tokio::spawn(supervise_streamer(
                adapter.clone(),
                store.clone(),
                symbol.clone(),
                config.orderbook_depth,
                cancel.clone(),
            )));
        }
    }

    let strategy = Arc::new(StrategyLoop::new(
        store.clone(),
        adapters.clone(),
        config.stream_symbols.clone(),
        config.clone(),
    ));
    let strategy_cancel = cancel.clone();
    let strategy_task = tokio::spawn({
        let strategy = strategy.clone();
        async move {
            tokio::select! {
                _ = strategy.run() => {}
                _ = strategy_cancel.cancelled() => {}
            }
        }
    });

    let paper_cancel = cancel.clone();
    let paper_task = tokio::spawn({
        let store = store.clone();
        let config = config.clone();
        async move {
            tokio::select! {
                _ = paper::run(store, config) => {}
                _ = paper_cancel.cancelled() => {}
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, cancelling tasks");
    cancel.cancel();

    for task in tasks {
        let _ = task.await;
    }
    let _ = strategy_task.await;
    let _ = paper_task.await;

    info!("arb-scanner stopped");
    Ok(())
}
