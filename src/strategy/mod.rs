//! Strategy Loop (C6) — the periodic driver over configured symbols and
//! exchanges. Ticks forever; per-tick errors are logged and never abort
//! the loop.

use crate::config::Config;
use crate::exchange::ExchangeAdapter;
use crate::model::{PairOpportunity, ScanBlock, Symbol};
use crate::publish;
use crate::scanner::{scan_symbol, ScanSettings};
use crate::store::Store;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct StrategyLoop {
    store: Arc<dyn Store>,
    adapters: Vec<Arc<dyn ExchangeAdapter>>,
    symbols: Vec<Symbol>,
    config: Config,
}

impl StrategyLoop {
    pub fn new(
        store: Arc<dyn Store>,
        adapters: Vec<Arc<dyn ExchangeAdapter>>,
        symbols: Vec<Symbol>,
        config: Config,
    ) -> Self {
        Self {
            store,
            adapters,
            symbols,
            config,
        }
    }

    fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            budget_quote: self.config.strat_budget_quote,
            withdraw_fee_base: self.config.strat_withdraw_fee_base,
            depth_levels: self.config.orderbook_depth,
            stale_ms: self.config.orderbook_stale_ms,
        }
    }

    /// Runs a single scan tick across every configured symbol and returns
    /// the per-symbol blocks plus the flattened, fallback-adjusted batch
    /// that was (or would be) handed to the publisher.
    pub async fn tick(&self) -> (Vec<ScanBlock>, Vec<PairOpportunity>) {
        let topn = self.config.strat_topn;
        let settings = self.scan_settings();
        let mut blocks = Vec::with_capacity(self.symbols.len());

        for symbol in &self.symbols {
            let pairs = scan_symbol(self.store.as_ref(), &self.adapters, symbol, settings).await;

            let debug_top: Vec<PairOpportunity> = pairs.iter().take(topn).cloned().collect();
            // "first record" per spec §9's pinned interpretation, not
            // "first ok" — the ambiguity observed across source revisions.
            let debug_best_any = pairs.first().cloned();

            let mut filtered: Vec<PairOpportunity> = pairs
                .into_iter()
                .filter(|p| {
                    p.ok
                        && p.depth.net_profit_quote >= self.config.strat_min_net_quote
                        && p.depth.roi * 100.0 >= self.config.strat_min_roi_pct
                })
                .collect();
            filtered.sort_by(|a, b| {
                b.depth
                    .net_profit_quote
                    .partial_cmp(&a.depth.net_profit_quote)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let top: Vec<PairOpportunity> = filtered.iter().take(topn).cloned().collect();
            let best = filtered.into_iter().next();

            blocks.push(ScanBlock {
                symbol: symbol.clone(),
                top,
                best,
                debug_top,
                debug_best_any,
            });
        }

        let mut flat: Vec<PairOpportunity> = blocks.iter().flat_map(|b| b.top.clone()).collect();

        if flat.is_empty() && self.config.publish_fallback_when_empty {
            for block in &blocks {
                let candidate = block
                    .debug_best_any
                    .clone()
                    .or_else(|| block.debug_top.first().cloned());
                if let Some(c) = candidate {
                    flat.push(c);
                }
            }
        }

        (blocks, flat)
    }

    /// Runs forever, publishing each tick's batch and sleeping to the next
    /// tick boundary. Call within a `tokio::spawn`ed task; cancel by
    /// dropping the task / selecting on an external cancellation signal.
    pub async fn run(&self) {
        info!(
            exchanges = ?self.adapters.iter().map(|a| a.id().to_string()).collect::<Vec<_>>(),
            symbols = ?self.symbols.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            interval_ms = self.config.strat_interval_ms,
            "strategy loop starting"
        );
        loop {
            let t0 = Instant::now();
            let (blocks, batch) = self.tick().await;

            for block in &blocks {
                match &block.best {
                    Some(best) => debug!(
                        symbol = %block.symbol,
                        buy = %best.buy,
                        sell = %best.sell,
                        net = best.depth.net_profit_quote,
                        roi_pct = best.depth.roi * 100.0,
                        "best opportunity"
                    ),
                    None => debug!(symbol = %block.symbol, "no profitable pair this tick"),
                }
            }

            if !batch.is_empty() {
                if let Err(e) = publish::publish_batch(
                    self.store.as_ref(),
                    &batch,
                    &self.config.publish_channel,
                    &self.config.publish_stream,
                    self.config.strat_topn,
                )
                .await
                {
                    warn!(error = %e, "publish failed for this tick");
                }
            }

            let elapsed_ms = t0.elapsed().as_millis() as u64;
            let sleep_ms = self.config.strat_interval_ms.saturating_sub(elapsed_ms);
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }
    }
}
