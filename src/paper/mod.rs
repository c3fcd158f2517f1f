//! Paper Executor (C8) — subscribes to the opportunity channel, filters,
//! de-duplicates, and records simulated fills with slippage. Never touches
//! a real exchange.

use crate::config::Config;
use crate::model::{OpportunityBatch, PairOpportunity, PaperFill};
use crate::store::{dedup_key, Store};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn fingerprint(item: &PairOpportunity) -> String {
    let qty = if item.depth.qty_base_sold > 0.0 {
        item.depth.qty_base_sold
    } else {
        item.depth.qty_base_bought
    };
    let parts = format!(
        "{}|{}|{}|{:.2}|{:.2}|{:.8}",
        item.symbol, item.buy, item.sell, item.best_ask, item.best_bid, qty
    );
    let mut hasher = Sha256::new();
    hasher.update(parts.as_bytes());
    hex::encode(hasher.finalize())
}

fn passes_thresholds(item: &PairOpportunity, config: &Config) -> bool {
    let net = item.depth.net_profit_quote;
    let roi_pct = item.depth.roi * 100.0;
    item.ok && net >= config.paper_min_net_quote && roi_pct >= config.paper_min_roi_pct
}

async fn should_execute(store: &dyn Store, item: &PairOpportunity, config: &Config) -> bool {
    let qty = if item.depth.qty_base_sold > 0.0 {
        item.depth.qty_base_sold
    } else {
        item.depth.qty_base_bought
    };
    if qty <= 0.0 {
        return false;
    }
    if !passes_thresholds(item, config) && !config.allow_no_profit {
        return false;
    }

    let key = dedup_key(&fingerprint(item));
    store
        .set_if_absent_with_expiry(&key, b"1", config.paper_dedup_cooldown_ms)
        .await
        .unwrap_or(false)
}

fn build_fill(item: &PairOpportunity, config: &Config) -> Option<PaperFill> {
    let qty = if item.depth.qty_base_sold > 0.0 {
        item.depth.qty_base_sold
    } else {
        item.depth.qty_base_bought
    };
    if qty <= 0.0 || item.best_ask <= 0.0 || item.best_bid <= 0.0 {
        return None;
    }

    let slip = config.paper_slippage_bps / 10_000.0;
    let eff_ask = item.best_ask * (1.0 + slip);
    let eff_bid = item.best_bid * (1.0 - slip);

    let spent_quote = qty * eff_ask * (1.0 + item.fee_buy);
    let received_quote = qty * eff_bid * (1.0 - item.fee_sell);
    let net_profit_quote = received_quote - spent_quote;
    let roi = if spent_quote > 0.0 {
        net_profit_quote / spent_quote
    } else {
        0.0
    };
    let gross_spread_bps = (item.best_bid - item.best_ask) / item.best_ask * 10_000.0;

    Some(PaperFill {
        ts_ms: chrono::Utc::now().timestamp_millis(),
        symbol: item.symbol.clone(),
        buy: item.buy.clone(),
        sell: item.sell.clone(),
        qty_base: qty,
        best_ask: item.best_ask,
        best_bid: item.best_bid,
        eff_ask,
        eff_bid,
        fee_buy_rate: item.fee_buy,
        fee_sell_rate: item.fee_sell,
        slippage_bps: config.paper_slippage_bps,
        spent_quote,
        received_quote,
        net_profit_quote,
        roi,
        gross_spread_bps,
    })
}

async fn handle_batch(store: &dyn Store, payload: &[u8], config: &Config) {
    let batch: OpportunityBatch = match serde_json::from_slice(payload) {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "paper executor: malformed batch payload");
            return;
        }
    };
    for item in &batch.items {
        if !should_execute(store, item, config).await {
            continue;
        }
        let Some(fill) = build_fill(item, config) else {
            continue;
        };
        let Ok(encoded) = serde_json::to_vec(&fill) else {
            continue;
        };
        if let Err(e) = store
            .append_stream(&config.paper_stream, &encoded, 5000)
            .await
        {
            warn!(error = %e, "paper executor: failed to append fill");
            continue;
        }
        info!(
            symbol = %fill.symbol,
            buy = %fill.buy,
            sell = %fill.sell,
            qty = fill.qty_base,
            net = fill.net_profit_quote,
            roi_pct = fill.roi * 100.0,
            "paper fill recorded"
        );
    }
}

/// Runs forever: subscribes to `config.publish_channel`, processes each
/// message, and re-subscribes with a 1-second backoff on any error.
pub async fn run(store: Arc<dyn Store>, config: Config) {
    loop {
        let mut rx = match store.subscribe(&config.publish_channel).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(error = %e, "paper executor: subscribe failed, retrying in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };
        info!(channel = %config.publish_channel, stream = %config.paper_stream, "paper executor listening");
        while let Some(payload) = rx.recv().await {
            handle_batch(store.as_ref(), &payload, &config).await;
        }
        warn!("paper executor: subscription ended, resubscribing in 1s");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
