//! Publisher (C7) — fans a batch of opportunities out over the pub/sub
//! channel and appends it to the bounded history stream.
//!
//! Never called with an empty batch (I6) — the strategy loop enforces
//! that before reaching here. Store errors are logged and swallowed: the
//! next tick retries, and no pipeline invariant depends on this publish
//! having succeeded (design note §9).

use crate::model::{OpportunityBatch, PairOpportunity};
use crate::store::Store;
use tracing::warn;

pub async fn publish_batch(
    store: &dyn Store,
    items: &[PairOpportunity],
    channel: &str,
    stream: &str,
    topn: usize,
) -> anyhow::Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    let batch = OpportunityBatch {
        ts_ms: chrono::Utc::now().timestamp_millis(),
        items: items.iter().take(topn).cloned().collect(),
    };
    let payload = serde_json::to_vec(&batch)?;

    if let Err(e) = store.publish(channel, &payload).await {
        warn!(error = %e, channel, "publish to channel failed, will retry next tick");
    }
    if let Err(e) = store.append_stream(stream, &payload, 1000).await {
        warn!(error = %e, stream, "append to history stream failed, will retry next tick");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FillResult, Symbol};
    use crate::store::memory::InMemoryStore;

    fn sample_opportunity() -> PairOpportunity {
        PairOpportunity {
            ts_ms: 0,
            symbol: Symbol::new("BTC/EUR").unwrap(),
            buy: "bitvavo".into(),
            sell: "kraken".into(),
            best_ask: 100.0,
            best_bid: 110.0,
            gross_spread: 0.1,
            fee_buy: 0.0,
            fee_sell: 0.0,
            depth: FillResult {
                qty_base_sold: 1.0,
                net_profit_quote: 10.0,
                ok: true,
                ..Default::default()
            },
            ok: true,
            failure: None,
        }
    }

    #[tokio::test]
    async fn publishing_a_batch_appends_to_history_stream() {
        let store = InMemoryStore::new();
        publish_batch(store.as_ref(), &[sample_opportunity()], "opps", "opps_stream", 5)
            .await
            .unwrap();
        assert_eq!(store.stream_len("opps_stream"), 1);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let store = InMemoryStore::new();
        publish_batch(store.as_ref(), &[], "opps", "opps_stream", 5)
            .await
            .unwrap();
    }
}
