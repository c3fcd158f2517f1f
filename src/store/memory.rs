//! `dashmap`-backed fake `Store`, used by tests and by `scan_once` when no
//! `REDIS_URL` is configured. Implements the same TTL and
//! set-if-absent-with-expiry semantics as `RedisStore` so C5–C8 are
//! testable without a live Redis.

use super::Store;
use crate::error::StoreError;
use crate::model::OrderBookSnapshot;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;

struct Entry {
    value: Vec<u8>,
    expires_at_ms: i64,
}

pub struct InMemoryStore {
    kv: DashMap<String, Entry>,
    streams: DashMap<String, Mutex<VecDeque<Vec<u8>>>>,
    channels: DashMap<String, broadcast::Sender<Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            kv: DashMap::new(),
            streams: DashMap::new(),
            channels: DashMap::new(),
        })
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn channel(&self, name: &str) -> broadcast::Sender<Vec<u8>> {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(1024).0)
            .clone()
    }

    /// Test/diagnostic helper: number of entries currently held in a
    /// bounded history stream.
    pub fn stream_len(&self, stream: &str) -> usize {
        self.streams
            .get(stream)
            .map(|buf| buf.lock().len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put(
        &self,
        exchange: &str,
        symbol: &str,
        snapshot: &OrderBookSnapshot,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let key = super::orderbook_key(exchange, symbol);
        let value = serde_json::to_vec(snapshot).map_err(|e| StoreError::Decode(e.into()))?;
        self.kv.insert(
            key,
            Entry {
                value,
                expires_at_ms: Self::now_ms() + ttl_seconds as i64 * 1000,
            },
        );
        Ok(())
    }

    async fn get(
        &self,
        exchange: &str,
        symbol: &str,
        stale_ms: i64,
    ) -> Result<Option<OrderBookSnapshot>, StoreError> {
        let key = super::orderbook_key(exchange, symbol);
        let entry = match self.kv.get(&key) {
            Some(e) => e,
            None => return Ok(None),
        };
        if Self::now_ms() > entry.expires_at_ms {
            drop(entry);
            self.kv.remove(&key);
            return Ok(None);
        }
        let mut snap: OrderBookSnapshot =
            serde_json::from_slice(&entry.value).map_err(|e| StoreError::Decode(e.into()))?;
        if Self::now_ms() - snap.ts_ms > stale_ms {
            return Ok(None);
        }
        // Defensive re-assertion of ordering on the read side.
        snap.asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap());
        snap.bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap());
        Ok(Some(snap))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let prefix = pattern.trim_end_matches('*');
        Ok(self
            .kv
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.kv.get(key).map(|e| e.value.clone()))
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), StoreError> {
        // No subscribers is not an error — matches Redis PUBLISH semantics.
        let _ = self.channel(channel).send(payload.to_vec());
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<Vec<u8>>, StoreError> {
        let mut rx = self.channel(channel).subscribe();
        let (tx, out_rx) = tokio::sync::mpsc::channel(1024);
        tokio::spawn(async move {
            while let Ok(payload) = rx.recv().await {
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
        });
        Ok(out_rx)
    }

    async fn append_stream(
        &self,
        stream: &str,
        payload: &[u8],
        maxlen: usize,
    ) -> Result<(), StoreError> {
        let entry = self
            .streams
            .entry(stream.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut buf = entry.lock();
        buf.push_back(payload.to_vec());
        while buf.len() > maxlen {
            buf.pop_front();
        }
        Ok(())
    }

    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        ttl_ms: i64,
    ) -> Result<bool, StoreError> {
        let now = Self::now_ms();
        match self.kv.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut occ) => {
                if now > occ.get().expires_at_ms {
                    occ.insert(Entry {
                        value: value.to_vec(),
                        expires_at_ms: now + ttl_ms,
                    });
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            dashmap::mapref::entry::Entry::Vacant(vac) => {
                vac.insert(Entry {
                    value: value.to_vec(),
                    expires_at_ms: now + ttl_ms,
                });
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PriceLevel, Symbol};

    fn sample_snapshot(ts_ms: i64) -> OrderBookSnapshot {
        OrderBookSnapshot::build(
            "kraken",
            Symbol::new("BTC/EUR").unwrap(),
            ts_ms,
            vec![PriceLevel::new(100.0, 1.0).unwrap()],
            vec![PriceLevel::new(99.0, 1.0).unwrap()],
            50,
        )
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryStore::new();
        let snap = sample_snapshot(InMemoryStore::now_ms());
        store.put("kraken", "BTC/EUR", &snap, 10).await.unwrap();
        let got = store.get("kraken", "BTC/EUR", 5000).await.unwrap();
        assert!(got.is_some());
        assert_eq!(got.unwrap().asks[0].price, 100.0);
    }

    #[tokio::test]
    async fn stale_snapshot_is_a_miss() {
        let store = InMemoryStore::new();
        let snap = sample_snapshot(InMemoryStore::now_ms() - 10_000);
        store.put("kraken", "BTC/EUR", &snap, 10).await.unwrap();
        let got = store.get("kraken", "BTC/EUR", 5000).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn set_if_absent_wins_exactly_once() {
        let store = InMemoryStore::new();
        let mut wins = 0;
        for _ in 0..5 {
            if store
                .set_if_absent_with_expiry("paper:dedup:abc", b"1", 4000)
                .await
                .unwrap()
            {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn concurrent_set_if_absent_has_exactly_one_winner() {
        let store = InMemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_if_absent_with_expiry("paper:dedup:race", b"1", 4000)
                    .await
                    .unwrap()
            }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}
