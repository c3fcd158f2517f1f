//! Production `Store` backed by Redis, using a `ConnectionManager` so every
//! task shares one pooled, auto-reconnecting connection rather than opening
//! a connection per call (design note §9: "per-request short-lived
//! connections → pooled clients").

use super::Store;
use crate::error::StoreError;
use crate::model::OrderBookSnapshot;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

pub struct RedisStore {
    manager: ConnectionManager,
    client: redis::Client,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client =
            redis::Client::open(redis_url).map_err(|e| StoreError::Transport(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self { manager, client })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn put(
        &self,
        exchange: &str,
        symbol: &str,
        snapshot: &OrderBookSnapshot,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let key = super::orderbook_key(exchange, symbol);
        let value = serde_json::to_vec(snapshot).map_err(|e| StoreError::Decode(e.into()))?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn get(
        &self,
        exchange: &str,
        symbol: &str,
        stale_ms: i64,
    ) -> Result<Option<OrderBookSnapshot>, StoreError> {
        let key = super::orderbook_key(exchange, symbol);
        let mut conn = self.manager.clone();
        let raw: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let raw = match raw {
            Some(r) => r,
            None => return Ok(None),
        };
        let mut snap: OrderBookSnapshot =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Decode(e.into()))?;
        if chrono::Utc::now().timestamp_millis() - snap.ts_ms > stale_ms {
            return Ok(None);
        }
        snap.asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap());
        snap.bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap());
        Ok(Some(snap))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.manager.clone();
        conn.keys(pattern)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.manager.clone();
        conn.get(key)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        conn.publish::<_, _, ()>(channel, payload)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<Vec<u8>>, StoreError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        pubsub
            .subscribe(channel)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let (tx, rx) = tokio::sync::mpsc::channel(1024);
        tokio::spawn(async move {
            use futures_util::StreamExt;
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: Vec<u8> = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                if tx.send(payload).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn append_stream(
        &self,
        stream: &str,
        payload: &[u8],
        maxlen: usize,
    ) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        redis::cmd("XADD")
            .arg(stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(maxlen)
            .arg("*")
            .arg("payload")
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        ttl_ms: i64,
    ) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(result.is_some())
    }
}
