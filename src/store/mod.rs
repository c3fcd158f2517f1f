//! Order-Book Store (C2) — shared key/value storage with per-entry TTL,
//! plus the pub/sub channel and bounded history streams C7/C8 need.
//!
//! Every component takes a `Store` handle rather than reaching for a
//! process-wide singleton (design note §9: "global mutable stores →
//! injected collaborators").

pub mod memory;
pub mod redis_store;

use crate::error::StoreError;
use crate::model::OrderBookSnapshot;
use async_trait::async_trait;

pub fn orderbook_key(exchange: &str, symbol: &str) -> String {
    format!("ob:{exchange}:{symbol}")
}

pub fn dedup_key(fingerprint: &str) -> String {
    format!("paper:dedup:{fingerprint}")
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Overwrites any prior value for `(exchange, symbol)`.
    async fn put(
        &self,
        exchange: &str,
        symbol: &str,
        snapshot: &OrderBookSnapshot,
        ttl_seconds: u64,
    ) -> Result<(), StoreError>;

    /// `None` if absent OR if the stored snapshot is older than
    /// `stale_ms` relative to the wall clock (I2) — a stale hit is a
    /// cache miss, never a propagated error.
    async fn get(
        &self,
        exchange: &str,
        symbol: &str,
        stale_ms: i64,
    ) -> Result<Option<OrderBookSnapshot>, StoreError>;

    /// Diagnostic only; not used by the core flow.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Diagnostic only; not used by the core flow.
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Publish `payload` on `channel` (pub/sub fan-out).
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), StoreError>;

    /// Subscribe to `channel`; yields raw payloads in receive order.
    async fn subscribe(
        &self,
        channel: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<Vec<u8>>, StoreError>;

    /// Append `payload` to the bounded history stream `stream`, trimming
    /// to approximately `maxlen` entries.
    async fn append_stream(
        &self,
        stream: &str,
        payload: &[u8],
        maxlen: usize,
    ) -> Result<(), StoreError>;

    /// Atomic "set if absent, with expiry". Returns `true` iff this call
    /// was the one that set the key (exactly one winner per fingerprint
    /// within the cooldown window — P7).
    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &[u8],
        ttl_ms: i64,
    ) -> Result<bool, StoreError>;
}
