//! Exchange Adapter (C1) — uniform, read-only access to one venue.
//!
//! The real exchange-protocol clients are out of scope for this crate (see
//! spec §1); `MockAdapter` below is the only implementation shipped here,
//! used by the test suite and by `scan_once` when no live venue is wired
//! up. A production binary supplies its own `ExchangeAdapter` impl wrapping
//! whatever ccxt-equivalent client it links against.

pub mod mock;
pub mod synonyms;

use crate::error::AdapterError;
use crate::model::{MarketMeta, OrderBookSnapshot, Symbol};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeId {
    Bitvavo,
    Coinbase,
    Kraken,
}

impl ExchangeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Bitvavo => "bitvavo",
            ExchangeId::Coinbase => "coinbase",
            ExchangeId::Kraken => "kraken",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bitvavo" => Ok(ExchangeId::Bitvavo),
            "coinbase" => Ok(ExchangeId::Coinbase),
            "kraken" => Ok(ExchangeId::Kraken),
            other => Err(format!("exchange '{other}' not supported")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ticker {
    pub symbol: Symbol,
    pub last: f64,
    pub ts_ms: i64,
}

#[derive(Debug, Clone)]
pub struct Ping {
    pub ok: bool,
    pub server_time_ms: Option<i64>,
    pub local_ms: Option<i64>,
}

/// The capability set the core pipeline consumes from one venue.
///
/// A synchronous implementation is acceptable per spec §4.1; wrap its
/// blocking calls in `tokio::task::spawn_blocking` so it doesn't starve
/// other tasks on the runtime (see spec §5).
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn id(&self) -> ExchangeId;

    async fn fetch_order_book(
        &self,
        symbol: &Symbol,
        limit: usize,
    ) -> Result<OrderBookSnapshot, AdapterError>;

    async fn fetch_ticker(&self, symbol: &Symbol) -> Result<Ticker, AdapterError>;

    async fn load_markets(&self) -> Result<HashMap<String, MarketMeta>, AdapterError>;

    async fn list_symbols(&self, quote: Option<&str>) -> Result<Vec<Symbol>, AdapterError>;

    /// Direct hit in `load_markets()` if present; else the unique entry
    /// whose quote matches and whose base belongs to the canonical base's
    /// synonym class. Fails with `SymbolNotFound` otherwise.
    async fn resolve_symbol(&self, canonical: &Symbol) -> Result<String, AdapterError> {
        let markets = self.load_markets().await?;
        if markets.contains_key(canonical.as_str()) {
            return Ok(canonical.as_str().to_string());
        }
        let synonyms = synonyms::SynonymTable::default();
        let base_class = synonyms.class_of(canonical.base());
        let quote = canonical.quote().to_uppercase();

        let mut hit = None;
        for (venue_symbol, meta) in &markets {
            if !meta.active {
                continue;
            }
            if meta.quote.to_uppercase() == quote && base_class.contains(&meta.base.to_uppercase())
            {
                hit = Some(venue_symbol.clone());
                break;
            }
        }
        hit.ok_or_else(|| AdapterError::SymbolNotFound {
            exchange: self.id().to_string(),
            symbol: canonical.as_str().to_string(),
        })
    }

    /// Optional push subscription. Adapters that can't stream return
    /// `Unsupported`; the streamer falls back to polling.
    async fn watch_order_book(
        &self,
        _symbol: &Symbol,
        _limit: usize,
    ) -> Result<tokio::sync::mpsc::Receiver<OrderBookSnapshot>, AdapterError> {
        Err(AdapterError::Unsupported)
    }

    async fn ping(&self) -> Ping {
        Ping {
            ok: true,
            server_time_ms: None,
            local_ms: Some(chrono::Utc::now().timestamp_millis()),
        }
    }
}
