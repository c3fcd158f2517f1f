//! In-memory adapter used by tests and by `scan_once` when no live venue
//! client is wired in. Serves canned books/markets set up by the caller.

use super::{ExchangeAdapter, ExchangeId, Ping, Ticker};
use crate::error::AdapterError;
use crate::model::{MarketMeta, OrderBookSnapshot, PriceLevel, Symbol};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

pub struct MockAdapter {
    id: ExchangeId,
    books: RwLock<HashMap<String, OrderBookSnapshot>>,
    markets: RwLock<HashMap<String, MarketMeta>>,
}

impl MockAdapter {
    pub fn new(id: ExchangeId) -> Self {
        Self {
            id,
            books: RwLock::new(HashMap::new()),
            markets: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_book(&self, symbol: &Symbol, asks: Vec<(f64, f64)>, bids: Vec<(f64, f64)>) {
        let asks = asks
            .into_iter()
            .filter_map(|(p, s)| PriceLevel::new(p, s))
            .collect();
        let bids = bids
            .into_iter()
            .filter_map(|(p, s)| PriceLevel::new(p, s))
            .collect();
        let snap = OrderBookSnapshot::build(
            self.id.as_str(),
            symbol.clone(),
            chrono::Utc::now().timestamp_millis(),
            asks,
            bids,
            50,
        );
        self.books
            .write()
            .insert(symbol.as_str().to_string(), snap);
    }

    pub fn set_market(&self, symbol: &Symbol, meta: MarketMeta) {
        self.markets
            .write()
            .insert(symbol.as_str().to_string(), meta);
    }
}

#[async_trait]
impl ExchangeAdapter for MockAdapter {
    fn id(&self) -> ExchangeId {
        self.id
    }

    async fn fetch_order_book(
        &self,
        symbol: &Symbol,
        limit: usize,
    ) -> Result<OrderBookSnapshot, AdapterError> {
        let mut snap = self
            .books
            .read()
            .get(symbol.as_str())
            .cloned()
            .ok_or_else(|| AdapterError::EmptyBook {
                exchange: self.id.to_string(),
                symbol: symbol.as_str().to_string(),
            })?;
        snap.asks.truncate(limit);
        snap.bids.truncate(limit);
        Ok(snap)
    }

    async fn fetch_ticker(&self, symbol: &Symbol) -> Result<Ticker, AdapterError> {
        let snap = self.books.read().get(symbol.as_str()).cloned();
        let last = snap
            .and_then(|s| s.asks.first().map(|l| l.price))
            .unwrap_or(0.0);
        Ok(Ticker {
            symbol: symbol.clone(),
            last,
            ts_ms: chrono::Utc::now().timestamp_millis(),
        })
    }

    async fn load_markets(&self) -> Result<HashMap<String, MarketMeta>, AdapterError> {
        Ok(self.markets.read().clone())
    }

    async fn list_symbols(&self, quote: Option<&str>) -> Result<Vec<Symbol>, AdapterError> {
        let markets = self.markets.read();
        let mut out: Vec<Symbol> = markets
            .iter()
            .filter(|(_, m)| m.active)
            .filter(|(_, m)| quote.map(|q| m.quote.eq_ignore_ascii_case(q)).unwrap_or(true))
            .filter_map(|(sym, _)| Symbol::new(sym.clone()).ok())
            .collect();
        out.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(out)
    }

    async fn ping(&self) -> Ping {
        Ping {
            ok: true,
            server_time_ms: Some(chrono::Utc::now().timestamp_millis()),
            local_ms: Some(chrono::Utc::now().timestamp_millis()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_direct_hit() {
        let adapter = MockAdapter::new(ExchangeId::Kraken);
        let sym = Symbol::new("BTC/EUR").unwrap();
        adapter.set_market(
            &sym,
            MarketMeta {
                base: "BTC".into(),
                quote: "EUR".into(),
                ..Default::default()
            },
        );
        let resolved = adapter.resolve_symbol(&sym).await.unwrap();
        assert_eq!(resolved, "BTC/EUR");
    }

    #[tokio::test]
    async fn resolves_via_synonym_class() {
        let adapter = MockAdapter::new(ExchangeId::Kraken);
        let canonical = Symbol::new("BTC/EUR").unwrap();
        let venue_symbol = Symbol::new("XBT/EUR").unwrap();
        adapter.set_market(
            &venue_symbol,
            MarketMeta {
                base: "XBT".into(),
                quote: "EUR".into(),
                ..Default::default()
            },
        );
        let resolved = adapter.resolve_symbol(&canonical).await.unwrap();
        assert_eq!(resolved, "XBT/EUR");
    }

    #[tokio::test]
    async fn unresolvable_symbol_errors() {
        let adapter = MockAdapter::new(ExchangeId::Kraken);
        let sym = Symbol::new("DOGE/EUR").unwrap();
        let err = adapter.resolve_symbol(&sym).await.unwrap_err();
        assert!(matches!(err, AdapterError::SymbolNotFound { .. }));
    }
}
