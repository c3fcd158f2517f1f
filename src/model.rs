//! Core data model shared by every component of the pipeline.
//!
//! Mirrors the canonical JSON shapes of the external interface: anything
//! that crosses the store or the pub/sub channel derives `Serialize` +
//! `Deserialize` and round-trips byte-for-byte after sort-normalization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A `BASE/QUOTE` trading pair, stored uppercased in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if !s.contains('/') {
            return Err(format!("invalid symbol '{s}', expected BASE/QUOTE"));
        }
        Ok(Symbol(s.to_uppercase()))
    }

    pub fn base(&self) -> &str {
        self.0.split('/').next().unwrap_or("")
    }

    pub fn quote(&self) -> &str {
        self.0.split('/').nth(1).unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Symbol::new(s)
    }
}

/// A `(price, size_base)` level. Both fields are required positive by I1;
/// malformed levels are dropped during sanitization, never constructed here.
///
/// Wire/storage form is a 2-element `[price, size]` array, matching the
/// shared store's documented shape, not an object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, f64)", into = "(f64, f64)")]
pub struct PriceLevel {
    pub price: f64,
    pub size_base: f64,
}

impl PriceLevel {
    pub fn new(price: f64, size_base: f64) -> Option<Self> {
        if price > 0.0 && size_base > 0.0 {
            Some(Self { price, size_base })
        } else {
            None
        }
    }
}

impl From<PriceLevel> for (f64, f64) {
    fn from(level: PriceLevel) -> Self {
        (level.price, level.size_base)
    }
}

impl TryFrom<(f64, f64)> for PriceLevel {
    type Error = String;
    fn try_from((price, size_base): (f64, f64)) -> Result<Self, Self::Error> {
        PriceLevel::new(price, size_base)
            .ok_or_else(|| format!("invalid price level [{price}, {size_base}]: both must be positive"))
    }
}

/// `asks` strictly ascending by price, `bids` strictly descending, each
/// truncated to at most `D` levels (I1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub exchange: String,
    pub symbol: Symbol,
    #[serde(rename = "ts")]
    pub ts_ms: i64,
    pub asks: Vec<PriceLevel>,
    pub bids: Vec<PriceLevel>,
}

impl OrderBookSnapshot {
    /// Sanitizes raw levels: drops non-positive entries, sorts, truncates
    /// to `depth`, and re-asserts strict monotonicity (I1).
    pub fn build(
        exchange: impl Into<String>,
        symbol: Symbol,
        ts_ms: i64,
        mut asks: Vec<PriceLevel>,
        mut bids: Vec<PriceLevel>,
        depth: usize,
    ) -> Self {
        asks.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap());
        bids.sort_by(|a, b| b.price.partial_cmp(&a.price).unwrap());
        asks.dedup_by(|a, b| a.price == b.price);
        bids.dedup_by(|a, b| a.price == b.price);
        asks.truncate(depth);
        bids.truncate(depth);
        Self {
            exchange: exchange.into(),
            symbol,
            ts_ms,
            asks,
            bids,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.asks.windows(2).all(|w| w[0].price < w[1].price)
            && self.bids.windows(2).all(|w| w[0].price > w[1].price)
            && self.asks.iter().all(|l| l.size_base > 0.0)
            && self.bids.iter().all(|l| l.size_base > 0.0)
    }
}

/// Market metadata for one (exchange, symbol) pair. Only `taker_fee` is
/// required; venues default to 0.001 when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMeta {
    pub taker_fee: f64,
    pub maker_fee: Option<f64>,
    pub base_step: Option<f64>,
    pub price_step: Option<f64>,
    pub min_base: Option<f64>,
    pub max_base: Option<f64>,
    pub min_notional: Option<f64>,
    pub max_notional: Option<f64>,
    pub withdraw_fee_base: Option<f64>,
    pub base: String,
    pub quote: String,
    pub active: bool,
}

pub const DEFAULT_TAKER_FEE: f64 = 0.001;

impl Default for MarketMeta {
    fn default() -> Self {
        Self {
            taker_fee: DEFAULT_TAKER_FEE,
            maker_fee: None,
            base_step: None,
            price_step: None,
            min_base: None,
            max_base: None,
            min_notional: None,
            max_notional: None,
            withdraw_fee_base: None,
            base: String::new(),
            quote: String::new(),
            active: true,
        }
    }
}

/// Output of the depth simulator (C4). `ok` is true iff `qty_base_sold > 0`
/// AND `net_profit_quote > 0` (I3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FillResult {
    pub qty_base_bought: f64,
    pub qty_base_after_withdraw: f64,
    pub qty_base_sold: f64,
    pub spent_quote: f64,
    pub received_quote: f64,
    pub buy_fee_quote: f64,
    pub sell_fee_quote: f64,
    pub withdraw_fee_base: f64,
    pub avg_buy_px: f64,
    pub avg_sell_px: f64,
    pub effective_spread: f64,
    pub net_profit_quote: f64,
    pub roi: f64,
    pub ok: bool,
}

/// Why a pair produced a non-`ok` record: a semantic reason, or a captured
/// exception. Never both — see design note on tagged structures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Failure {
    Reason(String),
    Error { error: String, error_type: String },
}

/// One ordered-pair evaluation for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairOpportunity {
    pub ts_ms: i64,
    pub symbol: Symbol,
    pub buy: String,
    pub sell: String,
    pub best_ask: f64,
    pub best_bid: f64,
    pub gross_spread: f64,
    pub fee_buy: f64,
    pub fee_sell: f64,
    pub depth: FillResult,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

/// Per-symbol, per-scan-tick record: post-threshold top-N plus the
/// pre-threshold debug ranking for observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanBlock {
    pub symbol: Symbol,
    pub top: Vec<PairOpportunity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<PairOpportunity>,
    pub debug_top: Vec<PairOpportunity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_best_any: Option<PairOpportunity>,
}

/// Batch handed to the publisher: `{ts_ms, items}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityBatch {
    #[serde(rename = "ts")]
    pub ts_ms: i64,
    pub items: Vec<PairOpportunity>,
}

/// A simulated paper fill, produced by the paper executor (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperFill {
    pub ts_ms: i64,
    pub symbol: Symbol,
    pub buy: String,
    pub sell: String,
    pub qty_base: f64,
    pub best_ask: f64,
    pub best_bid: f64,
    pub eff_ask: f64,
    pub eff_bid: f64,
    pub fee_buy_rate: f64,
    pub fee_sell_rate: f64,
    pub slippage_bps: f64,
    pub spent_quote: f64,
    pub received_quote: f64,
    pub net_profit_quote: f64,
    pub roi: f64,
    pub gross_spread_bps: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_uppercases_and_validates() {
        let s = Symbol::new("btc/eur").unwrap();
        assert_eq!(s.as_str(), "BTC/EUR");
        assert_eq!(s.base(), "BTC");
        assert_eq!(s.quote(), "EUR");
        assert!(Symbol::new("BTCEUR").is_err());
    }

    #[test]
    fn snapshot_build_sorts_and_truncates() {
        let asks = vec![
            PriceLevel::new(101.0, 1.0).unwrap(),
            PriceLevel::new(100.0, 1.0).unwrap(),
            PriceLevel::new(102.0, 1.0).unwrap(),
        ];
        let bids = vec![
            PriceLevel::new(99.0, 1.0).unwrap(),
            PriceLevel::new(98.0, 1.0).unwrap(),
            PriceLevel::new(99.5, 1.0).unwrap(),
        ];
        let snap = OrderBookSnapshot::build(
            "kraken",
            Symbol::new("BTC/EUR").unwrap(),
            0,
            asks,
            bids,
            2,
        );
        assert_eq!(snap.asks.len(), 2);
        assert_eq!(snap.asks[0].price, 100.0);
        assert_eq!(snap.asks[1].price, 101.0);
        assert_eq!(snap.bids[0].price, 99.5);
        assert!(snap.is_ordered());
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let snap = OrderBookSnapshot::build(
            "kraken",
            Symbol::new("BTC/EUR").unwrap(),
            1000,
            vec![PriceLevel::new(100.0, 1.0).unwrap()],
            vec![PriceLevel::new(99.0, 1.0).unwrap()],
            50,
        );
        let encoded = serde_json::to_string(&snap).unwrap();
        let decoded: OrderBookSnapshot = serde_json::from_str(&encoded).unwrap();
        let re_encoded = serde_json::to_string(&decoded).unwrap();
        assert_eq!(encoded, re_encoded);
    }

    #[test]
    fn price_level_serializes_as_a_two_element_array() {
        let level = PriceLevel::new(100.0, 1.5).unwrap();
        let encoded = serde_json::to_string(&level).unwrap();
        assert_eq!(encoded, "[100.0,1.5]");
        let decoded: PriceLevel = serde_json::from_str("[100.0, 1.5]").unwrap();
        assert_eq!(decoded, level);
    }

    #[test]
    fn price_level_rejects_non_positive_values_on_decode() {
        let result: Result<PriceLevel, _> = serde_json::from_str("[0.0, 1.0]");
        assert!(result.is_err());
    }

    #[test]
    fn snapshot_wire_shape_uses_ts_not_ts_ms() {
        let snap = OrderBookSnapshot::build(
            "kraken",
            Symbol::new("BTC/EUR").unwrap(),
            1000,
            vec![PriceLevel::new(100.0, 1.0).unwrap()],
            vec![PriceLevel::new(99.0, 1.0).unwrap()],
            50,
        );
        let encoded = serde_json::to_value(&snap).unwrap();
        assert!(encoded.get("ts").is_some());
        assert!(encoded.get("ts_ms").is_none());
        assert_eq!(encoded["asks"][0], serde_json::json!([100.0, 1.0]));
    }

    #[test]
    fn opportunity_batch_wire_shape_uses_ts_not_ts_ms() {
        let batch = OpportunityBatch {
            ts_ms: 1234,
            items: vec![],
        };
        let encoded = serde_json::to_value(&batch).unwrap();
        assert!(encoded.get("ts").is_some());
        assert!(encoded.get("ts_ms").is_none());
    }
}
