//! Error taxonomy for the arbitrage pipeline.
//!
//! Per-pair failures are captured in-band as non-`ok` records (see
//! `model::Failure`) rather than propagated; these types are for the
//! boundaries that can't be swallowed that way (adapter I/O, store I/O,
//! malformed payloads).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("network/parse failure fetching from {exchange}: {message}")]
    Network { exchange: String, message: String },

    #[error("no canonical/venue symbol mapping for '{symbol}' on {exchange}")]
    SymbolNotFound { exchange: String, symbol: String },

    #[error("sanitized order book for {exchange}:{symbol} has zero viable levels")]
    EmptyBook { exchange: String, symbol: String },

    #[error("operation not supported by this adapter")]
    Unsupported,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("corrupt payload: {0}")]
    Corrupt(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Corrupt(e.to_string())
    }
}
