//! Cross-exchange arbitrage scanner: streams order books from configured
//! venues into a shared store, simulates depth-aware cross-fills for every
//! exchange pair, publishes profitable opportunities, and records paper
//! fills for the ones that clear the configured thresholds.

pub mod config;
pub mod depth;
pub mod error;
pub mod exchange;
pub mod model;
pub mod paper;
pub mod publish;
pub mod scanner;
pub mod store;
pub mod streamer;
pub mod strategy;

pub use config::Config;
pub use error::{AdapterError, DecodeError, StoreError};
