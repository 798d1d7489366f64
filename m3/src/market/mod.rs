//! Market Adaptor Module
//!
//! Read and write access to the on-chain order book:
//! - `abi`: contract call encoding and return value decoding
//! - `ipc`: JSON-RPC client over the node's IPC socket
//! - `atomic`: the maker market / trade proxy adaptor
//!
//! The matcher only sees the `Market` trait.

pub mod abi;
pub mod atomic;
pub mod ipc;

pub use atomic::AtomicMarket;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::book::{Match, Order};

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid match: {0}")]
    InvalidMatch(String),
    #[error("connection closed")]
    Closed,
}

/// Order state and match execution on a market.
///
/// `close` releases the underlying connection. Callers stop every user of
/// the market before closing it; calls made after `close` fail with
/// `MarketError::Closed`.
#[async_trait]
pub trait Market: Send + Sync {
    /// Current open orders, ordered by id.
    async fn orders(&self) -> Result<Vec<Order>, MarketError>;

    /// Submits one match for settlement.
    async fn execute(&self, candidate: &Match) -> Result<(), MarketError>;

    async fn close(&self) -> Result<(), MarketError>;
}
