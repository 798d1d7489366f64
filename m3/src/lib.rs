//! M3 - maker market matcher
//!
//! Polls an on-chain order book and settles crossing offers through a trade
//! proxy contract:
//! - `book`: order books and crossing evaluation
//! - `market`: the on-chain market adaptor
//! - `matcher`: the polling loop
//! - `daemon`: process wiring and shutdown
//! - `config`, `logger`, `metrics`: ambient services

pub mod book;
pub mod config;
pub mod daemon;
pub mod logger;
pub mod market;
pub mod matcher;
pub mod metrics;
