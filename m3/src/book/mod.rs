//! Order Book Module
//!
//! Rebuilds the open offers of a snapshot into per-pair books and finds the
//! bid/ask pairs that cross:
//! - `order`: normalized offer types
//! - `orderbook`: price levels of one pair
//! - `crossing`: match candidates from a book

pub mod crossing;
pub mod order;
pub mod orderbook;

pub use crossing::{find_all_matches, find_matches, Match};
pub use order::{Order, OrderSide};
pub use orderbook::OrderBook;
