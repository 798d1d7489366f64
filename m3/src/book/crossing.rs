//! Crossing evaluation
//!
//! Walks the best bid and the best ask of a book towards each other and emits
//! a `Match` for every crossing pair until the book no longer crosses. Each
//! match executes at the resting ask price for the smaller of the two
//! remaining quantities.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::book::{Order, OrderBook};

/// A bid and an ask that can be settled against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Correlates the log lines of one execution
    pub id: Uuid,
    pub pair: String,
    pub bid_id: u64,
    pub ask_id: u64,
    pub price: Decimal,
    pub quantity: Decimal,
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bid #{} x ask #{} {} @ {}",
            self.pair, self.bid_id, self.ask_id, self.quantity, self.price
        )
    }
}

/// Matches of a single book. Two orders of the same owner never match; the
/// ask is passed over and the bid keeps looking for a counterparty.
pub fn find_matches(book: &OrderBook) -> Vec<Match> {
    let mut bids = book.bids_by_priority();
    let mut asks = book.asks_by_priority();
    let mut matches = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < bids.len() && j < asks.len() {
        let (bid, ask) = (&mut bids[i], &mut asks[j]);
        if !bid.crosses(ask) {
            break;
        }

        if bid.owner == ask.owner {
            j += 1;
            continue;
        }

        let quantity = bid.quantity.min(ask.quantity);
        matches.push(Match {
            id: Uuid::new_v4(),
            pair: book.pair.clone(),
            bid_id: bid.id,
            ask_id: ask.id,
            price: ask.price,
            quantity,
        });

        bid.quantity -= quantity;
        ask.quantity -= quantity;
        if bid.is_filled() {
            i += 1;
        }
        if ask.is_filled() {
            j += 1;
        }
    }

    matches
}

/// Groups a snapshot by pair and evaluates every book, pairs in key order.
pub fn find_all_matches(orders: Vec<Order>) -> Vec<Match> {
    let mut books: BTreeMap<String, OrderBook> = BTreeMap::new();
    for order in orders {
        books
            .entry(order.pair.clone())
            .or_insert_with(|| OrderBook::new(order.pair.clone()))
            .add_order(order);
    }
    books.values().flat_map(find_matches).collect()
}
