use crate::book::{Order, OrderSide};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Price levels of one pair, rebuilt from every snapshot.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub pair: String,
    pub bids: BTreeMap<Decimal, Vec<Order>>, // price -> orders
    pub asks: BTreeMap<Decimal, Vec<Order>>, // price -> orders
}

impl OrderBook {
    pub fn new(pair: impl Into<String>) -> Self {
        Self {
            pair: pair.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    /// Orders of another pair or without quantity are ignored.
    pub fn add_order(&mut self, order: Order) {
        if order.pair != self.pair || order.is_filled() {
            return;
        }
        let orders = match order.side {
            OrderSide::Buy => self.bids.entry(order.price).or_default(),
            OrderSide::Sell => self.asks.entry(order.price).or_default(),
        };
        // time priority inside a level follows the offer id
        let at = orders.partition_point(|o| o.id < order.id);
        orders.insert(at, order);
    }

    pub fn get_best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    pub fn get_best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    pub fn get_spread(&self) -> Option<Decimal> {
        match (self.get_best_ask(), self.get_best_bid()) {
            (Some(ask), Some(bid)) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.bids.values().map(Vec::len).sum::<usize>()
            + self.asks.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Bids from best (highest) to worst.
    pub fn bids_by_priority(&self) -> Vec<Order> {
        self.bids.values().rev().flatten().cloned().collect()
    }

    /// Asks from best (lowest) to worst.
    pub fn asks_by_priority(&self) -> Vec<Order> {
        self.asks.values().flatten().cloned().collect()
    }
}
