//! Order Types
//!
//! An order is one open offer read from the maker market, already normalized
//! to a side, a price in quote per base, and a quantity in base units.

use rust_decimal::Decimal;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderSide {
    #[default]
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Offer id on the maker market
    pub id: u64,
    /// `base/quote` key of the token pair
    pub pair: String,
    pub side: OrderSide,
    /// Quote per base
    pub price: Decimal,
    /// Remaining base units
    pub quantity: Decimal,
    pub owner: String,
}

impl Order {
    pub fn new(
        id: u64,
        pair: impl Into<String>,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            id,
            pair: pair.into(),
            side,
            price,
            quantity,
            owner: owner.into(),
        }
    }

    pub fn is_filled(&self) -> bool {
        self.quantity <= Decimal::ZERO
    }

    /// True when a bid at `self` and an ask at `other` cross (or vice versa).
    pub fn crosses(&self, other: &Order) -> bool {
        if self.pair != other.pair {
            return false;
        }
        match (self.side, other.side) {
            (OrderSide::Buy, OrderSide::Sell) => self.price >= other.price,
            (OrderSide::Sell, OrderSide::Buy) => other.price >= self.price,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_crosses() {
        let bid = Order::new(1, "a/b", OrderSide::Buy, dec!(100), dec!(1), "x");
        let ask = Order::new(2, "a/b", OrderSide::Sell, dec!(100), dec!(1), "y");
        let high_ask = Order::new(3, "a/b", OrderSide::Sell, dec!(101), dec!(1), "y");
        let other_pair = Order::new(4, "a/c", OrderSide::Sell, dec!(90), dec!(1), "y");

        assert!(bid.crosses(&ask));
        assert!(ask.crosses(&bid));
        assert!(!bid.crosses(&high_ask));
        assert!(!bid.crosses(&other_pair));
        assert!(!ask.crosses(&high_ask));
    }

    #[test]
    fn test_is_filled() {
        let mut order = Order::new(1, "a/b", OrderSide::Buy, dec!(1), dec!(2), "x");
        assert!(!order.is_filled());
        order.quantity -= dec!(2);
        assert!(order.is_filled());
    }
}
