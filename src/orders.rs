use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;
use crate::store::Currency;

/// Which side of the book an order rests on (or the opposite side it hits).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The currency the order debits/credits: quote (EUR) for buys, base (ETH) for sells.
    pub fn required_currency(&self) -> Currency {
        match self {
            Side::Buy => Currency::Eur,
            Side::Sell => Currency::Eth,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// An order resting in (or passing through) the in-memory book.
///
/// Engine-only: durable identity and history live in `store::Order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookOrder {
    pub id: u64,
    pub side: Side,
    pub amount: Decimal,
    pub price: Decimal,
    pub matched_amount: Decimal,
}

impl BookOrder {
    pub fn new(id: u64, side: Side, amount: Decimal, price: Decimal) -> Self {
        Self {
            id,
            side,
            amount,
            price,
            matched_amount: Decimal::ZERO,
        }
    }

    pub fn remaining(&self) -> Decimal {
        self.amount
            .checked_sub(self.matched_amount)
            .expect("matched_amount is bounded above by amount")
    }

    pub fn is_filled(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Transfer the minimum of `self` and `other`'s remaining amount between
    /// both orders, returning the traded quantity. Mirrors the original
    /// `OrderBookOrder.transfer_amount`.
    pub(crate) fn transfer_amount(&mut self, other: &mut BookOrder) -> Decimal {
        let traded = self.remaining().min(other.remaining());
        self.matched_amount = self
            .matched_amount
            .checked_add(traded)
            .expect("matched_amount stays within amount by construction");
        other.matched_amount = other
            .matched_amount
            .checked_add(traded)
            .expect("matched_amount stays within amount by construction");
        traded
    }
}
