//! One side of the order book: a price-indexed map of FIFO queues.
//!
//! Mirrors the teacher's `orderbook::OrderBook` price-level map, but
//! generalized into a standalone side with its own order-id index (for
//! `cancel` without a full scan) and an event-emitting match walk instead
//! of a bare `Vec<Trade>`.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::decimal::Decimal;
use crate::event::Event;
use crate::orders::BookOrder;

/// One side (bids or asks) of the book.
pub struct BookSide {
    /// `true` for an ascending side (asks: lowest price first).
    ascending: bool,
    levels: BTreeMap<Decimal, VecDeque<BookOrder>>,
    /// order id -> price, so `cancel` doesn't have to scan every level.
    index: HashMap<u64, Decimal>,
}

impl BookSide {
    pub fn new(ascending: bool) -> Self {
        Self {
            ascending,
            levels: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    /// Append `order` to its price level, creating the level if absent.
    pub fn add(&mut self, order: BookOrder) {
        self.index.insert(order.id, order.price);
        self.levels.entry(order.price).or_default().push_back(order);
    }

    /// Walk levels in priority order, matching `incoming` against resting
    /// orders until `incoming` is filled or no level crosses. Returns the
    /// events generated, in emission order.
    ///
    /// `incoming` is mutated in place (its `matched_amount` advances); the
    /// caller decides whether the residual should rest on the other side.
    pub fn match_against(&mut self, incoming: &mut BookOrder) -> Vec<Event> {
        let mut events = Vec::new();
        let mut levels_to_remove = Vec::new();

        let prices: Vec<Decimal> = if self.ascending {
            self.levels.keys().copied().collect()
        } else {
            self.levels.keys().rev().copied().collect()
        };

        'levels: for price in prices {
            if !self.crosses(price, incoming.price) {
                break;
            }
            let level = self.levels.get_mut(&price).expect("price came from levels.keys()");

            while let Some(resting) = level.front_mut() {
                let amount = resting.transfer_amount(incoming);

                events.push(Event::Match {
                    order_id: incoming.id,
                    matched_order_id: resting.id,
                    amount,
                });
                events.push(Event::Match {
                    order_id: resting.id,
                    matched_order_id: incoming.id,
                    amount,
                });

                if resting.is_filled() {
                    events.push(Event::Complete {
                        order_id: resting.id,
                    });
                    self.index.remove(&resting.id);
                    level.pop_front();
                }

                if level.is_empty() {
                    levels_to_remove.push(price);
                }
                if incoming.is_filled() {
                    break 'levels;
                }
                if level.is_empty() {
                    break;
                }
            }
        }

        for price in levels_to_remove {
            self.levels.remove(&price);
        }

        events
    }

    /// Whether a resting level at `level_price` crosses an incoming order
    /// priced at `incoming_price`, per the side's iteration direction.
    fn crosses(&self, level_price: Decimal, incoming_price: Decimal) -> bool {
        if self.ascending {
            level_price <= incoming_price
        } else {
            level_price >= incoming_price
        }
    }

    /// Remove an order by id, dropping its level if it becomes empty.
    /// Returns the `Cancelled` event, or `None` if the id isn't resting here.
    pub fn cancel(&mut self, order_id: u64) -> Option<Event> {
        let price = self.index.remove(&order_id)?;
        let level = self.levels.get_mut(&price)?;
        let position = level.iter().position(|o| o.id == order_id)?;
        let order = level.remove(position)?;
        if level.is_empty() {
            self.levels.remove(&price);
        }
        Some(Event::Cancelled {
            order_id: order.id,
            remaining_amount: order.remaining(),
        })
    }

    /// Best (highest priority) price currently resting on this side, if any.
    pub fn best_price(&self) -> Option<Decimal> {
        if self.ascending {
            self.levels.keys().next().copied()
        } else {
            self.levels.keys().next_back().copied()
        }
    }

    /// Snapshot of all resting orders, in priority-then-FIFO order.
    pub fn orders(&self) -> Vec<BookOrder> {
        let prices: Box<dyn Iterator<Item = &Decimal>> = if self.ascending {
            Box::new(self.levels.keys())
        } else {
            Box::new(self.levels.keys().rev())
        };
        prices
            .flat_map(|p| self.levels[p].iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::Side;

    fn order(id: u64, side: Side, amount: &str, price: &str) -> BookOrder {
        BookOrder::new(id, side, amount.parse().unwrap(), price.parse().unwrap())
    }

    #[test]
    fn add_then_snapshot_is_fifo_within_price() {
        let mut asks = BookSide::new(true);
        asks.add(order(1, Side::Sell, "10", "3.5"));
        asks.add(order(2, Side::Sell, "30", "3.5"));

        let snap = asks.orders();
        assert_eq!(snap[0].id, 1);
        assert_eq!(snap[1].id, 2);
    }

    #[test]
    fn match_against_consumes_best_price_first() {
        let mut asks = BookSide::new(true);
        asks.add(order(1, Side::Sell, "10", "3.6"));
        asks.add(order(2, Side::Sell, "30", "3.5"));
        asks.add(order(3, Side::Sell, "15", "3.5"));
        asks.add(order(4, Side::Sell, "5", "3.4"));

        let mut incoming = order(5, Side::Buy, "60", "3.5");
        let events = asks.match_against(&mut incoming);

        assert!(incoming.is_filled());
        assert_eq!(incoming.matched_amount, "50".parse().unwrap());
        assert_eq!(asks.orders()[0].id, 1); // untouched, price above incoming
        assert!(events.iter().any(|e| matches!(e, Event::Complete { order_id } if *order_id == 4)));
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut bids = BookSide::new(false);
        bids.add(order(1, Side::Buy, "10", "5"));
        assert!(bids.cancel(1).is_some());
        assert!(bids.cancel(1).is_none());
    }
}
