//! The two-sided book: dispatches incoming orders to the opposite side for
//! matching and, if a residual remains, rests it on the same side.
//!
//! A single `std::sync::Mutex` guards both sides, matching the teacher's
//! original rationale (`OrderBook` held one coarse lock, not per-side
//! locks) and the Python original's single `threading.Lock`.

use std::sync::Mutex;

use crate::book_side::BookSide;
use crate::event::Event;
use crate::orders::{BookOrder, Side};

pub struct OrderBook {
    inner: Mutex<BookSides>,
}

struct BookSides {
    bids: BookSide,
    asks: BookSide,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BookSides {
                bids: BookSide::new(false),
                asks: BookSide::new(true),
            }),
        }
    }

    /// Match `order` against the opposite side and, if a residual remains,
    /// rest it on the same side. Returns every event generated; the caller
    /// is responsible for enqueuing them onto the `EventQueue` (outside the
    /// lock, since enqueuing may suspend).
    pub fn add_order(&self, mut order: BookOrder) -> Vec<Event> {
        let mut sides = self.inner.lock().expect("book mutex poisoned");

        let mut events = match order.side {
            Side::Buy => sides.asks.match_against(&mut order),
            Side::Sell => sides.bids.match_against(&mut order),
        };

        if order.is_filled() {
            events.push(Event::Complete { order_id: order.id });
        } else {
            match order.side {
                Side::Buy => sides.bids.add(order),
                Side::Sell => sides.asks.add(order),
            }
        }

        events
    }

    /// Cancel a resting order by id. Idempotent: a second call for the same
    /// id (or an id that was never resting) returns `None` and emits nothing.
    pub fn cancel_order_by_id(&self, order_id: u64) -> Option<Event> {
        let mut sides = self.inner.lock().expect("book mutex poisoned");
        sides
            .bids
            .cancel(order_id)
            .or_else(|| sides.asks.cancel(order_id))
    }

    /// Best bid/ask prices, for diagnostics and the non-crossing invariant tests.
    pub fn best_prices(&self) -> (Option<crate::decimal::Decimal>, Option<crate::decimal::Decimal>) {
        let sides = self.inner.lock().expect("book mutex poisoned");
        (sides.bids.best_price(), sides.asks.best_price())
    }

    pub fn bid_orders(&self) -> Vec<BookOrder> {
        self.inner.lock().expect("book mutex poisoned").bids.orders()
    }

    pub fn ask_orders(&self) -> Vec<BookOrder> {
        self.inner.lock().expect("book mutex poisoned").asks.orders()
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
