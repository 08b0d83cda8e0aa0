use serde::{Deserialize, Serialize};

use crate::decimal::Decimal;

/// A matching-decision event, emitted by the book under its lock and
/// consumed, in order, by the background persister.
///
/// For every order, at most one `Complete` and at most one `Cancelled`
/// are ever emitted, and never both for the same order (§3 invariant 5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Event {
    /// One participant's side of a matched slice. The engine always emits
    /// the symmetric pair — `Match{a,b,x}` alongside `Match{b,a,x}` — within
    /// the same `add_order` call.
    Match {
        order_id: u64,
        matched_order_id: u64,
        amount: Decimal,
    },
    /// `order_id`'s `is_filled()` just transitioned from false to true.
    Complete { order_id: u64 },
    /// `order_id` was removed by user request with `remaining_amount` unmatched.
    Cancelled {
        order_id: u64,
        remaining_amount: Decimal,
    },
}
