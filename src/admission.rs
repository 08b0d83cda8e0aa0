//! Glue between the HTTP surface, the durable store and the in-memory book.
//!
//! Validates the request, debits the user's balance and persists a pending
//! order in one store commit, then hands the order to the engine and
//! enqueues whatever events it produced. The store write happens before the
//! engine sees the order, mirroring the original's ordering (commit the
//! order row, then call into the shared book).

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

use crate::decimal::Decimal;
use crate::order_book::OrderBook;
use crate::orders::{BookOrder, Side};
use crate::queue::EventSender;
use crate::store::{Currency, OrderView, Store, StoreError};

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("price must be greater than zero")]
    NonPositivePrice,
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: Decimal, need: Decimal },
    #[error("order {0} not found")]
    OrderNotFound(u64),
    #[error("order {0} does not belong to this user")]
    Forbidden(u64),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Serializes balance debit/credit for a single `(user, currency)` pair, so
/// two concurrent `place_order` calls for the same user and currency can't
/// both read the same balance and both decide they can afford their order.
/// Stands in for the row lock a relational database would take on the
/// user's balance row.
pub struct UserLocks {
    inner: std::sync::Mutex<HashMap<(u64, Currency), Arc<AsyncMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self {
            inner: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, user_id: u64, currency: Currency) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().expect("user lock map poisoned");
        map.entry((user_id, currency))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

impl Default for UserLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate, debit, persist and match a new order. Returns its durable id.
pub async fn place_order(
    store: &Arc<AsyncMutex<Store>>,
    book: &OrderBook,
    events: &EventSender,
    locks: &UserLocks,
    user_id: u64,
    side: Side,
    amount: Decimal,
    price: Decimal,
) -> Result<u64, AdmissionError> {
    if !amount.is_positive() {
        return Err(AdmissionError::NonPositiveAmount);
    }
    if !price.is_positive() {
        return Err(AdmissionError::NonPositivePrice);
    }

    let currency = side.required_currency();
    let lock = locks.get(user_id, currency);
    let _guard = lock.lock().await;

    let order_id = {
        let mut guard = store.lock().await;
        match guard.debit_and_insert_pending_order(user_id, side, amount, price) {
            Ok(id) => id,
            Err(StoreError::InsufficientFunds { have, need }) => {
                return Err(AdmissionError::InsufficientFunds { have, need });
            }
            Err(other) => return Err(other.into()),
        }
    };

    let book_order = BookOrder::new(order_id, side, amount, price);
    let engine_events = book.add_order(book_order);
    events.send_all(engine_events).await;

    Ok(order_id)
}

/// Cancel a resting order owned by `user_id`. `Ok(false)` means the order
/// exists but has nothing left to cancel (already filled or cancelled, or
/// it never rested because it matched in full on arrival).
pub async fn cancel_order(
    store: &Arc<AsyncMutex<Store>>,
    book: &OrderBook,
    events: &EventSender,
    user_id: u64,
    order_id: u64,
) -> Result<bool, AdmissionError> {
    {
        let guard = store.lock().await;
        let order = guard
            .get_order(order_id)?
            .ok_or(AdmissionError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(AdmissionError::Forbidden(order_id));
        }
    }

    match book.cancel_order_by_id(order_id) {
        Some(event) => {
            events.send(event).await;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// List every order `user_id` has ever placed, most-recent matches included.
pub async fn list_orders(
    store: &Arc<AsyncMutex<Store>>,
    user_id: u64,
) -> Result<Vec<OrderView>, AdmissionError> {
    let guard = store.lock().await;
    Ok(guard.list_orders(user_id)?)
}
