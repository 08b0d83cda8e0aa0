//! The background task that drains the event queue and applies every
//! decision the matching engine made to the durable store.
//!
//! Mirrors `BackgroundEventPersister`/`EventPersister.run` in the original:
//! a single consumer pulls events off the queue in order and applies them
//! one at a time. There is no crash recovery here, by design (§9) — if
//! applying an event fails, the task logs the failure and exits rather than
//! retrying or skipping, since skipping would leave the durable store
//! permanently inconsistent with the book.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

use crate::event::Event;
use crate::queue::EventReceiver;
use crate::store::Store;

/// Drain `receiver` until the channel closes or the store returns an error.
///
/// Takes the store behind an async mutex because the admission glue also
/// writes to it directly (placing orders, recording debits); this task is
/// simply the other writer, serialized the same way.
pub async fn run(mut receiver: EventReceiver, store: Arc<AsyncMutex<Store>>) {
    info!("persister started");

    while let Some(event) = receiver.recv().await {
        let mut guard = store.lock().await;
        if let Err(err) = apply(&mut guard, &event) {
            error!(?event, error = %err, "persister failed to apply event, exiting");
            return;
        }
    }

    warn!("event queue closed, persister exiting");
}

fn apply(store: &mut Store, event: &Event) -> Result<(), crate::store::StoreError> {
    match *event {
        Event::Match {
            order_id,
            matched_order_id,
            amount,
        } => store.insert_match(order_id, matched_order_id, amount),
        Event::Complete { order_id } => {
            store.set_order_status(order_id, crate::store::OrderStatus::Complete)
        }
        Event::Cancelled {
            order_id,
            remaining_amount,
        } => store.apply_cancelled(order_id, remaining_amount),
    }
}
