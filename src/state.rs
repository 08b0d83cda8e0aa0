//! Process-wide state, explicit instead of module-level singletons.
//!
//! The original kept a single `SharedOrderBook` and `Events` queue as
//! module globals; here both are fields on `AppState`, constructed once in
//! `main` (or once per test) and cloned into every request handler the way
//! the teacher's `AppState` was threaded through `axum::Router::with_state`.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::admission::UserLocks;
use crate::order_book::OrderBook;
use crate::persister;
use crate::queue::{self, EventSender};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub book: Arc<OrderBook>,
    pub events: EventSender,
    pub store: Arc<AsyncMutex<Store>>,
    pub user_locks: Arc<UserLocks>,
}

impl AppState {
    /// Open the durable store at `path`, seed demo users if needed, and
    /// spawn the background persister task that will keep consuming events
    /// for as long as this `AppState` (and its clones) stay alive.
    pub async fn new(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut store = Store::open(path)?;
        store.seed_demo_users()?;
        let store = Arc::new(AsyncMutex::new(store));

        let (tx, rx) = queue::channel(queue::DEFAULT_CAPACITY);
        tokio::spawn(persister::run(rx, store.clone()));

        Ok(Self {
            book: Arc::new(OrderBook::new()),
            events: tx,
            store,
            user_locks: Arc::new(UserLocks::new()),
        })
    }
}
