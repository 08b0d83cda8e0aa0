//! The embedded durable store: users, API keys, orders, matches and
//! balances, backed by ParityDB (the teacher's choice for its trade log,
//! generalized here to every durable entity touched by the persister and
//! the admission glue).
//!
//! ParityDB gives us atomic multi-key commits (`Db::commit`) but no SQL-style
//! row locking or query language, so every read-then-write sequence that
//! needs isolation (balance debit/credit, id allocation) is serialized by a
//! lock the caller holds — the admission glue's per-user balance mutex, or
//! the persister's single-threaded consumption of the event queue.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bincode::config::{self, standard};
use parity_db::{ColId, Db, Options};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::Decimal;
use crate::orders::Side;

const COL_ORDERS: ColId = 0;
const COL_MATCHES: ColId = 1;
const COL_BALANCES: ColId = 2;
const COL_USERS: ColId = 3;
const COL_API_KEYS: ColId = 4;
const COL_COUNTERS: ColId = 5;
const NUM_COLUMNS: u8 = 6;

const COUNTER_ORDER_ID: &[u8] = b"order_id";
const COUNTER_MATCH_ID: &[u8] = b"match_id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ParityDB error: {0}")]
    Parity(#[from] parity_db::Error),
    #[error("bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("order {0} not found")]
    OrderNotFound(u64),
    #[error("balance for user {0} in {1:?} not found")]
    BalanceNotFound(u64, Currency),
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds { have: Decimal, need: Decimal },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The two currencies this market settles in. `buy` orders move EUR
/// (quote), `sell` orders move ETH (base).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub enum Currency {
    Eur,
    Eth,
}

impl Currency {
    fn tag(&self) -> u8 {
        match self {
            Currency::Eur => 0,
            Currency::Eth => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Complete,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Order {
    pub id: u64,
    pub user_id: u64,
    pub side: Side,
    pub amount: Decimal,
    pub price: Decimal,
    pub status: OrderStatus,
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Match {
    pub id: u64,
    pub order_id: u64,
    pub matched_order_id: u64,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct User {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct ApiKey {
    pub user_id: u64,
    pub key: String,
}

/// An order alongside its durable match rows, as returned by `list_orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderView {
    pub id: u64,
    #[serde(rename = "type")]
    pub side: Side,
    pub amount: Decimal,
    pub price: Decimal,
    pub status: OrderStatus,
    pub matches: Vec<Match>,
}

pub struct Store {
    db: Db,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let mut opts = Options::with_columns(path.as_ref(), NUM_COLUMNS);
        for col in opts.columns.iter_mut() {
            col.btree_index = true;
        }
        let db = Db::open_or_create(&opts)?;
        Ok(Store { db })
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn encode<T: bincode::Encode>(value: &T) -> StoreResult<Vec<u8>> {
        Ok(bincode::encode_to_vec(value, standard())?)
    }

    fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> StoreResult<T> {
        let (value, _) = bincode::decode_from_slice(bytes, config::standard())?;
        Ok(value)
    }

    fn next_id(&mut self, counter_key: &[u8]) -> StoreResult<u64> {
        let current = match self.db.get(COL_COUNTERS, counter_key)? {
            Some(bytes) => u64::from_be_bytes(bytes.as_slice().try_into().unwrap_or([0; 8])),
            None => 0,
        };
        let next = current + 1;
        self.db.commit(vec![(
            COL_COUNTERS,
            counter_key.to_vec(),
            Some(next.to_be_bytes().to_vec()),
        )])?;
        Ok(next)
    }

    // ---- seed data -------------------------------------------------

    /// Idempotently create `user-1..9`, their API keys `user{i}`, and their
    /// starting balances of 5000 EUR / 50 ETH.
    pub fn seed_demo_users(&mut self) -> StoreResult<()> {
        for i in 1..=9u64 {
            if self.db.get(COL_USERS, &i.to_be_bytes())?.is_none() {
                let user = User {
                    id: i,
                    name: format!("user-{i}"),
                };
                self.db.commit(vec![(
                    COL_USERS,
                    i.to_be_bytes().to_vec(),
                    Some(Self::encode(&user)?),
                )])?;
            }

            let key_bytes = format!("user{i}").into_bytes();
            if self.db.get(COL_API_KEYS, &key_bytes)?.is_none() {
                let api_key = ApiKey {
                    user_id: i,
                    key: format!("user{i}"),
                };
                self.db
                    .commit(vec![(COL_API_KEYS, key_bytes, Some(Self::encode(&api_key)?))])?;
            }

            for (currency, amount) in [
                (Currency::Eur, Decimal::from_raw(5000_000_000)),
                (Currency::Eth, Decimal::from_raw(50_000_000)),
            ] {
                let key = Self::balance_key(i, currency);
                if self.db.get(COL_BALANCES, &key)?.is_none() {
                    self.db
                        .commit(vec![(COL_BALANCES, key, Some(Self::encode(&amount)?))])?;
                }
            }
        }
        Ok(())
    }

    // ---- auth -------------------------------------------------------

    /// Resolve `(user_id, key)` to an authenticated user id, mirroring the
    /// original's `check_credentials`.
    pub fn authenticate(&self, user_id: u64, key: &str) -> StoreResult<Option<u64>> {
        let Some(bytes) = self.db.get(COL_API_KEYS, key.as_bytes())? else {
            return Ok(None);
        };
        let api_key: ApiKey = Self::decode(&bytes)?;
        if api_key.user_id == user_id {
            Ok(Some(user_id))
        } else {
            Ok(None)
        }
    }

    // ---- balances -----------------------------------------------------

    fn balance_key(user_id: u64, currency: Currency) -> Vec<u8> {
        let mut key = user_id.to_be_bytes().to_vec();
        key.push(currency.tag());
        key
    }

    pub fn get_balance(&self, user_id: u64, currency: Currency) -> StoreResult<Decimal> {
        match self
            .db
            .get(COL_BALANCES, &Self::balance_key(user_id, currency))?
        {
            Some(bytes) => Self::decode(&bytes),
            None => Err(StoreError::BalanceNotFound(user_id, currency)),
        }
    }

    fn put_balance(&mut self, user_id: u64, currency: Currency, amount: Decimal) -> StoreResult<()> {
        self.db.commit(vec![(
            COL_BALANCES,
            Self::balance_key(user_id, currency),
            Some(Self::encode(&amount)?),
        )])?;
        Ok(())
    }

    pub fn credit_balance(&mut self, user_id: u64, currency: Currency, amount: Decimal) -> StoreResult<()> {
        let current = self.get_balance(user_id, currency)?;
        let updated = current
            .checked_add(amount)
            .map_err(|_| StoreError::InsufficientFunds {
                have: current,
                need: amount,
            })?;
        self.put_balance(user_id, currency, updated)
    }

    /// Debit `amount` from the user's balance in `currency` and insert a
    /// pending order in the same commit, or fail with `InsufficientFunds`
    /// and mutate nothing. Returns the new order's id.
    ///
    /// Callers (the admission glue) are expected to hold a per-user lock
    /// around this call: ParityDB commits are atomic, but the
    /// read-then-decide-then-write sequence here is not, by itself,
    /// isolated against a concurrent call for the same user.
    pub fn debit_and_insert_pending_order(
        &mut self,
        user_id: u64,
        side: Side,
        amount: Decimal,
        price: Decimal,
    ) -> StoreResult<u64> {
        let currency = side.required_currency();
        let balance = self.get_balance(user_id, currency)?;
        let required = match side {
            Side::Sell => amount,
            Side::Buy => amount
                .checked_mul(price)
                .map_err(|_| StoreError::InsufficientFunds {
                    have: balance,
                    need: balance,
                })?,
        };

        if balance < required {
            return Err(StoreError::InsufficientFunds {
                have: balance,
                need: required,
            });
        }
        let remaining = balance
            .checked_sub(required)
            .expect("required <= balance, checked above");

        let id = self.next_id(COUNTER_ORDER_ID)?;
        let order = Order {
            id,
            user_id,
            side,
            amount,
            price,
            status: OrderStatus::Pending,
            created_at: Self::now_secs(),
        };

        self.db.commit(vec![
            (
                COL_BALANCES,
                Self::balance_key(user_id, currency),
                Some(Self::encode(&remaining)?),
            ),
            (
                COL_ORDERS,
                id.to_be_bytes().to_vec(),
                Some(Self::encode(&order)?),
            ),
        ])?;

        Ok(id)
    }

    // ---- orders -------------------------------------------------------

    pub fn get_order(&self, order_id: u64) -> StoreResult<Option<Order>> {
        match self.db.get(COL_ORDERS, &order_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set_order_status(&mut self, order_id: u64, status: OrderStatus) -> StoreResult<()> {
        let mut order = self
            .get_order(order_id)?
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.status = status;
        self.db.commit(vec![(
            COL_ORDERS,
            order_id.to_be_bytes().to_vec(),
            Some(Self::encode(&order)?),
        )])?;
        Ok(())
    }

    /// Apply a `Cancelled` event: mark the order cancelled and refund the
    /// unmatched notional to its owner, in one commit.
    pub fn apply_cancelled(&mut self, order_id: u64, remaining_amount: Decimal) -> StoreResult<()> {
        let mut order = self
            .get_order(order_id)?
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.status = OrderStatus::Cancelled;
        let currency = order.side.required_currency();
        let balance = self.get_balance(order.user_id, currency)?;
        let refunded = balance
            .checked_add(remaining_amount)
            .map_err(|_| StoreError::InsufficientFunds {
                have: balance,
                need: remaining_amount,
            })?;

        self.db.commit(vec![
            (
                COL_ORDERS,
                order_id.to_be_bytes().to_vec(),
                Some(Self::encode(&order)?),
            ),
            (
                COL_BALANCES,
                Self::balance_key(order.user_id, currency),
                Some(Self::encode(&refunded)?),
            ),
        ])?;
        Ok(())
    }

    /// Insert one `Match` row.
    pub fn insert_match(
        &mut self,
        order_id: u64,
        matched_order_id: u64,
        amount: Decimal,
    ) -> StoreResult<()> {
        let id = self.next_id(COUNTER_MATCH_ID)?;
        let m = Match {
            id,
            order_id,
            matched_order_id,
            amount,
        };
        let key = Self::match_key(order_id, id);
        self.db
            .commit(vec![(COL_MATCHES, key, Some(Self::encode(&m)?))])?;
        Ok(())
    }

    fn match_key(order_id: u64, match_id: u64) -> Vec<u8> {
        let mut key = order_id.to_be_bytes().to_vec();
        key.extend_from_slice(&match_id.to_be_bytes());
        key
    }

    fn matches_for_order(&self, order_id: u64) -> StoreResult<Vec<Match>> {
        let mut iter = self.db.iter(COL_MATCHES)?;
        let prefix = order_id.to_be_bytes();
        iter.seek(&prefix)?;
        let mut out = Vec::new();
        while let Some((key, value)) = iter.next()? {
            if !key.starts_with(&prefix) {
                break;
            }
            out.push(Self::decode(&value)?);
        }
        Ok(out)
    }

    /// Every order placed by `user_id`, oldest first, with its match rows.
    pub fn list_orders(&self, user_id: u64) -> StoreResult<Vec<OrderView>> {
        let mut iter = self.db.iter(COL_ORDERS)?;
        iter.seek_to_first()?;
        let mut views = Vec::new();
        while let Some((_key, value)) = iter.next()? {
            let order: Order = Self::decode(&value)?;
            if order.user_id != user_id {
                continue;
            }
            let matches = self.matches_for_order(order.id)?;
            views.push(OrderView {
                id: order.id,
                side: order.side,
                amount: order.amount,
                price: order.price,
                status: order.status,
                matches,
            });
        }
        views.sort_by_key(|o| o.id);
        Ok(views)
    }
}
