use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

use crate::admission::{self, AdmissionError};
use crate::auth::AuthUser;
use crate::decimal::Decimal;
use crate::orders::Side;
use crate::state::AppState;

type ApiErr = (StatusCode, Json<serde_json::Value>);

fn err(status: StatusCode, msg: &str) -> ApiErr {
    (status, Json(json!({ "error": msg })))
}

impl From<AdmissionError> for ApiErr {
    fn from(e: AdmissionError) -> Self {
        match e {
            AdmissionError::NonPositiveAmount | AdmissionError::NonPositivePrice => {
                err(StatusCode::BAD_REQUEST, &e.to_string())
            }
            AdmissionError::InsufficientFunds { .. } => {
                err(StatusCode::BAD_REQUEST, &e.to_string())
            }
            AdmissionError::OrderNotFound(_) => err(StatusCode::NOT_FOUND, &e.to_string()),
            AdmissionError::Forbidden(_) => err(StatusCode::NOT_FOUND, "order not found"),
            AdmissionError::Store(_) => err(StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        }
    }
}

/// Request payload for `POST /orders`.
///
/// - `type`: `"buy"` or `"sell"`
/// - `amount`: quantity, as a decimal string
/// - `price`: limit price, as a decimal string
#[derive(Deserialize)]
pub struct NewOrder {
    #[serde(rename = "type")]
    pub side: Side,
    pub amount: Decimal,
    pub price: Decimal,
}

/// Response for `POST /orders`.
#[derive(Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: u64,
}

/// `POST /orders`
///
/// Validates, debits the authenticated user's balance and submits the order
/// to the matching engine.
///
/// *Success:* `200 OK`, JSON `OrderAck`.
/// *Bad request:* `400`, non-positive amount or price, or insufficient funds.
pub async fn place_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<NewOrder>,
) -> Result<Json<OrderAck>, ApiErr> {
    let order_id = admission::place_order(
        &state.store,
        &state.book,
        &state.events,
        &state.user_locks,
        user_id,
        payload.side,
        payload.amount,
        payload.price,
    )
    .await
    .map_err(|e| {
        warn!(user_id, error = %e, "order rejected");
        ApiErr::from(e)
    })?;

    info!(user_id, order_id, "order accepted");
    Ok(Json(OrderAck { order_id }))
}

/// `GET /orders`
///
/// Lists every order the authenticated user has placed, oldest first, with
/// their match history.
pub async fn list_orders(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, ApiErr> {
    let orders = admission::list_orders(&state.store, user_id)
        .await
        .map_err(ApiErr::from)?;
    Ok(Json(orders))
}

/// `DELETE /order/{orderId}`
///
/// Cancels a resting order owned by the authenticated user.
///
/// *Success:* `200 OK`, JSON `{ "status": "cancelled" }`.
/// *Not found:* `404` if the order doesn't exist, isn't owned by the caller,
/// or has nothing left to cancel.
pub async fn cancel_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(order_id): Path<u64>,
) -> Result<impl IntoResponse, ApiErr> {
    let cancelled = admission::cancel_order(&state.store, &state.book, &state.events, user_id, order_id)
        .await
        .map_err(ApiErr::from)?;

    if cancelled {
        info!(user_id, order_id, "order cancelled");
        Ok((StatusCode::OK, Json(json!({ "status": "cancelled" }))))
    } else {
        warn!(user_id, order_id, "cancel failed: nothing left to cancel");
        Err(err(StatusCode::NOT_FOUND, "order not found"))
    }
}

/// Constructs the application's `Router` with all routes and shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(place_order).get(list_orders))
        .route("/order/{order_id}", delete(cancel_order))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(false)
                        .level(tracing::Level::TRACE),
                )
                .on_response(DefaultOnResponse::new().level(tracing::Level::TRACE)),
        )
        .with_state(state)
}
