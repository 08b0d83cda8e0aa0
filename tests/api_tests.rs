use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::tempdir;
use tower::ServiceExt;

use order_book_engine::{api::OrderAck, api::router, state::AppState};

async fn test_app() -> (Router, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let state = AppState::new(dir.path()).await.unwrap();
    (router(state), dir)
}

fn basic_auth(user_id: u64) -> String {
    format!("Basic {}", B64.encode(format!("{user_id}:user{user_id}")))
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_order(user_id: u64, side: &str, amount: &str, price: &str) -> Request<Body> {
    let body = json!({ "type": side, "amount": amount, "price": price });
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header(header::AUTHORIZATION, basic_auth(user_id))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn unauthenticated_request_is_rejected() {
    let (app, _tmp) = test_app().await;

    let res = app
        .oneshot(
            Request::builder()
                .uri("/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_api_key_is_rejected() {
    let (app, _tmp) = test_app().await;

    let res = app
        .oneshot(
            Request::builder()
                .uri("/orders")
                .header(header::AUTHORIZATION, format!("Basic {}", B64.encode("1:not-my-key")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn place_order_rejects_zero_amount() {
    let (app, _tmp) = test_app().await;

    let res = app.oneshot(post_order(1, "buy", "0", "5")).await.unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("amount"));
}

#[tokio::test]
async fn place_order_rejects_insufficient_funds() {
    let (app, _tmp) = test_app().await;

    // user-1 starts with 5000 EUR; this buy needs 10_000.
    let res = app
        .oneshot(post_order(1, "buy", "1000", "10"))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn resting_order_then_cancel_round_trips() {
    let (app, _tmp) = test_app().await;

    let res = app.clone().oneshot(post_order(1, "sell", "5", "2")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ack: OrderAck = {
        let v = body_json(res).await;
        serde_json::from_value(v).unwrap()
    };

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/order/{}", ack.order_id))
                .header(header::AUTHORIZATION, basic_auth(1))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Cancelling twice has nothing left to cancel.
    let res = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/order/{}", ack.order_id))
                .header(header::AUTHORIZATION, basic_auth(1))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cannot_cancel_another_users_order() {
    let (app, _tmp) = test_app().await;

    let res = app.clone().oneshot(post_order(1, "sell", "5", "2")).await.unwrap();
    let ack: OrderAck = {
        let v = body_json(res).await;
        serde_json::from_value(v).unwrap()
    };

    let res = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/order/{}", ack.order_id))
                .header(header::AUTHORIZATION, basic_auth(2))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

async fn get_orders(app: &Router, user_id: u64) -> Value {
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/orders")
                .header(header::AUTHORIZATION, basic_auth(user_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    body_json(res).await
}

/// `place_order` only awaits the engine's events being *enqueued*
/// (`admission.rs`), not the persister applying them, so a `GET` right
/// after a crossing `POST` can race the background task. Poll until the
/// durable view reflects the match, the way the persister's own tests
/// drain the channel before asserting on the store.
async fn poll_orders(app: &Router, user_id: u64, ready: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..200 {
        let orders = get_orders(app, user_id).await;
        if ready(&orders) {
            return orders;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("persister did not apply expected event for user {user_id} in time");
}

#[tokio::test]
async fn matching_orders_show_up_in_both_users_order_lists() {
    let (app, _tmp) = test_app().await;

    let res = app.clone().oneshot(post_order(1, "sell", "5", "2")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app.clone().oneshot(post_order(2, "buy", "5", "2")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let seller_orders = poll_orders(&app, 1, |orders| {
        orders[0]["matches"].as_array().is_some_and(|m| !m.is_empty())
    })
    .await;
    let matches = seller_orders[0]["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["amount"], "5.000000");

    let buyer_orders = poll_orders(&app, 2, |orders| orders[0]["status"] == "complete").await;
    assert_eq!(buyer_orders[0]["status"], "complete");
}
