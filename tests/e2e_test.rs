use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use evm_sandbox::rpc::PING_RESPONSE;
use evm_sandbox::{Config, Node};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn app() -> Router {
    Node::from_config(Config::default()).unwrap().router()
}

async fn post(app: Router, path: &str, body: impl Into<Body>) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: Router, path: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

#[tokio::test]
async fn test_ping_and_health() {
    let (status, body) = get(app(), "/ping").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body, json!({"jsonrpc": "2.0", "id": 1, "result": PING_RESPONSE}));

    let (status, body) = get(app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_get_balance_over_http() {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 99,
        "method": "eth_getBalance",
        "params": ["0x00000000000000000000000000000000000a11ce"]
    });
    let response = post(app(), "/", body.to_string()).await;

    assert_eq!(response["id"], 0);
    assert_eq!(response["error"], Value::Null);
    assert_eq!(
        response["result"],
        "0x0000000000000000000000000000000000000000000000000de0b6b3a7640000"
    );
    assert_eq!(response["gasLeft"], 0);
}

#[tokio::test]
async fn test_batch_ids_advance_per_method() {
    let app = app();
    let balance = json!({"method": "eth_getBalance", "params": ["0x0000000000000000000000000000000000000b0b"]});
    let nonce = json!({"method": "eth_getTransactionCount", "params": ["0x0000000000000000000000000000000000000b0b"]});
    let batch = json!([balance, balance, nonce, {"method": "web3_clientVersion"}]);

    let response = post(app.clone(), "/rpc", batch.to_string()).await;
    let ids: Vec<u64> = response
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![0, 1, 0, 0]);
    assert_eq!(response[2]["result"], "0x0000000000000000");
    assert_eq!(response[3]["result"], "0x");

    // counters live as long as the router's dispatcher
    let response = post(app, "/", balance.to_string()).await;
    assert_eq!(response["id"], 2);
}

#[tokio::test]
async fn test_malformed_bodies_get_error_envelopes() {
    let response = post(app(), "/", "{not json").await;
    assert_eq!(response["id"], 0);
    assert!(response["error"].is_string());
    assert_eq!(response["result"], "0x");

    let response = post(app(), "/", "[]").await;
    let message = hex::decode(response["error"].as_str().unwrap().trim_start_matches("0x")).unwrap();
    assert_eq!(String::from_utf8(message).unwrap(), "Invalid request");
}

#[tokio::test]
async fn test_send_then_call_over_http() {
    let app = app();
    let transfer = json!({
        "method": "eth_send",
        "params": [{"to": "0x00000000000000000000000000000000000000dd", "value": "0x64"}]
    });
    let response = post(app.clone(), "/", transfer.to_string()).await;
    assert_eq!(response["error"], Value::Null);
    assert_eq!(response["gasLeft"], 1_000_000);

    let balance = json!({"method": "eth_getBalance", "params": ["0x00000000000000000000000000000000000000dd"]});
    let response = post(app, "/", balance.to_string()).await;
    assert_eq!(
        response["result"],
        "0x0000000000000000000000000000000000000000000000000000000000000064"
    );
}

#[tokio::test]
async fn test_server_shuts_down_on_signal() {
    let mut config = Config::default();
    config.rpc.port = 0;
    let node = Node::from_config(config).unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        node.run_until(async {
            let _ = rx.await;
        })
        .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server).await.unwrap().unwrap();
    assert!(result.is_ok());
}
