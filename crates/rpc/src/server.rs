use axum::{
    body::Bytes as Body,
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use sandbox_evm::Interpreter;
use sandbox_storage::Database;
use sandbox_types::Bytes;
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::{Dispatcher, RpcError, RpcRequest, RpcResponse};

/// Fixed `result` of the liveness probe.
pub const PING_RESPONSE: &str = "0x3503de5f0c766c68f78a03a3b05036a5";

pub struct RpcServer {
    addr: SocketAddr,
    app: Router,
}

impl RpcServer {
    pub fn new<D, I>(addr: SocketAddr, dispatcher: Arc<Dispatcher<D, I>>) -> Self
    where
        D: Database + 'static,
        I: Interpreter + 'static,
    {
        Self {
            addr,
            app: router(dispatcher),
        }
    }

    pub async fn run(self) -> std::io::Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves, then drains in-flight requests.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %listener.local_addr()?, "JSON-RPC server listening");
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}

pub fn router<D, I>(dispatcher: Arc<Dispatcher<D, I>>) -> Router
where
    D: Database + 'static,
    I: Interpreter + 'static,
{
    Router::new()
        .route("/", post(handle_rpc_request::<D, I>))
        .route("/rpc", post(handle_rpc_request::<D, I>))
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(dispatcher)
}

fn rejected(err: RpcError) -> Json<Value> {
    warn!(code = err.code(), %err, "rejected request body");
    let response = RpcResponse::failure(0, &err.to_string(), Bytes::new(), 0);
    Json(serde_json::to_value(response).unwrap_or(Value::Null))
}

async fn handle_rpc_request<D, I>(
    State(dispatcher): State<Arc<Dispatcher<D, I>>>,
    body: Body,
) -> Json<Value>
where
    D: Database + 'static,
    I: Interpreter + 'static,
{
    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return rejected(RpcError::ParseError(e.to_string())),
    };

    // Handle both single requests and batches
    let batch = request.is_array();
    let requests: Vec<RpcRequest> = match request {
        Value::Array(items) if items.is_empty() => return rejected(RpcError::InvalidRequest),
        Value::Array(items) => match items.into_iter().map(serde_json::from_value).collect::<Result<Vec<_>, _>>() {
            Ok(requests) => requests,
            Err(e) => return rejected(RpcError::ParseError(e.to_string())),
        },
        single => match serde_json::from_value(single) {
            Ok(request) => vec![request],
            Err(e) => return rejected(RpcError::ParseError(e.to_string())),
        },
    };

    // Engine calls block on the store lock.
    let responses = tokio::task::spawn_blocking(move || {
        requests
            .into_iter()
            .map(|request| dispatcher.dispatch(request))
            .collect::<Vec<_>>()
    })
    .await;

    let responses = match responses {
        Ok(responses) => responses,
        Err(e) => return rejected(RpcError::InternalError(e.to_string())),
    };

    let value = if batch {
        serde_json::to_value(responses)
    } else {
        match responses.into_iter().next() {
            Some(response) => serde_json::to_value(response),
            None => Ok(Value::Null),
        }
    };
    Json(value.unwrap_or(Value::Null))
}

async fn ping() -> Json<Value> {
    Json(json!({"jsonrpc": "2.0", "id": 1, "result": PING_RESPONSE}))
}

async fn health_check() -> &'static str {
    "OK"
}
