//! Registration and lifecycle tests against a live server
//!
//! - Methods registered while serving become callable immediately
//! - Re-registering a name replaces the previous handler
//! - Stateful handlers implemented as `MethodHandler` structs
//! - `close()` stops the listener

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wirerpc_http_server::{HttpRpcServer, Result};
use wirerpc_json_rpc_server::prelude::*;

/// Counter that adds its argument to a running total
#[derive(Default)]
struct Accumulator {
    total: AtomicI64,
}

#[async_trait]
impl MethodHandler for Accumulator {
    async fn call(&self, args: Vec<Value>) -> std::result::Result<Value, RpcError> {
        let amount: i64 = arg(&args, 0)?;
        let total = self.total.fetch_add(amount, Ordering::SeqCst) + amount;
        Ok(json!(total))
    }
}

async fn start_test_server(server: &HttpRpcServer) -> (String, JoinHandle<Result<()>>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server_url = format!("http://{}/", listener.local_addr().unwrap());

    let serving = server.clone();
    let task = tokio::spawn(async move { serving.serve(listener).await });

    (server_url, task)
}

async fn call(url: &str, method: &str, params: Value, id: i64) -> Value {
    reqwest::Client::new()
        .post(url)
        .body(json!({"jsonrpc": "2.0", "method": method, "params": params, "id": id}).to_string())
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_register_while_serving() {
    let server = HttpRpcServer::builder().build();
    let (url, _task) = start_test_server(&server).await;

    let body = call(&url, "greet", json!(["ada"]), 1).await;
    assert_eq!(body["error"]["code"], -32601);

    server.register_sync("greet", |args: Vec<Value>| {
        let name: String = arg(&args, 0)?;
        Ok::<_, RpcError>(format!("hello {}", name))
    });

    let body = call(&url, "greet", json!(["ada"]), 2).await;
    assert_eq!(body, json!({"jsonrpc": "2.0", "result": "hello ada", "id": 2}));
}

#[tokio::test]
async fn test_reregistration_replaces_handler() {
    let server = HttpRpcServer::builder()
        .method_sync("version", |_args| Ok::<_, RpcError>("v1"))
        .build();
    let (url, _task) = start_test_server(&server).await;

    assert_eq!(call(&url, "version", json!([]), 1).await["result"], "v1");

    server.register_fn("version", |_args| async { Ok::<_, RpcError>("v2") });
    assert_eq!(call(&url, "version", json!([]), 2).await["result"], "v2");
}

#[tokio::test]
async fn test_stateful_handler() {
    let server = HttpRpcServer::builder()
        .handler("accumulate", Accumulator::default())
        .build();
    let (url, _task) = start_test_server(&server).await;

    assert_eq!(call(&url, "accumulate", json!([5]), 1).await["result"], 5);
    assert_eq!(call(&url, "accumulate", json!([7]), 2).await["result"], 12);

    let body = call(&url, "accumulate", json!(["seven"]), 3).await;
    assert_eq!(body["error"]["code"], -32602);
    assert_eq!(body["id"], 3);
}

#[tokio::test]
async fn test_close_stops_listener() {
    let server = HttpRpcServer::builder()
        .method_sync("ping", |_args| Ok::<_, RpcError>("pong"))
        .build();
    let (url, task) = start_test_server(&server).await;

    assert_eq!(call(&url, "ping", json!([]), 1).await["result"], "pong");

    server.close();
    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(outcome.is_ok());

    let refused = reqwest::Client::new()
        .post(&url)
        .body(r#"{"jsonrpc":"2.0","method":"ping","params":[],"id":2}"#)
        .send()
        .await;
    assert!(refused.is_err());
}
