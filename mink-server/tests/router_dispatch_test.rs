//! Requests routed to handlers through a running listener

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use mink_core::{codec, Envelope, Error, ErrorCode, Id, Response, RpcError};
use mink_server::{from_fn, from_typed_fn, Dispatcher, Listener, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Deserialize)]
struct AddParams {
    a: i64,
    b: i64,
}

async fn start(listener: Listener) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let addr = listener.local_addr();
    let handle = tokio::spawn(async move {
        let _ = listener.run().await;
    });
    (addr, handle)
}

async fn call(client: &mut Client, request: Value) -> Response {
    client.send(Message::Text(request.to_string())).await.unwrap();
    match client.next().await {
        Some(Ok(Message::Text(text))) => codec::decode_response(&text).unwrap(),
        other => panic!("Expected text reply, got {:?}", other),
    }
}

#[tokio::test]
async fn test_handlers_via_builder() {
    let listener = Listener::builder()
        .bind_str("127.0.0.1:0")
        .unwrap()
        .handler("add", from_typed_fn(|p: AddParams| async move { Ok(p.a + p.b) }))
        .handler(
            "echo",
            from_fn(|params| async move { Ok(params.unwrap_or(Value::Null)) }),
        )
        .handler(
            "explode",
            from_fn(|_| async { Err(Error::Internal("boom".to_string())) }),
        )
        .handler(
            "custom",
            from_fn(|_| async { Err(Error::from(RpcError::new(-32000, "Custom failure"))) }),
        )
        .build()
        .await
        .unwrap();
    let (addr, server) = start(listener).await;
    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

    let reply = call(&mut client, json!({"jsonrpc": "2.0", "method": "add", "params": {"a": 2, "b": 40}, "id": 1})).await;
    assert_eq!(reply.result, Some(json!(42)));
    assert_eq!(reply.id, Id::from(1i64));

    let reply = call(&mut client, json!({"method": "echo", "params": ["x", 1], "id": "e"})).await;
    assert_eq!(reply.result, Some(json!(["x", 1])));

    let reply = call(&mut client, json!({"method": "missing", "id": 2})).await;
    assert_eq!(reply.error_code(), Some(ErrorCode::METHOD_NOT_FOUND));
    assert_eq!(reply.error.unwrap().message, "Method not found: missing");
    assert_eq!(reply.id, Id::from(2i64));

    let reply = call(&mut client, json!({"method": "add", "params": {"a": "two"}, "id": 3})).await;
    assert_eq!(reply.error_code(), Some(ErrorCode::INVALID_PARAMS));
    assert_eq!(reply.id, Id::from(3i64));

    let reply = call(&mut client, json!({"method": "explode", "id": 4})).await;
    assert_eq!(reply.error_code(), Some(ErrorCode::INTERNAL_ERROR));

    let reply = call(&mut client, json!({"method": "custom", "id": 5})).await;
    assert_eq!(reply.error_code(), Some(ErrorCode(-32000)));

    // Validation still happens before routing
    client.send(Message::Text("nope".into())).await.unwrap();
    match client.next().await {
        Some(Ok(Message::Text(text))) => {
            let reply = codec::decode_response(&text).unwrap();
            assert_eq!(reply.error_code(), Some(ErrorCode::PARSE_ERROR));
        }
        other => panic!("Expected text reply, got {:?}", other),
    }

    server.abort();
}

#[tokio::test]
async fn test_prebuilt_router() {
    let mut router = Router::new();
    router.register("ping", from_fn(|_| async { Ok(json!("pong")) }));

    let listener = Listener::builder()
        .bind_str("127.0.0.1:0")
        .unwrap()
        .router(router)
        .build()
        .await
        .unwrap();
    let (addr, server) = start(listener).await;
    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

    let reply = call(&mut client, json!({"method": "ping", "id": 9})).await;
    assert_eq!(reply.result, Some(json!("pong")));

    server.abort();
}

struct Counting {
    prefix: String,
}

#[async_trait]
impl Dispatcher for Counting {
    async fn dispatch(&self, envelope: &Envelope) -> Result<Value, RpcError> {
        let count = envelope
            .params
            .as_ref()
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        Ok(json!(format!("{}:{}:{}", self.prefix, envelope.method, count)))
    }
}

#[tokio::test]
async fn test_custom_dispatcher() {
    let listener = Listener::builder()
        .bind_str("127.0.0.1:0")
        .unwrap()
        .dispatcher(Counting {
            prefix: "c".to_string(),
        })
        .build()
        .await
        .unwrap();
    let (addr, server) = start(listener).await;
    let (mut client, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

    let reply = call(&mut client, json!({"method": "count", "params": [1, 2, 3], "id": 1})).await;
    assert_eq!(reply.result, Some(json!("c:count:3")));

    server.abort();
}
