//! Streamed replies decoded incrementally by the client.

use cromio::client::ClientError;
use cromio::config::LoadBalancerStrategy;
use cromio::server::{from_fn, Flow, MiddlewareContext};
use cromio::{ServerHandle, StreamChunk};
use serde_json::{json, Value};

mod common;

async fn stream_server() -> ServerHandle {
    common::start_server(common::server_config(vec![]), |server| {
        server.on_trigger(
            "items",
            [from_fn(|ctx: MiddlewareContext| async move {
                let count = ctx.body["count"].as_u64().unwrap_or(3);
                let items: Vec<Value> = (1..=count).map(|i| json!({"id": i, "name": format!("item-{i}")})).collect();
                Ok(Flow::respond(Value::Array(items)))
            })],
        );
        server.on_trigger(
            "single",
            [from_fn(|_ctx: MiddlewareContext| async move {
                Ok(Flow::respond(json!({"status": "ok", "nested": [1, 2]})))
            })],
        );
        server.on_trigger(
            "nothing",
            [from_fn(|_ctx: MiddlewareContext| async move { Ok(Flow::Continue) })],
        );
    })
    .await
}

#[tokio::test]
async fn three_items_then_done() {
    common::init_tracing();
    let server = stream_server().await;
    let client = common::client_for(&[server.url()], LoadBalancerStrategy::BestBiased);

    let mut chunks: Vec<StreamChunk> = Vec::new();
    client
        .dispatch_stream("items", json!({"count": 3}), |chunk| chunks.push(chunk))
        .await;

    assert_eq!(chunks.len(), 4);
    for (i, chunk) in chunks[..3].iter().enumerate() {
        assert!(!chunk.done);
        assert!(chunk.error.is_none());
        assert_eq!(chunk.data["id"], json!(i + 1));
    }
    assert!(chunks[3].done);
    assert!(chunks[3].error.is_none());
    assert_eq!(client.endpoints()[0].active_requests(), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn resolved_stream_equals_the_array() {
    let server = stream_server().await;
    let client = common::client_for(&[server.url()], LoadBalancerStrategy::BestBiased);

    let response = client.dispatch_stream_resolved("items", json!({"count": 3})).await;
    assert!(response.error.is_none());
    assert_eq!(
        response.data,
        json!([
            {"id": 1, "name": "item-1"},
            {"id": 2, "name": "item-2"},
            {"id": 3, "name": "item-3"},
        ])
    );

    server.shutdown().await;
}

#[tokio::test]
async fn single_object_and_empty_replies() {
    let server = stream_server().await;
    let client = common::client_for(&[server.url()], LoadBalancerStrategy::BestBiased);

    let response = client.dispatch_stream_resolved("single", json!({})).await;
    assert_eq!(response.data, json!({"status": "ok", "nested": [1, 2]}));

    let mut chunks = Vec::new();
    client.dispatch_stream("nothing", json!({}), |chunk| chunks.push(chunk)).await;
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].done);
    assert_eq!(chunks[0].data, Value::Null);

    let response = client.dispatch_stream_resolved("items", json!({"count": 0})).await;
    assert_eq!(response.data, json!([]));

    server.shutdown().await;
}

#[tokio::test]
async fn rejected_stream_ends_with_an_error_chunk() {
    let server = stream_server().await;
    let client = common::client_for(&[server.url()], LoadBalancerStrategy::BestBiased);

    let mut chunks = Vec::new();
    client.dispatch_stream("missing", json!({}), |chunk| chunks.push(chunk)).await;
    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].done);
    match &chunks[0].error {
        Some(ClientError::Remote { status, message }) => {
            assert_eq!(*status, 404);
            assert!(message.contains("'missing'"));
        }
        other => panic!("unexpected: {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn large_stream_arrives_in_order() {
    let server = stream_server().await;
    let client = common::client_for(&[server.url()], LoadBalancerStrategy::BestBiased);

    let mut ids = Vec::new();
    client
        .dispatch_stream("items", json!({"count": 500}), |chunk| {
            if !chunk.done {
                ids.push(chunk.data["id"].as_u64().unwrap());
            }
        })
        .await;
    assert_eq!(ids, (1..=500).collect::<Vec<u64>>());

    server.shutdown().await;
}

#[tokio::test]
async fn resolved_stream_carries_request_info() {
    let server = stream_server().await;
    let mut config = common::client_config(
        vec![cromio::EndpointConfig::new(server.url())],
        LoadBalancerStrategy::LeastLatency,
    );
    config.show_request_info = true;
    let client = cromio::Client::new(config).unwrap();

    let response = client.dispatch_stream_resolved("items", json!({"count": 2})).await;
    assert_eq!(response.data.as_array().map(Vec::len), Some(2));
    let info = response.info.expect("request info");
    assert_eq!(info.strategy, LoadBalancerStrategy::LeastLatency);
    assert_eq!(info.requests, 1);
    assert!(info.size > 0);

    let response = client.dispatch_stream_resolved("missing", Value::Null).await;
    assert!(response.error.is_some());
    let info = response.info.expect("request info on failure");
    assert_eq!(info.requests, 1);
    assert_eq!(info.size, 0);

    server.shutdown().await;
}
