//! Middleware chain behavior observed through a running server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use cromio::client::ClientError;
use cromio::config::LoadBalancerStrategy;
use cromio::server::{from_fn, BoxedMiddleware, Flow, MiddlewareContext};
use serde_json::{json, Value};

mod common;

fn counting(counter: Arc<AtomicUsize>) -> BoxedMiddleware {
    from_fn(move |_ctx: MiddlewareContext| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Flow::Continue)
        }
    })
}

#[tokio::test]
async fn global_middleware_can_short_circuit() {
    let later = Arc::new(AtomicUsize::new(0));
    let in_chain = later.clone();
    let server = common::start_server(common::server_config(vec![]), move |server| {
        server.on_trigger("div", [counting(in_chain.clone()), from_fn(common::div)]);
        // registered after the trigger, still runs first
        server.add_middleware(from_fn(|ctx: MiddlewareContext| async move {
            if ctx.body["blocked"] == json!(true) {
                ctx.reply_with(json!("blocked"), 202);
            }
            Ok(Flow::Continue)
        }));
    })
    .await;

    let client = common::client_for(&[server.url()], LoadBalancerStrategy::BestBiased);

    let response = client.dispatch("div", json!({"blocked": true})).await;
    assert!(response.is_ok(), "{:?}", response.error);
    assert_eq!(response.data, json!("blocked"));
    assert_eq!(later.load(Ordering::SeqCst), 0);

    let response = client.dispatch("div", json!({"num1": 9, "num2": 3})).await;
    assert_eq!(response.data, json!(3.0));
    assert_eq!(later.load(Ordering::SeqCst), 1);

    server.shutdown().await;
}

#[tokio::test]
async fn only_the_first_reply_is_sent() {
    let server = common::start_server(common::server_config(vec![]), |server| {
        server.on_trigger(
            "twice",
            [from_fn(|ctx: MiddlewareContext| async move {
                ctx.reply(json!("first"));
                ctx.reply(json!("second"));
                Ok(Flow::respond(json!("returned")))
            })],
        );
    })
    .await;

    let client = common::client_for(&[server.url()], LoadBalancerStrategy::BestBiased);
    let response = client.dispatch("twice", Value::Null).await;
    assert_eq!(response.data, json!("first"));

    server.shutdown().await;
}

#[tokio::test]
async fn exhausted_chain_resolves_null() {
    let calls = Arc::new(AtomicUsize::new(0));
    let in_chain = calls.clone();
    let server = common::start_server(common::server_config(vec![]), move |server| {
        server.on_trigger("noop", [counting(in_chain.clone()), counting(in_chain.clone())]);
    })
    .await;

    let client = common::client_for(&[server.url()], LoadBalancerStrategy::LeastConnection);
    let response = client.dispatch("noop", json!({"ignored": 1})).await;
    assert!(response.is_ok());
    assert_eq!(response.data, Value::Null);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    server.shutdown().await;
}

#[tokio::test]
async fn panicking_handler_is_a_500() {
    let server = common::start_server(common::server_config(vec![]), |server| {
        server.on_trigger(
            "explode",
            [from_fn(|_ctx: MiddlewareContext| async move {
                if true {
                    panic!("kaboom");
                }
                Ok(Flow::Continue)
            })],
        );
    })
    .await;

    let client = common::client_for(&[server.url()], LoadBalancerStrategy::BestBiased);
    let response = client.dispatch("explode", Value::Null).await;
    match response.error {
        Some(ClientError::Remote { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "kaboom");
        }
        other => panic!("unexpected: {other:?}"),
    }

    // the server keeps serving
    let response = client.dispatch("explode", Value::Null).await;
    assert_eq!(response.error.and_then(|e| e.status()), Some(500));

    server.shutdown().await;
}

#[tokio::test]
async fn re_registering_a_trigger_replaces_its_chain() {
    let server = common::start_server(common::server_config(vec![]), |server| {
        server.on_trigger(
            "version",
            [from_fn(|_ctx: MiddlewareContext| async move { Ok(Flow::respond(json!(1))) })],
        );
        server.on_trigger(
            "version",
            [from_fn(|_ctx: MiddlewareContext| async move { Ok(Flow::respond(json!(2))) })],
        );
    })
    .await;

    let client = common::client_for(&[server.url()], LoadBalancerStrategy::BestBiased);
    assert_eq!(client.dispatch("version", Value::Null).await.data, json!(2));

    server.shutdown().await;
}
