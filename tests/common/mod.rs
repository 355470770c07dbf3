//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use cromio::client::Client;
use cromio::codec::{self, ClientRecord, ResponseBody};
use cromio::config::{ClientConfig, EndpointConfig, LoadBalancerStrategy, RetryConfig, ServerConfig};
use cromio::server::{from_fn, Flow, HandlerError, MiddlewareContext, Server, ServerHandle};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub fn init_tracing() {
    cromio::observability::init_tracing("cromio=debug");
}

/// Quiet server config on an OS-picked port.
pub fn server_config(clients: Vec<ClientRecord>) -> ServerConfig {
    ServerConfig {
        clients,
        logs: false,
        ..ServerConfig::default()
    }
}

/// Client config with fast retries for tests.
pub fn client_config(endpoints: Vec<EndpointConfig>, strategy: LoadBalancerStrategy) -> ClientConfig {
    ClientConfig {
        endpoints,
        load_balancer: strategy,
        timeout_ms: 2_000,
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 50,
        },
        ip: Some("127.0.0.1".into()),
        ..ClientConfig::default()
    }
}

pub fn client_for(urls: &[&str], strategy: LoadBalancerStrategy) -> Client {
    let endpoints = urls.iter().map(|url| EndpointConfig::new(*url)).collect();
    Client::new(client_config(endpoints, strategy)).unwrap()
}

/// `payload.num1 / payload.num2`, failing on a zero divisor.
pub async fn div(ctx: MiddlewareContext) -> Result<Flow, HandlerError> {
    let num1 = ctx.body["num1"].as_f64().ok_or("num1 must be a number")?;
    let num2 = ctx.body["num2"].as_f64().ok_or("num2 must be a number")?;
    if num2 == 0.0 {
        return Err("division by zero".into());
    }
    Ok(Flow::respond(json!(num1 / num2)))
}

/// Start a server with `configure` applied and wait until it is bound.
pub async fn start_server<F>(config: ServerConfig, configure: F) -> ServerHandle
where
    F: FnOnce(&mut Server),
{
    let mut server = Server::new(config);
    configure(&mut server);
    server.start(|_| {}).await.unwrap()
}

/// A server exposing `div` to the given allow-list.
pub async fn start_div_server(clients: Vec<ClientRecord>) -> ServerHandle {
    start_server(server_config(clients), |server| {
        server.on_trigger("div", [from_fn(div)]);
    })
    .await
}

/// An address nothing listens on.
pub fn refused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Gzip `{data}` body as a real server would send it.
pub fn data_body(data: Value) -> Vec<u8> {
    codec::encode(&ResponseBody::data(data)).unwrap()
}

/// Gzip `{error}` body as a real server would send it.
pub fn error_body(message: &str) -> Vec<u8> {
    codec::encode(&ResponseBody::error(message)).unwrap()
}

async fn read_request(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            return;
        }
    }
}

/// Start a programmable raw HTTP backend on an OS-picked port.
///
/// `f` returns the status and the raw (already encoded) body for each request.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Vec<u8>)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_request(&mut socket).await;
                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let head = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Encoding: gzip\r\nConnection: close\r\n\r\n",
                            status_text,
                            body.len(),
                        );
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&body).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
