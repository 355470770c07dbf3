//! Division server.
//!
//! ```text
//! cargo run --example div_server [server.toml]
//! ```

use std::path::Path;

use cromio::config::load_server_config;
use cromio::extensions::{Extension, HookKind};
use cromio::lifecycle::shutdown_on_signal;
use cromio::observability::init_tracing;
use cromio::{from_fn, Flow, HandlerError, MiddlewareContext, Server, ServerConfig, ServerEvent};
use serde_json::json;

async fn div(ctx: MiddlewareContext) -> Result<Flow, HandlerError> {
    let num1 = ctx.body["num1"].as_f64().ok_or("num1 must be a number")?;
    let num2 = ctx.body["num2"].as_f64().ok_or("num2 must be a number")?;
    if num2 == 0.0 {
        return Err("division by zero".into());
    }
    Ok(Flow::respond(json!(num1 / num2)))
}

async fn range(ctx: MiddlewareContext) -> Result<Flow, HandlerError> {
    let count = ctx.body["count"].as_u64().unwrap_or(10);
    let items: Vec<_> = (0..count).map(|i| json!({ "index": i })).collect();
    Ok(Flow::respond(json!(items)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("cromio=info,div_server=info,tower_http=info");

    let config = match std::env::args().nth(1) {
        Some(path) => load_server_config(Path::new(&path))?,
        None => ServerConfig {
            port: 2000,
            ..ServerConfig::default()
        },
    };

    let mut server = Server::new(config);
    server
        .add_extension(Extension::<ServerEvent>::new("audit").on(HookKind::Error, |event, _props| {
            tracing::warn!(?event, "Request failed");
            Ok(())
        }))
        .add_middleware(from_fn(|ctx: MiddlewareContext| async move {
            tracing::debug!(trigger = %ctx.trigger, ip = %ctx.credentials.ip, "Incoming call");
            Ok(Flow::Continue)
        }))
        .on_trigger("div", [from_fn(div)])
        .on_trigger("range", [from_fn(range)]);

    let handle = server
        .start(|url| tracing::info!(%url, "Division server ready"))
        .await?;
    shutdown_on_signal(handle.shutdown_signal());
    handle.wait().await;

    tracing::info!("Division server stopped");
    Ok(())
}
