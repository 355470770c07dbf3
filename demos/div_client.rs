//! Division client.
//!
//! ```text
//! cargo run --example div_client [client.toml]
//! ```

use std::path::Path;

use cromio::config::load_client_config;
use cromio::observability::init_tracing;
use cromio::{Client, ClientConfig};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("cromio=info,div_client=info");

    let config = match std::env::args().nth(1) {
        Some(path) => load_client_config(Path::new(&path))?,
        None => {
            let mut config = ClientConfig::with_addresses(["http://127.0.0.1:2000"]);
            config.show_request_info = true;
            config
        }
    };
    let client = Client::new(config)?;

    let response = client.dispatch("div", json!({ "num1": 10, "num2": 4 })).await;
    match &response.error {
        None => tracing::info!(result = %response.data, info = ?response.info, "div"),
        Some(e) => tracing::error!(error = %e, "div failed"),
    }

    let response = client.dispatch("div", json!({ "num1": 1, "num2": 0 })).await;
    if let Some(e) = response.error {
        tracing::info!(error = %e, "div by zero rejected");
    }

    client
        .dispatch_stream("range", json!({ "count": 5 }), |chunk| {
            if let Some(e) = chunk.error {
                tracing::error!(error = %e, "stream failed");
            } else if chunk.done {
                tracing::info!("stream finished");
            } else {
                tracing::info!(item = %chunk.data, "stream item");
            }
        })
        .await;

    Ok(())
}
