//! RPC server.
//!
//! # Data Flow
//! ```text
//! Server::new(config)
//!     → add_middleware / on_trigger / register_trigger_definition
//!     → add_extension (properties merged once)
//!     → start(callback)
//!         → bind (port 0 = OS pick)
//!         → optional TLS / mutual TLS
//!         → spawn axum serve task (handler.rs)
//!         → onStart, callback(url)
//!     → ServerHandle::shutdown (graceful drain)
//! ```
//!
//! # Design Decisions
//! - Building and serving are separate phases; the trigger registry,
//!   client table and extensions are frozen into shared state at `start`
//! - Plain TCP uses `axum::serve`, TLS uses `axum-server` over the same
//!   pre-bound listener so the reported address is always the real one

pub mod auth;
pub mod error;
pub mod events;
pub mod handler;
pub mod middleware;
pub mod trigger;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

pub use auth::ClientTable;
pub use error::{HandlerError, RequestError, ServerError};
pub use events::ServerEvent;
pub use middleware::{
    from_fn, run_chain, BoxedMiddleware, ChainOutcome, Flow, Middleware, MiddlewareContext,
    MiddlewareResult,
};
pub use trigger::{TriggerDefinition, TriggerRegistry};

use crate::config::validation::validate_server_config;
use crate::config::{ConfigError, ServerConfig};
use crate::extensions::{Extension, ExtensionRegistry, Properties};
use crate::lifecycle::Shutdown;
use crate::net::{load_server_tls, public_url};
use handler::{build_router, AppState};

/// Grace period for in-flight TLS connections on shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// A server under construction.
pub struct Server {
    config: ServerConfig,
    registry: TriggerRegistry,
    extensions: ExtensionRegistry<ServerEvent>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: TriggerRegistry::new(),
            extensions: ExtensionRegistry::new(),
        }
    }

    /// Run `middleware` before every trigger's own chain.
    pub fn add_middleware(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        self.registry.add_global(middleware);
        self
    }

    pub fn add_global_middleware<I>(&mut self, middlewares: I) -> &mut Self
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        for middleware in middlewares {
            self.registry.add_global(middleware);
        }
        self
    }

    /// Register the chain for `name`, replacing any earlier one.
    pub fn on_trigger<I>(&mut self, name: impl Into<String>, middlewares: I) -> &mut Self
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        self.registry.register(name, middlewares.into_iter().collect());
        self
    }

    pub fn register_trigger_definition(&mut self, definition: TriggerDefinition) -> &mut Self {
        for (name, chain) in definition.into_entries() {
            self.registry.register(name, chain);
        }
        self
    }

    pub fn add_extension(&mut self, extension: Extension<ServerEvent>) -> &mut Self {
        self.extensions.register(extension);
        self
    }

    pub fn add_extensions<I>(&mut self, extensions: I) -> &mut Self
    where
        I: IntoIterator<Item = Extension<ServerEvent>>,
    {
        for extension in extensions {
            self.extensions.register(extension);
        }
        self
    }

    /// Capabilities contributed by extensions, shared with every request.
    pub fn properties(&self) -> &Properties {
        self.extensions.properties()
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.registry
    }

    /// Validate the config, bind, begin serving in the background and report
    /// the URL.
    ///
    /// `callback` runs after the listener is bound and `onStart` has fired.
    pub async fn start<F>(self, callback: F) -> Result<ServerHandle, ServerError>
    where
        F: FnOnce(&str),
    {
        let Server {
            config,
            registry,
            extensions,
        } = self;

        validate_server_config(&config).map_err(ConfigError::Validation)?;

        let address = format!("{}:{}", config.bind_address, config.port);
        let listener = std::net::TcpListener::bind(&address).map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let tls = match &config.tls {
            Some(tls) => Some(load_server_tls(tls).await?),
            None => None,
        };
        let url = public_url(local_addr, tls.is_some());

        let state = Arc::new(AppState {
            registry,
            clients: ClientTable::new(config.clients.iter().cloned()),
            extensions,
            logs: config.logs,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        });
        let app = build_router(state.clone(), &config);
        let shutdown = Shutdown::new();

        let task = match tls {
            None => {
                let listener = tokio::net::TcpListener::from_std(listener)?;
                let signal = shutdown.notified();
                tokio::spawn(async move {
                    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(signal).await {
                        tracing::error!(error = %e, "Server error");
                    }
                })
            }
            Some(rustls) => {
                let handle = axum_server::Handle::new();
                let drain = handle.clone();
                let signal = shutdown.notified();
                tokio::spawn(async move {
                    signal.await;
                    drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
                });
                tokio::spawn(async move {
                    let served = axum_server::from_tcp_rustls(listener, rustls)
                        .handle(handle)
                        .serve(app.into_make_service())
                        .await;
                    if let Err(e) = served {
                        tracing::error!(error = %e, "Server error");
                    }
                })
            }
        };

        if config.logs {
            tracing::info!(
                url = %url,
                tls = config.tls.is_some(),
                triggers = state.registry.len(),
                clients = state.clients.len(),
                "Server listening"
            );
        }
        state.extensions.fire(&ServerEvent::Start { url: url.clone() });
        callback(&url);

        Ok(ServerHandle {
            local_addr,
            url,
            shutdown,
            task,
        })
    }
}

/// A running server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    url: String,
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Coordinator that stops this server when triggered.
    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Stop accepting, drain in-flight requests and wait for the serve task.
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Server task failed");
        }
    }

    /// Wait until the server stops on its own or through its signal.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Server task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ClientRecord;
    use crate::config::ValidationError;
    use crate::extensions::HookKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[tokio::test]
    async fn start_reports_url_and_fires_on_start() {
        let starts = Arc::new(AtomicUsize::new(0));
        let seen = starts.clone();

        let mut server = Server::new(ServerConfig {
            logs: false,
            ..ServerConfig::default()
        });
        server.add_extension(Extension::new("counter").on(HookKind::Start, move |_event, _props| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        let reported = Mutex::new(String::new());
        let handle = server
            .start(|url| *reported.lock().unwrap() = url.to_string())
            .await
            .unwrap();

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(*reported.lock().unwrap(), handle.url());
        assert!(handle.url().starts_with("http://127.0.0.1:"));
        assert_ne!(handle.local_addr().port(), 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn duplicate_secret_keys_refuse_to_start() {
        let record = |key: &str, ip: &str| ClientRecord {
            secret_key: key.into(),
            ip: ip.into(),
            language: "*".into(),
            roles: None,
        };
        let server = Server::new(ServerConfig {
            clients: vec![record("k1", "10.0.0.1"), record("k1", "10.0.0.2")],
            logs: false,
            ..ServerConfig::default()
        });
        match server.start(|_| {}).await {
            Err(ServerError::Config(ConfigError::Validation(errors))) => {
                assert_eq!(errors, vec![ValidationError::DuplicateSecretKey("k1".into())]);
            }
            other => panic!("unexpected: {:?}", other.map(|h| h.url().to_string())),
        }
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let server = Server::new(ServerConfig {
            port,
            ..ServerConfig::default()
        });
        let err = server.start(|_| {}).await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
