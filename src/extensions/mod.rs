//! Extension registry shared by the client and the server.
//!
//! # Data Flow
//! ```text
//! add_extension(ext)
//!     → ext.inject_properties(&properties) merged into the owner's Properties
//!     → ext appended to the registry (registration order is firing order)
//!
//! fire(event)
//!     → event.kind() selects the hook slot
//!     → every extension with that slot filled is called, in order
//!     → a failing hook is logged and skipped
//! ```
//!
//! # Design Decisions
//! - Hooks are explicit typed slots per [`HookKind`], not probed by name
//! - Capabilities contributed by extensions live in one shared [`Properties`]
//!   bag instead of being bolted onto the owner
//! - Hooks are observational: an `Err` or a panic never aborts the request

pub mod properties;

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub use properties::{Properties, Property};

/// Lifecycle points an extension may observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Start,
    RequestBegin,
    RequestEnd,
    /// Client only.
    RequestRetry,
    Error,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Start => "onStart",
            HookKind::RequestBegin => "onRequestBegin",
            HookKind::RequestEnd => "onRequestEnd",
            HookKind::RequestRetry => "onRequestRetry",
            HookKind::Error => "onError",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered to hooks. Implemented by `ClientEvent` and `ServerEvent`.
pub trait HookEvent {
    fn kind(&self) -> HookKind;
}

/// Error returned by a hook. Logged, never propagated.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl From<&str> for HookError {
    fn from(msg: &str) -> Self {
        Self(msg.to_string())
    }
}

impl From<String> for HookError {
    fn from(msg: String) -> Self {
        Self(msg)
    }
}

type HookFn<E> = Box<dyn Fn(&E, &Properties) -> Result<(), HookError> + Send + Sync>;
type InjectFn = Box<dyn Fn(&Properties) -> Vec<(String, Property)> + Send + Sync>;

/// A named set of hook slots plus an optional property injector.
pub struct Extension<E> {
    name: String,
    inject: Option<InjectFn>,
    slots: HashMap<HookKind, HookFn<E>>,
}

impl<E: HookEvent> Extension<E> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inject: None,
            slots: HashMap::new(),
        }
    }

    /// Fill the slot for `kind`. A later call for the same kind replaces it.
    pub fn on<F>(mut self, kind: HookKind, hook: F) -> Self
    where
        F: Fn(&E, &Properties) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.slots.insert(kind, Box::new(hook));
        self
    }

    /// Contribute named capabilities, computed once at registration.
    pub fn inject_properties<F>(mut self, inject: F) -> Self
    where
        F: Fn(&Properties) -> Vec<(String, Property)> + Send + Sync + 'static,
    {
        self.inject = Some(Box::new(inject));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn implements(&self, kind: HookKind) -> bool {
        self.slots.contains_key(&kind)
    }
}

impl<E> fmt::Debug for Extension<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("hooks", &self.slots.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Ordered extension list owned by one client or server.
pub struct ExtensionRegistry<E> {
    extensions: Vec<Extension<E>>,
    properties: Properties,
}

impl<E: HookEvent> ExtensionRegistry<E> {
    pub fn new() -> Self {
        Self {
            extensions: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Register an extension and merge its injected properties.
    pub fn register(&mut self, extension: Extension<E>) {
        if let Some(inject) = &extension.inject {
            for (key, value) in inject(&self.properties) {
                self.properties.insert_raw(key, value);
            }
        }
        tracing::debug!(extension = %extension.name, "Extension registered");
        self.extensions.push(extension);
    }

    /// Invoke the matching hook of every extension, in registration order.
    pub fn fire(&self, event: &E) {
        let kind = event.kind();
        for ext in &self.extensions {
            let Some(hook) = ext.slots.get(&kind) else {
                continue;
            };
            match catch_unwind(AssertUnwindSafe(|| hook(event, &self.properties))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(extension = %ext.name, hook = %kind, error = %e, "Extension hook failed");
                }
                Err(_) => {
                    tracing::warn!(extension = %ext.name, hook = %kind, "Extension hook panicked");
                }
            }
        }
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl<E: HookEvent> Default for ExtensionRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
