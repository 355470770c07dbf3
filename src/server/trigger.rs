//! Trigger registry.
//!
//! # Responsibilities
//! - Map trigger names to their middleware chains
//! - Prepend global middlewares to every chain at lookup time
//!
//! # Design Decisions
//! - The registry is only mutated while building the server; once serving
//!   it is shared read-only
//! - Registering a name again replaces its chain

use std::collections::HashMap;
use std::fmt;

use crate::server::middleware::BoxedMiddleware;

#[derive(Clone, Default)]
pub struct TriggerRegistry {
    global: Vec<BoxedMiddleware>,
    triggers: HashMap<String, Vec<BoxedMiddleware>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global(&mut self, middleware: BoxedMiddleware) {
        self.global.push(middleware);
    }

    pub fn register(&mut self, name: impl Into<String>, chain: Vec<BoxedMiddleware>) {
        let name = name.into();
        if self.triggers.insert(name.clone(), chain).is_some() {
            tracing::warn!(trigger = %name, "Trigger registered twice; previous chain replaced");
        }
    }

    /// Global middlewares followed by the trigger's own, or `None` if unknown.
    pub fn chain(&self, name: &str) -> Option<Vec<BoxedMiddleware>> {
        let own = self.triggers.get(name)?;
        Some(self.global.iter().chain(own).cloned().collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.triggers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.triggers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

impl fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerRegistry")
            .field("global", &self.global.len())
            .field("triggers", &self.names())
            .finish()
    }
}

/// A reusable set of trigger chains, built apart from any server.
#[derive(Clone, Default)]
pub struct TriggerDefinition {
    entries: Vec<(String, Vec<BoxedMiddleware>)>,
}

impl TriggerDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger<I>(mut self, name: impl Into<String>, middlewares: I) -> Self
    where
        I: IntoIterator<Item = BoxedMiddleware>,
    {
        self.entries.push((name.into(), middlewares.into_iter().collect()));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn into_entries(self) -> Vec<(String, Vec<BoxedMiddleware>)> {
        self.entries
    }
}

impl fmt::Debug for TriggerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
