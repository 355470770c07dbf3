//! Shared capability bag for extensions.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

/// A type-erased, shareable property value.
#[derive(Clone)]
pub struct Property(Arc<dyn Any + Send + Sync>);

impl Property {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Property(..)")
    }
}

/// Name → value map shared by every hook and middleware of one owner.
///
/// Cloning is cheap; clones see the same entries.
#[derive(Clone, Default)]
pub struct Properties {
    inner: Arc<DashMap<String, Property>>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.inner.insert(key.into(), Property::new(value));
    }

    pub fn insert_raw(&self, key: impl Into<String>, value: Property) {
        self.inner.insert(key.into(), value);
    }

    /// Typed lookup; `None` when absent or of another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.inner.get(key).and_then(|p| p.value().downcast::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Property> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Properties").field("keys", &self.keys()).finish()
    }
}
