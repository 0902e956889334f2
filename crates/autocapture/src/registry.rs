//! Plugin registry.
//!
//! Keys are unique and iteration follows registration order, so start-up
//! binds plugins deterministically. [`PluginRegistry::global`] is the shared
//! per-thread registry; engines can be given their own instead.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::plugins::Plugin;

/// A registered plugin.
pub type PluginRef = Rc<RefCell<dyn Plugin>>;

thread_local! {
    static GLOBAL: PluginRegistry = PluginRegistry::new();
}

struct Entry {
    key: String,
    plugin: PluginRef,
}

/// Ordered, key-unique plugin table. Clones share the same table.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    entries: Rc<RefCell<Vec<Entry>>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared registry for this thread.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.with(Clone::clone)
    }

    /// Register a plugin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePlugin`] if the key is already present.
    pub fn register<P: Plugin + 'static>(&self, plugin: P) -> Result<PluginRef> {
        let plugin: PluginRef = Rc::new(RefCell::new(plugin));
        self.register_shared(Rc::clone(&plugin))?;
        Ok(plugin)
    }

    /// Register a plugin the caller keeps a handle to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePlugin`] if the key is already present, or
    /// [`Error::Internal`] if the plugin is mutably borrowed.
    pub fn register_shared(&self, plugin: PluginRef) -> Result<()> {
        let key = plugin
            .try_borrow()
            .map_err(|_| Error::internal("plugin is borrowed during registration"))?
            .key()
            .to_string();
        if self.has(&key) {
            return Err(Error::duplicate_plugin(key));
        }
        debug!(plugin = %key, "Registered plugin");
        self.entries.borrow_mut().push(Entry { key, plugin });
        Ok(())
    }

    /// Remove a plugin. Removing an absent key is a no-op.
    pub fn unregister(&self, key: &str) -> Option<PluginRef> {
        let mut entries = self.entries.borrow_mut();
        let index = entries.iter().position(|e| e.key == key)?;
        debug!(plugin = %key, "Unregistered plugin");
        Some(entries.remove(index).plugin)
    }

    /// Look up a plugin by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<PluginRef> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.key == key)
            .map(|e| Rc::clone(&e.plugin))
    }

    /// Whether a key is registered.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.entries.borrow().iter().any(|e| e.key == key)
    }

    /// Registered keys in registration order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().iter().map(|e| e.key.clone()).collect()
    }

    /// Snapshot of `(key, plugin)` pairs in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<(String, PluginRef)> {
        self.entries
            .borrow()
            .iter()
            .map(|e| (e.key.clone(), Rc::clone(&e.plugin)))
            .collect()
    }

    /// Number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{BindContext, BindDescriptor, ScrollPlugin};

    #[derive(Debug)]
    struct Named(&'static str);

    impl Plugin for Named {
        fn key(&self) -> &str {
            self.0
        }

        fn bind(&self, _cx: &BindContext<'_>) -> Vec<BindDescriptor> {
            Vec::new()
        }
    }

    #[test]
    fn test_register_rejects_duplicate_scroll() {
        let registry = PluginRegistry::new();
        registry.register(ScrollPlugin::new()).unwrap();

        let err = registry.register(ScrollPlugin::new()).unwrap_err();
        assert!(matches!(err, Error::DuplicatePlugin { ref key } if key == "scroll"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registration_order() {
        let registry = PluginRegistry::new();
        for key in ["b", "a", "c"] {
            registry.register(Named(key)).unwrap();
        }
        assert_eq!(registry.keys(), vec!["b", "a", "c"]);
        let all: Vec<String> = registry.all().into_iter().map(|(k, _)| k).collect();
        assert_eq!(all, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let registry = PluginRegistry::new();
        registry.register(Named("a")).unwrap();
        assert!(registry.unregister("a").is_some());
        assert!(registry.unregister("a").is_none());
        assert!(registry.is_empty());
        assert!(!registry.has("a"));
    }

    #[test]
    fn test_get_returns_shared_handle() {
        let registry = PluginRegistry::new();
        let handle = registry.register(Named("a")).unwrap();
        let found = registry.get("a").unwrap();
        assert!(Rc::ptr_eq(&handle, &found));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_clones_share_table() {
        let registry = PluginRegistry::new();
        let other = registry.clone();
        other.register(Named("a")).unwrap();
        assert!(registry.has("a"));
    }

    #[test]
    fn test_global_is_shared() {
        PluginRegistry::global().register(Named("global-test")).unwrap();
        assert!(PluginRegistry::global().has("global-test"));
        PluginRegistry::global().unregister("global-test");
    }
}
