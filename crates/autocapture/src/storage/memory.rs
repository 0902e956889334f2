//! In-memory key/value store.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value};

thread_local! {
    static SHARED: MemoryStore = MemoryStore::new();
}

/// A JSON-valued map that keeps insertion order.
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<Vec<(String, Value)>>>,
}

/// Parse `raw` as JSON, unwrapping strings that are themselves JSON.
///
/// Returns `None` when `raw` is not valid JSON.
#[must_use]
pub fn decode_json(raw: &str) -> Option<Value> {
    let mut value: Value = serde_json::from_str(raw).ok()?;
    while let Value::String(inner) = &value {
        match serde_json::from_str::<Value>(inner) {
            Ok(next) => value = next,
            Err(_) => break,
        }
    }
    Some(value)
}

impl MemoryStore {
    /// Create an isolated store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The thread-wide shared store.
    #[must_use]
    pub fn shared() -> Self {
        SHARED.with(Clone::clone)
    }

    /// Number of entries.
    #[must_use]
    pub fn length(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Alias of [`MemoryStore::length`].
    #[must_use]
    pub fn size(&self) -> usize {
        self.length()
    }

    /// Key at `index` in insertion order.
    #[must_use]
    pub fn key(&self, index: usize) -> Option<String> {
        self.entries.borrow().get(index).map(|(k, _)| k.clone())
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get_item(&self, key: &str) -> Option<Value> {
        self.entries
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Store a string; valid JSON is decoded first.
    pub fn set_item(&self, key: &str, raw: &str) {
        let value = decode_json(raw).unwrap_or_else(|| Value::String(raw.to_string()));
        self.set_value(key, value);
    }

    /// Store an already decoded value.
    pub fn set_value(&self, key: &str, value: Value) {
        let mut entries = self.entries.borrow_mut();
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => entries.push((key.to_string(), value)),
        }
    }

    /// Remove `key` if present.
    pub fn remove_item(&self, key: &str) {
        self.entries.borrow_mut().retain(|(k, _)| k != key);
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.entries.borrow().iter().any(|(k, _)| k == key)
    }

    /// Snapshot of every entry.
    #[must_use]
    pub fn get_all(&self) -> Map<String, Value> {
        self.entries.borrow().iter().cloned().collect()
    }

    /// Replace every entry with `all`.
    pub fn set_all(&self, all: Map<String, Value>) {
        *self.entries.borrow_mut() = all.into_iter().collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_item_decodes_json() {
        let store = MemoryStore::new();
        store.set_item("list", "[1,2,3]");
        store.set_item("plain", "hello world");
        assert_eq!(store.get_item("list"), Some(json!([1, 2, 3])));
        assert_eq!(store.get_item("plain"), Some(json!("hello world")));
    }

    #[test]
    fn test_decode_json_unwraps_nested_strings() {
        assert_eq!(decode_json(r#""[1]""#), Some(json!([1])));
        assert_eq!(decode_json(r#""\"[1]\"""#), Some(json!([1])));
        assert_eq!(decode_json(r#""abc""#), Some(json!("abc")));
        assert_eq!(decode_json("abc"), None);
    }

    #[test]
    fn test_insertion_order_and_overwrite() {
        let store = MemoryStore::new();
        store.set_value("b", json!(1));
        store.set_value("a", json!(2));
        store.set_value("b", json!(3));
        assert_eq!(store.key(0).as_deref(), Some("b"));
        assert_eq!(store.key(1).as_deref(), Some("a"));
        assert_eq!(store.key(2), None);
        assert_eq!(store.get_item("b"), Some(json!(3)));
        assert_eq!(store.size(), 2);
    }

    #[test]
    fn test_remove_has_clear() {
        let store = MemoryStore::new();
        store.set_value("a", json!(true));
        assert!(store.has("a"));
        store.remove_item("a");
        store.remove_item("a");
        assert!(!store.has("a"));
        store.set_value("b", json!(null));
        store.clear();
        assert_eq!(store.length(), 0);
    }

    #[test]
    fn test_set_all_replaces_entries() {
        let store = MemoryStore::new();
        store.set_value("old", json!(1));
        let mut all = Map::new();
        all.insert("x".to_string(), json!("y"));
        store.set_all(all.clone());
        assert_eq!(store.get_all(), all);
    }

    #[test]
    fn test_shared_is_one_store_per_thread() {
        let a = MemoryStore::shared();
        let b = MemoryStore::shared();
        a.set_value("shared-test", json!(1));
        assert!(b.has("shared-test"));
        a.remove_item("shared-test");
        assert!(!MemoryStore::new().has("shared-test"));
    }
}
