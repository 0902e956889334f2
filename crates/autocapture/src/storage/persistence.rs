//! Persistence adapter: one interface over memory, web storage or nothing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::host::Page;
use crate::payload::CapturedPayload;

use super::memory::{decode_json, MemoryStore};
use super::WebStorage;

/// Storage key holding the JSON array of captured payloads.
pub const STORAGE_KEY: &str = "AUTOCAPTURE_EVENT_DATA";

/// Storage key holding the visitor id.
pub const VISITOR_ID_KEY: &str = "AUTOCAPTURE_VISITOR_ID";

thread_local! {
    static INSTANCE: RefCell<Option<Persistence>> = const { RefCell::new(None) };
}

/// Where captured events are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PersistenceKind {
    /// The in-memory [`MemoryStore`].
    #[default]
    Memory,
    /// The page's `localStorage`.
    LocalStorage,
    /// The page's `sessionStorage`.
    SessionStorage,
    /// Nothing is stored; captures are never reported as persisted.
    None,
}

impl PersistenceKind {
    /// Canonical name as used in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::LocalStorage => "localStorage",
            Self::SessionStorage => "sessionStorage",
            Self::None => "none",
        }
    }
}

impl fmt::Display for PersistenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PersistenceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(Self::Memory),
            "localStorage" | "local_storage" | "local-storage" => Ok(Self::LocalStorage),
            "sessionStorage" | "session_storage" | "session-storage" => Ok(Self::SessionStorage),
            "none" => Ok(Self::None),
            other => Err(Error::UnknownPersistence {
                kind: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for PersistenceKind {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PersistenceKind> for String {
    fn from(kind: PersistenceKind) -> Self {
        kind.as_str().to_string()
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Memory(MemoryStore),
    Web(Rc<dyn WebStorage>),
    Disabled,
}

#[derive(Debug)]
struct Inner {
    kind: PersistenceKind,
    backend: Backend,
    max_events: Cell<usize>,
    visitor_id: RefCell<Option<String>>,
}

/// Uniform storage handle used by the capture engine.
///
/// Clones share the same backend.
#[derive(Debug, Clone)]
pub struct Persistence {
    inner: Rc<Inner>,
}

impl Persistence {
    fn from_backend(kind: PersistenceKind, backend: Backend, max_events: usize) -> Self {
        Self {
            inner: Rc::new(Inner {
                kind,
                backend,
                max_events: Cell::new(max_events),
                visitor_id: RefCell::new(None),
            }),
        }
    }

    /// Build an unshared adapter of the given kind.
    ///
    /// `memory` gets a fresh isolated [`MemoryStore`]; web kinds use the
    /// page's storage objects.
    #[must_use]
    pub fn new(kind: PersistenceKind, max_events: usize, page: &Page) -> Self {
        let backend = match kind {
            PersistenceKind::Memory => Backend::Memory(MemoryStore::new()),
            PersistenceKind::LocalStorage => Backend::Web(page.local_storage()),
            PersistenceKind::SessionStorage => Backend::Web(page.session_storage()),
            PersistenceKind::None => Backend::Disabled,
        };
        Self::from_backend(kind, backend, max_events)
    }

    /// An adapter over the given memory store.
    #[must_use]
    pub fn memory(store: MemoryStore, max_events: usize) -> Self {
        Self::from_backend(PersistenceKind::Memory, Backend::Memory(store), max_events)
    }

    /// An adapter over a web storage object.
    #[must_use]
    pub fn web(kind: PersistenceKind, storage: Rc<dyn WebStorage>, max_events: usize) -> Self {
        Self::from_backend(kind, Backend::Web(storage), max_events)
    }

    /// An adapter that stores nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self::from_backend(PersistenceKind::None, Backend::Disabled, 0)
    }

    /// The thread-wide shared adapter, created on first use.
    ///
    /// `memory` uses [`MemoryStore::shared`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::PersistenceConflict`] if the shared adapter already
    /// exists with a different kind.
    pub fn get_instance(kind: PersistenceKind, max_events: usize, page: &Page) -> Result<Self> {
        INSTANCE.with(|slot| {
            let mut slot = slot.borrow_mut();
            if let Some(existing) = slot.as_ref() {
                if existing.kind() != kind {
                    return Err(Error::PersistenceConflict {
                        existing: existing.kind().to_string(),
                        requested: kind.to_string(),
                    });
                }
                return Ok(existing.clone());
            }

            debug!(%kind, max_events, "Creating shared persistence");
            let created = match kind {
                PersistenceKind::Memory => Self::memory(MemoryStore::shared(), max_events),
                _ => Self::new(kind, max_events, page),
            };
            *slot = Some(created.clone());
            Ok(created)
        })
    }

    /// Drop the shared adapter so the next [`Persistence::get_instance`]
    /// may pick a different kind.
    pub fn reset_instance() {
        INSTANCE.with(|slot| slot.borrow_mut().take());
    }

    /// The kind this adapter was created with.
    #[must_use]
    pub fn kind(&self) -> PersistenceKind {
        self.inner.kind
    }

    /// Maximum number of retained events.
    #[must_use]
    pub fn max_events(&self) -> usize {
        self.inner.max_events.get()
    }

    /// Change the retention limit; applies from the next stored event.
    pub fn set_max_events(&self, max_events: usize) {
        self.inner.max_events.set(max_events);
    }

    // === Storage contract ===

    /// Value stored under `key`; web storage strings are JSON-decoded when possible.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn get_item(&self, key: &str) -> Result<Option<Value>> {
        match &self.inner.backend {
            Backend::Memory(store) => Ok(store.get_item(key)),
            Backend::Web(storage) => Ok(storage
                .get_item(key)?
                .map(|raw| decode_json(&raw).unwrap_or(Value::String(raw)))),
            Backend::Disabled => Ok(None),
        }
    }

    /// Store `value` under `key`. Web storage receives strings as-is and
    /// everything else JSON-encoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    pub fn set_item(&self, key: &str, value: &Value) -> Result<()> {
        match &self.inner.backend {
            Backend::Memory(store) => {
                store.set_value(key, value.clone());
                Ok(())
            }
            Backend::Web(storage) => match value {
                Value::String(raw) => storage.set_item(key, raw),
                other => storage.set_item(key, &serde_json::to_string(other)?),
            },
            Backend::Disabled => Ok(()),
        }
    }

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn remove_item(&self, key: &str) -> Result<()> {
        match &self.inner.backend {
            Backend::Memory(store) => {
                store.remove_item(key);
                Ok(())
            }
            Backend::Web(storage) => storage.remove_item(key),
            Backend::Disabled => Ok(()),
        }
    }

    /// Remove every key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn clear(&self) -> Result<()> {
        match &self.inner.backend {
            Backend::Memory(store) => {
                store.clear();
                Ok(())
            }
            Backend::Web(storage) => storage.clear(),
            Backend::Disabled => Ok(()),
        }
    }

    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn size(&self) -> Result<usize> {
        match &self.inner.backend {
            Backend::Memory(store) => Ok(store.size()),
            Backend::Web(storage) => storage.length(),
            Backend::Disabled => Ok(0),
        }
    }

    /// Key at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn key(&self, index: usize) -> Result<Option<String>> {
        match &self.inner.backend {
            Backend::Memory(store) => Ok(store.key(index)),
            Backend::Web(storage) => storage.key(index),
            Backend::Disabled => Ok(None),
        }
    }

    /// Whether `key` is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get_item(key)?.is_some())
    }

    /// Every entry, rebuilt by walking indices `0..size`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn get_all(&self) -> Result<Map<String, Value>> {
        let mut all = Map::new();
        for index in 0..self.size()? {
            if let Some(key) = self.key(index)? {
                if let Some(value) = self.get_item(&key)? {
                    all.insert(key, value);
                }
            }
        }
        Ok(all)
    }

    /// Replace every entry with `all`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects a write.
    pub fn set_all(&self, all: &Map<String, Value>) -> Result<()> {
        self.clear()?;
        for (key, value) in all {
            self.set_item(key, value)?;
        }
        Ok(())
    }

    // === Event history ===

    /// Append a payload to the history, evicting the oldest entries beyond
    /// [`Persistence::max_events`].
    ///
    /// Returns `true` only when the payload was written. Backend failures are
    /// logged and reported as `false`.
    pub fn store_event(&self, payload: &CapturedPayload) -> bool {
        match self.try_store_event(payload) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(event = %payload.event, kind = %self.kind(), "Failed to persist event: {e}");
                false
            }
        }
    }

    fn try_store_event(&self, payload: &CapturedPayload) -> Result<bool> {
        if matches!(self.inner.backend, Backend::Disabled) {
            return Ok(false);
        }
        let max = self.max_events();
        if max == 0 {
            debug!(event = %payload.event, "History holds no events, not storing");
            return Ok(false);
        }
        let mut history = self.raw_events()?;
        history.push(serde_json::to_value(payload)?);
        if history.len() > max {
            let excess = history.len() - max;
            history.drain(..excess);
            debug!(evicted = excess, max, "Evicted oldest events");
        }
        self.set_item(STORAGE_KEY, &Value::Array(history))?;
        Ok(true)
    }

    fn raw_events(&self) -> Result<Vec<Value>> {
        match self.get_item(STORAGE_KEY)? {
            None => Ok(Vec::new()),
            Some(Value::Array(history)) => Ok(history),
            Some(other) => {
                warn!("Discarding malformed event history of type {}", json_type(&other));
                Ok(Vec::new())
            }
        }
    }

    /// The stored history, oldest first. Entries that no longer decode are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn events(&self) -> Result<Vec<CapturedPayload>> {
        let history = self.raw_events()?;
        Ok(history
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value) {
                Ok(payload) => Some(payload),
                Err(e) => {
                    warn!("Skipping undecodable stored event: {e}");
                    None
                }
            })
            .collect())
    }

    /// Remove the history key only.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn clear_events(&self) -> Result<()> {
        self.remove_item(STORAGE_KEY)
    }

    /// The visitor id: `custom` when given, else the stored id, else a new
    /// UUID that is persisted for next time.
    pub fn visitor_id(&self, custom: Option<&str>) -> String {
        if let Some(id) = custom.filter(|id| !id.is_empty()) {
            return id.to_string();
        }
        if let Some(id) = self.inner.visitor_id.borrow().as_ref() {
            return id.clone();
        }

        let id = match self.stored_visitor_id() {
            Ok(Some(id)) => id,
            Ok(None) => {
                let id = Uuid::new_v4().to_string();
                if let Err(e) = self.set_item(VISITOR_ID_KEY, &Value::String(id.clone())) {
                    warn!("Failed to persist visitor id: {e}");
                }
                id
            }
            Err(e) => {
                warn!("Failed to read visitor id: {e}");
                Uuid::new_v4().to_string()
            }
        };
        *self.inner.visitor_id.borrow_mut() = Some(id.clone());
        id
    }

    fn stored_visitor_id(&self) -> Result<Option<String>> {
        Ok(match self.get_item(VISITOR_ID_KEY)? {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
