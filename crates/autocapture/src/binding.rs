//! A listener attachment that can be detached later.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::host::{EventTarget, Listener, ListenerId, ListenerOptions, Page};

/// One listener on one target, tagged with the key of its owner.
///
/// Bind and unbind are idempotent. Retargeting needs a new binding.
pub struct EventBinding {
    page: Page,
    target: EventTarget,
    event_type: String,
    listener: Listener,
    options: ListenerOptions,
    owner: String,
    id: Cell<Option<ListenerId>>,
}

impl EventBinding {
    /// Create an unbound binding.
    #[must_use]
    pub fn new(
        page: &Page,
        target: EventTarget,
        event_type: &str,
        listener: Listener,
        options: ListenerOptions,
        owner: &str,
    ) -> Self {
        Self {
            page: page.clone(),
            target,
            event_type: event_type.to_string(),
            listener,
            options,
            owner: owner.to_string(),
            id: Cell::new(None),
        }
    }

    /// Attach the listener.
    pub fn bind(&self) -> &Self {
        if self.id.get().is_none() {
            let id = self.page.add_event_listener(
                self.target.clone(),
                &self.event_type,
                Rc::clone(&self.listener),
                self.options,
            );
            trace!(
                owner = %self.owner,
                event = %self.event_type,
                target = %self.target.label(),
                "Bound listener"
            );
            self.id.set(Some(id));
        }
        self
    }

    /// Detach the listener.
    pub fn unbind(&self) -> &Self {
        if let Some(id) = self.id.take() {
            self.page.remove_event_listener(id);
            trace!(owner = %self.owner, event = %self.event_type, "Unbound listener");
        }
        self
    }

    /// Whether the listener is still attached. A fired `once` listener is not.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.id.get().is_some_and(|id| self.page.has_listener(id))
    }

    /// Key of the plugin (or engine) that owns this binding.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The native event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The attachment target.
    #[must_use]
    pub fn target(&self) -> &EventTarget {
        &self.target
    }

    /// The listener options.
    #[must_use]
    pub fn options(&self) -> ListenerOptions {
        self.options
    }
}

impl fmt::Debug for EventBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBinding")
            .field("owner", &self.owner)
            .field("event_type", &self.event_type)
            .field("target", &self.target.label())
            .field("options", &self.options)
            .field("bound", &self.is_bound())
            .finish_non_exhaustive()
    }
}
