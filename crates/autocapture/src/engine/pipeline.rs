//! The per-occurrence gating pipeline.
//!
//! Every bound descriptor runs through the same steps, in order:
//! plugin veto, descriptor condition, throttle, payload build, handler,
//! persistence, then notification. Each step can end the run; nothing after
//! the step that ended it has side effects.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use super::observer::Observer;
use crate::config::Config;
use crate::filter::ElementFilter;
use crate::host::{DomEvent, Listener, Page};
use crate::payload::{CapturedPayload, PayloadBuilder};
use crate::plugins::{BindDescriptor, Condition, Handler, Outcome};
use crate::registry::PluginRef;
use crate::storage::Persistence;

/// Shared state of one engine, reachable from its listeners.
pub(crate) struct CaptureContext {
    pub(crate) config: Rc<Config>,
    pub(crate) page: Page,
    pub(crate) filter: Rc<ElementFilter>,
    pub(crate) builder: PayloadBuilder,
    pub(crate) persistence: Persistence,
    pub(crate) session_id: String,
    pub(crate) observer: Option<Observer>,
}

impl fmt::Debug for CaptureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureContext")
            .field("page", &self.page)
            .field("persistence", &self.persistence)
            .field("session_id", &self.session_id)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

/// How one occurrence left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The owning plugin's `on_before_capture` returned false.
    Vetoed,
    /// The descriptor's condition did not hold.
    ConditionFailed,
    /// Too soon after the previous admitted occurrence.
    Throttled,
    /// The handler suppressed it.
    Suppressed,
    /// The handler's fields could not be merged.
    Rejected,
    /// The persistence backend did not store it.
    NotPersisted,
    /// Stored and notified.
    Captured,
}

impl Disposition {
    /// Lower-case label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vetoed => "vetoed",
            Self::ConditionFailed => "condition-failed",
            Self::Throttled => "throttled",
            Self::Suppressed => "suppressed",
            Self::Rejected => "rejected",
            Self::NotPersisted => "not-persisted",
            Self::Captured => "captured",
        }
    }
}

/// One descriptor wrapped for the pipeline.
pub(crate) struct Gate {
    owner: String,
    plugin: Option<PluginRef>,
    name: String,
    callback: Handler,
    condition: Option<Condition>,
    throttle_ms: Option<f64>,
    last_admitted: Cell<Option<f64>>,
}

impl Gate {
    pub(crate) fn new(owner: &str, plugin: Option<PluginRef>, descriptor: &BindDescriptor) -> Self {
        Self {
            owner: owner.to_string(),
            plugin,
            name: descriptor.name.clone(),
            callback: Rc::clone(&descriptor.callback),
            condition: descriptor.condition.clone(),
            throttle_ms: descriptor.throttle.map(|d| d.as_secs_f64() * 1000.0),
            last_admitted: Cell::new(None),
        }
    }

    pub(crate) fn run(&self, cx: &CaptureContext, event: &DomEvent) -> Disposition {
        if let Some(plugin) = &self.plugin {
            match plugin.try_borrow() {
                Ok(plugin) if plugin.on_before_capture(event) => {}
                Ok(_) => return Disposition::Vetoed,
                Err(_) => {
                    debug!(owner = %self.owner, "Plugin busy, dropping re-entrant event");
                    return Disposition::Vetoed;
                }
            }
        }

        if let Some(condition) = &self.condition {
            if !condition() {
                return Disposition::ConditionFailed;
            }
        }

        if let Some(interval) = self.throttle_ms {
            let now = event.time_stamp();
            if let Some(last) = self.last_admitted.get() {
                if now - last < interval {
                    return Disposition::Throttled;
                }
            }
            self.last_admitted.set(Some(now));
        }

        let mut payload = cx.builder.build(event, &self.name, &cx.session_id);
        match (self.callback)(event, &payload) {
            Outcome::Suppressed => return Disposition::Suppressed,
            Outcome::Accepted(fields) => {
                if let Err(e) = payload.merge(fields) {
                    warn!(owner = %self.owner, event = %self.name, "Discarding payload: {e}");
                    return Disposition::Rejected;
                }
            }
        }

        if !cx.persistence.store_event(&payload) {
            return Disposition::NotPersisted;
        }

        if let Some(observer) = &cx.observer {
            observer(&payload);
        }
        if let Some(plugin) = &self.plugin {
            if let Ok(plugin) = plugin.try_borrow() {
                plugin.on_event_capture(&payload);
            }
        }
        debug!(owner = %self.owner, event = %payload.event, "Captured event");
        Disposition::Captured
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("throttle_ms", &self.throttle_ms)
            .finish_non_exhaustive()
    }
}

/// Wrap a gate into a page listener bound to `cx`.
pub(crate) fn listener(cx: &Rc<CaptureContext>, gate: Gate) -> Listener {
    let cx = Rc::clone(cx);
    Rc::new(move |event: &DomEvent| {
        let disposition = gate.run(&cx, event);
        if disposition != Disposition::Captured {
            trace!(
                owner = %gate.owner,
                event = %event.event_type,
                disposition = disposition.as_str(),
                "Dropped event"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::EventTarget;
    use crate::storage::MemoryStore;
    use std::time::Duration;

    fn context(persistence: Persistence) -> CaptureContext {
        let config = Rc::new(Config::default());
        let page = Page::builder().build().unwrap();
        CaptureContext {
            filter: Rc::new(ElementFilter::from_config(&config).unwrap()),
            builder: PayloadBuilder::new(Rc::clone(&config), page.clone()).unwrap(),
            config,
            page,
            persistence,
            session_id: "s".to_string(),
            observer: None,
        }
    }

    fn memory() -> Persistence {
        Persistence::memory(MemoryStore::new(), 10)
    }

    fn descriptor(outcome: Outcome) -> BindDescriptor {
        BindDescriptor::new("sample", EventTarget::Window, "sample", move |_e, _p| outcome.clone())
    }

    fn sample(ts: f64) -> DomEvent {
        DomEvent::new("sample", EventTarget::Window).at(ts)
    }

    #[test]
    fn test_throttle_admits_after_interval() {
        let cx = context(memory());
        let gate = Gate::new(
            "t",
            None,
            &descriptor(Outcome::accept()).throttled(Duration::from_millis(100)),
        );
        assert_eq!(gate.run(&cx, &sample(0.0)), Disposition::Captured);
        assert_eq!(gate.run(&cx, &sample(50.0)), Disposition::Throttled);
        assert_eq!(gate.run(&cx, &sample(100.0)), Disposition::Captured);
        assert_eq!(gate.run(&cx, &sample(150.0)), Disposition::Throttled);
    }

    #[test]
    fn test_condition_runs_before_throttle() {
        let cx = context(memory());
        let gate = Gate::new(
            "t",
            None,
            &descriptor(Outcome::accept())
                .throttled(Duration::from_millis(100))
                .when(|| false),
        );
        assert_eq!(gate.run(&cx, &sample(0.0)), Disposition::ConditionFailed);
        assert!(gate.last_admitted.get().is_none());
    }

    #[test]
    fn test_suppressed_has_no_side_effects() {
        let cx = context(memory());
        let gate = Gate::new("t", None, &descriptor(Outcome::Suppressed));
        assert_eq!(gate.run(&cx, &sample(0.0)), Disposition::Suppressed);
        assert!(cx.persistence.events().unwrap().is_empty());
    }

    #[test]
    fn test_merge_failure_rejects() {
        let cx = context(memory());
        let gate = Gate::new(
            "t",
            None,
            &descriptor(Outcome::fields(serde_json::json!({"timestamp": "not a date"}))),
        );
        assert_eq!(gate.run(&cx, &sample(0.0)), Disposition::Rejected);
        assert!(cx.persistence.events().unwrap().is_empty());
    }

    #[test]
    fn test_disabled_persistence_skips_observer() {
        let mut cx = context(Persistence::disabled());
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        cx.observer = Some(Rc::new(move |_p: &CapturedPayload| counter.set(counter.get() + 1)));

        let gate = Gate::new("t", None, &descriptor(Outcome::accept()));
        assert_eq!(gate.run(&cx, &sample(0.0)), Disposition::NotPersisted);
        assert_eq!(seen.get(), 0);
    }

    #[test]
    fn test_captured_fields_merged() {
        let cx = context(memory());
        let gate = Gate::new("t", None, &descriptor(Outcome::with("custom", 7)));
        assert_eq!(gate.run(&cx, &sample(0.0)), Disposition::Captured);
        let events = cx.persistence.events().unwrap();
        assert_eq!(events[0].event, "sample");
        assert_eq!(events[0].field("custom"), Some(&serde_json::json!(7)));
    }
}
