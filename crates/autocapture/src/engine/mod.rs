//! The capture engine.
//!
//! [`AutoCapture`] owns the listener table of one page. On start it binds its
//! own direct listeners for the enabled interaction categories, then asks
//! every enabled plugin for descriptors and runs each occurrence through the
//! gating pipeline.

mod observer;
mod pipeline;

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::binding::EventBinding;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::ElementFilter;
use crate::host::{DomEvent, EventTarget, ListenerOptions, Page};
use crate::payload::{CapturedPayload, PayloadBuilder};
use crate::plugins::{BindContext, BindDescriptor, Outcome, Plugin, PAGE_VIEW_EVENT};
use crate::registry::{PluginRef, PluginRegistry};
use crate::storage::Persistence;

pub use observer::{forward_to, Observer};
pub use pipeline::Disposition;

use pipeline::{CaptureContext, Gate};

/// Owner key of the engine's own listeners.
pub const DIRECT_OWNER: &str = "autocapture";

/// Capture categories served by direct listeners, with their native events.
pub const DIRECT_CATEGORIES: &[(&str, &[&str])] = &[
    ("click", &["click"]),
    ("double-click", &["dblclick"]),
    ("context-menu", &["contextmenu"]),
    ("input", &["input"]),
    ("change", &["change"]),
    ("submit", &["submit"]),
    ("touch", &["touchstart", "touchmove", "touchend"]),
];

/// Automatic interaction capture for one page.
///
/// ```
/// use autocapture::{AutoCapture, Config, PluginRegistry};
/// use autocapture::host::{DomEvent, Page};
/// use autocapture::storage::{MemoryStore, Persistence};
///
/// let page = Page::builder().build()?;
/// let config = Config {
///     capture: vec!["click".to_string()],
///     ..Config::default()
/// };
/// let engine = AutoCapture::builder(config, page.clone())
///     .registry(PluginRegistry::new())
///     .persistence(Persistence::memory(MemoryStore::new(), 10))
///     .build()?;
/// engine.start();
///
/// let button = page.create_element("button").with_attribute("id", "buy");
/// page.dispatch(DomEvent::new("click", &button));
///
/// let events = engine.get_captured_events();
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].event, "click");
/// # Ok::<(), autocapture::Error>(())
/// ```
pub struct AutoCapture {
    context: Rc<CaptureContext>,
    registry: PluginRegistry,
    bindings: RefCell<Vec<EventBinding>>,
    started: RefCell<BTreeSet<String>>,
    running: Cell<bool>,
}

/// Builder for [`AutoCapture`] with injectable collaborators.
pub struct AutoCaptureBuilder {
    config: Config,
    page: Page,
    registry: Option<PluginRegistry>,
    persistence: Option<Persistence>,
    observer: Option<Observer>,
}

impl AutoCaptureBuilder {
    /// Use this registry instead of the shared one.
    #[must_use]
    pub fn registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use this adapter instead of the shared one for the configured kind.
    #[must_use]
    pub fn persistence(mut self, persistence: Persistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Notify `observer` after every persisted payload.
    #[must_use]
    pub fn on_event_capture(mut self, observer: impl Fn(&CapturedPayload) + 'static) -> Self {
        self.observer = Some(Rc::new(observer));
        self
    }

    /// Use an already shared observer.
    #[must_use]
    pub fn observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validate the configuration, resolve collaborators and call
    /// `on_init` on every registered plugin.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid options, or a persistence
    /// error when the shared adapter exists with another kind.
    pub fn build(self) -> Result<AutoCapture> {
        self.config.validate()?;
        let config = Rc::new(self.config);
        let filter = Rc::new(ElementFilter::from_config(&config)?);
        let builder = PayloadBuilder::new(Rc::clone(&config), self.page.clone())?;
        let persistence = match self.persistence {
            Some(persistence) => persistence,
            None => Persistence::get_instance(config.persistence, config.max_events, &self.page)?,
        };
        let session_id = persistence.visitor_id(config.session_id.as_deref());
        let registry = self.registry.unwrap_or_else(PluginRegistry::global);

        for (key, plugin) in registry.all() {
            match plugin.try_borrow_mut() {
                Ok(mut plugin) => plugin.on_init(Rc::clone(&config)),
                Err(_) => warn!(plugin = %key, "Plugin busy, skipping on_init"),
            }
        }
        debug!(
            persistence = %persistence.kind(),
            plugins = registry.len(),
            "Created capture engine"
        );

        Ok(AutoCapture {
            context: Rc::new(CaptureContext {
                config,
                page: self.page,
                filter,
                builder,
                persistence,
                session_id,
                observer: self.observer,
            }),
            registry,
            bindings: RefCell::new(Vec::new()),
            started: RefCell::new(BTreeSet::new()),
            running: Cell::new(false),
        })
    }
}

impl fmt::Debug for AutoCaptureBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoCaptureBuilder")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("persistence", &self.persistence)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl AutoCapture {
    /// Create an engine on the shared registry and shared persistence.
    ///
    /// # Errors
    ///
    /// See [`AutoCaptureBuilder::build`].
    pub fn new(config: Config, page: Page) -> Result<Self> {
        Self::builder(config, page).build()
    }

    /// Start building an engine.
    #[must_use]
    pub fn builder(config: Config, page: Page) -> AutoCaptureBuilder {
        AutoCaptureBuilder {
            config,
            page,
            registry: None,
            persistence: None,
            observer: None,
        }
    }

    /// Register a plugin in the shared registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePlugin`] if the key is taken.
    pub fn use_plugin<P: Plugin + 'static>(plugin: P) -> Result<PluginRef> {
        PluginRegistry::global().register(plugin)
    }

    /// Bind direct listeners and every enabled plugin.
    ///
    /// Owners that are already started are left alone, so calling this again
    /// only picks up plugins registered since.
    pub fn start(&self) {
        self.start_direct();

        for (key, plugin) in self.registry.all() {
            if !self.context.config.is_capture_enabled(&key) {
                debug!(plugin = %key, "Skipping plugin not in capture list");
                continue;
            }
            if self.started.borrow().contains(&key) {
                continue;
            }

            let descriptors = {
                let Ok(mut guard) = plugin.try_borrow_mut() else {
                    warn!(plugin = %key, "Plugin busy, not starting");
                    continue;
                };
                guard.on_start();
                let options = guard
                    .options()
                    .unwrap_or_else(|| Rc::clone(&self.context.config));
                guard.bind(&BindContext {
                    options: &options,
                    page: &self.context.page,
                    filter: &self.context.filter,
                })
            };
            debug!(plugin = %key, descriptors = descriptors.len(), "Starting plugin");
            self.bind_descriptors(&key, Some(&plugin), &descriptors);
            self.started.borrow_mut().insert(key);
        }

        if !self.running.replace(true) {
            info!(bindings = self.binding_count(), "Capture started");
        }
    }

    fn start_direct(&self) {
        if self.started.borrow().contains(DIRECT_OWNER) {
            return;
        }
        let descriptors: Vec<BindDescriptor> = DIRECT_CATEGORIES
            .iter()
            .filter(|(category, _)| self.context.config.is_capture_enabled(category))
            .flat_map(|(_, events)| events.iter())
            .map(|event| {
                let filter = Rc::clone(&self.context.filter);
                BindDescriptor::new(
                    event,
                    EventTarget::Document,
                    event,
                    move |event: &DomEvent, _payload: &CapturedPayload| {
                        if filter.accepts(event) {
                            Outcome::accept()
                        } else {
                            Outcome::Suppressed
                        }
                    },
                )
                .with_options(ListenerOptions::capture())
            })
            .collect();
        self.bind_descriptors(DIRECT_OWNER, None, &descriptors);
        self.started.borrow_mut().insert(DIRECT_OWNER.to_string());
    }

    fn bind_descriptors(
        &self,
        owner: &str,
        plugin: Option<&PluginRef>,
        descriptors: &[BindDescriptor],
    ) {
        let mut bindings = self.bindings.borrow_mut();
        for descriptor in descriptors {
            let gate = Gate::new(owner, plugin.map(Rc::clone), descriptor);
            let binding = EventBinding::new(
                &self.context.page,
                descriptor.target.clone(),
                &descriptor.event,
                pipeline::listener(&self.context, gate),
                descriptor.options,
                owner,
            );
            binding.bind();
            bindings.push(binding);
        }
    }

    /// Unbind everything and call `on_stop` on every registered plugin.
    /// Stopping a stopped engine does nothing.
    pub fn stop(&self) {
        if !self.running.replace(false) {
            return;
        }
        let bindings = std::mem::take(&mut *self.bindings.borrow_mut());
        for binding in &bindings {
            binding.unbind();
        }
        self.started.borrow_mut().clear();

        for (key, plugin) in self.registry.all() {
            match plugin.try_borrow_mut() {
                Ok(mut plugin) => plugin.on_stop(),
                Err(_) => warn!(plugin = %key, "Plugin busy, skipping on_stop"),
            }
        }
        info!(unbound = bindings.len(), "Capture stopped");
    }

    /// Whether [`AutoCapture::start`] ran more recently than [`AutoCapture::stop`].
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Number of tracked bindings.
    #[must_use]
    pub fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    /// Number of tracked bindings owned by `key`.
    #[must_use]
    pub fn bindings_for(&self, key: &str) -> usize {
        self.bindings
            .borrow()
            .iter()
            .filter(|b| b.owner() == key)
            .count()
    }

    /// The persisted history, oldest first. Read failures yield an empty list.
    #[must_use]
    pub fn get_captured_events(&self) -> Vec<CapturedPayload> {
        self.context.persistence.events().unwrap_or_else(|e| {
            warn!("Failed to read captured events: {e}");
            Vec::new()
        })
    }

    /// Remove the persisted history, leaving other keys in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    pub fn clear_captured_events(&self) -> Result<()> {
        self.context.persistence.clear_events()
    }

    /// The persisted page views, oldest first.
    #[must_use]
    pub fn get_page_views(&self) -> Vec<CapturedPayload> {
        self.get_captured_events()
            .into_iter()
            .filter(|p| p.event == PAGE_VIEW_EVENT)
            .collect()
    }

    /// Unbind a plugin's listeners and remove it from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPlugin`] if `key` is not registered.
    pub fn unregister_plugin(&self, key: &str) -> Result<()> {
        if !self.registry.has(key) {
            return Err(Error::unknown_plugin(key));
        }
        let removed: Vec<EventBinding> = {
            let mut bindings = self.bindings.borrow_mut();
            let (removed, kept) = std::mem::take(&mut *bindings)
                .into_iter()
                .partition(|b| b.owner() == key);
            *bindings = kept;
            removed
        };
        for binding in &removed {
            binding.unbind();
        }
        self.started.borrow_mut().remove(key);
        self.registry.unregister(key);
        debug!(plugin = %key, unbound = removed.len(), "Unregistered plugin from engine");
        Ok(())
    }

    /// The registry this engine reads plugins from.
    #[must_use]
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// The instrumented page.
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.context.page
    }

    /// The persistence adapter.
    #[must_use]
    pub fn persistence(&self) -> &Persistence {
        &self.context.persistence
    }

    /// The session id stamped on every payload.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.context.session_id
    }
}

impl Drop for AutoCapture {
    fn drop(&mut self) {
        for binding in self.bindings.get_mut().iter() {
            binding.unbind();
        }
    }
}

impl fmt::Debug for AutoCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoCapture")
            .field("context", &self.context)
            .field("registry", &self.registry)
            .field("bindings", &self.binding_count())
            .field("running", &self.running.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MAX_PAGE_TIME;
    use crate::plugins::{MouseMovementPlugin, PageViewPlugin, ScrollPlugin};
    use crate::storage::{MemoryStore, PersistenceKind};
    use serde_json::json;

    #[derive(Debug, Default, Clone)]
    struct Counters {
        init: Rc<Cell<u32>>,
        start: Rc<Cell<u32>>,
        stop: Rc<Cell<u32>>,
        captured: Rc<Cell<u32>>,
    }

    #[derive(Debug)]
    struct Sample {
        counters: Counters,
        allow: bool,
        extra: serde_json::Value,
    }

    impl Sample {
        fn new(counters: &Counters) -> Self {
            Self {
                counters: counters.clone(),
                allow: true,
                extra: json!({}),
            }
        }
    }

    fn bump(cell: &Rc<Cell<u32>>) {
        cell.set(cell.get() + 1);
    }

    impl Plugin for Sample {
        fn key(&self) -> &str {
            "sample"
        }

        fn bind(&self, _cx: &BindContext<'_>) -> Vec<BindDescriptor> {
            let extra = self.extra.clone();
            vec![BindDescriptor::new(
                "sample",
                EventTarget::Document,
                "sample",
                move |_e: &DomEvent, _p: &CapturedPayload| Outcome::fields(extra.clone()),
            )]
        }

        fn on_init(&mut self, _config: Rc<Config>) {
            bump(&self.counters.init);
        }

        fn on_start(&mut self) {
            bump(&self.counters.start);
        }

        fn on_stop(&mut self) {
            bump(&self.counters.stop);
        }

        fn on_before_capture(&self, _event: &DomEvent) -> bool {
            self.allow
        }

        fn on_event_capture(&self, _payload: &CapturedPayload) {
            bump(&self.counters.captured);
        }
    }

    fn config(capture: &[&str]) -> Config {
        Config {
            capture: capture.iter().map(ToString::to_string).collect(),
            ..Config::default()
        }
    }

    fn engine(config: Config, registry: &PluginRegistry) -> (AutoCapture, Page) {
        let page = Page::builder().build().unwrap();
        let engine = AutoCapture::builder(config, page.clone())
            .registry(registry.clone())
            .persistence(Persistence::memory(MemoryStore::new(), 100))
            .build()
            .unwrap();
        (engine, page)
    }

    fn sample_event() -> DomEvent {
        DomEvent::new("sample", EventTarget::Document)
    }

    #[test]
    fn test_button_click_is_captured() {
        let config = Config {
            elements: vec!["a".to_string(), "button".to_string()],
            ..config(&["click"])
        };
        let (engine, page) = engine(config, &PluginRegistry::new());
        engine.start();

        let button = page.create_element("button").with_attribute("id", "x");
        page.dispatch(DomEvent::new("click", &button));

        let events = engine.get_captured_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "click");
        let target = events[0].target.as_ref().unwrap();
        assert_eq!(target.selector, "button");
        assert_eq!(target.attributes["id"], "x");
    }

    #[test]
    fn test_huge_time_stamp_is_captured_at_bound() {
        let (engine, page) = engine(config(&["click"]), &PluginRegistry::new());
        engine.start();

        let button = page.create_element("button");
        page.dispatch(DomEvent::new("click", &button).at(1e18));

        let events = engine.get_captured_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp, page.timestamp_at(MAX_PAGE_TIME));
    }

    #[test]
    fn test_history_timestamps_never_decrease() {
        let (engine, page) = engine(config(&["click"]), &PluginRegistry::new());
        engine.start();

        let button = page.create_element("button");
        page.dispatch(DomEvent::new("click", &button).at(1000.0));
        page.dispatch(DomEvent::new("click", &button).at(500.0));
        page.dispatch(DomEvent::new("click", &button));

        let events = engine.get_captured_events();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_direct_listeners_apply_filter() {
        let config = Config {
            safelist: vec![".no-track".to_string()],
            ..config(&["click", "input"])
        };
        let (engine, page) = engine(config, &PluginRegistry::new());
        engine.start();
        assert_eq!(engine.bindings_for(DIRECT_OWNER), 2);

        page.dispatch(DomEvent::new("click", &page.create_element("div")));
        let hidden = page.create_element("button").with_attribute("class", "no-track");
        page.dispatch(DomEvent::new("click", &hidden));
        page.dispatch(DomEvent::new("input", &page.create_element("input")));

        let events = engine.get_captured_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "input");
    }

    #[test]
    fn test_default_capture_binds_no_direct_listeners() {
        let (engine, _page) = engine(Config::default(), &PluginRegistry::new());
        engine.start();
        assert_eq!(engine.bindings_for(DIRECT_OWNER), 0);
        assert!(engine.is_running());
    }

    #[test]
    fn test_persistence_none_returns_empty_history() {
        let captured = Rc::new(Cell::new(0));
        let counter = Rc::clone(&captured);
        let page = Page::builder().build().unwrap();
        let engine = AutoCapture::builder(config(&["click"]), page.clone())
            .registry(PluginRegistry::new())
            .persistence(Persistence::disabled())
            .on_event_capture(move |_p| counter.set(counter.get() + 1))
            .build()
            .unwrap();
        engine.start();

        page.dispatch(DomEvent::new("click", &page.create_element("button")));
        assert!(engine.get_captured_events().is_empty());
        assert_eq!(captured.get(), 0);
    }

    #[test]
    fn test_throttle_spacing() {
        let run = |gap: f64| {
            let registry = PluginRegistry::new();
            registry.register(MouseMovementPlugin::new()).unwrap();
            let (engine, page) = engine(config(&["mouse-movement"]), &registry);
            engine.start();
            page.dispatch(DomEvent::new("mousemove", EventTarget::Window).at(1000.0));
            page.dispatch(DomEvent::new("mousemove", EventTarget::Window).at(1000.0 + gap));
            engine.get_captured_events().len()
        };
        assert_eq!(run(50.0), 1);
        assert_eq!(run(150.0), 2);
    }

    #[test]
    fn test_notifications_fire_once() {
        let counters = Counters::default();
        let registry = PluginRegistry::new();
        registry.register(Sample::new(&counters)).unwrap();

        let page = Page::builder().build().unwrap();
        let observed = Rc::new(Cell::new(0));
        let counter = Rc::clone(&observed);
        let engine = AutoCapture::builder(config(&["sample"]), page.clone())
            .registry(registry)
            .persistence(Persistence::memory(MemoryStore::new(), 100))
            .on_event_capture(move |_p| counter.set(counter.get() + 1))
            .build()
            .unwrap();
        engine.start();
        page.dispatch(sample_event());

        assert_eq!(observed.get(), 1);
        assert_eq!(counters.captured.get(), 1);
        assert_eq!(engine.get_captured_events().len(), 1);
    }

    #[test]
    fn test_engine_observer_runs_before_plugin() {
        let counters = Counters::default();
        let registry = PluginRegistry::new();
        registry.register(Sample::new(&counters)).unwrap();

        let page = Page::builder().build().unwrap();
        let plugin_count = Rc::clone(&counters.captured);
        let observed = Rc::new(Cell::new(None));
        let slot = Rc::clone(&observed);
        let engine = AutoCapture::builder(config(&["sample"]), page.clone())
            .registry(registry)
            .persistence(Persistence::memory(MemoryStore::new(), 100))
            .on_event_capture(move |_p| slot.set(Some(plugin_count.get())))
            .build()
            .unwrap();
        engine.start();
        page.dispatch(sample_event());

        assert_eq!(observed.get(), Some(0));
        assert_eq!(counters.captured.get(), 1);
    }

    #[test]
    fn test_veto_has_no_side_effects() {
        let counters = Counters::default();
        let registry = PluginRegistry::new();
        let mut sample = Sample::new(&counters);
        sample.allow = false;
        registry.register(sample).unwrap();
        let (engine, page) = engine(config(&["sample"]), &registry);
        engine.start();

        page.dispatch(sample_event());
        assert!(engine.get_captured_events().is_empty());
        assert_eq!(counters.captured.get(), 0);
    }

    #[test]
    fn test_handler_fields_merged() {
        let counters = Counters::default();
        let registry = PluginRegistry::new();
        let mut sample = Sample::new(&counters);
        sample.extra = json!({"campaign": "spring"});
        registry.register(sample).unwrap();
        let (engine, page) = engine(config(&["sample"]), &registry);
        engine.start();

        page.dispatch(sample_event());
        let events = engine.get_captured_events();
        assert_eq!(events[0].field("campaign"), Some(&json!("spring")));
    }

    #[test]
    fn test_lifecycle_hooks() {
        let counters = Counters::default();
        let registry = PluginRegistry::new();
        registry.register(Sample::new(&counters)).unwrap();
        let (engine, _page) = engine(config(&["sample"]), &registry);
        assert_eq!(counters.init.get(), 1);

        engine.start();
        engine.start();
        assert_eq!(counters.start.get(), 1);
        assert_eq!(engine.bindings_for("sample"), 1);

        engine.stop();
        engine.stop();
        assert_eq!(counters.stop.get(), 1);
    }

    #[test]
    fn test_stop_twice_unbinds_everything() {
        let registry = PluginRegistry::new();
        registry.register(ScrollPlugin::new()).unwrap();
        let (engine, page) = engine(config(&["scroll", "click"]), &registry);
        engine.start();
        assert!(engine.binding_count() > 0);

        engine.stop();
        engine.stop();
        assert_eq!(engine.binding_count(), 0);
        assert_eq!(page.listener_count(), 0);
        assert!(!engine.is_running());

        page.dispatch(DomEvent::new("click", &page.create_element("button")));
        assert!(engine.get_captured_events().is_empty());
    }

    #[test]
    fn test_restart_after_stop_rebinds() {
        let registry = PluginRegistry::new();
        registry.register(ScrollPlugin::new()).unwrap();
        let (engine, _page) = engine(config(&["scroll"]), &registry);
        engine.start();
        let bound = engine.binding_count();
        engine.stop();
        engine.start();
        assert_eq!(engine.binding_count(), bound);
    }

    #[test]
    fn test_skips_plugins_outside_capture_list() {
        let registry = PluginRegistry::new();
        registry.register(ScrollPlugin::new()).unwrap();
        registry.register(PageViewPlugin::new()).unwrap();
        let (engine, _page) = engine(config(&["page-view"]), &registry);
        engine.start();
        assert_eq!(engine.bindings_for("scroll"), 0);
        assert_eq!(engine.bindings_for("page-view"), 3);
    }

    #[test]
    fn test_unregister_plugin() {
        let registry = PluginRegistry::new();
        registry.register(ScrollPlugin::new()).unwrap();
        let (engine, page) = engine(config(&["scroll"]), &registry);
        engine.start();

        let err = engine.unregister_plugin("video").unwrap_err();
        assert!(matches!(err, Error::UnknownPlugin { .. }));

        engine.unregister_plugin("scroll").unwrap();
        assert_eq!(engine.bindings_for("scroll"), 0);
        assert!(!registry.has("scroll"));
        assert_eq!(page.listener_count(), 0);
    }

    #[test]
    fn test_page_views() {
        let registry = PluginRegistry::new();
        registry.register(PageViewPlugin::new()).unwrap();
        let (engine, page) = engine(config(&["page-view", "click"]), &registry);
        engine.start();

        page.dispatch(DomEvent::new("load", EventTarget::Window));
        page.dispatch(DomEvent::new("load", EventTarget::Window));
        page.dispatch(DomEvent::new("click", &page.create_element("a")));
        page.navigate("https://shop.test/next");
        page.dispatch(DomEvent::new("popstate", EventTarget::Window));

        let views = engine.get_page_views();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].field("type"), Some(&json!("page-load")));
        assert_eq!(views[1].field("type"), Some(&json!("page-change")));
        assert_eq!(engine.get_captured_events().len(), 3);
    }

    #[test]
    fn test_clear_captured_events_keeps_visitor_id() {
        let store = MemoryStore::new();
        let page = Page::builder().build().unwrap();
        let engine = AutoCapture::builder(config(&["click"]), page.clone())
            .registry(PluginRegistry::new())
            .persistence(Persistence::memory(store.clone(), 100))
            .build()
            .unwrap();
        engine.start();
        page.dispatch(DomEvent::new("click", &page.create_element("button")));

        engine.clear_captured_events().unwrap();
        assert!(engine.get_captured_events().is_empty());
        assert!(store.has(crate::storage::VISITOR_ID_KEY));
    }

    #[test]
    fn test_session_id_override() {
        let config = Config {
            session_id: Some("fixed".to_string()),
            ..config(&["click"])
        };
        let (engine, page) = engine(config, &PluginRegistry::new());
        engine.start();
        page.dispatch(DomEvent::new("click", &page.create_element("button")));
        assert_eq!(engine.session_id(), "fixed");
        assert_eq!(engine.get_captured_events()[0].session.id, "fixed");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            max_events: 0,
            ..Config::default()
        };
        let page = Page::builder().build().unwrap();
        let err = AutoCapture::builder(config, page)
            .registry(PluginRegistry::new())
            .build()
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_shared_persistence_by_default() {
        Persistence::reset_instance();
        let page = Page::builder().build().unwrap();
        let first = AutoCapture::builder(config(&["click"]), page.clone())
            .registry(PluginRegistry::new())
            .build()
            .unwrap();
        let second = AutoCapture::builder(config(&["click"]), page.clone())
            .registry(PluginRegistry::new())
            .build()
            .unwrap();
        assert_eq!(first.session_id(), second.session_id());

        let conflicting = Config {
            persistence: PersistenceKind::LocalStorage,
            ..config(&["click"])
        };
        assert!(AutoCapture::builder(conflicting, page)
            .registry(PluginRegistry::new())
            .build()
            .is_err());
        Persistence::reset_instance();
    }

    #[test]
    fn test_use_plugin_rejects_duplicates() {
        #[derive(Debug)]
        struct Unique;
        impl Plugin for Unique {
            fn key(&self) -> &str {
                "engine-test-unique"
            }
            fn bind(&self, _cx: &BindContext<'_>) -> Vec<BindDescriptor> {
                Vec::new()
            }
        }

        AutoCapture::use_plugin(Unique).unwrap();
        assert!(matches!(
            AutoCapture::use_plugin(Unique),
            Err(Error::DuplicatePlugin { .. })
        ));
        PluginRegistry::global().unregister("engine-test-unique");
    }

    #[test]
    fn test_drop_releases_listeners() {
        let (engine, page) = engine(config(&["click"]), &PluginRegistry::new());
        engine.start();
        assert_eq!(page.listener_count(), 1);
        drop(engine);
        assert_eq!(page.listener_count(), 0);
    }
}
