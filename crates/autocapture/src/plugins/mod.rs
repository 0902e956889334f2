//! Capture plugins.
//!
//! A plugin declares the listeners it needs as [`BindDescriptor`]s. The engine
//! wraps each descriptor's handler in its gating pipeline, so a handler only
//! decides whether an occurrence is worth keeping and what to add to it.
//!
//! ```
//! use autocapture::host::{DomEvent, EventTarget};
//! use autocapture::payload::CapturedPayload;
//! use autocapture::plugins::{BindContext, BindDescriptor, Outcome, Plugin};
//! use serde_json::json;
//!
//! #[derive(Debug)]
//! struct ResizePlugin;
//!
//! impl Plugin for ResizePlugin {
//!     fn key(&self) -> &str {
//!         "resize"
//!     }
//!
//!     fn bind(&self, cx: &BindContext<'_>) -> Vec<BindDescriptor> {
//!         let page = cx.page.clone();
//!         vec![BindDescriptor::new(
//!             "resize",
//!             EventTarget::Window,
//!             "resize",
//!             move |_e: &DomEvent, _p: &CapturedPayload| {
//!                 let size = page.viewport();
//!                 Outcome::fields(json!({ "viewport": size }))
//!             },
//!         )]
//!     }
//! }
//! ```

mod form;
mod mouse_movement;
mod page_view;
mod scroll;
mod swipe;
mod tap;
mod video;
mod visibility;

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::Result;
use crate::filter::ElementFilter;
use crate::host::{DomEvent, EventTarget, ListenerOptions, Page};
use crate::payload::CapturedPayload;
use crate::registry::PluginRegistry;

pub use form::FormPlugin;
pub use mouse_movement::{MouseMovementPlugin, DEFAULT_THROTTLE};
pub use page_view::{PageViewPlugin, PAGE_VIEW_EVENT};
pub use scroll::ScrollPlugin;
pub use swipe::{SwipePlugin, DEFAULT_MIN_DISTANCE};
pub use tap::TapPlugin;
pub use video::VideoPlugin;
pub use visibility::VisibilityPlugin;

/// Keys of the built-in plugins, in registration order.
pub const BUILTIN_KEYS: &[&str] = &[
    "tap",
    "form",
    "scroll",
    "swipe",
    "page-view",
    "page-visibility",
    "mouse-movement",
    "video",
];

/// What a handler decided about one occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Do not capture this occurrence.
    Suppressed,
    /// Capture it, merging these fields into the payload.
    Accepted(Map<String, Value>),
}

impl Outcome {
    /// Capture as-is.
    #[must_use]
    pub fn accept() -> Self {
        Self::Accepted(Map::new())
    }

    /// Capture with the fields of a JSON object. Non-objects add nothing.
    #[must_use]
    pub fn fields(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Accepted(map),
            _ => Self::accept(),
        }
    }

    /// Capture with one extra field.
    #[must_use]
    pub fn with(key: &str, value: impl Serialize) -> Self {
        let mut map = Map::new();
        if let Ok(value) = serde_json::to_value(value) {
            map.insert(key.to_string(), value);
        }
        Self::Accepted(map)
    }

    /// Whether the occurrence is suppressed.
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }
}

/// Descriptor handler: sees the event and the payload built so far.
pub type Handler = Rc<dyn Fn(&DomEvent, &CapturedPayload) -> Outcome>;

/// Descriptor precondition, checked before throttling.
pub type Condition = Rc<dyn Fn() -> bool>;

/// One listener a plugin wants bound.
#[derive(Clone)]
pub struct BindDescriptor {
    /// Event name written to the payload.
    pub name: String,
    /// Where to attach.
    pub target: EventTarget,
    /// Native event type.
    pub event: String,
    /// Occurrence handler.
    pub callback: Handler,
    /// Listener options.
    pub options: ListenerOptions,
    /// Minimum spacing between accepted occurrences.
    pub throttle: Option<Duration>,
    /// Only capture while this holds.
    pub condition: Option<Condition>,
}

impl BindDescriptor {
    /// Create a descriptor with default options.
    pub fn new(
        name: &str,
        target: EventTarget,
        event: &str,
        callback: impl Fn(&DomEvent, &CapturedPayload) -> Outcome + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            target,
            event: event.to_string(),
            callback: Rc::new(callback),
            options: ListenerOptions::default(),
            throttle: None,
            condition: None,
        }
    }

    /// Set listener options.
    #[must_use]
    pub fn with_options(mut self, options: ListenerOptions) -> Self {
        self.options = options;
        self
    }

    /// Throttle accepted occurrences.
    #[must_use]
    pub fn throttled(mut self, interval: Duration) -> Self {
        self.throttle = Some(interval);
        self
    }

    /// Gate on a condition.
    #[must_use]
    pub fn when(mut self, condition: impl Fn() -> bool + 'static) -> Self {
        self.condition = Some(Rc::new(condition));
        self
    }
}

impl fmt::Debug for BindDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindDescriptor")
            .field("name", &self.name)
            .field("target", &self.target.label())
            .field("event", &self.event)
            .field("options", &self.options)
            .field("throttle", &self.throttle)
            .field("condition", &self.condition.is_some())
            .finish_non_exhaustive()
    }
}

/// What a plugin sees when asked for its descriptors.
#[derive(Debug)]
pub struct BindContext<'a> {
    /// The plugin's options: its `on_init` snapshot, else the engine config.
    pub options: &'a Rc<Config>,
    /// The page being instrumented.
    pub page: &'a Page,
    /// The engine's allowlist and safelist predicate.
    pub filter: &'a Rc<ElementFilter>,
}

/// A capture strategy.
///
/// Only [`Plugin::key`] and [`Plugin::bind`] are required; hooks default to
/// no-ops and [`Plugin::on_before_capture`] to `true`.
pub trait Plugin: fmt::Debug {
    /// Unique key, matched against the capture list.
    fn key(&self) -> &str;

    /// Descriptors for the listeners to bind. Called on every start.
    fn bind(&self, cx: &BindContext<'_>) -> Vec<BindDescriptor>;

    /// Called when an engine is constructed.
    fn on_init(&mut self, _config: Rc<Config>) {}

    /// Called before the plugin's listeners are bound.
    fn on_start(&mut self) {}

    /// Called when the engine stops.
    fn on_stop(&mut self) {}

    /// Veto an occurrence before any payload is built.
    fn on_before_capture(&self, _event: &DomEvent) -> bool {
        true
    }

    /// Notified after a payload from this plugin was persisted.
    fn on_event_capture(&self, _payload: &CapturedPayload) {}

    /// The configuration received in `on_init`.
    fn options(&self) -> Option<Rc<Config>> {
        None
    }
}

/// Register every built-in plugin.
///
/// # Errors
///
/// Returns [`crate::Error::DuplicatePlugin`] if a built-in key is taken.
pub fn register_builtin(registry: &PluginRegistry) -> Result<()> {
    registry.register(TapPlugin::new())?;
    registry.register(FormPlugin::new())?;
    registry.register(ScrollPlugin::new())?;
    registry.register(SwipePlugin::new())?;
    registry.register(PageViewPlugin::new())?;
    registry.register(VisibilityPlugin::new())?;
    registry.register(MouseMovementPlugin::new())?;
    registry.register(VideoPlugin::new())?;
    Ok(())
}
