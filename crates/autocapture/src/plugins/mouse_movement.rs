//! Pointer movement, throttled.

use std::rc::Rc;
use std::time::Duration;

use serde_json::json;

use super::{BindContext, BindDescriptor, Outcome, Plugin};
use crate::config::Config;
use crate::host::{DomEvent, EventTarget, ListenerOptions};
use crate::payload::CapturedPayload;

/// Default spacing between captured moves.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(100);

/// Captures `mousemove` viewport coordinates.
#[derive(Debug)]
pub struct MouseMovementPlugin {
    options: Option<Rc<Config>>,
    throttle: Duration,
}

impl Default for MouseMovementPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl MouseMovementPlugin {
    /// Create the plugin with the default throttle.
    #[must_use]
    pub fn new() -> Self {
        Self::with_throttle(DEFAULT_THROTTLE)
    }

    /// Create the plugin with a custom throttle.
    #[must_use]
    pub fn with_throttle(throttle: Duration) -> Self {
        Self {
            options: None,
            throttle,
        }
    }
}

impl Plugin for MouseMovementPlugin {
    fn key(&self) -> &str {
        "mouse-movement"
    }

    fn bind(&self, _cx: &BindContext<'_>) -> Vec<BindDescriptor> {
        vec![BindDescriptor::new(
            "mouse-movement",
            EventTarget::Window,
            "mousemove",
            |event: &DomEvent, _payload: &CapturedPayload| {
                Outcome::with("coordinates", json!({ "x": event.client.x, "y": event.client.y }))
            },
        )
        .with_options(ListenerOptions::passive())
        .throttled(self.throttle)]
    }

    fn on_init(&mut self, config: Rc<Config>) {
        self.options = Some(config);
    }

    fn options(&self) -> Option<Rc<Config>> {
        self.options.clone()
    }
}
