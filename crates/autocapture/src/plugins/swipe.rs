//! Single-finger swipes.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::json;

use super::{BindContext, BindDescriptor, Outcome, Plugin};
use crate::config::Config;
use crate::host::{DomEvent, EventTarget, ListenerOptions, Point};
use crate::payload::CapturedPayload;

/// Default minimum travel, in CSS pixels, for a touch to count as a swipe.
pub const DEFAULT_MIN_DISTANCE: f64 = 50.0;

#[derive(Debug, Clone, Copy)]
struct Start {
    at: Point,
    fingers: usize,
}

/// Captures swipes between a `touchstart` and the following `touchend`.
///
/// `speed` is `distance / 100`, a relative figure rather than a velocity.
#[derive(Debug)]
pub struct SwipePlugin {
    options: Option<Rc<Config>>,
    min_distance: f64,
    start: Rc<Cell<Option<Start>>>,
}

impl Default for SwipePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl SwipePlugin {
    /// Create the plugin with the default threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::with_min_distance(DEFAULT_MIN_DISTANCE)
    }

    /// Create the plugin with a custom threshold.
    #[must_use]
    pub fn with_min_distance(min_distance: f64) -> Self {
        Self {
            options: None,
            min_distance,
            start: Rc::new(Cell::new(None)),
        }
    }
}

fn direction(dx: f64, dy: f64) -> &'static str {
    if dx.abs() >= dy.abs() {
        if dx > 0.0 {
            "right"
        } else {
            "left"
        }
    } else if dy > 0.0 {
        "down"
    } else {
        "up"
    }
}

impl Plugin for SwipePlugin {
    fn key(&self) -> &str {
        "swipe"
    }

    fn bind(&self, _cx: &BindContext<'_>) -> Vec<BindDescriptor> {
        let start = Rc::clone(&self.start);
        let on_start = move |event: &DomEvent, _payload: &CapturedPayload| {
            let at = event.touches.first().map_or(event.page, |t| t.page);
            start.set(Some(Start {
                at,
                fingers: event.touches.len(),
            }));
            Outcome::Suppressed
        };

        let start = Rc::clone(&self.start);
        let min_distance = self.min_distance;
        let on_end = move |event: &DomEvent, _payload: &CapturedPayload| {
            let Some(begin) = start.take() else {
                return Outcome::Suppressed;
            };
            if begin.fingers != 1 {
                return Outcome::Suppressed;
            }
            let end = event.changed_touches.first().map_or(event.page, |t| t.page);
            let distance = begin.at.distance(end);
            if distance < min_distance {
                return Outcome::Suppressed;
            }
            Outcome::fields(json!({
                "swipe": {
                    "direction": direction(end.x - begin.at.x, end.y - begin.at.y),
                    "distance": distance,
                    "speed": distance / 100.0,
                }
            }))
        };

        vec![
            BindDescriptor::new("swipe", EventTarget::Window, "touchstart", on_start)
                .with_options(ListenerOptions::passive()),
            BindDescriptor::new("swipe", EventTarget::Window, "touchend", on_end)
                .with_options(ListenerOptions::passive()),
        ]
    }

    fn on_init(&mut self, config: Rc<Config>) {
        self.options = Some(config);
    }

    fn on_stop(&mut self) {
        self.start.set(None);
    }

    fn options(&self) -> Option<Rc<Config>> {
        self.options.clone()
    }
}
