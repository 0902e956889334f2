//! Scroll direction and depth.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::json;

use super::{BindContext, BindDescriptor, Outcome, Plugin};
use crate::config::Config;
use crate::host::{scroll_percentage, DomEvent, EventTarget, ListenerOptions, Point};
use crate::payload::CapturedPayload;

/// Captures window scrolling.
///
/// Direction compares against the previous offset; an unchanged vertical
/// offset counts as `up`. `depth` tracks the deepest vertical percentage seen
/// since the plugin was started.
#[derive(Debug, Default)]
pub struct ScrollPlugin {
    options: Option<Rc<Config>>,
    last_offset: Rc<Cell<Point>>,
    max_depth: Rc<Cell<f64>>,
}

impl ScrollPlugin {
    /// Create the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for ScrollPlugin {
    fn key(&self) -> &str {
        "scroll"
    }

    fn bind(&self, cx: &BindContext<'_>) -> Vec<BindDescriptor> {
        let page = cx.page.clone();
        let last_offset = Rc::clone(&self.last_offset);
        let max_depth = Rc::clone(&self.max_depth);
        last_offset.set(page.scroll_offset());

        let handler = move |_event: &DomEvent, _payload: &CapturedPayload| {
            let offset = page.scroll_offset();
            let previous = last_offset.replace(offset);
            let direction = if offset.y > previous.y { "down" } else { "up" };

            let document = page.document_size();
            let viewport = page.viewport();
            let x = scroll_percentage(offset.x, document.width, viewport.width);
            let y = scroll_percentage(offset.y, document.height, viewport.height);
            let depth = max_depth.get().max(y);
            max_depth.set(depth);

            Outcome::fields(json!({
                "scroll": {
                    "direction": direction,
                    "x": x,
                    "y": y,
                    "offset": { "x": offset.x, "y": offset.y },
                    "depth": depth,
                }
            }))
        };

        vec![
            BindDescriptor::new("scroll", EventTarget::Window, "scroll", handler)
                .with_options(ListenerOptions::passive()),
        ]
    }

    fn on_init(&mut self, config: Rc<Config>) {
        self.options = Some(config);
    }

    fn on_start(&mut self) {
        self.max_depth.set(0.0);
    }

    fn options(&self) -> Option<Rc<Config>> {
        self.options.clone()
    }
}
