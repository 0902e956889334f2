//! Clicks on desktop, taps on touch screens.

use std::rc::Rc;

use serde_json::json;

use super::{BindContext, BindDescriptor, Outcome, Plugin};
use crate::config::Config;
use crate::filter::ElementFilter;
use crate::host::{DomEvent, EventTarget, ListenerOptions, Point};
use crate::payload::CapturedPayload;

const POINTER_EVENTS: &[&str] = &["click", "dblclick", "contextmenu"];

/// Captures pointer activations on allowlisted elements.
///
/// Mouse events are only captured on pages without touch support, so a tap
/// is never recorded twice through its synthesized click.
#[derive(Debug, Default)]
pub struct TapPlugin {
    options: Option<Rc<Config>>,
}

impl TapPlugin {
    /// Create the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn position(event: &DomEvent) -> Point {
    event
        .touches
        .first()
        .map_or(event.client, |touch| touch.client)
}

fn detail(
    filter: Rc<ElementFilter>,
    kind: Option<&'static str>,
) -> impl Fn(&DomEvent, &CapturedPayload) -> Outcome {
    move |event: &DomEvent, _payload: &CapturedPayload| {
        if !filter.accepts(event) {
            return Outcome::Suppressed;
        }
        let at = position(event);
        let kind = kind.unwrap_or(event.event_type.as_str());
        Outcome::fields(json!({
            "detail": { "type": kind, "x": at.x, "y": at.y }
        }))
    }
}

impl Plugin for TapPlugin {
    fn key(&self) -> &str {
        "tap"
    }

    fn bind(&self, cx: &BindContext<'_>) -> Vec<BindDescriptor> {
        let mut descriptors: Vec<BindDescriptor> = POINTER_EVENTS
            .iter()
            .map(|event| {
                let page = cx.page.clone();
                BindDescriptor::new(
                    "click",
                    EventTarget::Document,
                    event,
                    detail(Rc::clone(cx.filter), None),
                )
                .with_options(ListenerOptions::capture())
                .when(move || !page.is_touch_capable())
            })
            .collect();

        descriptors.push(
            BindDescriptor::new(
                "tap",
                EventTarget::Document,
                "touchstart",
                detail(Rc::clone(cx.filter), Some("tap")),
            )
            .with_options(ListenerOptions {
                capture: true,
                passive: true,
                once: false,
            }),
        );
        descriptors
    }

    fn on_init(&mut self, config: Rc<Config>) {
        self.options = Some(config);
    }

    fn options(&self) -> Option<Rc<Config>> {
        self.options.clone()
    }
}
