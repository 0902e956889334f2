//! Tab visibility changes.

use std::rc::Rc;

use super::{BindContext, BindDescriptor, Outcome, Plugin};
use crate::config::Config;
use crate::host::{DomEvent, EventTarget};
use crate::payload::CapturedPayload;

/// Captures `visibilitychange` with the new `state`.
#[derive(Debug, Default)]
pub struct VisibilityPlugin {
    options: Option<Rc<Config>>,
}

impl VisibilityPlugin {
    /// Create the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for VisibilityPlugin {
    fn key(&self) -> &str {
        "page-visibility"
    }

    fn bind(&self, cx: &BindContext<'_>) -> Vec<BindDescriptor> {
        let page = cx.page.clone();
        vec![BindDescriptor::new(
            "page-visibility",
            EventTarget::Document,
            "visibilitychange",
            move |_event: &DomEvent, _payload: &CapturedPayload| {
                Outcome::with("state", page.visibility().as_str())
            },
        )]
    }

    fn on_init(&mut self, config: Rc<Config>) {
        self.options = Some(config);
    }

    fn options(&self) -> Option<Rc<Config>> {
        self.options.clone()
    }
}
