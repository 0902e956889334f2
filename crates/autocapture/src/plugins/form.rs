//! Form submissions and field edits.

use std::rc::Rc;

use serde_json::{json, Map, Value};

use super::{BindContext, BindDescriptor, Outcome, Plugin};
use crate::config::Config;
use crate::host::{DomEvent, EventTarget, ListenerOptions};
use crate::payload::CapturedPayload;

/// `reset` is bound but never passes the shared interaction predicate, so it
/// is observed without being recorded.
const FORM_EVENTS: &[&str] = &["submit", "reset", "input", "change"];

/// Captures form activity on allowlisted elements, with the owning form's
/// action, method, id and name.
#[derive(Debug, Default)]
pub struct FormPlugin {
    options: Option<Rc<Config>>,
}

impl FormPlugin {
    /// Create the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn form_fields(event: &DomEvent) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("type".to_string(), json!(event.event_type));
    let info = event
        .target_element()
        .and_then(|el| el.form())
        .and_then(|form| form.form_info());
    if let Some(info) = info {
        fields.insert("action".to_string(), json!(info.action));
        fields.insert("method".to_string(), json!(info.method));
        fields.insert("id".to_string(), json!(info.id));
        fields.insert("name".to_string(), json!(info.name));
    }
    fields
}

impl Plugin for FormPlugin {
    fn key(&self) -> &str {
        "form"
    }

    fn bind(&self, cx: &BindContext<'_>) -> Vec<BindDescriptor> {
        FORM_EVENTS
            .iter()
            .map(|event| {
                let filter = Rc::clone(cx.filter);
                BindDescriptor::new(
                    "form",
                    EventTarget::Document,
                    event,
                    move |event: &DomEvent, _payload: &CapturedPayload| {
                        if filter.accepts(event) {
                            Outcome::Accepted(form_fields(event))
                        } else {
                            Outcome::Suppressed
                        }
                    },
                )
                .with_options(ListenerOptions::capture())
            })
            .collect()
    }

    fn on_init(&mut self, config: Rc<Config>) {
        self.options = Some(config);
    }

    fn options(&self) -> Option<Rc<Config>> {
        self.options.clone()
    }
}
