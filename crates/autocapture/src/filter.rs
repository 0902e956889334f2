//! The element allowlist and safelist predicate shared by every capture path.

use tracing::trace;

use crate::config::Config;
use crate::error::Result;
use crate::host::{DomEvent, SelectorList};

/// Native event types that count as user interactions.
pub const INTERACTION_EVENTS: &[&str] = &[
    "submit",
    "input",
    "change",
    "click",
    "mousedown",
    "mouseup",
    "dblclick",
    "contextmenu",
    "touchstart",
    "touchmove",
    "touchend",
];

/// True when the event targets an allowlisted tag and is an interaction.
#[must_use]
pub fn should_capture<S: AsRef<str>>(elements: &[S], event: &DomEvent) -> bool {
    let Some(target) = event.target_element() else {
        return false;
    };
    let tag = target.tag_name();
    elements
        .iter()
        .any(|e| e.as_ref().eq_ignore_ascii_case(&tag))
        && INTERACTION_EVENTS.contains(&event.event_type.as_str())
}

/// Allowlist plus compiled safelist.
#[derive(Debug, Clone)]
pub struct ElementFilter {
    elements: Vec<String>,
    safelist: SelectorList,
}

impl ElementFilter {
    /// Create a filter from tag names and an already compiled safelist.
    #[must_use]
    pub fn new(elements: Vec<String>, safelist: SelectorList) -> Self {
        Self { elements, safelist }
    }

    /// Create a filter from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a safelist selector is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.elements.clone(), config.safelist_selectors()?))
    }

    /// Whether the event should be captured.
    ///
    /// Safelisted targets are rejected even when they pass the allowlist.
    #[must_use]
    pub fn accepts(&self, event: &DomEvent) -> bool {
        if !should_capture(&self.elements, event) {
            trace!(event = %event.event_type, target = %event.target.label(), "Not in allowlist");
            return false;
        }
        match event.target_element() {
            Some(target) if self.safelist.matches(target) => {
                trace!(event = %event.event_type, "Target is safelisted");
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}
