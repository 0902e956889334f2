//! JSON session scripts for replaying interactions against a page.
//!
//! A script describes the page, the elements on it and a timeline of events:
//!
//! ```json
//! {
//!   "page": {
//!     "url": "https://shop.test/",
//!     "title": "Shop",
//!     "document": { "width": 1280, "height": 3000 }
//!   },
//!   "elements": [
//!     { "ref": "signup", "tag": "form", "attributes": { "action": "/signup" } },
//!     { "ref": "email", "tag": "input", "parent": "signup", "attributes": { "type": "email" } }
//!   ],
//!   "events": [
//!     { "at": 0, "type": "load", "target": "window" },
//!     { "at": 120, "type": "input", "target": "email", "value": "a@b.test" },
//!     { "at": 400, "type": "scroll", "target": "window", "scroll": { "x": 0, "y": 900 } }
//!   ]
//! }
//! ```
//!
//! Targets are `window`, `document` or an element `ref`. State changes such
//! as `scroll`, `navigate`, `visibility`, `value` and `media` are applied to
//! the page right before the event is dispatched.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::host::{
    DomEvent, Element, EventTarget, MediaState, Page, PageBuilder, Point, Size, Touch, Visibility,
    MAX_PAGE_TIME,
};

/// Page settings of a script.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageSpec {
    /// Initial location.
    pub url: Option<String>,
    /// Initial referrer.
    pub referrer: Option<String>,
    /// Document title.
    pub title: Option<String>,
    /// User agent.
    #[serde(alias = "userAgent")]
    pub user_agent: Option<String>,
    /// Screen size.
    pub screen: Option<Size>,
    /// Viewport size.
    pub viewport: Option<Size>,
    /// Scrollable document size.
    pub document: Option<Size>,
    /// Touch support.
    pub touch: bool,
}

/// One element to create.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    /// Name used by events and children to refer to this element.
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    /// Tag name.
    pub tag: String,
    /// Attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Direct text content.
    #[serde(default)]
    pub text: Option<String>,
    /// Current value of a form control.
    #[serde(default)]
    pub value: Option<String>,
    /// `ref` of an element defined earlier.
    #[serde(default)]
    pub parent: Option<String>,
    /// Media state for `<video>` elements.
    #[serde(default)]
    pub media: Option<MediaState>,
}

/// One timed event.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEvent {
    /// Milliseconds since the time origin.
    #[serde(default)]
    pub at: f64,
    /// Native event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// `window`, `document` or an element `ref`.
    #[serde(default = "default_target")]
    pub target: String,
    /// Viewport-relative pointer position.
    #[serde(default)]
    pub position: Option<Point>,
    /// Document-relative pointer position. Defaults to `position`.
    #[serde(default, alias = "pagePosition")]
    pub page_position: Option<Point>,
    /// Active touches.
    #[serde(default)]
    pub touches: Vec<Point>,
    /// Touches that changed with this event.
    #[serde(default, alias = "changedTouches")]
    pub changed_touches: Vec<Point>,
    /// Wheel delta.
    #[serde(default, alias = "deltaY")]
    pub delta_y: f64,
    /// Scroll the window to this offset first.
    #[serde(default)]
    pub scroll: Option<Point>,
    /// Navigate to this URL first.
    #[serde(default)]
    pub navigate: Option<String>,
    /// Change document visibility first.
    #[serde(default)]
    pub visibility: Option<Visibility>,
    /// Set the target's value first.
    #[serde(default)]
    pub value: Option<String>,
    /// Replace the target's media state first.
    #[serde(default)]
    pub media: Option<MediaState>,
}

fn default_target() -> String {
    "document".to_string()
}

/// A parsed session script.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionScript {
    /// Page settings.
    pub page: PageSpec,
    /// Elements, parents first.
    pub elements: Vec<ElementSpec>,
    /// Timeline.
    pub events: Vec<ScriptEvent>,
}

impl SessionScript {
    /// Parse a script from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid script.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a script file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// A page builder carrying the script's page settings.
    #[must_use]
    pub fn page_builder(&self) -> PageBuilder {
        let spec = &self.page;
        let mut builder = Page::builder().touch(spec.touch);
        if let Some(url) = &spec.url {
            builder = builder.url(url);
        }
        if let Some(referrer) = &spec.referrer {
            builder = builder.referrer(referrer);
        }
        if let Some(title) = &spec.title {
            builder = builder.title(title);
        }
        if let Some(user_agent) = &spec.user_agent {
            builder = builder.user_agent(user_agent);
        }
        if let Some(size) = spec.screen {
            builder = builder.screen(size.width, size.height);
        }
        if let Some(size) = spec.viewport {
            builder = builder.viewport(size.width, size.height);
        }
        if let Some(size) = spec.document {
            builder = builder.document_size(size.width, size.height);
        }
        builder
    }
}

fn touches(points: &[Point]) -> Vec<Touch> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| Touch::at(u32::try_from(i).unwrap_or(u32::MAX), p.x, p.y))
        .collect()
}

/// Feeds a script's timeline into a page, one event at a time.
pub struct ScriptRunner {
    page: Page,
    refs: HashMap<String, Element>,
    events: VecDeque<ScriptEvent>,
}

impl ScriptRunner {
    /// Create the script's elements on `page` and queue its events by time.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a parent or event target names an
    /// unknown `ref`, or if a `ref` is defined twice.
    pub fn new(script: SessionScript, page: Page) -> Result<Self> {
        let mut refs: HashMap<String, Element> = HashMap::new();
        for spec in script.elements {
            let element = page.create_element(&spec.tag);
            for (name, value) in &spec.attributes {
                element.set_attribute(name, value);
            }
            if let Some(text) = &spec.text {
                element.set_text(text);
            }
            if let Some(value) = &spec.value {
                element.set_value(value);
            }
            if let Some(media) = spec.media {
                element.set_media(media);
            }
            if let Some(parent) = &spec.parent {
                let parent = refs.get(parent).ok_or_else(|| {
                    Error::validation(format!("unknown parent reference '{parent}'"))
                })?;
                element.set_parent(Some(parent));
            }
            if let Some(reference) = spec.reference {
                if refs.insert(reference.clone(), element).is_some() {
                    return Err(Error::validation(format!(
                        "element reference '{reference}' is defined twice"
                    )));
                }
            }
        }

        let mut events = script.events;
        for event in &events {
            if !(0.0..=MAX_PAGE_TIME).contains(&event.at) {
                return Err(Error::validation(format!(
                    "event '{}' has time {} outside 0..={MAX_PAGE_TIME} ms",
                    event.event_type, event.at
                )));
            }
            if !matches!(event.target.as_str(), "window" | "document")
                && !refs.contains_key(&event.target)
            {
                return Err(Error::validation(format!(
                    "event '{}' targets unknown reference '{}'",
                    event.event_type, event.target
                )));
            }
        }
        events.sort_by(|a, b| a.at.total_cmp(&b.at));
        debug!(elements = refs.len(), events = events.len(), "Loaded session script");

        Ok(Self {
            page,
            refs,
            events: events.into(),
        })
    }

    /// The page events are dispatched to.
    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Look up an element by `ref`.
    #[must_use]
    pub fn element(&self, reference: &str) -> Option<&Element> {
        self.refs.get(reference)
    }

    /// Events not yet dispatched.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len()
    }

    /// Time of the next event.
    #[must_use]
    pub fn next_at(&self) -> Option<f64> {
        self.events.front().map(|e| e.at)
    }

    /// Apply and dispatch the next event, returning its type.
    pub fn dispatch_next(&mut self) -> Option<String> {
        let event = self.events.pop_front()?;
        let target = self.target(&event.target);

        if let Some(offset) = event.scroll {
            self.page.scroll_to(offset.x, offset.y);
        }
        if let Some(url) = &event.navigate {
            self.page.navigate(url);
        }
        if let Some(visibility) = event.visibility {
            self.page.set_visibility(visibility);
        }
        if let EventTarget::Element(element) = &target {
            if let Some(value) = &event.value {
                element.set_value(value);
            }
            if let Some(media) = event.media.clone() {
                element.set_media(media);
            }
        }

        let position = event.position.unwrap_or_default();
        let page_position = event.page_position.unwrap_or(position);
        let dom = DomEvent::new(&event.event_type, target)
            .with_position(position.x, position.y)
            .with_page_position(page_position.x, page_position.y)
            .with_touches(touches(&event.touches))
            .with_changed_touches(touches(&event.changed_touches))
            .with_delta_y(event.delta_y)
            .at(event.at);
        trace!(event = %event.event_type, at = event.at, "Dispatching scripted event");
        self.page.dispatch(dom);
        Some(event.event_type)
    }

    /// Dispatch everything left, returning how many events ran.
    pub fn run_all(&mut self) -> usize {
        let mut count = 0;
        while self.dispatch_next().is_some() {
            count += 1;
        }
        count
    }

    fn target(&self, name: &str) -> EventTarget {
        match name {
            "window" => EventTarget::Window,
            "document" => EventTarget::Document,
            reference => self
                .refs
                .get(reference)
                .map_or(EventTarget::Document, |el| EventTarget::Element(el.clone())),
        }
    }
}

impl fmt::Debug for ScriptRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptRunner")
            .field("page", &self.page)
            .field("refs", &self.refs.len())
            .field("remaining", &self.events.len())
            .finish()
    }
}
