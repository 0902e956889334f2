//! Element handles for the page model.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::selector::Selector;

/// A shared handle to an element node.
///
/// Cloning the handle is cheap and yields the same node; equality is identity.
#[derive(Clone)]
pub struct Element {
    node: Rc<Node>,
}

struct Node {
    tag: String,
    attributes: RefCell<Vec<(String, String)>>,
    text: RefCell<String>,
    value: RefCell<Option<String>>,
    parent: RefCell<Option<Element>>,
    media: RefCell<Option<MediaState>>,
}

/// Playback state of a media (video) element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaState {
    /// Current playback position in seconds.
    pub current_time: f64,
    /// Media duration in seconds, absent until metadata is loaded.
    pub duration: Option<f64>,
    /// Whether playback is paused.
    pub paused: bool,
    /// Whether playback reached the end.
    pub ended: bool,
    /// Whether the audio is muted.
    pub muted: bool,
    /// Whether a seek is in progress.
    pub seeking: bool,
    /// Volume between 0.0 and 1.0.
    pub volume: f64,
    /// HTML media ready state (0-4).
    pub ready_state: u8,
    /// Source URL.
    pub src: String,
    /// Intrinsic video width in pixels.
    pub video_width: u32,
    /// Intrinsic video height in pixels.
    pub video_height: u32,
}

impl Default for MediaState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: None,
            paused: true,
            ended: false,
            muted: false,
            seeking: false,
            volume: 1.0,
            ready_state: 0,
            src: String::new(),
            video_width: 0,
            video_height: 0,
        }
    }
}

/// Submission details of a `<form>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInfo {
    /// The `action` attribute.
    pub action: String,
    /// The submission method, lower-cased (`get` when absent).
    pub method: String,
    /// The form id.
    pub id: String,
    /// The form name.
    pub name: String,
}

impl Element {
    /// Create a detached element with the given tag name.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            node: Rc::new(Node {
                tag: tag.to_ascii_lowercase(),
                attributes: RefCell::new(Vec::new()),
                text: RefCell::new(String::new()),
                value: RefCell::new(None),
                parent: RefCell::new(None),
                media: RefCell::new(None),
            }),
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder-style direct text setter.
    #[must_use]
    pub fn with_text(self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    /// Builder-style value setter.
    #[must_use]
    pub fn with_value(self, value: &str) -> Self {
        self.set_value(value);
        self
    }

    /// Builder-style parent setter.
    #[must_use]
    pub fn with_parent(self, parent: &Element) -> Self {
        self.set_parent(Some(parent));
        self
    }

    /// Builder-style media state setter.
    #[must_use]
    pub fn with_media(self, media: MediaState) -> Self {
        self.set_media(media);
        self
    }

    /// Lower-case tag name.
    #[must_use]
    pub fn tag_name(&self) -> String {
        self.node.tag.clone()
    }

    /// Value of the named attribute, if present. Names are case-insensitive.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.node
            .attributes
            .borrow()
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// Set (or replace) an attribute, keeping its original position.
    pub fn set_attribute(&self, name: &str, value: &str) {
        let mut attributes = self.node.attributes.borrow_mut();
        if let Some(slot) = attributes
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            slot.1 = value.to_string();
        } else {
            attributes.push((name.to_ascii_lowercase(), value.to_string()));
        }
    }

    /// Remove an attribute.
    pub fn remove_attribute(&self, name: &str) {
        self.node
            .attributes
            .borrow_mut()
            .retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// All attributes in document order.
    #[must_use]
    pub fn attributes(&self) -> Vec<(String, String)> {
        self.node.attributes.borrow().clone()
    }

    /// The `id` attribute, or an empty string.
    #[must_use]
    pub fn id(&self) -> String {
        self.attribute("id").unwrap_or_default()
    }

    /// The `class` attribute, or an empty string.
    #[must_use]
    pub fn class_name(&self) -> String {
        self.attribute("class").unwrap_or_default()
    }

    /// Individual class names.
    #[must_use]
    pub fn class_list(&self) -> Vec<String> {
        self.class_name()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Text held directly by this element's text nodes (children excluded).
    #[must_use]
    pub fn direct_text(&self) -> String {
        self.node.text.borrow().clone()
    }

    /// Replace the direct text.
    pub fn set_text(&self, text: &str) {
        *self.node.text.borrow_mut() = text.to_string();
    }

    /// Current form-control value; falls back to the `value` attribute.
    #[must_use]
    pub fn value(&self) -> String {
        self.node
            .value
            .borrow()
            .clone()
            .or_else(|| self.attribute("value"))
            .unwrap_or_default()
    }

    /// Set the current form-control value.
    pub fn set_value(&self, value: &str) {
        *self.node.value.borrow_mut() = Some(value.to_string());
    }

    /// Parent element, if attached.
    #[must_use]
    pub fn parent(&self) -> Option<Element> {
        self.node.parent.borrow().clone()
    }

    /// Attach to (or detach from) a parent.
    pub fn set_parent(&self, parent: Option<&Element>) {
        *self.node.parent.borrow_mut() = parent.cloned();
    }

    /// Iterate ancestors from the parent upwards.
    pub fn ancestors(&self) -> impl Iterator<Item = Element> {
        std::iter::successors(self.parent(), Element::parent)
    }

    /// The form this element submits with: itself when it is a `<form>`,
    /// otherwise the nearest `<form>` ancestor.
    #[must_use]
    pub fn form(&self) -> Option<Element> {
        if self.node.tag == "form" {
            return Some(self.clone());
        }
        self.ancestors().find(|a| a.node.tag == "form")
    }

    /// Submission details when this element is a `<form>`.
    #[must_use]
    pub fn form_info(&self) -> Option<FormInfo> {
        if self.node.tag != "form" {
            return None;
        }
        Some(FormInfo {
            action: self.attribute("action").unwrap_or_default(),
            method: self
                .attribute("method")
                .map_or_else(|| "get".to_string(), |m| m.to_ascii_lowercase()),
            id: self.id(),
            name: self.attribute("name").unwrap_or_default(),
        })
    }

    /// Media state for video and audio elements.
    #[must_use]
    pub fn media(&self) -> Option<MediaState> {
        self.node.media.borrow().clone()
    }

    /// Replace the media state.
    pub fn set_media(&self, media: MediaState) {
        *self.node.media.borrow_mut() = Some(media);
    }

    /// Apply an in-place update to the media state, creating it if needed.
    pub fn update_media(&self, update: impl FnOnce(&mut MediaState)) {
        let mut media = self.node.media.borrow_mut();
        update(media.get_or_insert_with(MediaState::default));
    }

    /// Check the element against a selector.
    #[must_use]
    pub fn matches(&self, selector: &Selector) -> bool {
        selector.matches(self)
    }

    /// Identity comparison.
    #[must_use]
    pub fn ptr_eq(&self, other: &Element) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.node.tag)
            .field("attributes", &*self.node.attributes.borrow())
            .finish_non_exhaustive()
    }
}
