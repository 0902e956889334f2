//! Native events delivered by the page.

use serde::{Deserialize, Serialize};

use super::element::Element;

/// Where a listener is attached or an event is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTarget {
    /// The window object.
    Window,
    /// The document object.
    Document,
    /// A specific element.
    Element(Element),
}

impl EventTarget {
    /// The element behind this target, if any.
    #[must_use]
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(el) => Some(el),
            Self::Window | Self::Document => None,
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Window => "window".to_string(),
            Self::Document => "document".to_string(),
            Self::Element(el) => el.tag_name(),
        }
    }
}

impl From<Element> for EventTarget {
    fn from(el: Element) -> Self {
        Self::Element(el)
    }
}

impl From<&Element> for EventTarget {
    fn from(el: &Element) -> Self {
        Self::Element(el.clone())
    }
}

/// A 2D coordinate in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// One contact point of a touch event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Touch {
    /// Stable identifier for the contact.
    pub identifier: u32,
    /// Viewport-relative position.
    pub client: Point,
    /// Document-relative position.
    pub page: Point,
}

impl Touch {
    /// A touch at the given viewport position; page position mirrors it.
    #[must_use]
    pub const fn at(identifier: u32, x: f64, y: f64) -> Self {
        Self {
            identifier,
            client: Point::new(x, y),
            page: Point::new(x, y),
        }
    }
}

// Events that do not take part in the bubbling phase.
const NON_BUBBLING: &[&str] = &[
    "load",
    "unload",
    "beforeunload",
    "popstate",
    "scroll",
    "focus",
    "blur",
    "mouseenter",
    "mouseleave",
    "play",
    "pause",
    "ended",
    "loadeddata",
    "loadedmetadata",
    "timeupdate",
];

/// A native event as seen by listeners.
#[derive(Debug, Clone)]
pub struct DomEvent {
    /// The event type, e.g. `click`.
    pub event_type: String,
    /// The dispatch target.
    pub target: EventTarget,
    /// Viewport-relative pointer position.
    pub client: Point,
    /// Document-relative pointer position.
    pub page: Point,
    /// Contacts currently on the surface.
    pub touches: Vec<Touch>,
    /// Contacts that changed with this event.
    pub changed_touches: Vec<Touch>,
    /// Wheel delta on the vertical axis.
    pub delta_y: f64,
    time_stamp: Option<f64>,
}

impl DomEvent {
    /// Create an event with zeroed coordinates.
    #[must_use]
    pub fn new(event_type: &str, target: impl Into<EventTarget>) -> Self {
        Self {
            event_type: event_type.to_string(),
            target: target.into(),
            client: Point::default(),
            page: Point::default(),
            touches: Vec::new(),
            changed_touches: Vec::new(),
            delta_y: 0.0,
            time_stamp: None,
        }
    }

    /// Set the pointer position; page coordinates mirror client ones.
    #[must_use]
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.client = Point::new(x, y);
        self.page = Point::new(x, y);
        self
    }

    /// Set the document-relative position separately.
    #[must_use]
    pub fn with_page_position(mut self, x: f64, y: f64) -> Self {
        self.page = Point::new(x, y);
        self
    }

    /// Set the active touches.
    #[must_use]
    pub fn with_touches(mut self, touches: Vec<Touch>) -> Self {
        self.touches = touches;
        self
    }

    /// Set the changed touches.
    #[must_use]
    pub fn with_changed_touches(mut self, touches: Vec<Touch>) -> Self {
        self.changed_touches = touches;
        self
    }

    /// Set the wheel delta.
    #[must_use]
    pub fn with_delta_y(mut self, delta_y: f64) -> Self {
        self.delta_y = delta_y;
        self
    }

    /// Preset the timestamp instead of letting the page stamp it.
    #[must_use]
    pub fn at(mut self, time_stamp: f64) -> Self {
        self.time_stamp = Some(time_stamp);
        self
    }

    /// Milliseconds since the page's time origin; zero before dispatch.
    #[must_use]
    pub fn time_stamp(&self) -> f64 {
        self.time_stamp.unwrap_or(0.0)
    }

    pub(crate) fn preset_time_stamp(&self) -> Option<f64> {
        self.time_stamp
    }

    pub(crate) fn stamp(&mut self, time_stamp: f64) {
        self.time_stamp = Some(time_stamp);
    }

    /// The target element, if the event was dispatched on one.
    #[must_use]
    pub fn target_element(&self) -> Option<&Element> {
        self.target.as_element()
    }

    /// Whether the event takes part in the bubbling phase.
    #[must_use]
    pub fn bubbles(&self) -> bool {
        !NON_BUBBLING.contains(&self.event_type.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bubbles() {
        let button = Element::new("button");
        assert!(DomEvent::new("click", &button).bubbles());
        assert!(!DomEvent::new("load", EventTarget::Window).bubbles());
        assert!(!DomEvent::new("play", &button).bubbles());
    }

    #[test]
    fn test_time_stamp_defaults_to_zero() {
        let event = DomEvent::new("scroll", EventTarget::Window);
        assert!(event.time_stamp().abs() < f64::EPSILON);
        assert!(event.preset_time_stamp().is_none());
        let event = event.at(42.0);
        assert!((event.time_stamp() - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_position_builders() {
        let event = DomEvent::new("mousemove", EventTarget::Window)
            .with_position(10.0, 20.0)
            .with_page_position(10.0, 520.0);
        assert_eq!(event.client, Point::new(10.0, 20.0));
        assert_eq!(event.page, Point::new(10.0, 520.0));
    }

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(30.0, 40.0);
        assert!((a.distance(b) - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_target_element() {
        let input = Element::new("input");
        let event = DomEvent::new("input", &input);
        assert_eq!(event.target_element(), Some(&input));
        assert_eq!(event.target.label(), "input");
        assert!(DomEvent::new("load", EventTarget::Window)
            .target_element()
            .is_none());
    }
}
