//! The page: window and document state, the listener table and dispatch.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::storage::{SqliteStorage, WebStorage};

use super::element::Element;
use super::event::{DomEvent, EventTarget, Point};
use super::selector::SelectorList;

/// Default user agent string for pages built without one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Upper bound of the page clock in milliseconds (about 300 years).
pub const MAX_PAGE_TIME: f64 = 1.0e13;

/// A callback attached to the listener table.
pub type Listener = Rc<dyn Fn(&DomEvent)>;

/// Width and height in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl Size {
    /// Create a size.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Options accepted by [`Page::add_event_listener`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerOptions {
    /// Invoke during the capture phase.
    pub capture: bool,
    /// Remove the listener after its first invocation.
    pub once: bool,
    /// The listener never cancels the event.
    pub passive: bool,
}

impl ListenerOptions {
    /// Options with only `once` set.
    #[must_use]
    pub const fn once() -> Self {
        Self {
            capture: false,
            once: true,
            passive: false,
        }
    }

    /// Options with only `passive` set.
    #[must_use]
    pub const fn passive() -> Self {
        Self {
            capture: false,
            once: false,
            passive: true,
        }
    }

    /// Options with only `capture` set.
    #[must_use]
    pub const fn capture() -> Self {
        Self {
            capture: true,
            once: false,
            passive: false,
        }
    }
}

/// Handle returned when a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Document visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// The page is in the foreground.
    #[default]
    Visible,
    /// The page is in the background.
    Hidden,
}

impl Visibility {
    /// Lower-case name as reported by `document.visibilityState`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Visible => "visible",
            Self::Hidden => "hidden",
        }
    }
}

/// Percentage of one scroll axis covered by `offset`.
///
/// An axis whose content fits inside the viewport has nothing left to
/// scroll and reports 100. Everything else is clamped into `[0, 100]`.
#[must_use]
pub fn scroll_percentage(offset: f64, content: f64, viewport: f64) -> f64 {
    let range = content - viewport;
    if range <= 0.0 {
        return 100.0;
    }
    (offset / range * 100.0).clamp(0.0, 100.0)
}

struct ListenerEntry {
    id: ListenerId,
    target: EventTarget,
    event_type: String,
    listener: Listener,
    options: ListenerOptions,
}

#[derive(Debug, Clone)]
struct PageState {
    url: String,
    referrer: String,
    title: String,
    user_agent: String,
    screen: Size,
    viewport: Size,
    document_size: Size,
    scroll: Point,
    touch_capable: bool,
    visibility: Visibility,
}

struct PageInner {
    state: RefCell<PageState>,
    listeners: RefCell<Vec<ListenerEntry>>,
    next_listener: Cell<u64>,
    elements: RefCell<Vec<Element>>,
    clock: Cell<f64>,
    time_origin: DateTime<Utc>,
    local_storage: Rc<dyn WebStorage>,
    session_storage: Rc<dyn WebStorage>,
}

/// Shared handle to a page.
///
/// All clones refer to the same window and document.
#[derive(Clone)]
pub struct Page {
    inner: Rc<PageInner>,
}

/// Builder for [`Page`].
pub struct PageBuilder {
    state: PageState,
    time_origin: Option<DateTime<Utc>>,
    local_storage: Option<Rc<dyn WebStorage>>,
    session_storage: Option<Rc<dyn WebStorage>>,
}

impl Default for PageBuilder {
    fn default() -> Self {
        Self {
            state: PageState {
                url: "about:blank".to_string(),
                referrer: String::new(),
                title: String::new(),
                user_agent: DEFAULT_USER_AGENT.to_string(),
                screen: Size::new(1920.0, 1080.0),
                viewport: Size::new(1280.0, 720.0),
                document_size: Size::new(1280.0, 720.0),
                scroll: Point::default(),
                touch_capable: false,
                visibility: Visibility::Visible,
            },
            time_origin: None,
            local_storage: None,
            session_storage: None,
        }
    }
}

impl PageBuilder {
    /// Set the location.
    #[must_use]
    pub fn url(mut self, url: &str) -> Self {
        self.state.url = url.to_string();
        self
    }

    /// Set the referrer.
    #[must_use]
    pub fn referrer(mut self, referrer: &str) -> Self {
        self.state.referrer = referrer.to_string();
        self
    }

    /// Set the document title.
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.state.title = title.to_string();
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.state.user_agent = user_agent.to_string();
        self
    }

    /// Set the screen size.
    #[must_use]
    pub fn screen(mut self, width: f64, height: f64) -> Self {
        self.state.screen = Size::new(width, height);
        self
    }

    /// Set the viewport size.
    #[must_use]
    pub fn viewport(mut self, width: f64, height: f64) -> Self {
        self.state.viewport = Size::new(width, height);
        self
    }

    /// Set the scrollable document size.
    #[must_use]
    pub fn document_size(mut self, width: f64, height: f64) -> Self {
        self.state.document_size = Size::new(width, height);
        self
    }

    /// Mark the device as touch capable.
    #[must_use]
    pub fn touch(mut self, touch_capable: bool) -> Self {
        self.state.touch_capable = touch_capable;
        self
    }

    /// Fix the wall-clock instant that page time zero corresponds to.
    #[must_use]
    pub fn time_origin(mut self, origin: DateTime<Utc>) -> Self {
        self.time_origin = Some(origin);
        self
    }

    /// Use the given `localStorage` backend.
    #[must_use]
    pub fn local_storage(mut self, storage: Rc<dyn WebStorage>) -> Self {
        self.local_storage = Some(storage);
        self
    }

    /// Use the given `sessionStorage` backend.
    #[must_use]
    pub fn session_storage(mut self, storage: Rc<dyn WebStorage>) -> Self {
        self.session_storage = Some(storage);
        self
    }

    /// Build the page. Storage backends not supplied are in-memory databases.
    ///
    /// # Errors
    ///
    /// Returns an error if an in-memory storage database cannot be created.
    pub fn build(self) -> Result<Page> {
        let local_storage = match self.local_storage {
            Some(storage) => storage,
            None => Rc::new(SqliteStorage::open_in_memory()?),
        };
        let session_storage = match self.session_storage {
            Some(storage) => storage,
            None => Rc::new(SqliteStorage::open_in_memory()?),
        };
        Ok(Page {
            inner: Rc::new(PageInner {
                state: RefCell::new(self.state),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(1),
                elements: RefCell::new(Vec::new()),
                clock: Cell::new(0.0),
                time_origin: self.time_origin.unwrap_or_else(Utc::now),
                local_storage,
                session_storage,
            }),
        })
    }
}

impl fmt::Debug for PageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageBuilder")
            .field("state", &self.state)
            .field("time_origin", &self.time_origin)
            .finish_non_exhaustive()
    }
}

impl Page {
    /// Start building a page.
    #[must_use]
    pub fn builder() -> PageBuilder {
        PageBuilder::default()
    }

    // === Listener table ===

    /// Attach a listener and return its handle.
    pub fn add_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: Listener,
        options: ListenerOptions,
    ) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.get());
        self.inner.next_listener.set(id.0 + 1);
        self.inner.listeners.borrow_mut().push(ListenerEntry {
            id,
            target,
            event_type: event_type.to_string(),
            listener,
            options,
        });
        id
    }

    /// Detach a listener. Unknown or already removed handles are ignored.
    pub fn remove_event_listener(&self, id: ListenerId) {
        self.inner.listeners.borrow_mut().retain(|e| e.id != id);
    }

    /// Whether the listener behind `id` is still attached.
    #[must_use]
    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.borrow().iter().any(|e| e.id == id)
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Deliver an event to every matching listener along its propagation path.
    ///
    /// The event is stamped with the page clock unless a timestamp was preset,
    /// in which case the clock advances to it. A preset earlier than the clock
    /// is raised to the clock, so stamps never decrease.
    pub fn dispatch(&self, mut event: DomEvent) {
        if let Some(stamp) = event.preset_time_stamp() {
            self.advance_to(stamp);
        }
        event.stamp(self.now());

        let path = propagation_path(&event.target);
        let snapshot: Vec<(ListenerId, EventTarget, Listener, ListenerOptions)> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .filter(|e| e.event_type == event.event_type)
            .map(|e| (e.id, e.target.clone(), Rc::clone(&e.listener), e.options))
            .collect();
        if snapshot.is_empty() {
            trace!(event = %event.event_type, "no listeners");
            return;
        }

        let Some((at_target, ancestors)) = path.split_last() else {
            return;
        };

        for node in ancestors {
            self.invoke(&snapshot, node, true, &event);
        }
        self.invoke(&snapshot, at_target, true, &event);
        self.invoke(&snapshot, at_target, false, &event);
        if event.bubbles() {
            for node in ancestors.iter().rev() {
                self.invoke(&snapshot, node, false, &event);
            }
        }
    }

    fn invoke(
        &self,
        snapshot: &[(ListenerId, EventTarget, Listener, ListenerOptions)],
        node: &EventTarget,
        capture: bool,
        event: &DomEvent,
    ) {
        for (id, target, listener, options) in snapshot {
            if target != node || options.capture != capture {
                continue;
            }
            // A handler earlier in this dispatch may have removed it.
            if !self.has_listener(*id) {
                continue;
            }
            if options.once {
                self.remove_event_listener(*id);
            }
            listener(event);
        }
    }

    // === Clock ===

    /// Current page time in milliseconds since the time origin.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.inner.clock.get()
    }

    /// Move the page clock forward.
    ///
    /// The clock stops at [`MAX_PAGE_TIME`].
    pub fn advance(&self, ms: f64) {
        if ms > 0.0 {
            self.advance_to(self.now() + ms);
        }
    }

    /// Move the page clock to `ms` unless it is already past it.
    pub fn advance_to(&self, ms: f64) {
        if ms > self.now() {
            self.inner.clock.set(ms.min(MAX_PAGE_TIME));
        }
    }

    /// Wall-clock instant of page time zero.
    #[must_use]
    pub fn time_origin(&self) -> DateTime<Utc> {
        self.inner.time_origin
    }

    /// Wall-clock instant of a page timestamp.
    ///
    /// Stamps outside `±MAX_PAGE_TIME`, and non-finite stamps, map to the
    /// nearest bound or to the time origin.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn timestamp_at(&self, time_stamp: f64) -> DateTime<Utc> {
        let origin = self.inner.time_origin;
        if !time_stamp.is_finite() {
            return origin;
        }
        let ms = time_stamp.clamp(-MAX_PAGE_TIME, MAX_PAGE_TIME);
        let offset = Duration::microseconds((ms * 1000.0).round() as i64);
        origin.checked_add_signed(offset).unwrap_or(origin)
    }

    // === Elements ===

    /// Create an element and add it to the document index.
    pub fn create_element(&self, tag: &str) -> Element {
        let el = Element::new(tag);
        self.inner.elements.borrow_mut().push(el.clone());
        el
    }

    /// Add an element built elsewhere to the document index.
    pub fn append(&self, el: &Element) {
        let mut elements = self.inner.elements.borrow_mut();
        if !elements.iter().any(|e| e.ptr_eq(el)) {
            elements.push(el.clone());
        }
    }

    /// Indexed elements with the given tag, in creation order.
    #[must_use]
    pub fn elements_by_tag(&self, tag: &str) -> Vec<Element> {
        self.inner
            .elements
            .borrow()
            .iter()
            .filter(|e| e.tag_name().eq_ignore_ascii_case(tag))
            .cloned()
            .collect()
    }

    /// Indexed elements matching any selector in the list.
    #[must_use]
    pub fn query_selector_all(&self, selectors: &SelectorList) -> Vec<Element> {
        self.inner
            .elements
            .borrow()
            .iter()
            .filter(|e| selectors.matches(e))
            .cloned()
            .collect()
    }

    // === Window and document state ===

    /// Current location.
    #[must_use]
    pub fn url(&self) -> String {
        self.inner.state.borrow().url.clone()
    }

    /// Document referrer.
    #[must_use]
    pub fn referrer(&self) -> String {
        self.inner.state.borrow().referrer.clone()
    }

    /// Document title.
    #[must_use]
    pub fn title(&self) -> String {
        self.inner.state.borrow().title.clone()
    }

    /// Set the document title.
    pub fn set_title(&self, title: &str) {
        self.inner.state.borrow_mut().title = title.to_string();
    }

    /// Navigator user agent.
    #[must_use]
    pub fn user_agent(&self) -> String {
        self.inner.state.borrow().user_agent.clone()
    }

    /// Screen size.
    #[must_use]
    pub fn screen(&self) -> Size {
        self.inner.state.borrow().screen
    }

    /// Viewport (inner window) size.
    #[must_use]
    pub fn viewport(&self) -> Size {
        self.inner.state.borrow().viewport
    }

    /// Resize the viewport.
    pub fn set_viewport(&self, width: f64, height: f64) {
        self.inner.state.borrow_mut().viewport = Size::new(width, height);
    }

    /// Scrollable document size.
    #[must_use]
    pub fn document_size(&self) -> Size {
        self.inner.state.borrow().document_size
    }

    /// Resize the document content.
    pub fn set_document_size(&self, width: f64, height: f64) {
        self.inner.state.borrow_mut().document_size = Size::new(width, height);
    }

    /// Current scroll offsets.
    #[must_use]
    pub fn scroll_offset(&self) -> Point {
        self.inner.state.borrow().scroll
    }

    /// Scroll to the given offsets, clamped to the scrollable range.
    pub fn scroll_to(&self, x: f64, y: f64) {
        let mut state = self.inner.state.borrow_mut();
        let max_x = (state.document_size.width - state.viewport.width).max(0.0);
        let max_y = (state.document_size.height - state.viewport.height).max(0.0);
        state.scroll = Point::new(x.clamp(0.0, max_x), y.clamp(0.0, max_y));
    }

    /// Vertical scroll position as a percentage of the scrollable range.
    #[must_use]
    pub fn scroll_depth(&self) -> f64 {
        let state = self.inner.state.borrow();
        scroll_percentage(
            state.scroll.y,
            state.document_size.height,
            state.viewport.height,
        )
    }

    /// Change the location; the previous location becomes the referrer.
    pub fn navigate(&self, url: &str) {
        let mut state = self.inner.state.borrow_mut();
        state.referrer = std::mem::replace(&mut state.url, url.to_string());
    }

    /// Whether the device reports touch support.
    #[must_use]
    pub fn is_touch_capable(&self) -> bool {
        self.inner.state.borrow().touch_capable
    }

    /// Current document visibility.
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.inner.state.borrow().visibility
    }

    /// Change the document visibility.
    pub fn set_visibility(&self, visibility: Visibility) {
        self.inner.state.borrow_mut().visibility = visibility;
    }

    /// The page's `localStorage`.
    #[must_use]
    pub fn local_storage(&self) -> Rc<dyn WebStorage> {
        Rc::clone(&self.inner.local_storage)
    }

    /// The page's `sessionStorage`.
    #[must_use]
    pub fn session_storage(&self) -> Rc<dyn WebStorage> {
        Rc::clone(&self.inner.session_storage)
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("state", &*self.inner.state.borrow())
            .field("clock", &self.inner.clock.get())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

/// Window first, target last.
fn propagation_path(target: &EventTarget) -> Vec<EventTarget> {
    let mut path = vec![EventTarget::Window];
    match target {
        EventTarget::Window => {}
        EventTarget::Document => path.push(EventTarget::Document),
        EventTarget::Element(el) => {
            path.push(EventTarget::Document);
            let mut ancestors: Vec<EventTarget> =
                el.ancestors().map(EventTarget::Element).collect();
            ancestors.reverse();
            path.extend(ancestors);
            path.push(target.clone());
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Page {
        Page::builder().build().unwrap()
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>, label: &str) -> Listener {
        let log = Rc::clone(log);
        let label = label.to_string();
        Rc::new(move |_e: &DomEvent| log.borrow_mut().push(label.clone()))
    }

    #[test]
    fn test_scroll_percentage() {
        assert!((scroll_percentage(500.0, 2000.0, 1000.0) - 50.0).abs() < f64::EPSILON);
        assert!((scroll_percentage(0.0, 800.0, 1000.0) - 100.0).abs() < f64::EPSILON);
        assert!((scroll_percentage(0.0, 1000.0, 1000.0) - 100.0).abs() < f64::EPSILON);
        assert!((scroll_percentage(5000.0, 2000.0, 1000.0) - 100.0).abs() < f64::EPSILON);
        assert!(scroll_percentage(-10.0, 2000.0, 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_propagation_order() {
        let page = page();
        let form = page.create_element("form");
        let button = page.create_element("button").with_parent(&form);
        let log = Rc::new(RefCell::new(Vec::new()));

        let none = ListenerOptions::default();
        let cap = ListenerOptions::capture();
        page.add_event_listener(EventTarget::Document, "click", recorder(&log, "doc-bubble"), none);
        page.add_event_listener(EventTarget::Window, "click", recorder(&log, "win-capture"), cap);
        page.add_event_listener((&button).into(), "click", recorder(&log, "target"), none);
        page.add_event_listener((&form).into(), "click", recorder(&log, "form-bubble"), none);
        page.add_event_listener(EventTarget::Document, "click", recorder(&log, "doc-capture"), cap);

        page.dispatch(DomEvent::new("click", &button));

        assert_eq!(
            *log.borrow(),
            vec!["win-capture", "doc-capture", "target", "form-bubble", "doc-bubble"]
        );
    }

    #[test]
    fn test_non_bubbling_event_stays_at_target() {
        let page = page();
        let video = page.create_element("video");
        let log = Rc::new(RefCell::new(Vec::new()));
        let none = ListenerOptions::default();
        page.add_event_listener(EventTarget::Document, "play", recorder(&log, "doc"), none);
        page.add_event_listener((&video).into(), "play", recorder(&log, "video"), none);

        page.dispatch(DomEvent::new("play", &video));
        assert_eq!(*log.borrow(), vec!["video"]);
    }

    #[test]
    fn test_once_listener_removed_after_first_call() {
        let page = page();
        let log = Rc::new(RefCell::new(Vec::new()));
        page.add_event_listener(
            EventTarget::Window,
            "load",
            recorder(&log, "load"),
            ListenerOptions::once(),
        );
        page.dispatch(DomEvent::new("load", EventTarget::Window));
        page.dispatch(DomEvent::new("load", EventTarget::Window));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(page.listener_count(), 0);
    }

    #[test]
    fn test_remove_unknown_listener_is_noop() {
        let page = page();
        let id = page.add_event_listener(
            EventTarget::Window,
            "scroll",
            Rc::new(|_e: &DomEvent| {}),
            ListenerOptions::default(),
        );
        page.remove_event_listener(id);
        page.remove_event_listener(id);
        assert!(!page.has_listener(id));
        assert_eq!(page.listener_count(), 0);
    }

    #[test]
    fn test_listener_removed_during_dispatch_is_skipped() {
        let page = page();
        let log = Rc::new(RefCell::new(Vec::new()));
        let second = Rc::new(Cell::new(None::<ListenerId>));

        let remover = {
            let page = page.clone();
            let second = Rc::clone(&second);
            Rc::new(move |_e: &DomEvent| {
                if let Some(id) = second.get() {
                    page.remove_event_listener(id);
                }
            })
        };
        page.add_event_listener(EventTarget::Window, "scroll", remover, ListenerOptions::default());
        let id = page.add_event_listener(
            EventTarget::Window,
            "scroll",
            recorder(&log, "second"),
            ListenerOptions::default(),
        );
        second.set(Some(id));

        page.dispatch(DomEvent::new("scroll", EventTarget::Window));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_dispatch_stamps_time() {
        let page = page();
        let seen = Rc::new(Cell::new(0.0));
        let sink = Rc::clone(&seen);
        page.add_event_listener(
            EventTarget::Window,
            "mousemove",
            Rc::new(move |e: &DomEvent| sink.set(e.time_stamp())),
            ListenerOptions::default(),
        );

        page.advance(25.0);
        page.dispatch(DomEvent::new("mousemove", EventTarget::Window));
        assert!((seen.get() - 25.0).abs() < f64::EPSILON);

        page.dispatch(DomEvent::new("mousemove", EventTarget::Window).at(150.0));
        assert!((seen.get() - 150.0).abs() < f64::EPSILON);
        assert!((page.now() - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clock_never_goes_back() {
        let page = page();
        page.advance(100.0);
        page.advance_to(50.0);
        page.advance(-20.0);
        assert!((page.now() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_earlier_preset_stamp_is_raised_to_clock() {
        let page = page();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        page.add_event_listener(
            EventTarget::Window,
            "mousemove",
            Rc::new(move |e: &DomEvent| sink.borrow_mut().push(e.time_stamp())),
            ListenerOptions::default(),
        );

        page.dispatch(DomEvent::new("mousemove", EventTarget::Window).at(1000.0));
        page.dispatch(DomEvent::new("mousemove", EventTarget::Window).at(500.0));
        page.dispatch(DomEvent::new("mousemove", EventTarget::Window));
        assert_eq!(*seen.borrow(), vec![1000.0, 1000.0, 1000.0]);
    }

    #[test]
    fn test_clock_stops_at_max_page_time() {
        let page = page();
        page.dispatch(DomEvent::new("click", EventTarget::Document).at(1e18));
        assert!((page.now() - MAX_PAGE_TIME).abs() < f64::EPSILON);
        page.advance(1e18);
        assert!((page.now() - MAX_PAGE_TIME).abs() < f64::EPSILON);
    }

    #[test]
    fn test_timestamp_at_out_of_range() {
        let page = page();
        let origin = page.time_origin();
        assert_eq!(page.timestamp_at(f64::NAN), origin);
        assert_eq!(page.timestamp_at(f64::INFINITY), origin);
        assert_eq!(page.timestamp_at(1e18), page.timestamp_at(MAX_PAGE_TIME));
        assert!(page.timestamp_at(1e18) > origin);
    }

    #[test]
    fn test_timestamp_at_offsets_origin() {
        let origin = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let page = Page::builder().time_origin(origin).build().unwrap();
        let at = page.timestamp_at(1500.0);
        assert_eq!(at.to_rfc3339(), "2024-01-01T00:00:01.500+00:00");
    }

    #[test]
    fn test_scroll_to_clamps_and_depth() {
        let page = Page::builder()
            .viewport(1000.0, 1000.0)
            .document_size(1000.0, 3000.0)
            .build()
            .unwrap();
        page.scroll_to(0.0, 1000.0);
        assert!((page.scroll_depth() - 50.0).abs() < f64::EPSILON);
        page.scroll_to(50.0, 9000.0);
        assert_eq!(page.scroll_offset(), Point::new(0.0, 2000.0));
    }

    #[test]
    fn test_navigate_sets_referrer() {
        let page = Page::builder().url("https://a.test/").build().unwrap();
        page.navigate("https://a.test/next");
        assert_eq!(page.url(), "https://a.test/next");
        assert_eq!(page.referrer(), "https://a.test/");
    }

    #[test]
    fn test_elements_by_tag() {
        let page = page();
        let v1 = page.create_element("video");
        page.create_element("div");
        let v2 = Element::new("VIDEO");
        page.append(&v2);
        page.append(&v2);
        assert_eq!(page.elements_by_tag("video"), vec![v1, v2]);

        let selectors = SelectorList::parse("div").unwrap();
        assert_eq!(page.query_selector_all(&selectors).len(), 1);
    }
}
