//! In-process page model.
//!
//! Listeners, elements and storage objects live here. Everything is
//! single-threaded: handles are `Rc` based and events are delivered one at a
//! time by [`Page::dispatch`].

pub mod element;
pub mod event;
pub mod page;
pub mod selector;

pub use element::{Element, FormInfo, MediaState};
pub use event::{DomEvent, EventTarget, Point, Touch};
pub use page::{
    scroll_percentage, Listener, ListenerId, ListenerOptions, Page, PageBuilder, Size, Visibility,
    MAX_PAGE_TIME,
};
pub use selector::{Selector, SelectorList};
