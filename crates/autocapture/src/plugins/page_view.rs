//! Page loads, leaves and history navigations.

use std::rc::Rc;

use serde_json::json;

use super::{BindContext, BindDescriptor, Outcome, Plugin};
use crate::config::Config;
use crate::host::{DomEvent, EventTarget, ListenerOptions, Page};
use crate::payload::CapturedPayload;

/// Event name of every payload this plugin emits.
pub const PAGE_VIEW_EVENT: &str = "page-view";

/// Captures page views as `page-load`, `page-leave` and `page-change`.
#[derive(Debug, Default)]
pub struct PageViewPlugin {
    options: Option<Rc<Config>>,
}

impl PageViewPlugin {
    /// Create the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn view(page: &Page, kind: &'static str) -> impl Fn(&DomEvent, &CapturedPayload) -> Outcome {
    let page = page.clone();
    move |_event: &DomEvent, _payload: &CapturedPayload| {
        Outcome::fields(json!({
            "type": kind,
            "page": {
                "url": page.url(),
                "referrer": page.referrer(),
                "title": page.title(),
            }
        }))
    }
}

impl Plugin for PageViewPlugin {
    fn key(&self) -> &str {
        "page-view"
    }

    fn bind(&self, cx: &BindContext<'_>) -> Vec<BindDescriptor> {
        vec![
            BindDescriptor::new(
                PAGE_VIEW_EVENT,
                EventTarget::Window,
                "load",
                view(cx.page, "page-load"),
            )
            .with_options(ListenerOptions::once()),
            BindDescriptor::new(
                PAGE_VIEW_EVENT,
                EventTarget::Window,
                "beforeunload",
                view(cx.page, "page-leave"),
            ),
            BindDescriptor::new(
                PAGE_VIEW_EVENT,
                EventTarget::Window,
                "popstate",
                view(cx.page, "page-change"),
            ),
        ]
    }

    fn on_init(&mut self, config: Rc<Config>) {
        self.options = Some(config);
    }

    fn options(&self) -> Option<Rc<Config>> {
        self.options.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::{accepted, find, run, Harness};

    fn harness() -> Harness {
        let page = Page::builder()
            .url("https://shop.test/")
            .referrer("https://search.test/")
            .title("Home")
            .build()
            .unwrap();
        Harness::new(page, Config::default())
    }

    #[test]
    fn test_load_is_bound_once() {
        let descriptors = harness().descriptors(&PageViewPlugin::new());
        assert!(find(&descriptors, "load").options.once);
        assert!(!find(&descriptors, "popstate").options.once);
        assert!(descriptors.iter().all(|d| d.name == PAGE_VIEW_EVENT));
    }

    #[test]
    fn test_page_load_fields() {
        let h = harness();
        let descriptors = h.descriptors(&PageViewPlugin::new());
        let load = DomEvent::new("load", EventTarget::Window);
        let fields = accepted(run(find(&descriptors, "load"), &load));
        assert_eq!(fields["type"], "page-load");
        assert_eq!(
            fields["page"],
            json!({
                "url": "https://shop.test/",
                "referrer": "https://search.test/",
                "title": "Home"
            })
        );
    }

    #[test]
    fn test_page_change_reads_current_location() {
        let h = harness();
        let descriptors = h.descriptors(&PageViewPlugin::new());
        h.page.navigate("https://shop.test/cart");
        let event = DomEvent::new("popstate", EventTarget::Window);
        let fields = accepted(run(find(&descriptors, "popstate"), &event));
        assert_eq!(fields["type"], "page-change");
        assert_eq!(fields["page"]["url"], "https://shop.test/cart");
        assert_eq!(fields["page"]["referrer"], "https://shop.test/");
    }

    #[test]
    fn test_page_leave() {
        let h = harness();
        let descriptors = h.descriptors(&PageViewPlugin::new());
        let event = DomEvent::new("beforeunload", EventTarget::Window);
        assert_eq!(accepted(run(find(&descriptors, "beforeunload"), &event))["type"], "page-leave");
    }
}
