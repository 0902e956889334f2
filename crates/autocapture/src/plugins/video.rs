//! Video playback.

use std::rc::Rc;

use serde_json::{json, Value};

use super::{BindContext, BindDescriptor, Outcome, Plugin};
use crate::config::Config;
use crate::host::{DomEvent, Element, EventTarget};
use crate::payload::CapturedPayload;

const MEDIA_EVENTS: &[&str] = &["load", "play", "pause", "ended"];

/// Captures playback state of every `<video>` present when the plugin binds.
///
/// Videos added later are picked up on the next start.
#[derive(Debug, Default)]
pub struct VideoPlugin {
    options: Option<Rc<Config>>,
}

impl VideoPlugin {
    /// Create the plugin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn snapshot(state: &str, video: &Element) -> Value {
    let media = video.media().unwrap_or_default();
    json!({
        "state": state,
        "current_time": media.current_time,
        "duration": media.duration,
        "paused": media.paused,
        "ended": media.ended,
        "muted": media.muted,
        "seeking": media.seeking,
        "volume": media.volume,
        "ready_state": media.ready_state,
        "src": media.src,
        "width": media.video_width,
        "height": media.video_height,
    })
}

impl Plugin for VideoPlugin {
    fn key(&self) -> &str {
        "video"
    }

    fn bind(&self, cx: &BindContext<'_>) -> Vec<BindDescriptor> {
        let mut descriptors = Vec::new();
        for video in cx.page.elements_by_tag("video") {
            for event in MEDIA_EVENTS {
                let element = video.clone();
                descriptors.push(BindDescriptor::new(
                    "video",
                    EventTarget::Element(video.clone()),
                    event,
                    move |event: &DomEvent, _payload: &CapturedPayload| {
                        Outcome::with("video", snapshot(&event.event_type, &element))
                    },
                ));
            }
        }
        descriptors
    }

    fn on_init(&mut self, config: Rc<Config>) {
        self.options = Some(config);
    }

    fn options(&self) -> Option<Rc<Config>> {
        self.options.clone()
    }
}
