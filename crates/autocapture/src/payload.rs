//! Canonical payloads built from native events.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::host::{DomEvent, Element, Page, Size};
use crate::privacy::{mask, TextScrubber};

/// Visitor session reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Visitor or custom session id.
    pub id: String,
}

/// The element an event was dispatched on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetInfo {
    /// Lower-case tag name.
    pub selector: String,
    /// Non-empty extracted attributes.
    pub attributes: BTreeMap<String, String>,
}

/// Environment snapshot taken when the event was captured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageMeta {
    /// Page location.
    pub url: String,
    /// Document referrer.
    pub referrer: String,
    /// Document title.
    pub title: String,
    /// Screen size.
    pub screen: Size,
    /// Viewport size.
    pub window: Size,
    /// Navigator user agent.
    pub user_agent: String,
    /// User agent looks like a phone or tablet.
    pub is_mobile: bool,
    /// Device reports touch support.
    pub is_touch: bool,
    /// User agent looks like a crawler or headless browser.
    pub is_bot: bool,
    /// Vertical scroll position in percent.
    pub scroll_depth: f64,
}

/// The unit that is persisted and handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedPayload {
    /// Canonical event name, never empty.
    pub event: String,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Session reference.
    pub session: Session,
    /// Present when the event had an element target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetInfo>,
    /// Environment snapshot.
    #[serde(default)]
    pub meta: PageMeta,
    /// Static custom fields.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub payload: Map<String, Value>,
    /// Plugin-supplied fields at the top level.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CapturedPayload {
    /// A payload with only the required fields.
    #[must_use]
    pub fn new(
        event: impl Into<String>,
        timestamp: DateTime<Utc>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            event: event.into(),
            timestamp,
            session: Session {
                id: session_id.into(),
            },
            target: None,
            meta: PageMeta::default(),
            payload: Map::new(),
            extra: Map::new(),
        }
    }

    /// Shallow-merge `fields` at the top level; later keys win.
    ///
    /// Canonical fields may be overwritten. The payload is left unchanged
    /// when the result no longer decodes or the event name ends up empty.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the merge was rejected.
    pub fn merge(&mut self, fields: Map<String, Value>) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let Value::Object(mut object) = serde_json::to_value(&*self)? else {
            return Err(Error::internal("payload did not serialize to an object"));
        };
        object.extend(fields);
        let merged: CapturedPayload = serde_json::from_value(Value::Object(object))?;
        if merged.event.is_empty() {
            return Err(Error::internal("merge left the event name empty"));
        }
        *self = merged;
        Ok(())
    }

    /// Look up a top-level extension field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Read one attribute for the payload target. Empty values are `None`.
///
/// `text` and `value` pass through the scrubber, or are masked entirely when
/// `masked` is set.
#[must_use]
pub fn attribute_value(
    event: &DomEvent,
    element: &Element,
    name: &str,
    masked: bool,
    scrubber: &TextScrubber,
) -> Option<String> {
    let sensitive = |raw: String| {
        if masked {
            Some(mask(&raw))
        } else {
            scrubber.scrub(&raw)
        }
    };
    let value = match name {
        "text" => sensitive(element.direct_text().trim().to_string()),
        "value" => sensitive(element.value()),
        "className" => Some(element.class_name()),
        "type" => Some(event.event_type.clone()),
        "tagName" => Some(element.tag_name()),
        "id" => Some(element.id()),
        other => element.attribute(other),
    };
    value.filter(|v| !v.is_empty())
}

fn mobile_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?i)android|webos|iphone|ipad|ipod|blackberry|iemobile|opera mini|mobile",
            )
            .ok()
        })
        .as_ref()
}

fn bot_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)bot|crawl|spider|slurp|headless|lighthouse").ok())
        .as_ref()
}

/// Whether a user agent belongs to a phone or tablet.
#[must_use]
pub fn is_mobile_agent(user_agent: &str) -> bool {
    mobile_pattern().is_some_and(|re| re.is_match(user_agent))
}

/// Whether a user agent belongs to a crawler or headless browser.
#[must_use]
pub fn is_bot_agent(user_agent: &str) -> bool {
    bot_pattern().is_some_and(|re| re.is_match(user_agent))
}

/// Builds payloads for one engine.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    config: Rc<Config>,
    page: Page,
    scrubber: TextScrubber,
}

impl PayloadBuilder {
    /// Create a builder; the scrubber comes from the privacy configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a custom privacy pattern is invalid.
    pub fn new(config: Rc<Config>, page: Page) -> Result<Self> {
        let scrubber = config.scrubber()?;
        Ok(Self {
            config,
            page,
            scrubber,
        })
    }

    /// Snapshot the page environment.
    #[must_use]
    pub fn meta(&self) -> PageMeta {
        let user_agent = self.page.user_agent();
        PageMeta {
            url: self.page.url(),
            referrer: self.page.referrer(),
            title: self.page.title(),
            screen: self.page.screen(),
            window: self.page.viewport(),
            is_mobile: is_mobile_agent(&user_agent),
            is_touch: self.page.is_touch_capable(),
            is_bot: is_bot_agent(&user_agent),
            scroll_depth: self.page.scroll_depth(),
            user_agent,
        }
    }

    /// Describe the event's element target, if it has one.
    #[must_use]
    pub fn target(&self, event: &DomEvent) -> Option<TargetInfo> {
        let element = event.target_element()?;
        let attributes = self
            .config
            .attributes
            .iter()
            .filter_map(|name| {
                attribute_value(
                    event,
                    element,
                    name,
                    self.config.mask_text_content,
                    &self.scrubber,
                )
                .map(|value| (name.clone(), value))
            })
            .collect();
        Some(TargetInfo {
            selector: element.tag_name(),
            attributes,
        })
    }

    /// Build the canonical payload for `event` under the name `name`.
    #[must_use]
    pub fn build(&self, event: &DomEvent, name: &str, session_id: &str) -> CapturedPayload {
        CapturedPayload {
            event: name.to_string(),
            timestamp: self.page.timestamp_at(event.time_stamp()),
            session: Session {
                id: session_id.to_string(),
            },
            target: self.target(event),
            meta: self.meta(),
            payload: self.config.payload.clone(),
            extra: Map::new(),
        }
    }
}
