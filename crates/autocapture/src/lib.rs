//! `autocapture` - Plugin-based automatic interaction capture
//!
//! This library observes user interactions on a page (clicks, taps, form
//! activity, scrolling, swipes, page views, video playback), turns each
//! admitted occurrence into a [`CapturedPayload`] and persists it to a
//! bounded event history.
//!
//! The page itself is modelled in [`host`]; [`engine::AutoCapture`] binds
//! listeners to it through [`plugins`] and its own direct listeners.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod binding;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod host;
pub mod logging;
pub mod payload;
pub mod plugins;
pub mod privacy;
pub mod registry;
pub mod script;
pub mod storage;

pub use config::Config;
pub use engine::{AutoCapture, AutoCaptureBuilder};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use payload::CapturedPayload;
pub use plugins::{BindDescriptor, Outcome, Plugin};
pub use registry::PluginRegistry;
pub use storage::{Persistence, PersistenceKind};
