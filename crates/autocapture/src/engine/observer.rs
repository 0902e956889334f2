//! Engine-level capture observers.

use std::rc::Rc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::payload::CapturedPayload;

/// Called once for every persisted payload, before the owning plugin.
pub type Observer = Rc<dyn Fn(&CapturedPayload)>;

/// An observer that forwards a copy of every payload into a channel.
///
/// Once the receiver is gone, payloads are dropped with a debug log.
#[must_use]
pub fn forward_to(sender: UnboundedSender<CapturedPayload>) -> Observer {
    Rc::new(move |payload: &CapturedPayload| {
        if sender.send(payload.clone()).is_err() {
            debug!(event = %payload.event, "Capture receiver closed");
        }
    })
}
