//! Notification dispatcher: button presses to tags, with debounce.
//!
//! A press is accepted only if strictly more than `debounce_ms` has passed
//! since the tag's last accepted press.  Timestamps are `u32` milliseconds
//! since boot compared with `wrapping_sub`, so the rule holds across the
//! ~49.7 day counter wrap.

use log::{debug, info};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, FeedbackPort, NotifyHandle};

use super::registry::TagRegistry;

/// Whether a press at `now_ms` passes the debounce window.
pub fn debounce_accepts(last_ms: Option<u32>, now_ms: u32, debounce_ms: u32) -> bool {
    match last_ms {
        None => true,
        Some(last) => now_ms.wrapping_sub(last) > debounce_ms,
    }
}

#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    debounce_ms: u32,
    button_beep_ms: u32,
    accepted: u32,
    suppressed: u32,
}

impl NotificationDispatcher {
    pub fn new(debounce_ms: u32, button_beep_ms: u32) -> Self {
        Self {
            debounce_ms,
            button_beep_ms,
            accepted: 0,
            suppressed: 0,
        }
    }

    pub fn accepted(&self) -> u32 {
        self.accepted
    }

    /// Presses dropped by the debounce window.
    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }

    /// Attribute a notification to its tag and debounce it.
    ///
    /// Returns the tag index when the press is accepted.  Handles bound to
    /// no tag (stale or never subscribed) are dropped without touching the
    /// registry.  The payload content is not interpreted.
    pub fn on_notification(
        &mut self,
        registry: &mut TagRegistry,
        handle: &NotifyHandle,
        at_ms: u32,
        feedback: &mut impl FeedbackPort,
        sink: &mut impl EventSink,
    ) -> Option<usize> {
        let Some(index) = registry.lookup_by_notify(handle) else {
            debug!("Notification on unbound handle {:?}", handle);
            return None;
        };
        let tag = registry.get_mut(index)?;

        if !debounce_accepts(tag.last_button_ms(), at_ms, self.debounce_ms) {
            self.suppressed = self.suppressed.wrapping_add(1);
            return None;
        }

        tag.set_last_button(at_ms);
        self.accepted = self.accepted.wrapping_add(1);

        let address = tag.address();
        info!("Button on iTag {} ({})", index, address);
        feedback.activate_for(self.button_beep_ms);
        sink.emit(&AppEvent::ButtonPressed {
            tag: index,
            address,
            at_ms,
        });
        Some(index)
    }
}
