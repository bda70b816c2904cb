//! Outbound application events.
//!
//! The tracker emits these through the [`EventSink`](super::ports::EventSink)
//! port.  Adapters on the other side decide what to do with them: log to
//! serial, count them in a test, forward them elsewhere.

use crate::config::TagAddress;
use crate::error::RadioError;

/// Structured events emitted by the tracker core.
///
/// `tag` is the tag's position in the configured table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service is up with this many tags configured.
    Started { tags: usize },

    /// A tag's advertisement was seen while it was not marked advertised.
    TagDiscovered { tag: usize, address: TagAddress },

    /// A scan was started (initial, restart, or confirmation).
    ScanStarted,

    /// A bounded-duration scan ran out.
    ScanEnded,

    /// The scan was stopped because every tag has been seen.
    ScanStoppedAllFound,

    /// Starting or stopping the scanner failed.
    ScanFailed(RadioError),

    /// A connect attempt is about to be issued.
    ConnectAttempt { tag: usize, address: TagAddress },

    /// The connect attempt succeeded.
    Connected { tag: usize, address: TagAddress },

    /// The connect attempt failed; the tag stays advertised.
    ConnectFailed { tag: usize, address: TagAddress, error: RadioError },

    /// Battery level read after connecting.
    Battery { tag: usize, percent: u8 },

    /// Battery level could not be read (not fatal).
    BatteryUnavailable { tag: usize, error: RadioError },

    /// Button notifications are enabled for the tag.
    ButtonSubscribed { tag: usize },

    /// Button notifications could not be enabled (tag stays connected).
    ButtonUnavailable { tag: usize, error: RadioError },

    /// The stack reported the tag's link down.
    Disconnected { tag: usize, address: TagAddress },

    /// A debounced button press.
    ButtonPressed { tag: usize, address: TagAddress, at_ms: u32 },

    /// Radio events were lost because the queue was full (running total).
    EventsDropped { total: u32 },
}
