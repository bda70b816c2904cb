//! Deferred radio event queue.
//!
//! Events are produced by:
//! - NimBLE GAP discovery callbacks (advertisement seen, scan ended)
//! - NimBLE connection callbacks (connected, disconnected)
//! - NimBLE notification callbacks (button press payloads)
//!
//! Callbacks never touch the tag registry or call back into the radio.
//! They push a [`RadioEvent`] and return; the main cycle drains the queue
//! once per tick and is the only place radio operations are issued.
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ GAP disc cb  │────▶│              │     │              │
//! │ GAP conn cb  │────▶│ Radio events │────▶│  Main cycle  │
//! │ Notify rx cb │────▶│  (bounded)   │     │  (consumer)  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::app::ports::{LinkHandle, NotifyHandle};
use crate::config::TagAddress;

/// Maximum number of pending events.
pub const RADIO_QUEUE_CAP: usize = 32;

/// Largest notification payload kept (iTag button frames are 1 byte).
pub const NOTIFY_PAYLOAD_CAP: usize = 8;

/// Everything the radio stack reports asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// An advertisement from a configured address.
    Advertisement(TagAddress),
    /// A link finished connecting.
    Connected(LinkHandle),
    /// A link dropped, for any reason.
    Disconnected(LinkHandle),
    /// A notification on a subscribed characteristic, stamped when it arrived.
    Notification {
        handle: NotifyHandle,
        payload: heapless::Vec<u8, NOTIFY_PAYLOAD_CAP>,
        at_ms: u32,
    },
    /// A bounded-duration discovery finished on its own.
    ScanEnded,
}

/// Bounded multi-producer queue between radio callbacks and the main cycle.
///
/// Pushing never blocks: when the queue is full the event is dropped and
/// counted, so a callback can always return immediately.
pub struct RadioEventQueue {
    channel: Channel<CriticalSectionRawMutex, RadioEvent, RADIO_QUEUE_CAP>,
    dropped: AtomicU32,
}

impl RadioEventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Queue an event.  Returns `false` if the queue was full.
    pub fn push(&self, event: RadioEvent) -> bool {
        if self.channel.try_send(event).is_ok() {
            true
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Pop the oldest pending event.
    pub fn pop(&self) -> Option<RadioEvent> {
        self.channel.try_receive().ok()
    }

    /// Drain all pending events into a callback, in arrival order.
    ///
    /// Events pushed while draining are picked up in the same pass.
    pub fn drain(&self, mut handler: impl FnMut(RadioEvent)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    /// Total events dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for RadioEventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The queue shared by the NimBLE callbacks and the device main loop.
pub static RADIO_EVENTS: RadioEventQueue = RadioEventQueue::new();
