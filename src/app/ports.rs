//! Port traits: the hexagonal boundary between tracker logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ TrackerService (domain)
//! ```
//!
//! Driven adapters (the NimBLE radio, buzzer and LED, event sinks)
//! implement these traits.  The [`TrackerService`](super::service::TrackerService)
//! consumes them via generics, so the domain core never touches the radio
//! or GPIO directly.
//!
//! ## Callback discipline
//!
//! Nothing in this module is called from a radio callback.  Callbacks push
//! into the [`RadioEventQueue`](crate::events::RadioEventQueue); every
//! method here runs on the main cycle only.

use crate::config::TagAddress;
use crate::error::RadioError;

// ───────────────────────────────────────────────────────────────
// Handles
// ───────────────────────────────────────────────────────────────

/// Identifies one per-tag connection resource.
///
/// Created once per tag at startup and reused for every connect and
/// disconnect cycle of that tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkHandle(pub u8);

/// A subscribed notification source: the link plus the value attribute.
///
/// Two tags of the same model expose identical attribute handles, so the
/// link is part of the identity.  A handle from a previous connection of
/// the same link compares equal only if it is re-bound after reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifyHandle {
    pub link: LinkHandle,
    pub attr: u16,
}

/// Attribute range of a discovered primary service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceHandle {
    pub start: u16,
    pub end: u16,
}

/// A discovered characteristic: value attribute and property bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharHandle {
    pub value: u16,
    pub properties: u8,
}

/// GATT characteristic property: notify.
pub const PROP_NOTIFY: u8 = 0x10;
/// GATT characteristic property: read.
pub const PROP_READ: u8 = 0x02;

impl CharHandle {
    pub fn can_notify(&self) -> bool {
        self.properties & PROP_NOTIFY != 0
    }

    pub fn can_read(&self) -> bool {
        self.properties & PROP_READ != 0
    }

    /// CCCD handle to use when descriptor discovery finds none. iTags place
    /// it right after the value attribute.
    pub fn assumed_cccd(&self) -> u16 {
        self.value.wrapping_add(1)
    }
}

/// Client Characteristic Configuration descriptor UUID.
pub const UUID_CCCD: u16 = 0x2902;

/// What one attribute found after a characteristic value means for the
/// search for that characteristic's CCCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorStep {
    Cccd,
    /// Another descriptor of the same characteristic.
    Skip,
    /// A service or characteristic declaration: the descriptors ended.
    End,
}

impl DescriptorStep {
    pub fn classify(uuid: u16) -> Self {
        match uuid {
            UUID_CCCD => Self::Cccd,
            0x2800 | 0x2801 | 0x2802 | 0x2803 => Self::End,
            _ => Self::Skip,
        }
    }
}

/// How long a scan runs once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Until explicitly stopped.
    Continuous,
    /// For a bounded time, then a `ScanEnded` event.
    Duration { ms: u32 },
}

/// Largest characteristic value read back.
pub const READ_CAP: usize = 20;

// ───────────────────────────────────────────────────────────────
// Radio port (driven adapter: domain → BLE stack)
// ───────────────────────────────────────────────────────────────

/// Everything the tracker asks of the BLE central role.
///
/// All calls are synchronous from the caller's point of view.  Results
/// that arrive later (advertisements, disconnects, notifications) are
/// delivered through the event queue, never through this trait.
pub trait RadioPort {
    /// Reserve the connection resource for one tag.  Called once per tag.
    fn create_link(&mut self, address: TagAddress) -> Result<LinkHandle, RadioError>;

    /// Start discovery.  Advertisements from configured tags are queued.
    fn start_scan(&mut self, mode: ScanMode) -> Result<(), RadioError>;

    /// Stop discovery.  Stopping an idle scanner is not an error.
    fn stop_scan(&mut self) -> Result<(), RadioError>;

    /// Forget advertisements accumulated by the current scan.
    fn clear_scan_results(&mut self);

    fn is_scanning(&self) -> bool;

    /// Connect `link` to `address`, giving up after `timeout_ms`.
    fn connect(
        &mut self,
        link: LinkHandle,
        address: TagAddress,
        timeout_ms: u32,
    ) -> Result<(), RadioError>;

    /// Whether the stack currently reports `link` connected.
    fn is_connected(&self, link: LinkHandle) -> bool;

    fn disconnect(&mut self, link: LinkHandle) -> Result<(), RadioError>;

    /// Find a primary service by 16-bit UUID.
    fn service(&mut self, link: LinkHandle, uuid: u16) -> Option<ServiceHandle>;

    /// Find a characteristic by 16-bit UUID within `service`.
    fn characteristic(
        &mut self,
        link: LinkHandle,
        service: &ServiceHandle,
        uuid: u16,
    ) -> Option<CharHandle>;

    /// Read a characteristic value.
    fn read(
        &mut self,
        link: LinkHandle,
        characteristic: &CharHandle,
    ) -> Result<heapless::Vec<u8, READ_CAP>, RadioError>;

    /// Enable notifications on `characteristic`.
    fn subscribe(
        &mut self,
        link: LinkHandle,
        characteristic: &CharHandle,
    ) -> Result<NotifyHandle, RadioError>;
}

// ───────────────────────────────────────────────────────────────
// Feedback port (driven adapter: domain → buzzer / LED)
// ───────────────────────────────────────────────────────────────

/// Audible and visual output.
pub trait FeedbackPort {
    /// Sound the signal for `duration_ms`.  A new request replaces the
    /// remaining time of the previous one.
    fn activate_for(&mut self, duration_ms: u32);

    /// Drive the presence indicator.
    fn set_presence(&mut self, on: bool);

    /// Count down the active signal by one main-cycle period.
    fn advance(&mut self, elapsed_ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
