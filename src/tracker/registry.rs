//! Tag registry: the fixed table of known tags.
//!
//! One [`Tag`] per configured address, created at startup and never added
//! or removed.  Only the scan coordinator and connection manager write the
//! link-related fields; the dispatcher writes the button timestamp.  Those
//! mutators are `pub(super)` so nothing outside the tracker can reach them.

use crate::app::ports::{LinkHandle, NotifyHandle};
use crate::config::{MAX_TAGS, TagAddress};

/// Connection state of a tag's link as the tracker last observed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Connecting,
    Up,
}

/// Lifecycle state derived from the tag fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TagState {
    /// Not seen since the last disconnect.
    Idle,
    /// Seen, not connected.
    Advertised,
    /// Connect attempt in flight.
    Connecting,
    Connected,
}

/// Per-tag runtime record.
#[derive(Debug, Clone)]
pub struct Tag {
    address: TagAddress,
    link: LinkHandle,
    link_state: LinkState,
    notify: Option<NotifyHandle>,
    advertised: bool,
    battery_percent: Option<u8>,
    last_button_ms: Option<u32>,
}

impl Tag {
    fn new(address: TagAddress, link: LinkHandle) -> Self {
        Self {
            address,
            link,
            link_state: LinkState::Down,
            notify: None,
            advertised: false,
            battery_percent: None,
            last_button_ms: None,
        }
    }

    pub fn address(&self) -> TagAddress {
        self.address
    }

    pub fn link(&self) -> LinkHandle {
        self.link
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn notify(&self) -> Option<NotifyHandle> {
        self.notify
    }

    pub fn is_advertised(&self) -> bool {
        self.advertised
    }

    pub fn is_connected(&self) -> bool {
        self.link_state == LinkState::Up
    }

    /// Last battery level read on the current connection.
    pub fn battery_percent(&self) -> Option<u8> {
        self.battery_percent
    }

    /// Time of the last accepted button press, `None` if never.
    pub fn last_button_ms(&self) -> Option<u32> {
        self.last_button_ms
    }

    pub fn state(&self) -> TagState {
        match self.link_state {
            LinkState::Up => TagState::Connected,
            LinkState::Connecting => TagState::Connecting,
            LinkState::Down if self.advertised => TagState::Advertised,
            LinkState::Down => TagState::Idle,
        }
    }

    // ── Mutators (tracker components only) ────────────────────

    pub(super) fn set_advertised(&mut self, advertised: bool) {
        self.advertised = advertised;
    }

    pub(super) fn set_link_state(&mut self, state: LinkState) {
        self.link_state = state;
    }

    pub(super) fn bind_notify(&mut self, handle: NotifyHandle) {
        self.notify = Some(handle);
    }

    pub(super) fn clear_notify(&mut self) {
        self.notify = None;
    }

    pub(super) fn set_battery(&mut self, percent: Option<u8>) {
        self.battery_percent = percent;
    }

    pub(super) fn set_last_button(&mut self, now_ms: u32) {
        self.last_button_ms = Some(now_ms);
    }
}

/// Fixed-capacity table of tags, indexed by configuration order.
#[derive(Debug, Clone, Default)]
pub struct TagRegistry {
    tags: heapless::Vec<Tag, MAX_TAGS>,
}

impl TagRegistry {
    /// Build the registry from `(address, link)` pairs.  Entries beyond
    /// capacity are ignored (configuration validation rejects them first).
    pub fn new(entries: impl IntoIterator<Item = (TagAddress, LinkHandle)>) -> Self {
        let mut tags = heapless::Vec::new();
        for (address, link) in entries {
            if tags.push(Tag::new(address, link)).is_err() {
                break;
            }
        }
        Self { tags }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tag> {
        self.tags.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    /// Exact-byte address match.
    pub fn lookup_by_address(&self, address: &TagAddress) -> Option<usize> {
        self.tags.iter().position(|t| t.address == *address)
    }

    pub fn lookup_by_link(&self, link: LinkHandle) -> Option<usize> {
        self.tags.iter().position(|t| t.link == link)
    }

    /// Only tags with a currently bound handle can match.
    pub fn lookup_by_notify(&self, handle: &NotifyHandle) -> Option<usize> {
        self.tags.iter().position(|t| t.notify.as_ref() == Some(handle))
    }

    pub fn all_advertised(&self) -> bool {
        self.tags.iter().all(|t| t.advertised)
    }

    pub fn any_advertised(&self) -> bool {
        self.tags.iter().any(|t| t.advertised)
    }

    pub fn all_connected(&self) -> bool {
        self.tags.iter().all(Tag::is_connected)
    }

    pub fn connected_count(&self) -> usize {
        self.tags.iter().filter(|t| t.is_connected()).count()
    }

    pub(super) fn get_mut(&mut self, index: usize) -> Option<&mut Tag> {
        self.tags.get_mut(index)
    }
}
