//! Connection manager: connect attempts and link-state transitions.
//!
//! Per tag:
//!
//! ```text
//!   Idle ──advert──▶ Advertised ──sweep──▶ Connecting ──ok──▶ Connected
//!    ▲                  ▲                     │                  │
//!    │                  └──────── fail ───────┘                  │
//!    └─────────────────────── disconnect ────────────────────────┘
//! ```
//!
//! With `clear_advertised_on_disconnect` off, a disconnect lands in
//! `Advertised` instead of `Idle` and the next sweep reconnects without
//! waiting for a fresh advertisement.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, FeedbackPort, LinkHandle, RadioPort};
use crate::config::{GattIds, TrackerConfig};
use crate::error::RadioError;

use super::registry::{LinkState, TagRegistry};
use super::scan::ScanCoordinator;

#[derive(Debug, Clone)]
pub struct ConnectionManager {
    battery: GattIds,
    button: GattIds,
    connect_timeout_ms: u32,
    connect_beep_ms: u32,
    beep_on_connect_attempt: bool,
    clear_advertised_on_disconnect: bool,
    attempts: u32,
    failures: u32,
}

impl ConnectionManager {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            battery: config.battery,
            button: config.button,
            connect_timeout_ms: config.connect_timeout_ms,
            connect_beep_ms: config.connect_beep_ms,
            beep_on_connect_attempt: config.beep_on_connect_attempt,
            clear_advertised_on_disconnect: config.clear_advertised_on_disconnect,
            attempts: 0,
            failures: 0,
        }
    }

    /// Connect attempts issued so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Connect attempts that failed.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Try to connect every advertised tag the radio does not report connected.
    ///
    /// Each attempt blocks until the radio returns or the connect timeout
    /// expires.  A tag whose link went down without a disconnect event
    /// reaching the queue is handled as a disconnect first.
    pub fn sweep(
        &mut self,
        registry: &mut TagRegistry,
        scan: &mut ScanCoordinator,
        radio: &mut impl RadioPort,
        feedback: &mut impl FeedbackPort,
        sink: &mut impl EventSink,
    ) {
        for index in 0..registry.len() {
            let Some(tag) = registry.get(index) else {
                continue;
            };
            let link = tag.link();

            if tag.is_connected() && !radio.is_connected(link) {
                warn!("iTag {} link lost without disconnect event", index);
                self.on_disconnected(registry, link, scan, sink);
            }

            let Some(tag) = registry.get(index) else {
                continue;
            };
            if !tag.is_advertised() {
                continue;
            }
            if radio.is_connected(link) {
                if !tag.is_connected() {
                    // Link came up outside a completed attempt; it still
                    // needs its battery read and button binding.
                    info!("iTag {} link already up, adopting", index);
                    self.link_up(index, registry, radio, sink);
                }
                continue;
            }

            self.attempt(index, registry, scan, radio, feedback, sink);
        }
    }

    /// A `Connected` event from the radio.  The attempt that caused it has
    /// already updated the registry; only the scan restart remains.
    pub fn on_connected(
        &mut self,
        registry: &TagRegistry,
        link: LinkHandle,
        scan: &mut ScanCoordinator,
    ) -> Option<usize> {
        let Some(index) = registry.lookup_by_link(link) else {
            debug!("Connected event for unknown link {:?}", link);
            return None;
        };
        scan.on_connection_state_changed();
        Some(index)
    }

    /// The link for a tag went down, for whatever reason.
    ///
    /// Clears the notification binding and the battery reading, resets
    /// `advertised` (policy permitting), and requests a scan restart.
    pub fn on_disconnected(
        &mut self,
        registry: &mut TagRegistry,
        link: LinkHandle,
        scan: &mut ScanCoordinator,
        sink: &mut impl EventSink,
    ) -> Option<usize> {
        let Some(index) = registry.lookup_by_link(link) else {
            debug!("Disconnected event for unknown link {:?}", link);
            return None;
        };
        let tag = registry.get_mut(index)?;

        tag.clear_notify();
        tag.set_battery(None);
        tag.set_link_state(LinkState::Down);
        if self.clear_advertised_on_disconnect {
            tag.set_advertised(false);
        }
        let address = tag.address();

        info!("Disconnected from iTag {} ({})", index, address);
        sink.emit(&AppEvent::Disconnected {
            tag: index,
            address,
        });
        scan.on_connection_state_changed();
        Some(index)
    }

    // ── Internal ──────────────────────────────────────────────

    fn attempt(
        &mut self,
        index: usize,
        registry: &mut TagRegistry,
        scan: &mut ScanCoordinator,
        radio: &mut impl RadioPort,
        feedback: &mut impl FeedbackPort,
        sink: &mut impl EventSink,
    ) {
        let Some(tag) = registry.get_mut(index) else {
            return;
        };
        let address = tag.address();
        let link = tag.link();

        info!("Try connect to iTag {}, mac is {}", index, address);
        sink.emit(&AppEvent::ConnectAttempt {
            tag: index,
            address,
        });
        tag.set_link_state(LinkState::Connecting);
        self.attempts = self.attempts.wrapping_add(1);

        scan.on_connection_state_changed();
        if self.beep_on_connect_attempt {
            feedback.activate_for(self.connect_beep_ms);
        }

        let result = radio
            .connect(link, address, self.connect_timeout_ms)
            .and_then(|()| {
                if radio.is_connected(link) {
                    Ok(())
                } else {
                    Err(RadioError::LinkUnavailable)
                }
            });

        if let Err(error) = result {
            self.failures = self.failures.wrapping_add(1);
            tag.set_link_state(LinkState::Down);
            warn!("No connection to iTag {}: {}", index, error);
            sink.emit(&AppEvent::ConnectFailed {
                tag: index,
                address,
                error,
            });
            return;
        }

        self.link_up(index, registry, radio, sink);
    }

    /// Post-connect sequence: mark the link up, read the battery level and
    /// bind the button notification.
    fn link_up(
        &mut self,
        index: usize,
        registry: &mut TagRegistry,
        radio: &mut impl RadioPort,
        sink: &mut impl EventSink,
    ) {
        let Some(tag) = registry.get_mut(index) else {
            return;
        };
        let address = tag.address();
        let link = tag.link();

        // Never carry a binding over from a previous connection.
        tag.clear_notify();
        tag.set_link_state(LinkState::Up);
        info!("Connected to iTag {} ({})", index, address);
        sink.emit(&AppEvent::Connected {
            tag: index,
            address,
        });

        match self.read_battery(link, radio) {
            Ok(percent) => {
                tag.set_battery(Some(percent));
                info!("iTag {} battery is {} percent", index, percent);
                sink.emit(&AppEvent::Battery {
                    tag: index,
                    percent,
                });
            }
            Err(error) => {
                warn!("iTag {} battery unavailable: {}", index, error);
                sink.emit(&AppEvent::BatteryUnavailable { tag: index, error });
            }
        }

        match self.subscribe_button(link, radio) {
            Ok(handle) => {
                tag.bind_notify(handle);
                info!("iTag {} button notifications enabled", index);
                sink.emit(&AppEvent::ButtonSubscribed { tag: index });
            }
            Err(error) => {
                warn!("iTag {} button unavailable: {}", index, error);
                sink.emit(&AppEvent::ButtonUnavailable { tag: index, error });
            }
        }
    }

    fn read_battery(&self, link: LinkHandle, radio: &mut impl RadioPort) -> Result<u8, RadioError> {
        let service = radio
            .service(link, self.battery.service)
            .ok_or(RadioError::ServiceNotFound)?;
        let characteristic = radio
            .characteristic(link, &service, self.battery.characteristic)
            .ok_or(RadioError::CharacteristicNotFound)?;
        let value = radio.read(link, &characteristic)?;
        value.first().copied().ok_or(RadioError::ReadFailed)
    }

    fn subscribe_button(
        &self,
        link: LinkHandle,
        radio: &mut impl RadioPort,
    ) -> Result<crate::app::ports::NotifyHandle, RadioError> {
        let service = radio
            .service(link, self.button.service)
            .ok_or(RadioError::ServiceNotFound)?;
        let characteristic = radio
            .characteristic(link, &service, self.button.characteristic)
            .ok_or(RadioError::CharacteristicNotFound)?;
        if !characteristic.can_notify() {
            return Err(RadioError::NotifyUnsupported);
        }
        radio.subscribe(link, &characteristic)
    }
}
