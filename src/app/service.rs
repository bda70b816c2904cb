//! Tracker service: the hexagonal core and its main cycle.
//!
//! [`TrackerService`] owns the tag registry and the three tracker
//! components.  It exposes one entry point per main-cycle period,
//! [`tick`](TrackerService::tick).  All I/O flows through port traits
//! injected at call sites, making the whole cycle testable with mocks.
//!
//! ```text
//!  RadioEventQueue ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!                      │       TrackerService        │
//!        RadioPort ◀──▶│ Registry · Scan · Connect   │──▶ FeedbackPort
//!                      │ Dispatch                    │
//!                      └────────────────────────────┘
//! ```
//!
//! Tick order is fixed: drain events, service the scan restart, advance
//! the feedback timer, run the connect sweep when due, then project the
//! presence indicator.

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{MAX_TAGS, TagAddress, TrackerConfig};
use crate::error::Result;
use crate::events::{RadioEvent, RadioEventQueue};
use crate::scheduler::Cadence;
use crate::tracker::{
    ConnectionManager, NotificationDispatcher, ScanCoordinator, TagRegistry, TagState,
};

use super::events::AppEvent;
use super::ports::{EventSink, FeedbackPort, RadioPort};

// ───────────────────────────────────────────────────────────────
// Snapshot
// ───────────────────────────────────────────────────────────────

/// Point-in-time view of one tag, for logging or inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagStatus {
    pub address: TagAddress,
    pub state: TagState,
    pub battery_percent: Option<u8>,
    pub button_subscribed: bool,
    pub last_button_ms: Option<u32>,
}

/// Point-in-time view of the whole tracker.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub tags: heapless::Vec<TagStatus, MAX_TAGS>,
    pub ticks: u64,
    pub connect_attempts: u32,
    pub connect_failures: u32,
    pub presses_accepted: u32,
    pub presses_suppressed: u32,
    pub scan_restarts: u32,
    pub events_dropped: u32,
}

// ───────────────────────────────────────────────────────────────
// TrackerService
// ───────────────────────────────────────────────────────────────

pub struct TrackerService {
    config: TrackerConfig,
    registry: TagRegistry,
    scan: ScanCoordinator,
    connections: ConnectionManager,
    dispatcher: NotificationDispatcher,
    /// Connect sweep and scan confirmation; fires on the first tick.
    sweep: Cadence,
    tick_count: u64,
    /// Queue drop count already reported.
    dropped_seen: u32,
}

impl TrackerService {
    /// Validate the configuration and reserve one radio link per tag.
    ///
    /// Does **not** start scanning; call [`start`](Self::start) next.
    pub fn new(config: TrackerConfig, radio: &mut impl RadioPort) -> Result<Self> {
        config.validate()?;

        let mut entries: heapless::Vec<_, MAX_TAGS> = heapless::Vec::new();
        for address in &config.tags {
            let link = radio.create_link(*address)?;
            // Capacity matches the config's own tag vector.
            let _ = entries.push((*address, link));
        }

        Ok(Self {
            registry: TagRegistry::new(entries),
            scan: ScanCoordinator::new(config.stop_scan_when_all_found),
            connections: ConnectionManager::new(&config),
            dispatcher: NotificationDispatcher::new(config.debounce_ms, config.button_beep_ms),
            sweep: Cadence::immediate("connect-sweep", config.connect_sweep_ticks()),
            tick_count: 0,
            dropped_seen: 0,
            config,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the continuous boot scan.
    pub fn start(&mut self, radio: &mut impl RadioPort, sink: &mut impl EventSink) {
        info!("Tracker started with {} iTags", self.registry.len());
        sink.emit(&AppEvent::Started {
            tags: self.registry.len(),
        });
        self.scan.start(radio, sink);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one main cycle.
    pub fn tick(
        &mut self,
        events: &RadioEventQueue,
        radio: &mut impl RadioPort,
        feedback: &mut impl FeedbackPort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        // 1. Everything the radio reported since the last tick
        events.drain(|event| self.handle_event(event, &*radio, feedback, sink));
        self.report_drops(events, sink);

        // 2. Deferred scan restart / early stop
        self.scan.service(&self.registry, radio, sink);

        // 3. Feedback timer
        feedback.advance(self.config.cycle_period_ms);

        // 4. Connect sweep + scan confirmation on the slow cadence
        if self.sweep.tick() {
            self.connections.sweep(
                &mut self.registry,
                &mut self.scan,
                radio,
                feedback,
                sink,
            );
            self.scan.confirm_active(&self.registry, radio, sink);
        }

        // 5. Presence indicator (derived, idempotent)
        if self.config.presence_indicator {
            feedback.set_presence(self.registry.any_advertised());
        }
    }

    /// Apply one radio event to the registry.
    ///
    /// A `Disconnected` for a link the radio reports up again is stale: the
    /// sweep already handled the loss and reconnected.
    pub fn handle_event(
        &mut self,
        event: RadioEvent,
        radio: &impl RadioPort,
        feedback: &mut impl FeedbackPort,
        sink: &mut impl EventSink,
    ) {
        match event {
            RadioEvent::Advertisement(address) => {
                self.scan.on_advertisement(&mut self.registry, &address, sink);
            }
            RadioEvent::Connected(link) => {
                self.connections.on_connected(&self.registry, link, &mut self.scan);
            }
            RadioEvent::Disconnected(link) if radio.is_connected(link) => {
                debug!("Stale disconnect for {:?}, link is up", link);
            }
            RadioEvent::Disconnected(link) => {
                self.connections
                    .on_disconnected(&mut self.registry, link, &mut self.scan, sink);
            }
            RadioEvent::Notification { handle, at_ms, .. } => {
                self.dispatcher
                    .on_notification(&mut self.registry, &handle, at_ms, feedback, sink);
            }
            RadioEvent::ScanEnded => {
                info!("Scan ended");
                sink.emit(&AppEvent::ScanEnded);
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn registry(&self) -> &TagRegistry {
        &self.registry
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Main cycles executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn scan_restart_pending(&self) -> bool {
        self.scan.restart_pending()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        let mut tags = heapless::Vec::new();
        for tag in self.registry.iter() {
            let _ = tags.push(TagStatus {
                address: tag.address(),
                state: tag.state(),
                battery_percent: tag.battery_percent(),
                button_subscribed: tag.notify().is_some(),
                last_button_ms: tag.last_button_ms(),
            });
        }
        TrackerSnapshot {
            tags,
            ticks: self.tick_count,
            connect_attempts: self.connections.attempts(),
            connect_failures: self.connections.failures(),
            presses_accepted: self.dispatcher.accepted(),
            presses_suppressed: self.dispatcher.suppressed(),
            scan_restarts: self.scan.restarts(),
            events_dropped: self.dropped_seen,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn report_drops(&mut self, events: &RadioEventQueue, sink: &mut impl EventSink) {
        let total = events.dropped();
        if total != self.dropped_seen {
            warn!(
                "Radio event queue overflowed, {} events lost",
                total.wrapping_sub(self.dropped_seen)
            );
            self.dropped_seen = total;
            sink.emit(&AppEvent::EventsDropped { total });
        }
    }
}
