//! Scan coordinator: when discovery runs and when it restarts.
//!
//! Radio callbacks never start or stop the scanner.  A connect, a
//! disconnect, or a connect attempt only raises `restart_requested`; the
//! main cycle services the flag once per tick through [`ScanCoordinator::service`].
//!
//! Restart takes priority over an early stop: if both are pending in the
//! same tick the scanner is restarted (or left stopped when every tag has
//! been seen and the early-stop policy is on).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, RadioPort, ScanMode};
use crate::config::TagAddress;

use super::registry::TagRegistry;

#[derive(Debug, Clone)]
pub struct ScanCoordinator {
    restart_requested: bool,
    stop_requested: bool,
    /// Stop scanning once every tag has been seen.
    stop_when_all_found: bool,
    restarts: u32,
}

impl ScanCoordinator {
    pub fn new(stop_when_all_found: bool) -> Self {
        Self {
            restart_requested: false,
            stop_requested: false,
            stop_when_all_found,
            restarts: 0,
        }
    }

    /// Start the boot-time continuous scan.
    pub fn start(&mut self, radio: &mut impl RadioPort, sink: &mut impl EventSink) {
        self.start_continuous(radio, sink);
    }

    /// An advertisement from `address` was observed.
    ///
    /// Marks the tag advertised if it was not already and returns its index.
    /// Already-advertised and unknown addresses change nothing.
    pub fn on_advertisement(
        &mut self,
        registry: &mut TagRegistry,
        address: &TagAddress,
        sink: &mut impl EventSink,
    ) -> Option<usize> {
        let Some(index) = registry.lookup_by_address(address) else {
            debug!("Advertisement from unknown address {}", address);
            return None;
        };
        let tag = registry.get_mut(index)?;
        if tag.is_advertised() {
            return None;
        }

        tag.set_advertised(true);
        info!("Found iTag {} ({})", index, address);
        sink.emit(&AppEvent::TagDiscovered {
            tag: index,
            address: *address,
        });

        if self.stop_when_all_found && registry.all_advertised() {
            self.stop_requested = true;
        }
        Some(index)
    }

    /// Any connect, disconnect, or connect attempt.  Deferred to the next
    /// [`service`](Self::service) call.
    pub fn on_connection_state_changed(&mut self) {
        self.restart_requested = true;
    }

    pub fn restart_pending(&self) -> bool {
        self.restart_requested
    }

    pub fn stop_pending(&self) -> bool {
        self.stop_requested
    }

    /// Number of restarts performed so far.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Act on the deferred restart / stop flags.  Once per main-cycle tick.
    pub fn service(
        &mut self,
        registry: &TagRegistry,
        radio: &mut impl RadioPort,
        sink: &mut impl EventSink,
    ) {
        if self.restart_requested {
            self.restart_requested = false;
            self.stop_requested = false;
            self.restarts = self.restarts.wrapping_add(1);

            self.stop(radio, sink);
            radio.clear_scan_results();

            if self.stop_when_all_found && registry.all_advertised() {
                sink.emit(&AppEvent::ScanStoppedAllFound);
            } else {
                debug!("Scan restart #{}", self.restarts);
                self.start_continuous(radio, sink);
            }
        } else if self.stop_requested {
            self.stop_requested = false;
            self.stop(radio, sink);
            info!("All iTags found, scan stopped");
            sink.emit(&AppEvent::ScanStoppedAllFound);
        }
    }

    /// Periodic check: while any tag is not connected, make sure a scan is
    /// running.  Never touches the `advertised` flags.
    pub fn confirm_active(
        &mut self,
        registry: &TagRegistry,
        radio: &mut impl RadioPort,
        sink: &mut impl EventSink,
    ) {
        if registry.all_connected() || radio.is_scanning() {
            return;
        }
        if self.stop_when_all_found && registry.all_advertised() {
            return;
        }
        debug!("Scan not running with tags outstanding, starting");
        self.start_continuous(radio, sink);
    }

    fn start_continuous(&mut self, radio: &mut impl RadioPort, sink: &mut impl EventSink) {
        match radio.start_scan(ScanMode::Continuous) {
            Ok(()) => sink.emit(&AppEvent::ScanStarted),
            Err(e) => {
                warn!("Scan start failed: {}", e);
                sink.emit(&AppEvent::ScanFailed(e));
            }
        }
    }

    fn stop(&mut self, radio: &mut impl RadioPort, sink: &mut impl EventSink) {
        if let Err(e) = radio.stop_scan() {
            warn!("Scan stop failed: {}", e);
            sink.emit(&AppEvent::ScanFailed(e));
        }
    }
}
