//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one line per tracker event to the
//! ESP-IDF logger (UART / USB-CDC in production).  Transient radio
//! failures go out at `warn`, everything else at `info`.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { tags } => {
                info!("START | tags={}", tags);
            }
            AppEvent::TagDiscovered { tag, address } => {
                info!("FOUND | tag={} | mac={}", tag, address);
            }
            AppEvent::ScanStarted => {
                info!("SCAN | started");
            }
            AppEvent::ScanEnded => {
                info!("SCAN | ended");
            }
            AppEvent::ScanStoppedAllFound => {
                info!("SCAN | stopped, all tags found");
            }
            AppEvent::ScanFailed(e) => {
                warn!("SCAN | failed: {}", e);
            }
            AppEvent::ConnectAttempt { tag, address } => {
                info!("CONNECT | tag={} | mac={} | attempt", tag, address);
            }
            AppEvent::Connected { tag, address } => {
                info!("CONNECT | tag={} | mac={} | ok", tag, address);
            }
            AppEvent::ConnectFailed { tag, address, error } => {
                warn!("CONNECT | tag={} | mac={} | failed: {}", tag, address, error);
            }
            AppEvent::Battery { tag, percent } => {
                info!("BATTERY | tag={} | {}%", tag, percent);
            }
            AppEvent::BatteryUnavailable { tag, error } => {
                warn!("BATTERY | tag={} | unavailable: {}", tag, error);
            }
            AppEvent::ButtonSubscribed { tag } => {
                info!("BUTTON | tag={} | notifications on", tag);
            }
            AppEvent::ButtonUnavailable { tag, error } => {
                warn!("BUTTON | tag={} | unavailable: {}", tag, error);
            }
            AppEvent::Disconnected { tag, address } => {
                info!("DISCONNECT | tag={} | mac={}", tag, address);
            }
            AppEvent::ButtonPressed { tag, address, at_ms } => {
                info!("BUTTON | tag={} | mac={} | pressed at {}ms", tag, address, at_ms);
            }
            AppEvent::EventsDropped { total } => {
                warn!("QUEUE | {} radio events dropped so far", total);
            }
        }
    }
}
