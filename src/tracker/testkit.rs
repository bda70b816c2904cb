//! In-crate fakes for the tracker unit tests.

use std::collections::HashMap;

use crate::app::events::AppEvent;
use crate::app::ports::{
    CharHandle, EventSink, FeedbackPort, LinkHandle, NotifyHandle, PROP_NOTIFY, PROP_READ,
    RadioPort, READ_CAP, ScanMode, ServiceHandle,
};
use crate::config::TagAddress;
use crate::error::RadioError;

pub const BATTERY_SVC: u16 = 0x180F;
pub const BATTERY_CHR: u16 = 0x2A19;
pub const BUTTON_SVC: u16 = 0xFFE0;
pub const BUTTON_CHR: u16 = 0xFFE1;

/// Scriptable radio.  Every tag exposes the battery and button services
/// unless told otherwise.
#[derive(Default)]
pub struct FakeRadio {
    pub links: Vec<TagAddress>,
    pub connected: Vec<bool>,
    pub scanning: bool,
    pub scan_starts: u32,
    pub scan_stops: u32,
    pub clears: u32,
    pub connect_calls: Vec<LinkHandle>,
    pub failing: Vec<TagAddress>,
    pub battery: HashMap<u8, Vec<u8>>,
    pub no_button: Vec<LinkHandle>,
    pub no_battery: Vec<LinkHandle>,
    pub fail_scan_start: bool,
}

impl FakeRadio {
    pub fn drop_link(&mut self, link: LinkHandle) {
        self.connected[link.0 as usize] = false;
    }
}

impl RadioPort for FakeRadio {
    fn create_link(&mut self, address: TagAddress) -> Result<LinkHandle, RadioError> {
        self.links.push(address);
        self.connected.push(false);
        Ok(LinkHandle((self.links.len() - 1) as u8))
    }

    fn start_scan(&mut self, _mode: ScanMode) -> Result<(), RadioError> {
        if self.fail_scan_start {
            return Err(RadioError::ScanFailed);
        }
        self.scanning = true;
        self.scan_starts += 1;
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.scanning = false;
        self.scan_stops += 1;
        Ok(())
    }

    fn clear_scan_results(&mut self) {
        self.clears += 1;
    }

    fn is_scanning(&self) -> bool {
        self.scanning
    }

    fn connect(
        &mut self,
        link: LinkHandle,
        address: TagAddress,
        _timeout_ms: u32,
    ) -> Result<(), RadioError> {
        self.connect_calls.push(link);
        if self.failing.contains(&address) {
            return Err(RadioError::ConnectFailed);
        }
        self.connected[link.0 as usize] = true;
        Ok(())
    }

    fn is_connected(&self, link: LinkHandle) -> bool {
        self.connected.get(link.0 as usize).copied().unwrap_or(false)
    }

    fn disconnect(&mut self, link: LinkHandle) -> Result<(), RadioError> {
        self.drop_link(link);
        Ok(())
    }

    fn service(&mut self, link: LinkHandle, uuid: u16) -> Option<ServiceHandle> {
        match uuid {
            BATTERY_SVC if !self.no_battery.contains(&link) => {
                Some(ServiceHandle { start: 0x10, end: 0x14 })
            }
            BUTTON_SVC if !self.no_button.contains(&link) => {
                Some(ServiceHandle { start: 0x20, end: 0x26 })
            }
            _ => None,
        }
    }

    fn characteristic(
        &mut self,
        _link: LinkHandle,
        _service: &ServiceHandle,
        uuid: u16,
    ) -> Option<CharHandle> {
        match uuid {
            BATTERY_CHR => Some(CharHandle { value: 0x12, properties: PROP_READ }),
            BUTTON_CHR => Some(CharHandle { value: 0x25, properties: PROP_NOTIFY }),
            _ => None,
        }
    }

    fn read(
        &mut self,
        link: LinkHandle,
        _characteristic: &CharHandle,
    ) -> Result<heapless::Vec<u8, READ_CAP>, RadioError> {
        let bytes = self.battery.get(&link.0).cloned().unwrap_or_else(|| vec![87]);
        heapless::Vec::from_slice(&bytes).map_err(|_| RadioError::ReadFailed)
    }

    fn subscribe(
        &mut self,
        link: LinkHandle,
        characteristic: &CharHandle,
    ) -> Result<NotifyHandle, RadioError> {
        Ok(NotifyHandle { link, attr: characteristic.value })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

#[derive(Default)]
pub struct RecordingFeedback {
    pub beeps: Vec<u32>,
    pub presence: Option<bool>,
}

impl FeedbackPort for RecordingFeedback {
    fn activate_for(&mut self, duration_ms: u32) {
        self.beeps.push(duration_ms);
    }

    fn set_presence(&mut self, on: bool) {
        self.presence = Some(on);
    }

    fn advance(&mut self, _elapsed_ms: u32) {}
}
