//! Fuzz target: arbitrary radio event streams through the main cycle
//!
//! Each input byte pair becomes one radio event (or a tick).  Verifies:
//! - No panics for any ordering of connects, disconnects, and notifications
//! - A connected tag is always advertised
//! - A bound notify handle always belongs to the tag's own link
//!
//! cargo fuzz run fuzz_radio_events

#![no_main]

use itagfinder::app::events::AppEvent;
use itagfinder::app::ports::{
    CharHandle, EventSink, FeedbackPort, LinkHandle, NotifyHandle, PROP_NOTIFY, RadioPort,
    READ_CAP, ScanMode, ServiceHandle,
};
use itagfinder::app::service::TrackerService;
use itagfinder::config::{TagAddress, TrackerConfig};
use itagfinder::error::RadioError;
use itagfinder::events::{RadioEvent, RadioEventQueue};
use libfuzzer_sys::fuzz_target;

const TAGS: [&str; 3] = ["ff:ff:11:11:a2:fa", "ff:ff:22:21:ab:11", "ff:ff:77:70:4b:f0"];

/// Radio whose connect outcome is taken from the fuzz input.
struct ScriptRadio {
    up: [bool; 3],
    accept_next: bool,
    created: u8,
}

impl RadioPort for ScriptRadio {
    fn create_link(&mut self, _address: TagAddress) -> Result<LinkHandle, RadioError> {
        self.created += 1;
        Ok(LinkHandle(self.created - 1))
    }
    fn start_scan(&mut self, _mode: ScanMode) -> Result<(), RadioError> {
        Ok(())
    }
    fn stop_scan(&mut self) -> Result<(), RadioError> {
        Ok(())
    }
    fn clear_scan_results(&mut self) {}
    fn is_scanning(&self) -> bool {
        true
    }
    fn connect(&mut self, link: LinkHandle, _a: TagAddress, _t: u32) -> Result<(), RadioError> {
        if self.accept_next {
            self.up[link.0 as usize] = true;
            Ok(())
        } else {
            Err(RadioError::ConnectTimeout)
        }
    }
    fn is_connected(&self, link: LinkHandle) -> bool {
        self.up[link.0 as usize]
    }
    fn disconnect(&mut self, link: LinkHandle) -> Result<(), RadioError> {
        self.up[link.0 as usize] = false;
        Ok(())
    }
    fn service(&mut self, link: LinkHandle, _uuid: u16) -> Option<ServiceHandle> {
        self.up[link.0 as usize].then_some(ServiceHandle { start: 1, end: 0x30 })
    }
    fn characteristic(
        &mut self,
        _link: LinkHandle,
        _service: &ServiceHandle,
        uuid: u16,
    ) -> Option<CharHandle> {
        Some(CharHandle { value: uuid & 0xff, properties: PROP_NOTIFY | 0x02 })
    }
    fn read(
        &mut self,
        _link: LinkHandle,
        _ch: &CharHandle,
    ) -> Result<heapless::Vec<u8, READ_CAP>, RadioError> {
        Ok(heapless::Vec::from_slice(&[50]).unwrap_or_default())
    }
    fn subscribe(&mut self, link: LinkHandle, ch: &CharHandle) -> Result<NotifyHandle, RadioError> {
        Ok(NotifyHandle { link, attr: ch.value })
    }
}

struct Quiet;

impl FeedbackPort for Quiet {
    fn activate_for(&mut self, _ms: u32) {}
    fn set_presence(&mut self, _on: bool) {}
    fn advance(&mut self, _ms: u32) {}
}

impl EventSink for Quiet {
    fn emit(&mut self, _event: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let Ok(config) = TrackerConfig::with_tags(&TAGS) else {
        return;
    };
    let mut radio = ScriptRadio {
        up: [false; 3],
        accept_next: true,
        created: 0,
    };
    let Ok(mut svc) = TrackerService::new(config, &mut radio) else {
        return;
    };
    let queue = RadioEventQueue::new();
    let mut quiet = Quiet;
    let mut feedback = Quiet;
    svc.start(&mut radio, &mut quiet);

    let mut now: u32 = 0;
    for pair in data.chunks(2) {
        let op = pair[0];
        let arg = pair.get(1).copied().unwrap_or(0);
        let tag = (arg % 3) as usize;
        let link = LinkHandle(tag as u8);
        now = now.wrapping_add(u32::from(arg) * 7);

        match op % 6 {
            0 => {
                queue.push(RadioEvent::Advertisement(TAGS[tag].parse().unwrap()));
            }
            1 => {
                radio.up[tag] = false;
                queue.push(RadioEvent::Disconnected(link));
            }
            2 => {
                queue.push(RadioEvent::Connected(link));
            }
            3 => {
                queue.push(RadioEvent::Notification {
                    handle: NotifyHandle { link, attr: u16::from(arg) },
                    payload: heapless::Vec::new(),
                    at_ms: now,
                });
            }
            4 => radio.accept_next = arg & 1 == 0,
            _ => {
                for _ in 0..=arg % 64 {
                    svc.tick(&queue, &mut radio, &mut feedback, &mut quiet);
                }
            }
        }
    }
    svc.tick(&queue, &mut radio, &mut feedback, &mut quiet);

    for (i, tag) in svc.registry().iter().enumerate() {
        if tag.is_connected() {
            assert!(tag.is_advertised(), "tag {} connected without advert", i);
        }
        if let Some(handle) = tag.notify() {
            assert_eq!(handle.link, tag.link());
        }
    }
});
