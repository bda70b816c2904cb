//! Integration tests for the radio event queue feeding the main cycle.
//!
//! A full queue drops the newest event; the main cycle reports the
//! running drop count once per change and keeps working.

use itagfinder::app::events::AppEvent;
use itagfinder::app::service::TrackerService;
use itagfinder::config::{TagAddress, TrackerConfig};
use itagfinder::events::{RADIO_QUEUE_CAP, RadioEvent, RadioEventQueue};
use itagfinder::tracker::TagState;

use crate::mock_radio::{LogSink, MockFeedback, MockRadio};

const A: &str = "ff:ff:11:11:a2:fa";

fn setup() -> (TrackerService, MockRadio, MockFeedback, LogSink) {
    let mut radio = MockRadio::new();
    let mut sink = LogSink::new();
    let config = TrackerConfig::with_tags(&[A]).unwrap();
    let mut svc = TrackerService::new(config, &mut radio).unwrap();
    svc.start(&mut radio, &mut sink);
    (svc, radio, MockFeedback::default(), sink)
}

#[test]
fn overflow_is_reported_once_per_change() {
    let (mut svc, mut radio, mut fb, mut sink) = setup();
    let queue = RadioEventQueue::new();
    let stranger: TagAddress = "00:00:00:00:00:01".parse().unwrap();

    for _ in 0..RADIO_QUEUE_CAP + 3 {
        queue.push(RadioEvent::Advertisement(stranger));
    }
    assert_eq!(queue.dropped(), 3);

    svc.tick(&queue, &mut radio, &mut fb, &mut sink);
    svc.tick(&queue, &mut radio, &mut fb, &mut sink);

    assert!(queue.is_empty());
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::EventsDropped { .. })),
        1
    );
    assert!(sink.events.contains(&AppEvent::EventsDropped { total: 3 }));
    assert_eq!(svc.snapshot().events_dropped, 3);
}

#[test]
fn events_queued_before_overflow_are_still_applied() {
    let (mut svc, mut radio, mut fb, mut sink) = setup();
    let queue = RadioEventQueue::new();
    let a: TagAddress = A.parse().unwrap();

    assert!(queue.push(RadioEvent::Advertisement(a)));
    while queue.push(RadioEvent::ScanEnded) {}

    svc.tick(&queue, &mut radio, &mut fb, &mut sink);

    assert_eq!(svc.registry().get(0).unwrap().state(), TagState::Connected);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::ScanEnded)),
        RADIO_QUEUE_CAP - 1
    );
}

#[test]
fn queue_drains_in_arrival_order() {
    let queue = RadioEventQueue::new();
    let a: TagAddress = A.parse().unwrap();
    queue.push(RadioEvent::ScanEnded);
    queue.push(RadioEvent::Advertisement(a));

    let mut seen = Vec::new();
    queue.drain(|e| seen.push(e));
    assert_eq!(seen, vec![RadioEvent::ScanEnded, RadioEvent::Advertisement(a)]);
    assert_eq!(queue.len(), 0);
}
