//! End-to-end tracker scenarios: registry → scan → connect → dispatch.
//!
//! Each test drives `TrackerService::tick` exactly as the device main
//! cycle does, with the mock radio standing in for NimBLE.

use itagfinder::app::events::AppEvent;
use itagfinder::app::ports::{LinkHandle, NotifyHandle, RadioPort, ScanMode};
use itagfinder::app::service::TrackerService;
use itagfinder::config::{TagAddress, TrackerConfig};
use itagfinder::error::RadioError;
use itagfinder::events::{RadioEvent, RadioEventQueue};
use itagfinder::tracker::TagState;

use crate::mock_radio::{BATTERY_VALUE_HANDLE, BUTTON_VALUE_HANDLE, LogSink, MockFeedback, MockRadio, RadioCall};

const A: &str = "ff:ff:11:11:a2:fa";
const B: &str = "ff:ff:22:21:ab:11";
const LINK_A: LinkHandle = LinkHandle(0);
const LINK_B: LinkHandle = LinkHandle(1);
const BUTTON_A: NotifyHandle = NotifyHandle {
    link: LINK_A,
    attr: BUTTON_VALUE_HANDLE,
};

fn addr(text: &str) -> TagAddress {
    text.parse().unwrap()
}

struct Rig {
    svc: TrackerService,
    radio: MockRadio,
    fb: MockFeedback,
    sink: LogSink,
    queue: RadioEventQueue,
}

impl Rig {
    fn new(config: TrackerConfig) -> Self {
        let mut radio = MockRadio::new();
        let mut sink = LogSink::new();
        let mut svc = TrackerService::new(config, &mut radio).unwrap();
        svc.start(&mut radio, &mut sink);
        Self {
            svc,
            radio,
            fb: MockFeedback::default(),
            sink,
            queue: RadioEventQueue::new(),
        }
    }

    fn two_tags() -> Self {
        Self::new(TrackerConfig::with_tags(&[A, B]).unwrap())
    }

    fn advertise(&self, text: &str) {
        self.queue.push(RadioEvent::Advertisement(addr(text)));
    }

    fn press(&self, handle: NotifyHandle, at_ms: u32) {
        self.queue.push(RadioEvent::Notification {
            handle,
            payload: heapless::Vec::new(),
            at_ms,
        });
    }

    fn tick(&mut self) {
        self.radio.deliver(&self.queue);
        self.svc
            .tick(&self.queue, &mut self.radio, &mut self.fb, &mut self.sink);
    }

    fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    fn state(&self, index: usize) -> TagState {
        self.svc.registry().get(index).unwrap().state()
    }

    fn presses(&self) -> usize {
        self.sink
            .count(|e| matches!(e, AppEvent::ButtonPressed { .. }))
    }

    /// Tag A advertised and connected on the first tick.
    fn with_a_connected() -> Self {
        let mut rig = Self::two_tags();
        rig.advertise(A);
        rig.tick();
        assert_eq!(rig.state(0), TagState::Connected);
        rig
    }
}

// ── Scenario 1: advertise → connect → battery → subscribe ────

#[test]
fn advertised_tag_is_connected_and_subscribed_on_first_tick() {
    let mut rig = Rig::two_tags();
    assert_eq!(rig.radio.calls, vec![RadioCall::StartScan(ScanMode::Continuous)]);

    rig.advertise(A);
    rig.tick();

    let tag = rig.svc.registry().get(0).unwrap();
    assert_eq!(tag.state(), TagState::Connected);
    assert!(tag.is_advertised());
    assert_eq!(tag.notify(), Some(BUTTON_A));
    assert_eq!(tag.battery_percent(), Some(87));
    assert_eq!(rig.fb.presence, Some(true));

    assert!(rig.radio.calls.contains(&RadioCall::Connect(LINK_A)));
    assert!(rig.radio.calls.contains(&RadioCall::Read(LINK_A, BATTERY_VALUE_HANDLE)));
    assert!(rig.radio.calls.contains(&RadioCall::Subscribe(LINK_A, BUTTON_VALUE_HANDLE)));
    assert_eq!(rig.radio.connect_count(LINK_B), 0, "tag B never advertised");

    assert_eq!(rig.fb.beeps, vec![1000], "connect-attempt beep");
    assert!(rig.sink.events.contains(&AppEvent::Battery { tag: 0, percent: 87 }));
    assert!(rig.sink.events.contains(&AppEvent::ButtonSubscribed { tag: 0 }));
}

#[test]
fn connect_yields_radio_back_to_scanning_on_next_tick() {
    let mut rig = Rig::with_a_connected();
    assert!(rig.svc.scan_restart_pending());

    rig.radio.clear_calls();
    rig.tick();

    assert!(!rig.svc.scan_restart_pending());
    assert_eq!(
        rig.radio.calls,
        vec![
            RadioCall::StopScan,
            RadioCall::ClearResults,
            RadioCall::StartScan(ScanMode::Continuous),
        ]
    );
    assert!(rig.radio.is_scanning());
    assert_eq!(rig.state(0), TagState::Connected);
}

// ── Scenario 2: debounce ──────────────────────────────────────

#[test]
fn presses_200ms_apart_raise_one_event() {
    let mut rig = Rig::with_a_connected();
    rig.fb.beeps.clear();

    rig.press(BUTTON_A, 20_000);
    rig.press(BUTTON_A, 20_200);
    rig.tick();

    assert_eq!(rig.presses(), 1);
    assert_eq!(rig.fb.beeps, vec![500]);
    assert!(rig.sink.events.contains(&AppEvent::ButtonPressed {
        tag: 0,
        address: addr(A),
        at_ms: 20_000,
    }));
    assert_eq!(rig.svc.snapshot().presses_suppressed, 1);
}

#[test]
fn press_just_past_window_is_accepted() {
    let mut rig = Rig::with_a_connected();

    rig.press(BUTTON_A, 20_000);
    rig.press(BUTTON_A, 20_500);
    rig.press(BUTTON_A, 20_501);
    rig.tick();

    assert_eq!(rig.presses(), 2);
    let tag = rig.svc.registry().get(0).unwrap();
    assert_eq!(tag.last_button_ms(), Some(20_501));
}

#[test]
fn replayed_stream_yields_same_count_per_window() {
    let mut rig = Rig::with_a_connected();
    let stream = [0u32, 100, 300, 600, 700, 1200, 1250];

    for t in stream {
        rig.press(BUTTON_A, 50_000 + t);
    }
    rig.tick();
    let first = rig.presses();

    for t in stream {
        rig.press(BUTTON_A, 60_000 + t);
    }
    rig.tick();
    assert_eq!(rig.presses(), first * 2);
    assert_eq!(first, 3);
}

// ── Scenario 3: disconnect ────────────────────────────────────

#[test]
fn disconnect_clears_tag_and_requests_restart() {
    let mut rig = Rig::with_a_connected();
    rig.tick();

    rig.radio.peer_lost(LINK_A);
    rig.radio.deliver(&rig.queue);
    let event = rig.queue.pop().unwrap();
    rig.svc.handle_event(event, &rig.radio, &mut rig.fb, &mut rig.sink);

    let tag = rig.svc.registry().get(0).unwrap();
    assert!(!tag.is_advertised());
    assert_eq!(tag.notify(), None);
    assert_eq!(tag.battery_percent(), None);
    assert_eq!(tag.state(), TagState::Idle);
    assert!(rig.svc.scan_restart_pending());
    assert!(rig.sink.events.contains(&AppEvent::Disconnected {
        tag: 0,
        address: addr(A),
    }));

    rig.radio.clear_calls();
    rig.tick();
    assert_eq!(rig.fb.presence, Some(false), "no other tag advertised");
    assert!(rig.radio.calls.contains(&RadioCall::StartScan(ScanMode::Continuous)));
}

#[test]
fn presence_stays_on_while_another_tag_is_advertised() {
    let mut rig = Rig::two_tags();
    rig.radio.refuse.insert(addr(B));
    rig.advertise(A);
    rig.advertise(B);
    rig.tick();

    rig.radio.peer_lost(LINK_A);
    rig.tick();

    assert_eq!(rig.state(0), TagState::Idle);
    assert_eq!(rig.state(1), TagState::Advertised);
    assert_eq!(rig.fb.presence, Some(true));
}

#[test]
fn disconnected_tag_is_not_reconnected_until_seen_again() {
    let mut rig = Rig::with_a_connected();
    rig.radio.peer_lost(LINK_A);
    rig.ticks(100);
    assert_eq!(rig.radio.connect_count(LINK_A), 1);

    rig.advertise(A);
    rig.ticks(50);
    assert_eq!(rig.radio.connect_count(LINK_A), 2);
    assert_eq!(rig.state(0), TagState::Connected);
}

#[test]
fn silent_link_loss_is_treated_as_disconnect_on_sweep() {
    let mut rig = Rig::with_a_connected();
    rig.radio.peer_lost_silently(LINK_A);

    rig.ticks(49);
    assert_eq!(rig.state(0), TagState::Connected, "not noticed before the sweep");

    rig.tick();
    assert_eq!(rig.state(0), TagState::Idle);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::Disconnected { tag: 0, .. })),
        1
    );
}

#[test]
fn keep_advertised_policy_reconnects_on_next_sweep() {
    let mut config = TrackerConfig::with_tags(&[A, B]).unwrap();
    config.clear_advertised_on_disconnect = false;
    let mut rig = Rig::new(config);
    rig.advertise(A);
    rig.tick();

    rig.radio.peer_lost(LINK_A);
    rig.tick();
    assert_eq!(rig.state(0), TagState::Advertised);
    assert_eq!(rig.svc.registry().get(0).unwrap().notify(), None);

    rig.ticks(49);
    assert_eq!(rig.radio.connect_count(LINK_A), 2);
    assert_eq!(rig.state(0), TagState::Connected);
}

#[test]
fn disconnect_event_arriving_after_reconnect_is_ignored() {
    let mut config = TrackerConfig::with_tags(&[A, B]).unwrap();
    config.clear_advertised_on_disconnect = false;
    let mut rig = Rig::new(config);
    rig.advertise(A);
    rig.tick();

    // Link drops; the sweep notices and reconnects before the
    // disconnect event reaches the queue.
    rig.radio.peer_lost_silently(LINK_A);
    rig.ticks(50);
    assert_eq!(rig.radio.connect_count(LINK_A), 2);
    assert_eq!(rig.state(0), TagState::Connected);

    rig.queue.push(RadioEvent::Disconnected(LINK_A));
    rig.press(BUTTON_A, 60_000);
    rig.tick();

    let tag = rig.svc.registry().get(0).unwrap();
    assert_eq!(tag.state(), TagState::Connected);
    assert_eq!(tag.notify(), Some(BUTTON_A));
    assert_eq!(rig.presses(), 1);
}

// ── Scenario 4: connect failure ───────────────────────────────

#[test]
fn failed_connect_keeps_tag_advertised_and_retries_on_cadence() {
    let mut rig = Rig::two_tags();
    rig.radio.refuse.insert(addr(B));
    rig.advertise(A);
    rig.advertise(B);
    rig.tick();

    assert_eq!(rig.state(0), TagState::Connected);
    assert_eq!(rig.state(1), TagState::Advertised);
    assert!(rig.sink.events.contains(&AppEvent::ConnectFailed {
        tag: 1,
        address: addr(B),
        error: RadioError::ConnectFailed,
    }));

    rig.ticks(49);
    assert_eq!(rig.radio.connect_count(LINK_B), 1, "no retry before 5 s");

    rig.tick();
    assert_eq!(rig.radio.connect_count(LINK_B), 2);
    assert_eq!(rig.radio.connect_count(LINK_A), 1, "connected tag left alone");

    rig.ticks(100);
    assert_eq!(rig.radio.connect_count(LINK_B), 4, "one attempt per sweep");
    assert_eq!(rig.svc.snapshot().connect_failures, 4);
}

#[test]
fn connect_that_never_comes_up_counts_as_failure() {
    let mut rig = Rig::two_tags();
    rig.radio.silent.insert(addr(A));
    rig.advertise(A);
    rig.tick();

    assert_eq!(rig.state(0), TagState::Advertised);
    assert!(rig.sink.events.contains(&AppEvent::ConnectFailed {
        tag: 0,
        address: addr(A),
        error: RadioError::LinkUnavailable,
    }));
}

#[test]
fn late_connect_is_adopted_with_battery_and_button() {
    let mut rig = Rig::two_tags();
    rig.radio.silent.insert(addr(A));
    rig.advertise(A);
    rig.tick();
    assert_eq!(rig.state(0), TagState::Advertised);

    rig.radio.silent.clear();
    rig.radio.late_connect(LINK_A);
    rig.ticks(50);

    let tag = rig.svc.registry().get(0).unwrap();
    assert_eq!(tag.state(), TagState::Connected);
    assert_eq!(tag.notify(), Some(BUTTON_A));
    assert_eq!(tag.battery_percent(), Some(87));
    assert_eq!(rig.radio.connect_count(LINK_A), 1, "adopted, not reconnected");

    rig.press(BUTTON_A, 40_000);
    rig.tick();
    assert_eq!(rig.presses(), 1);
}

// ── Scenario 5: stale / unknown handles ───────────────────────

#[test]
fn notification_on_unbound_handle_changes_nothing() {
    let mut rig = Rig::with_a_connected();
    let before = rig.svc.snapshot().tags;

    rig.press(NotifyHandle { link: LINK_B, attr: BUTTON_VALUE_HANDLE }, 30_000);
    rig.press(NotifyHandle { link: LINK_A, attr: 0x99 }, 30_000);
    rig.tick();

    assert_eq!(rig.presses(), 0);
    assert_eq!(rig.svc.snapshot().tags, before);
    assert!(rig.fb.beeps.iter().all(|&b| b != 500));
}

#[test]
fn handle_from_previous_connection_is_discarded() {
    let mut rig = Rig::with_a_connected();
    rig.radio.peer_lost(LINK_A);
    rig.tick();

    rig.press(BUTTON_A, 40_000);
    rig.tick();

    assert_eq!(rig.presses(), 0);
    assert_eq!(rig.svc.registry().get(0).unwrap().last_button_ms(), None);
}

// ── Scan coordination ─────────────────────────────────────────

#[test]
fn unknown_and_repeated_advertisements_are_ignored() {
    let mut rig = Rig::two_tags();
    rig.radio.refuse.insert(addr(A));
    rig.advertise("00:11:22:33:44:55");
    rig.advertise(A);
    rig.advertise(A);
    rig.tick();

    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::TagDiscovered { .. })),
        1
    );
    assert_eq!(rig.state(1), TagState::Idle);
}

#[test]
fn advertisement_mid_period_waits_for_next_sweep() {
    let mut rig = Rig::two_tags();
    rig.tick();
    rig.advertise(A);
    rig.ticks(49);
    assert_eq!(rig.state(0), TagState::Advertised);
    assert_eq!(rig.radio.connect_count(LINK_A), 0);

    rig.tick();
    assert_eq!(rig.radio.connect_count(LINK_A), 1);
}

#[test]
fn early_stop_policy_stops_scan_once_all_seen() {
    let mut config = TrackerConfig::with_tags(&[A, B]).unwrap();
    config.stop_scan_when_all_found = true;
    config.beep_on_connect_attempt = false;
    let mut rig = Rig::new(config);
    rig.radio.refuse.insert(addr(A));
    rig.radio.refuse.insert(addr(B));

    rig.tick();
    rig.advertise(A);
    rig.advertise(B);
    rig.radio.clear_calls();
    rig.tick();

    assert_eq!(rig.radio.calls, vec![RadioCall::StopScan]);
    assert!(rig.sink.events.contains(&AppEvent::ScanStoppedAllFound));
    assert!(rig.fb.beeps.is_empty());
}

#[test]
fn sweep_restarts_a_scan_that_died() {
    let mut rig = Rig::two_tags();
    rig.tick();
    rig.radio.stop_scan().unwrap();
    rig.radio.clear_calls();

    rig.ticks(50);
    assert_eq!(rig.radio.scan_starts(), 1);
}

#[test]
fn button_without_notify_leaves_tag_connected_unsubscribed() {
    let mut rig = Rig::two_tags();
    rig.radio.button_without_notify = true;
    rig.advertise(A);
    rig.tick();

    let tag = rig.svc.registry().get(0).unwrap();
    assert_eq!(tag.state(), TagState::Connected);
    assert_eq!(tag.notify(), None);
    assert!(rig.sink.events.contains(&AppEvent::ButtonUnavailable {
        tag: 0,
        error: RadioError::NotifyUnsupported,
    }));
}

#[test]
fn feedback_timer_advances_one_period_per_tick() {
    let mut rig = Rig::two_tags();
    rig.ticks(7);
    assert_eq!(rig.fb.advanced_ms, 700);
    assert_eq!(rig.svc.tick_count(), 7);
}
