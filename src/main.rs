//! iTag tracker firmware: main entry point.
//!
//! Hexagonal architecture with a fixed-period cooperative main cycle.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NimbleRadio       FeedbackAdapter        LogEventSink         │
//! │  (RadioPort)       (FeedbackPort)         (EventSink)          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            TrackerService (pure logic)                 │    │
//! │  │  Registry · Scan · Connections · Dispatch              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  RADIO_EVENTS (NimBLE callbacks → main cycle) · Watchdog       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_hal::ledc::config::TimerConfig;
use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use log::{info, warn};

use itagfinder::adapters::feedback::FeedbackAdapter;
use itagfinder::adapters::log_sink::LogEventSink;
use itagfinder::adapters::nimble::{GATT_BUDGET_PER_TAG_MS, NimbleRadio};
use itagfinder::app::service::TrackerService;
use itagfinder::config::TrackerConfig;
use itagfinder::drivers::buzzer::Buzzer;
use itagfinder::drivers::presence_led::PresenceLed;
use itagfinder::drivers::watchdog::{Watchdog, stall_budget_ms};
use itagfinder::error::Error;
use itagfinder::events::RADIO_EVENTS;
use itagfinder::pins;
use itagfinder::scheduler::Cadence;

/// Interval between status snapshots on the console.
const SNAPSHOT_PERIOD_MS: u32 = 60_000;

fn load_config() -> TrackerConfig {
    match option_env!("ITAGFINDER_CONFIG") {
        Some(json) => match TrackerConfig::from_json(json) {
            Ok(cfg) => {
                info!("Config loaded from ITAGFINDER_CONFIG");
                cfg
            }
            Err(e) => {
                warn!("ITAGFINDER_CONFIG rejected ({}), using defaults", e);
                TrackerConfig::default()
            }
        },
        None => TrackerConfig::default(),
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("iTag tracker v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config();
    config.validate().map_err(Error::from)?;
    for (i, tag) in config.tags.iter().enumerate() {
        info!("Tag {}: {}", i, tag);
    }

    // ── 2. Feedback outputs ───────────────────────────────────
    let peripherals = Peripherals::take()?;
    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::new()
            .frequency(Hertz(pins::BUZZER_PWM_FREQ_HZ))
            .resolution(Resolution::Bits8),
    )?;
    // SAFETY: each GPIO is claimed exactly once, here.
    let buzzer_pin = unsafe { AnyOutputPin::new(pins::BUZZER_GPIO) };
    let led_pin = unsafe { AnyOutputPin::new(pins::PRESENCE_LED_GPIO) };

    let pwm = LedcDriver::new(peripherals.ledc.channel0, &timer, buzzer_pin)?;
    let led = PinDriver::output(led_pin)?;
    let mut feedback = FeedbackAdapter::new(Buzzer::new(pwm), PresenceLed::new(led));

    // ── 3. Radio + tracker ────────────────────────────────────
    let mut radio = NimbleRadio::new(config.scan).map_err(Error::from)?;
    let mut sink = LogEventSink::new();

    let cycle_ms = config.cycle_period_ms;
    let watchdog = Watchdog::new(stall_budget_ms(
        config.tags.len(),
        config.connect_timeout_ms,
        GATT_BUDGET_PER_TAG_MS,
    ));

    let mut status = Cadence::new("status-snapshot", SNAPSHOT_PERIOD_MS / cycle_ms.max(1));
    let mut tracker = TrackerService::new(config, &mut radio)?;
    tracker.start(&mut radio, &mut sink);

    info!("System ready. Entering main cycle ({} ms).", cycle_ms);

    // ── 4. Main cycle ─────────────────────────────────────────
    loop {
        tracker.tick(&RADIO_EVENTS, &mut radio, &mut feedback, &mut sink);
        watchdog.feed();

        if status.tick() {
            match serde_json::to_string(&tracker.snapshot()) {
                Ok(json) => info!("STATUS | {}", json),
                Err(e) => warn!("Snapshot encode failed: {}", e),
            }
        }

        FreeRtos::delay_ms(cycle_ms);
    }
}
