//! Tick-driven cadences for the main cycle.
//!
//! The main cycle runs at a fixed period.  Slower periodic work (the
//! connect sweep and scan confirmation) is expressed as a [`Cadence`]
//! counted in main-cycle ticks, so it never needs a clock of its own and
//! stays in lock-step with the cycle even if a tick runs long.
//!
//! ```text
//!  tick ─┬─ drain radio events
//!        ├─ service scan restart
//!        ├─ advance feedback timer
//!        ├─ Cadence(connect sweep) ──▶ every N ticks
//!        └─ presence indicator
//! ```

use log::debug;

// ═══════════════════════════════════════════════════════════════
//  Cadence
// ═══════════════════════════════════════════════════════════════

/// Fires once every `period_ticks` calls to [`Cadence::tick`].
#[derive(Debug, Clone)]
pub struct Cadence {
    /// Human-readable label for logs.
    label: &'static str,
    period_ticks: u32,
    /// Ticks since the last fire.
    elapsed_ticks: u32,
    /// Fire on the very first tick instead of waiting a full period.
    fire_first: bool,
    fired_count: u32,
}

impl Cadence {
    /// A cadence that first fires after a full period.
    pub fn new(label: &'static str, period_ticks: u32) -> Self {
        Self {
            label,
            period_ticks: period_ticks.max(1),
            elapsed_ticks: 0,
            fire_first: false,
            fired_count: 0,
        }
    }

    /// A cadence that fires on the first tick, then every period.
    pub fn immediate(label: &'static str, period_ticks: u32) -> Self {
        Self {
            fire_first: true,
            ..Self::new(label, period_ticks)
        }
    }

    /// Advance by one tick.  Returns `true` when the cadence fires.
    pub fn tick(&mut self) -> bool {
        if self.fire_first {
            self.fire_first = false;
            return self.fire();
        }

        self.elapsed_ticks = self.elapsed_ticks.saturating_add(1);
        if self.elapsed_ticks >= self.period_ticks {
            return self.fire();
        }
        false
    }

    pub fn period_ticks(&self) -> u32 {
        self.period_ticks
    }

    /// Number of times this cadence has fired.
    pub fn fired_count(&self) -> u32 {
        self.fired_count
    }

    fn fire(&mut self) -> bool {
        self.elapsed_ticks = 0;
        self.fired_count = self.fired_count.wrapping_add(1);
        debug!("Cadence '{}' fired (#{})", self.label, self.fired_count);
        true
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
