//! Piezo buzzer driver with a millisecond countdown.
//!
//! The buzzer sits on an LEDC channel at 2 kHz, 8-bit.  A beep sets a low
//! fixed duty and arms the countdown; the main cycle calls [`Buzzer::advance`]
//! once per period and the output is silenced when the countdown reaches
//! zero.  A new beep replaces the remaining time of the current one.
//!
//! ## Dual-target design
//!
//! Generic over `embedded_hal::pwm::SetDutyCycle`: on ESP-IDF this is an
//! `esp_idf_hal::ledc::LedcDriver`, on host a recording fake.

use embedded_hal::pwm::{Error as _, SetDutyCycle};
use log::warn;

/// Beep loudness as a fraction of full duty (10 / 255 on the 8-bit timer).
pub const BEEP_DUTY: (u16, u16) = (10, 255);

pub struct Buzzer<P: SetDutyCycle> {
    pwm: P,
    remaining_ms: u32,
    sounding: bool,
}

impl<P: SetDutyCycle> Buzzer<P> {
    pub fn new(pwm: P) -> Self {
        let mut buzzer = Self {
            pwm,
            remaining_ms: 0,
            sounding: false,
        };
        buzzer.silence();
        buzzer
    }

    /// Sound for `duration_ms`.  Zero silences immediately.
    pub fn beep(&mut self, duration_ms: u32) {
        if duration_ms == 0 {
            self.remaining_ms = 0;
            self.silence();
            return;
        }
        self.remaining_ms = duration_ms;
        if !self.sounding {
            let (num, denom) = BEEP_DUTY;
            match self.pwm.set_duty_cycle_fraction(num, denom) {
                Ok(()) => self.sounding = true,
                Err(e) => warn!("Buzzer duty set failed: {:?}", e.kind()),
            }
        }
    }

    /// Count down by `elapsed_ms`; silence when the countdown runs out.
    pub fn advance(&mut self, elapsed_ms: u32) {
        if self.remaining_ms == 0 {
            return;
        }
        self.remaining_ms = self.remaining_ms.saturating_sub(elapsed_ms);
        if self.remaining_ms == 0 {
            self.silence();
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding
    }

    pub fn remaining_ms(&self) -> u32 {
        self.remaining_ms
    }

    fn silence(&mut self) {
        match self.pwm.set_duty_cycle_fully_off() {
            Ok(()) => self.sounding = false,
            Err(e) => warn!("Buzzer off failed: {:?}", e.kind()),
        }
    }
}
