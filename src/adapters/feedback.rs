//! Feedback adapter: bridges the buzzer and presence LED to [`FeedbackPort`].
//!
//! Owns both output drivers.  On non-espidf targets the drivers are built
//! over fake pins, so this adapter is exercised the same way in tests.

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;

use crate::app::ports::FeedbackPort;
use crate::drivers::buzzer::Buzzer;
use crate::drivers::presence_led::PresenceLed;

/// Concrete adapter that combines the feedback outputs behind one port.
pub struct FeedbackAdapter<B: SetDutyCycle, L: OutputPin> {
    buzzer: Buzzer<B>,
    led: PresenceLed<L>,
}

impl<B: SetDutyCycle, L: OutputPin> FeedbackAdapter<B, L> {
    pub fn new(buzzer: Buzzer<B>, led: PresenceLed<L>) -> Self {
        Self { buzzer, led }
    }

    pub fn buzzer(&self) -> &Buzzer<B> {
        &self.buzzer
    }

    pub fn led(&self) -> &PresenceLed<L> {
        &self.led
    }
}

impl<B: SetDutyCycle, L: OutputPin> FeedbackPort for FeedbackAdapter<B, L> {
    fn activate_for(&mut self, duration_ms: u32) {
        self.buzzer.beep(duration_ms);
    }

    fn set_presence(&mut self, on: bool) {
        self.led.set(on);
    }

    fn advance(&mut self, elapsed_ms: u32) {
        self.buzzer.advance(elapsed_ms);
    }
}
