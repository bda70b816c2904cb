//! Presence indicator LED.
//!
//! Lit while at least one tag is advertised.  The main cycle sets it every
//! tick; the pin is only written when the level actually changes.

use embedded_hal::digital::{Error as _, OutputPin};
use log::warn;

pub struct PresenceLed<P: OutputPin> {
    pin: P,
    lit: Option<bool>,
}

impl<P: OutputPin> PresenceLed<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, lit: None }
    }

    pub fn set(&mut self, on: bool) {
        if self.lit == Some(on) {
            return;
        }
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.lit = Some(on),
            Err(e) => warn!("Presence LED write failed: {:?}", e.kind()),
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit == Some(true)
    }
}
