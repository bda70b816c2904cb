//! Feedback output drivers and the task watchdog.

pub mod buzzer;
pub mod presence_led;
pub mod watchdog;
