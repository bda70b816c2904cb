//! Application core: tracker orchestration, zero I/O.
//!
//! The main cycle and its outbound events live here.  All interaction with
//! the radio and the buzzer/LED happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
