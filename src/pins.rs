//! GPIO / peripheral pin assignments for the tracker board.
//!
//! Single source of truth: the device binary references this module rather
//! than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Buzzer (passive piezo on an LEDC channel)
// ---------------------------------------------------------------------------

pub const BUZZER_GPIO: i32 = 25;
/// LEDC base frequency for the buzzer tone.
pub const BUZZER_PWM_FREQ_HZ: u32 = 2_000;

// ---------------------------------------------------------------------------
// Presence indicator
// ---------------------------------------------------------------------------

/// On-board LED, active HIGH.
pub const PRESENCE_LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  8-bit gives 0 – 255 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;
