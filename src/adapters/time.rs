//! ESP32 time adapter.
//!
//! Provides the monotonic millisecond clock used to stamp notifications.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` for
//!   host-side testing and simulation.

/// Milliseconds since boot, truncated to `u32` (wraps after ~49.7 days).
#[cfg(target_os = "espidf")]
pub fn uptime_ms() -> u32 {
    // SAFETY: esp_timer_get_time has no preconditions once the system is up.
    ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1000) as u32
}

/// Milliseconds since the first call, truncated to `u32`.
#[cfg(not(target_os = "espidf"))]
pub fn uptime_ms() -> u32 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_millis() as u32
}
