//! System configuration parameters
//!
//! The tag table, GATT identifiers, timing, and policy switches.  All of
//! it is fixed at startup: either the compiled-in defaults or a JSON
//! document handed to [`TrackerConfig::from_json`].  Nothing is changed
//! at runtime.

use core::fmt;
use core::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Capacity of the tag registry.
pub const MAX_TAGS: usize = 8;

// ---------------------------------------------------------------------------
// Tag address
// ---------------------------------------------------------------------------

/// A 48-bit Bluetooth device address in display order
/// (`ff:ff:11:11:a2:fa` → `[0xff, 0xff, 0x11, 0x11, 0xa2, 0xfa]`).
///
/// Equality is exact byte equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagAddress([u8; 6]);

impl TagAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Octets in over-the-air (little-endian) order, as NimBLE stores them.
    pub fn to_le_bytes(&self) -> [u8; 6] {
        let mut le = self.0;
        le.reverse();
        le
    }

    pub fn from_le_bytes(mut le: [u8; 6]) -> Self {
        le.reverse();
        Self(le)
    }
}

impl FromStr for TagAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or(ConfigError::InvalidAddress)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ConfigError::InvalidAddress);
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| ConfigError::InvalidAddress)?;
        }
        if parts.next().is_some() {
            return Err(ConfigError::InvalidAddress);
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for TagAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Serialize for TagAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use core::fmt::Write as _;
        let mut text: heapless::String<17> = heapless::String::new();
        write!(text, "{self}").map_err(|_| serde::ser::Error::custom("address overflow"))?;
        serializer.serialize_str(&text)
    }
}

struct TagAddressVisitor;

impl Visitor<'_> for TagAddressVisitor {
    type Value = TagAddress;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a colon-separated BLE address such as \"ff:ff:11:11:a2:fa\"")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<TagAddress, E> {
        v.parse().map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

impl<'de> Deserialize<'de> for TagAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(TagAddressVisitor)
    }
}

// ---------------------------------------------------------------------------
// GATT identifiers and scan parameters
// ---------------------------------------------------------------------------

/// A 16-bit service UUID and one of its characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GattIds {
    pub service: u16,
    pub characteristic: u16,
}

/// GAP discovery parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanParams {
    /// Scan interval (milliseconds)
    pub interval_ms: u16,
    /// Listening time within each interval (milliseconds)
    pub window_ms: u16,
    /// Request scan responses (faster discovery of iTags).
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Tracker configuration
// ---------------------------------------------------------------------------

/// Core tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    // --- Tags ---
    /// Hardware addresses of the known tags, in registry order.
    pub tags: heapless::Vec<TagAddress, MAX_TAGS>,

    // --- GATT ---
    /// Battery level (read once per connection, best effort).
    pub battery: GattIds,
    /// Button press notifications.
    pub button: GattIds,

    // --- Timing ---
    /// Main cycle period (milliseconds)
    pub cycle_period_ms: u32,
    /// Period between connect sweeps (milliseconds)
    pub connect_retry_ms: u32,
    /// Upper bound for a single connect attempt (milliseconds)
    pub connect_timeout_ms: u32,
    /// Minimum gap between two accepted button presses (strict, milliseconds)
    pub debounce_ms: u32,
    /// Beep length on an accepted button press (milliseconds)
    pub button_beep_ms: u32,
    /// Beep length on a connect attempt (milliseconds)
    pub connect_beep_ms: u32,

    // --- Scanning ---
    pub scan: ScanParams,

    // --- Policy ---
    /// Stop scanning once every tag has been seen.
    pub stop_scan_when_all_found: bool,
    /// Forget a tag's advertisement when it disconnects, so a fresh
    /// advertisement must confirm presence before reconnecting.
    pub clear_advertised_on_disconnect: bool,
    /// Long beep for each connect attempt.
    pub beep_on_connect_attempt: bool,
    /// Drive the presence LED from the advertised flags.
    pub presence_indicator: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        let mut tags = heapless::Vec::new();
        for octets in [
            [0xff, 0xff, 0x11, 0x11, 0xa2, 0xfa],
            [0xff, 0xff, 0x22, 0x21, 0xab, 0x11],
            [0xff, 0xff, 0x77, 0x70, 0x4b, 0xf0],
        ] {
            // Three defaults always fit in MAX_TAGS.
            let _ = tags.push(TagAddress::new(octets));
        }

        Self {
            tags,

            battery: GattIds {
                service: 0x180F,
                characteristic: 0x2A19,
            },
            button: GattIds {
                service: 0xFFE0,
                characteristic: 0xFFE1,
            },

            cycle_period_ms: 100,
            connect_retry_ms: 5_000,
            connect_timeout_ms: 10_000,
            debounce_ms: 500,
            button_beep_ms: 500,
            connect_beep_ms: 1_000,

            scan: ScanParams {
                interval_ms: 45,
                window_ms: 15,
                active: true,
            },

            stop_scan_when_all_found: false,
            clear_advertised_on_disconnect: true,
            beep_on_connect_attempt: true,
            presence_indicator: true,
        }
    }
}

impl ScanParams {
    /// Interval in controller units of 0.625 ms.
    pub fn interval_units(&self) -> u16 {
        ms_to_units(self.interval_ms)
    }

    /// Window in controller units of 0.625 ms.
    pub fn window_units(&self) -> u16 {
        ms_to_units(self.window_ms)
    }
}

fn ms_to_units(ms: u16) -> u16 {
    (u32::from(ms) * 16 / 10).min(u32::from(u16::MAX)) as u16
}

impl TrackerConfig {
    /// Default timings and policies with a custom tag table.
    pub fn with_tags(addresses: &[&str]) -> Result<Self, ConfigError> {
        let mut tags = heapless::Vec::new();
        for text in addresses {
            tags.push(text.parse()?).map_err(|_| ConfigError::TooManyTags)?;
        }
        let config = Self {
            tags,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Decode a JSON configuration and validate it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tag tables and timings the tracker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tags.is_empty() {
            return Err(ConfigError::NoTags);
        }
        for (i, a) in self.tags.iter().enumerate() {
            if self.tags[i + 1..].contains(a) {
                return Err(ConfigError::DuplicateAddress);
            }
        }
        if self.cycle_period_ms == 0 {
            return Err(ConfigError::InvalidTiming("cycle_period_ms"));
        }
        if self.connect_retry_ms < self.cycle_period_ms {
            return Err(ConfigError::InvalidTiming("connect_retry_ms"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidTiming("connect_timeout_ms"));
        }
        if self.debounce_ms < self.cycle_period_ms {
            return Err(ConfigError::InvalidTiming("debounce_ms"));
        }
        if self.scan.window_ms == 0 || self.scan.window_ms > self.scan.interval_ms {
            return Err(ConfigError::InvalidTiming("scan.window_ms"));
        }
        Ok(())
    }

    /// Number of main-cycle ticks between connect sweeps (at least 1).
    pub fn connect_sweep_ticks(&self) -> u32 {
        (self.connect_retry_ms / self.cycle_period_ms.max(1)).max(1)
    }
}
