//! Unified error types for the ItagFinder firmware.
//!
//! A single `Error` enum that every subsystem can convert into.  All
//! variants are `Copy` so they can be passed through the tracker and the
//! port traits without allocation.
//!
//! None of these are fatal inside the main cycle: radio errors are logged
//! and retried on the natural cadence, configuration errors stop the boot.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The BLE stack rejected or failed an operation.
    Radio(RadioError),
    /// The tag table or timing parameters are unusable.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Radio errors
// ---------------------------------------------------------------------------

/// Transient failures reported by a [`RadioPort`](crate::app::ports::RadioPort).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Scan could not be started or stopped.
    ScanFailed,
    /// The peer did not accept the connection.
    ConnectFailed,
    /// The connect attempt did not complete within the configured bound.
    ConnectTimeout,
    /// The requested primary service is not exposed by the peer.
    ServiceNotFound,
    /// The service exists but lacks the requested characteristic.
    CharacteristicNotFound,
    /// Reading a characteristic value failed or returned no data.
    ReadFailed,
    /// The characteristic does not have the notify property.
    NotifyUnsupported,
    /// Writing the CCCD / registering for notifications failed.
    SubscribeFailed,
    /// The link handle is unknown or not connected.
    LinkUnavailable,
    /// Raw NimBLE return code.
    Stack(i32),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanFailed => write!(f, "scan failed"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::ConnectTimeout => write!(f, "connect timed out"),
            Self::ServiceNotFound => write!(f, "service not found"),
            Self::CharacteristicNotFound => write!(f, "characteristic not found"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::NotifyUnsupported => write!(f, "characteristic cannot notify"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
            Self::LinkUnavailable => write!(f, "link unavailable"),
            Self::Stack(rc) => write!(f, "NimBLE error rc={rc}"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A hardware address is not six colon-separated hex octets.
    InvalidAddress,
    /// The same address appears twice in the tag table.
    DuplicateAddress,
    /// More tags than the registry can hold.
    TooManyTags,
    /// The tag table is empty.
    NoTags,
    /// A period or duration is zero or inconsistent with the cycle period.
    InvalidTiming(&'static str),
    /// The serialized configuration could not be decoded.
    Malformed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress => write!(f, "invalid tag address"),
            Self::DuplicateAddress => write!(f, "duplicate tag address"),
            Self::TooManyTags => write!(f, "too many tags"),
            Self::NoTags => write!(f, "no tags configured"),
            Self::InvalidTiming(what) => write!(f, "invalid timing: {what}"),
            Self::Malformed => write!(f, "malformed configuration"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
