//! Tag connection lifecycle: the tracker core.
//!
//! | Component                  | Owns                                      |
//! |----------------------------|-------------------------------------------|
//! | [`TagRegistry`]            | the fixed tag table and per-tag status    |
//! | [`ScanCoordinator`]        | scan start, deferred restart, early stop  |
//! | [`ConnectionManager`]      | connect sweep, disconnect handling        |
//! | [`NotificationDispatcher`] | button attribution and debounce           |
//!
//! None of these hold a radio or feedback handle; the main cycle passes the
//! ports in on every call.

pub mod connection;
pub mod dispatch;
pub mod registry;
pub mod scan;

#[cfg(test)]
pub(crate) mod testkit;

pub use connection::ConnectionManager;
pub use dispatch::{NotificationDispatcher, debounce_accepts};
pub use registry::{LinkState, Tag, TagRegistry, TagState};
pub use scan::ScanCoordinator;
