//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to              |
//! |----------------|--------------------|--------------------------|
//! | `feedback`     | FeedbackPort       | LEDC buzzer, GPIO LED    |
//! | `log_sink`     | EventSink          | Serial log output        |
//! | `nimble`       | RadioPort          | NimBLE central (espidf)  |
//! | `time`         | (clock source)     | ESP32 system timer       |

pub mod feedback;
pub mod log_sink;
#[cfg(target_os = "espidf")]
pub mod nimble;
pub mod time;
