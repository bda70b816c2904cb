//! Fuzz target: `TrackerConfig::from_json` and `TagAddress` parsing
//!
//! Verifies:
//! - No panics under arbitrary input
//! - Any accepted config passes `validate()` and has a non-zero sweep period
//! - Every accepted address prints back to a string that parses to itself
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use itagfinder::config::{TagAddress, TrackerConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    if let Ok(address) = text.parse::<TagAddress>() {
        let printed = address.to_string();
        assert_eq!(printed.parse::<TagAddress>(), Ok(address));
    }

    if let Ok(config) = TrackerConfig::from_json(text) {
        assert!(config.validate().is_ok());
        assert!(config.connect_sweep_ticks() >= 1);
        for address in &config.tags {
            assert_eq!(address.to_string().parse::<TagAddress>(), Ok(*address));
        }
    }
});
