//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text to `AppConfig::parse()`. A config that parses must
//! also pass validation again and survive a serialize / parse cycle.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = inkwell_config::AppConfig::parse(s) else {
        return;
    };
    assert!(config.validate().is_ok());
    if let Ok(rendered) = toml::to_string(&config) {
        let reparsed = inkwell_config::AppConfig::parse(&rendered);
        assert!(reparsed.is_ok(), "re-rendered config failed to parse: {rendered}");
    }
});
