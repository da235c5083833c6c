//! Fuzz target: `parse_portal_form`
//!
//! Any client on the soft AP can POST to the portal.  Asserts that form
//! parsing never panics and accepted credentials respect the WiFi limits.
//!
//! cargo fuzz run fuzz_portal_form

#![no_main]

use libfuzzer_sys::fuzz_target;
use plantops::adapters::wifi::parse_portal_form;

fuzz_target!(|data: &[u8]| {
    let Ok(body) = core::str::from_utf8(data) else {
        return;
    };
    if let Ok(creds) = parse_portal_form(body) {
        assert!(!creds.ssid.is_empty() && creds.ssid.len() <= 32);
        let pass = creds.password.len();
        assert!(pass == 0 || (8..=64).contains(&pass));
    }
});
