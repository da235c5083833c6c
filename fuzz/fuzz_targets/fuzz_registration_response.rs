//! Fuzz target: `parse_registration_response`
//!
//! The registration body comes from the network.  Asserts that parsing
//! never panics and that anything accepted fits a device identity.
//!
//! cargo fuzz run fuzz_registration_response

#![no_main]

use libfuzzer_sys::fuzz_target;
use plantops::app::model::DeviceIdentity;
use plantops::app::provisioner::parse_registration_response;

fuzz_target!(|data: &[u8]| {
    let Ok(parsed) = parse_registration_response(data) else {
        return;
    };

    let identity = DeviceIdentity::provisioned(
        "AA:BB:CC:DD:EE:FF",
        &parsed.device_id,
        &parsed.mqtt_username,
        &parsed.mqtt_password,
    )
    .expect("accepted response must build an identity");

    assert_eq!(identity.device_id(), parsed.device_id);
    assert_eq!(identity.mqtt_username(), parsed.mqtt_username);
    assert_eq!(identity.mqtt_password(), parsed.mqtt_password);
});
