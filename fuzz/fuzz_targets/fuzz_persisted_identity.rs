//! Fuzz target: `Provisioner::load_persisted`
//!
//! Seeds the simulated NVS identity namespace with arbitrary field bytes
//! (including missing keys and invalid UTF-8) and asserts that restoring
//! never panics and never yields a half-provisioned identity.
//!
//! cargo fuzz run fuzz_persisted_identity

#![no_main]

use libfuzzer_sys::fuzz_target;
use plantops::adapters::http::HttpAdapter;
use plantops::adapters::nvs::NvsAdapter;
use plantops::app::ports::StoragePort;
use plantops::app::provisioner::{
    IDENTITY_NAMESPACE, KEY_DEVICE_ID, KEY_MQTT_PASS, KEY_MQTT_USER, Provisioner,
};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let Ok(mut nvs) = NvsAdapter::new() else {
        return;
    };

    // First byte: which keys exist.  Remaining bytes: split into three fields.
    let present = data[0];
    let rest = &data[1..];
    let third = rest.len() / 3;
    let fields = [
        (KEY_DEVICE_ID, &rest[..third]),
        (KEY_MQTT_USER, &rest[third..2 * third]),
        (KEY_MQTT_PASS, &rest[2 * third..]),
    ];
    for (bit, (key, value)) in fields.iter().enumerate() {
        if present & (1 << bit) != 0 {
            let _ = nvs.write(IDENTITY_NAMESPACE, key, value);
        }
    }

    let provisioner = Provisioner::new(nvs, HttpAdapter::new());
    if let Ok(identity) = provisioner.load_persisted("AA:BB:CC:DD:EE:FF") {
        if identity.is_provisioned() {
            assert!(!identity.mqtt_username().is_empty());
            assert!(!identity.mqtt_password().is_empty());
        } else {
            assert!(!provisioner.is_provisioned());
        }
    }
});
