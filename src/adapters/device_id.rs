//! Stable hardware address of the node.
//!
//! The WiFi station MAC is burned into eFuse at the factory and never
//! changes, so it is the registration key before a device id exists.
//! Rendered as `AA:BB:CC:DD:EE:FF` by
//! [`format_hardware_address`](crate::app::model::format_hardware_address).

use crate::app::ports::MacAddress;

/// Read the WiFi station MAC.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    let rc = unsafe {
        esp_idf_svc::sys::esp_read_mac(
            mac.as_mut_ptr(),
            esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_WIFI_STA,
        )
    };
    if rc != esp_idf_svc::sys::ESP_OK {
        log::warn!("WiFi: esp_read_mac failed (rc={}), using eFuse default", rc);
        unsafe {
            esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
        }
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}
