//! System configuration parameters
//!
//! All tunable parameters for the PlantOps sensor node.
//! Values can be overridden via NVS (non-volatile storage); anything not
//! stored falls back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::drivers::watchdog::WATCHDOG_TIMEOUT_MS;

/// Length bound for host names stored in config.
pub const MAX_HOST_LEN: usize = 64;

/// Headroom kept between the worst blocking tick and the watchdog timeout.
pub const WATCHDOG_MARGIN_MS: u32 = 5_000;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Backend ---
    /// Registration backend host (IP or DNS name)
    pub backend_host: heapless::String<MAX_HOST_LEN>,
    /// Registration backend HTTP port
    pub backend_port: u16,

    // --- Broker ---
    /// MQTT broker host
    pub broker_host: heapless::String<MAX_HOST_LEN>,
    /// MQTT broker TLS port
    pub broker_port: u16,
    /// First topic segment, `{prefix}/{device_id}/...`
    pub topic_prefix: heapless::String<32>,
    /// Client identifier prefix, completed with the device id
    pub client_id_prefix: heapless::String<16>,
    /// Transport buffer size for one outgoing MQTT frame (bytes)
    pub publish_buffer_bytes: u16,

    // --- Provisioning portal ---
    /// Soft-AP name while collecting WiFi credentials
    pub portal_ap_name: heapless::String<32>,
    /// Portal lifetime before giving up (seconds)
    pub portal_timeout_secs: u32,

    // --- Timing ---
    /// Steady-state loop tick (milliseconds)
    pub tick_interval_ms: u32,
    /// Telemetry publish interval (milliseconds)
    pub telemetry_interval_ms: u32,
    /// Heartbeat publish interval (milliseconds)
    pub heartbeat_interval_ms: u32,
    /// How often a down link is re-checked (milliseconds)
    pub connectivity_recheck_ms: u32,
    /// Blocking wait after a link reconnect request (milliseconds)
    pub link_reconnect_wait_ms: u32,
    /// Minimum gap between broker reconnect attempts (milliseconds)
    pub broker_backoff_ms: u32,
    /// Bound on a single broker handshake (milliseconds)
    pub broker_handshake_timeout_ms: u32,
    /// Delay before a boot-fatal restart (milliseconds)
    pub boot_fatal_delay_ms: u32,

    // --- Factory reset ---
    /// Hold time on the reset input that arms a factory reset (milliseconds)
    pub reset_hold_ms: u32,

    // --- Soil calibration (hardware specific) ---
    /// Raw ADC reading at or below which soil counts as saturated (100%)
    pub soil_wet_raw: u16,
    /// Raw ADC reading at or above which soil counts as dry (0%)
    pub soil_dry_raw: u16,
}

fn fixed<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    // Defaults are compile-time literals well inside N.
    let _ = out.push_str(s);
    out
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Backend
            backend_host: fixed("192.168.1.100"),
            backend_port: 8000,

            // Broker
            broker_host: fixed("192.168.1.100"),
            broker_port: 8883, // TLS
            topic_prefix: fixed("devices"),
            client_id_prefix: fixed("plantops-"),
            publish_buffer_bytes: 512,

            // Portal
            portal_ap_name: fixed("PlantOps-Sensor"),
            portal_timeout_secs: 180, // 3 min

            // Timing
            tick_interval_ms: 100,
            telemetry_interval_ms: 60_000,
            heartbeat_interval_ms: 60_000,
            connectivity_recheck_ms: 5_000,
            link_reconnect_wait_ms: 5_000,
            broker_backoff_ms: 5_000,
            broker_handshake_timeout_ms: 10_000,
            boot_fatal_delay_ms: 30_000,

            // Factory reset
            reset_hold_ms: 10_000,

            // Soil calibration: capacitive probe reads ~4095 in air, ~1500 in water
            soil_wet_raw: 1500,
            soil_dry_raw: 4095,
        }
    }
}

impl SystemConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend_host.is_empty() {
            return Err(ConfigError::ValidationFailed("backend_host must not be empty"));
        }
        if self.broker_host.is_empty() {
            return Err(ConfigError::ValidationFailed("broker_host must not be empty"));
        }
        if self.backend_port == 0 || self.broker_port == 0 {
            return Err(ConfigError::ValidationFailed("ports must be 1–65535"));
        }
        if self.topic_prefix.is_empty() || self.topic_prefix.contains(['/', '#', '+']) {
            return Err(ConfigError::ValidationFailed(
                "topic_prefix must be a single non-wildcard segment",
            ));
        }
        if !(128..=4096).contains(&self.publish_buffer_bytes) {
            return Err(ConfigError::ValidationFailed(
                "publish_buffer_bytes must be 128–4096",
            ));
        }
        if !(30..=1800).contains(&self.portal_timeout_secs) {
            return Err(ConfigError::ValidationFailed(
                "portal_timeout_secs must be 30–1800",
            ));
        }
        if !(10..=1000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "tick_interval_ms must be 10–1000",
            ));
        }
        let periodic = [
            self.telemetry_interval_ms,
            self.heartbeat_interval_ms,
            self.connectivity_recheck_ms,
            self.broker_backoff_ms,
        ];
        if periodic.iter().any(|&p| p <= self.tick_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "periodic intervals must be longer than one tick",
            ));
        }
        // A steady-state tick can block for a link reconnect wait followed
        // by a broker handshake; both must fit inside the watchdog.
        let worst_tick_ms = self
            .link_reconnect_wait_ms
            .saturating_add(self.broker_handshake_timeout_ms)
            .saturating_add(self.tick_interval_ms);
        if worst_tick_ms.saturating_add(WATCHDOG_MARGIN_MS) > WATCHDOG_TIMEOUT_MS {
            return Err(ConfigError::ValidationFailed(
                "reconnect wait plus handshake timeout must stay inside the watchdog",
            ));
        }
        if self.reset_hold_ms <= self.tick_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "reset_hold_ms must be longer than one tick",
            ));
        }
        if self.soil_wet_raw >= self.soil_dry_raw || self.soil_dry_raw > 4095 {
            return Err(ConfigError::ValidationFailed(
                "soil band must satisfy wet_raw < dry_raw <= 4095",
            ));
        }
        Ok(())
    }
}
