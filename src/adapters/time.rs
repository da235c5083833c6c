//! ESP32 system adapter.
//!
//! Implements [`SystemPort`]: monotonic uptime, blocking delay and the
//! terminal restart.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` (microsecond,
//!   monotonic), FreeRTOS delay, `esp_restart()`.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `thread::sleep`; a restart is recorded instead of performed.

use log::warn;

use crate::app::model::RestartReason;
use crate::app::ports::SystemPort;

/// System adapter for the ESP32 platform.
pub struct Esp32SystemAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    restart_reason: Option<RestartReason>,
}

impl Default for Esp32SystemAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32SystemAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            restart_reason: None,
        }
    }

    /// Simulation: the restart the firmware asked for, if any.
    #[cfg(not(target_os = "espidf"))]
    pub fn restart_reason(&self) -> Option<RestartReason> {
        self.restart_reason
    }
}

impl SystemPort for Esp32SystemAdapter {
    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }

    #[cfg(target_os = "espidf")]
    fn restart(&mut self, reason: RestartReason) {
        warn!("Main: restarting ({})", reason);
        esp_idf_svc::hal::reset::restart();
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self, reason: RestartReason) {
        warn!("Main(sim): restart requested ({})", reason);
        self.restart_reason = Some(reason);
    }
}
