//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART in production).  One line per
//! event, tagged so a serial capture can be grepped by kind.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Booting { firmware_version } => {
                info!("BOOT  | PlantOps sensor v{}", firmware_version);
            }
            AppEvent::LinkChanged { from, to } => {
                info!("LINK  | {:?} -> {:?}", from, to);
            }
            AppEvent::IdentityRestored => {
                info!("IDENT | restored from NVS");
            }
            AppEvent::Registered => {
                info!("IDENT | registered and persisted");
            }
            AppEvent::ProvisioningFailed(e) => {
                warn!("IDENT | provisioning failed: {}", e);
            }
            AppEvent::SessionChanged { from, to } => {
                info!("MQTT  | {:?} -> {:?}", from, to);
            }
            AppEvent::SessionConnectFailed(rc) => {
                warn!("MQTT  | connect failed, rc={}", rc);
            }
            AppEvent::TelemetryPublished(r) => {
                info!(
                    "TELEM | T={:.1}\u{00b0}C | RH={:.1}% | soil={:.0}% | light={:.0}lx",
                    r.temperature_c, r.humidity_pct, r.soil_moisture_pct, r.light_lux,
                );
            }
            AppEvent::TelemetrySkipped => {
                warn!("TELEM | skipped, invalid reading");
            }
            AppEvent::HeartbeatPublished { uptime_s, rssi } => {
                info!("HBEAT | uptime={}s | rssi={}dBm", uptime_s, rssi);
            }
            AppEvent::PublishFailed(e) => {
                warn!("MQTT  | publish failed: {}", e);
            }
            AppEvent::Ready => {
                info!("READY | entering steady state");
            }
            AppEvent::FactoryReset => {
                warn!("RESET | factory reset requested");
            }
            AppEvent::Restarting(reason) => {
                warn!("RESET | restarting: {}", reason);
            }
        }
    }
}
