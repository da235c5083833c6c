//! Network connectivity manager.
//!
//! Owns the [`ConnectivityState`] machine on top of a [`LinkPort`]:
//!
//! ```text
//!              stored creds                     link up
//!  Disconnected ──────────▶ Connecting ─────────────────▶ Connected
//!       │                       │ fail                        │ link lost
//!       │ no creds              ▼                             ▼
//!       └──────────▶ ProvisioningPortalActive ──timeout──▶ Disconnected
//! ```
//!
//! Connection failures are never fatal here.  The lifecycle controller
//! decides how often to call [`ConnectivityManager::check_connection`] and
//! what to do when boot-time [`ConnectivityManager::initialize`] fails.

use log::{info, warn};

use super::events::AppEvent;
use super::model::{ConnectivityState, HardwareAddress, RestartReason, format_hardware_address};
use super::ports::{EventSink, LinkPort, SystemPort};

pub struct ConnectivityManager<L: LinkPort> {
    link: L,
    state: ConnectivityState,
    portal_ap_name: heapless::String<32>,
    portal_timeout_secs: u32,
    reconnect_wait_ms: u32,
}

impl<L: LinkPort> ConnectivityManager<L> {
    pub fn new(
        link: L,
        portal_ap_name: &str,
        portal_timeout_secs: u32,
        reconnect_wait_ms: u32,
    ) -> Self {
        let mut ap = heapless::String::new();
        for c in portal_ap_name.chars() {
            if ap.push(c).is_err() {
                break;
            }
        }
        Self {
            link,
            state: ConnectivityState::Disconnected,
            portal_ap_name: ap,
            portal_timeout_secs,
            reconnect_wait_ms,
        }
    }

    // ── Boot ──────────────────────────────────────────────────

    /// Bring the link up: stored credentials first, then the interactive
    /// portal.  Blocks for at most the portal timeout.  Returns whether a
    /// usable link exists on return.
    pub fn initialize(&mut self, sink: &mut impl EventSink) -> bool {
        if self.link.has_stored_credentials() {
            self.set_state(ConnectivityState::Connecting, sink);
            match self.link.connect_stored() {
                Ok(()) => {
                    self.set_state(ConnectivityState::Connected, sink);
                    info!("WiFi: connected with stored credentials");
                    return true;
                }
                Err(e) => warn!("WiFi: stored credentials failed: {}", e),
            }
        } else {
            info!("WiFi: no stored credentials");
        }

        info!(
            "WiFi: starting portal '{}' ({}s)",
            self.portal_ap_name, self.portal_timeout_secs
        );
        self.set_state(ConnectivityState::ProvisioningPortalActive, sink);
        match self
            .link
            .run_portal(&self.portal_ap_name, self.portal_timeout_secs)
        {
            Ok(()) => {
                self.set_state(ConnectivityState::Connected, sink);
                info!("WiFi: connected via portal");
                true
            }
            Err(e) => {
                warn!("WiFi: portal ended without link: {}", e);
                self.set_state(ConnectivityState::Disconnected, sink);
                false
            }
        }
    }

    // ── Steady state ──────────────────────────────────────────

    /// Non-blocking status refresh from the driver.  Call every tick.
    pub fn refresh(&mut self, sink: &mut impl EventSink) -> ConnectivityState {
        let up = self.link.is_link_up();
        match (self.state, up) {
            (ConnectivityState::Connected, false) => {
                warn!("WiFi: link lost");
                self.set_state(ConnectivityState::Disconnected, sink);
            }
            (ConnectivityState::Disconnected | ConnectivityState::Connecting, true) => {
                self.set_state(ConnectivityState::Connected, sink);
            }
            _ => {}
        }
        self.state
    }

    /// Health probe.  If the link is down, request a reconnect, block for
    /// the configured wait, then probe again.  The caller rate-limits this.
    pub fn check_connection(
        &mut self,
        sys: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> bool {
        if self.link.is_link_up() {
            self.set_state(ConnectivityState::Connected, sink);
            return true;
        }

        info!("WiFi: reconnecting");
        self.set_state(ConnectivityState::Connecting, sink);
        self.link.request_reconnect();
        sys.delay_ms(self.reconnect_wait_ms);

        if self.link.is_link_up() {
            self.set_state(ConnectivityState::Connected, sink);
            info!("WiFi: reconnected");
            true
        } else {
            self.set_state(ConnectivityState::Disconnected, sink);
            warn!("WiFi: reconnect failed");
            false
        }
    }

    // ── Destructive ───────────────────────────────────────────

    /// Forget stored network credentials and restart.  Terminal: on the
    /// device `sys.restart` does not return.
    pub fn reset_credentials(&mut self, sys: &mut impl SystemPort) {
        warn!("WiFi: erasing stored credentials");
        if let Err(e) = self.link.erase_credentials() {
            warn!("WiFi: credential erase failed: {}", e);
        }
        sys.restart(RestartReason::FactoryReset);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> ConnectivityState {
        self.state
    }

    /// Station MAC as `AA:BB:CC:DD:EE:FF`.
    pub fn stable_address(&self) -> HardwareAddress {
        format_hardware_address(&self.link.mac_address())
    }

    pub fn rssi(&self) -> Option<i8> {
        if self.state == ConnectivityState::Connected {
            self.link.rssi()
        } else {
            None
        }
    }

    /// Borrow the underlying link (tests and diagnostics).
    pub fn link(&self) -> &L {
        &self.link
    }

    fn set_state(&mut self, to: ConnectivityState, sink: &mut impl EventSink) {
        if self.state != to {
            sink.emit(&AppEvent::LinkChanged { from: self.state, to });
            self.state = to;
        }
    }
}
