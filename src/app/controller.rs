//! Lifecycle controller, the hexagonal core.
//!
//! [`LifecycleController`] owns the connectivity manager, the provisioner,
//! the messaging session, the periodic task clock and the reset-hold
//! detector.  It sequences boot and runs one steady-state tick at a time.
//! Ports it does not own (sensors, reset input, system timer, event sink)
//! are injected at call sites, so the whole lifecycle runs against mocks.
//!
//! ```text
//!   LinkPort ──▶ ┌──────────────────────────────┐
//!  StoragePort ─▶│     LifecycleController      │──▶ EventSink
//!   HttpPort ──▶ │ Connectivity · Provisioner   │
//!  BrokerPort ◀─▶│ Session · ScheduleClock      │◀── SensorPort
//!                └──────────────────────────────┘◀── ResetInputPort
//! ```
//!
//! ## Steady-state tick
//!
//! Every tick runs these steps in order, to completion:
//!
//! 1. sample the reset input; a hold past the threshold wipes identity and
//!    network credentials and restarts
//! 2. refresh link status; on the recheck interval, if the link is not
//!    connected, run a blocking reconnect
//! 3. service the broker session and run its debounced health check
//! 4. on the telemetry interval, if the session is connected, sample the
//!    sensors and publish only a valid reading
//! 5. on the heartbeat interval, publish a heartbeat

use log::{error, info, warn};

use crate::config::SystemConfig;
use crate::drivers::button::ResetHoldDetector;
use crate::scheduler::{PeriodicTask, ScheduleClock};

use super::connectivity::ConnectivityManager;
use super::events::AppEvent;
use super::model::{ConnectivityState, DeviceIdentity, RestartReason, SessionState};
use super::ports::{
    BrokerPort, BrokerSettings, EventSink, HttpPort, LinkPort, ResetInputPort, SensorPort,
    StoragePort, SystemPort,
};
use super::provisioner::Provisioner;
use super::session::MessagingSession;

/// What the caller should do after [`LifecycleController::boot`] or
/// [`LifecycleController::tick`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// A restart was requested.  On hardware this is never observed.
    Restart(RestartReason),
}

pub struct LifecycleController<L, S, H, B>
where
    L: LinkPort,
    S: StoragePort,
    H: HttpPort,
    B: BrokerPort,
{
    config: SystemConfig,
    firmware_version: &'static str,
    ca_pem: &'static str,
    connectivity: ConnectivityManager<L>,
    provisioner: Provisioner<S, H>,
    session: MessagingSession<B>,
    clock: ScheduleClock,
    reset: ResetHoldDetector,
    identity: DeviceIdentity,
}

impl<L, S, H, B> LifecycleController<L, S, H, B>
where
    L: LinkPort,
    S: StoragePort,
    H: HttpPort,
    B: BrokerPort,
{
    /// Wire up the components.  Does no I/O; call [`boot`](Self::boot) next.
    pub fn new(
        config: SystemConfig,
        firmware_version: &'static str,
        ca_pem: &'static str,
        link: L,
        storage: S,
        http: H,
        broker: B,
    ) -> Self {
        let connectivity = ConnectivityManager::new(
            link,
            &config.portal_ap_name,
            config.portal_timeout_secs,
            config.link_reconnect_wait_ms,
        );
        let session = MessagingSession::new(broker, config.broker_backoff_ms);
        let clock = ScheduleClock::from_config(&config);
        let reset = ResetHoldDetector::new(config.reset_hold_ms);

        Self {
            firmware_version,
            ca_pem,
            connectivity,
            provisioner: Provisioner::new(storage, http),
            session,
            clock,
            reset,
            identity: DeviceIdentity::unprovisioned(""),
            config,
        }
    }

    // ── Boot ──────────────────────────────────────────────────

    /// Link → identity → sensors → broker session.
    ///
    /// No link, or no identity on first boot, is fatal: wait the configured
    /// delay and restart once.
    pub fn boot(
        &mut self,
        sensors: &mut impl SensorPort,
        sys: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> Flow {
        sink.emit(&AppEvent::Booting {
            firmware_version: self.firmware_version,
        });

        if !self.connectivity.initialize(sink) {
            error!("Main: no network link");
            return self.fatal(RestartReason::NoConnectivity, sys, sink);
        }

        let hw_addr = self.connectivity.stable_address();
        info!("Main: hardware address {}", hw_addr);

        match self.restore_identity(&hw_addr, sink) {
            Some(identity) => self.identity = identity,
            None => match self.provisioner.register(
                &self.config.backend_host,
                self.config.backend_port,
                &hw_addr,
                self.firmware_version,
            ) {
                Ok(identity) => {
                    if let Err(e) = self.provisioner.persist(&identity) {
                        sink.emit(&AppEvent::ProvisioningFailed(e));
                        return self.fatal(RestartReason::PersistFailed, sys, sink);
                    }
                    sink.emit(&AppEvent::Registered);
                    self.identity = identity;
                }
                Err(e) => {
                    sink.emit(&AppEvent::ProvisioningFailed(e));
                    return self.fatal(RestartReason::RegistrationFailed, sys, sink);
                }
            },
        }

        if !sensors.init() {
            warn!("Sensors: init reported no usable probes");
        }

        let settings = BrokerSettings {
            host: &self.config.broker_host,
            port: self.config.broker_port,
            ca_pem: self.ca_pem,
            buffer_bytes: usize::from(self.config.publish_buffer_bytes),
            handshake_timeout_ms: self.config.broker_handshake_timeout_ms,
        };
        if self.session.initialize(
            &settings,
            &self.config.topic_prefix,
            &self.config.client_id_prefix,
            &self.identity,
        ) {
            // Failure here is recovered by the steady-state health check.
            self.session.connect(sys.uptime_ms(), sink);
        } else {
            error!("MQTT: session initialisation failed");
        }

        sink.emit(&AppEvent::Ready);
        Flow::Continue
    }

    // ── Steady state ──────────────────────────────────────────

    /// One loop iteration.  Never blocks except for the bounded link
    /// reconnect wait.
    pub fn tick(
        &mut self,
        sensors: &mut impl SensorPort,
        input: &mut impl ResetInputPort,
        sys: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> Flow {
        let now = sys.uptime_ms();

        // 1. Factory reset
        let pressed = input.is_pressed();
        if self.reset.sample(now, pressed) {
            return self.factory_reset(sys, sink);
        }

        // 2. Link
        let link = self.connectivity.refresh(sink);
        // The recheck slot only advances while the link is down, so the
        // first recheck after a drop runs on the next tick.
        if link != ConnectivityState::Connected
            && self.clock.fire_if_due(PeriodicTask::ConnectivityRecheck, now)
        {
            self.connectivity.check_connection(sys, sink);
        }

        // The link check may have blocked.
        let now = sys.uptime_ms();

        // 3. Broker session
        self.session.tick();
        self.session.check_connection(now, sink);

        // 4. Telemetry
        if self.clock.fire_if_due(PeriodicTask::Telemetry, now)
            && self.session.state() == SessionState::Connected
        {
            let reading = sensors.read();
            if reading.valid {
                match self.session.publish_telemetry(&reading, now) {
                    Ok(()) => sink.emit(&AppEvent::TelemetryPublished(reading)),
                    Err(e) => {
                        warn!("MQTT: telemetry publish failed: {}", e);
                        sink.emit(&AppEvent::PublishFailed(e));
                    }
                }
            } else {
                warn!("Sensors: invalid reading, telemetry skipped");
                sink.emit(&AppEvent::TelemetrySkipped);
            }
        }

        // 5. Heartbeat
        if self.clock.fire_if_due(PeriodicTask::Heartbeat, now) {
            let rssi = self.connectivity.rssi();
            match self.session.publish_heartbeat(now, rssi) {
                Ok(()) => sink.emit(&AppEvent::HeartbeatPublished {
                    uptime_s: now / 1000,
                    rssi: rssi.unwrap_or(0),
                }),
                Err(e) => {
                    warn!("MQTT: heartbeat publish failed: {}", e);
                    sink.emit(&AppEvent::PublishFailed(e));
                }
            }
        }

        Flow::Continue
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn connectivity(&self) -> &ConnectivityManager<L> {
        &self.connectivity
    }

    pub fn session(&self) -> &MessagingSession<B> {
        &self.session
    }

    // ── Internal ──────────────────────────────────────────────

    /// Persisted identity if one is complete.  An incomplete or unreadable
    /// record is wiped so registration can start from a clean namespace.
    fn restore_identity(
        &mut self,
        hw_addr: &str,
        sink: &mut impl EventSink,
    ) -> Option<DeviceIdentity> {
        if !self.provisioner.is_provisioned() {
            info!("Reg: not provisioned");
            return None;
        }
        match self.provisioner.load_persisted(hw_addr) {
            Ok(identity) if identity.is_provisioned() => {
                info!("Reg: restored device_id={}", identity.device_id());
                sink.emit(&AppEvent::IdentityRestored);
                Some(identity)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Reg: persisted identity unusable: {}", e);
                sink.emit(&AppEvent::ProvisioningFailed(e));
                if let Err(e) = self.provisioner.clear() {
                    warn!("Reg: clear failed: {}", e);
                }
                None
            }
        }
    }

    fn fatal(
        &mut self,
        reason: RestartReason,
        sys: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> Flow {
        error!(
            "Main: {}; restarting in {} ms",
            reason, self.config.boot_fatal_delay_ms
        );
        sink.emit(&AppEvent::Restarting(reason));
        sys.delay_ms(self.config.boot_fatal_delay_ms);
        sys.restart(reason);
        Flow::Restart(reason)
    }

    fn factory_reset(&mut self, sys: &mut impl SystemPort, sink: &mut impl EventSink) -> Flow {
        warn!("Main: reset held > {} ms, factory reset", self.config.reset_hold_ms);
        sink.emit(&AppEvent::FactoryReset);
        if let Err(e) = self.provisioner.clear() {
            error!("Main: identity clear failed: {}", e);
        }
        self.identity = DeviceIdentity::unprovisioned(self.identity.hardware_address());
        sink.emit(&AppEvent::Restarting(RestartReason::FactoryReset));
        self.connectivity.reset_credentials(sys);
        Flow::Restart(RestartReason::FactoryReset)
    }
}
