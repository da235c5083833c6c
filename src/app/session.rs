//! Secure messaging session.
//!
//! Keeps one authenticated, publish-only session to the broker:
//!
//! ```text
//!  Disconnected ──connect()──▶ Connecting ──ok──▶ Connected
//!       ▲                          │ fail             │ transport drop
//!       └──────────────────────────┴──────────────────┘
//! ```
//!
//! Reconnects are debounced: [`MessagingSession::check_connection`] issues
//! at most one handshake per backoff interval, however often it is called.
//! Publishing is QoS 0; a failed publish is reported and left for the next
//! health check, it never triggers a reconnect by itself.

use log::{debug, info, warn};
use serde::Serialize;

use crate::error::PublishError;

use super::events::AppEvent;
use super::model::{DeviceIdentity, IdentityField, SensorReading, SessionState};
use super::ports::{BrokerError, BrokerPort, BrokerSettings, EventSink};

/// Fixed header upper bound plus the 2-byte topic length prefix.
const FRAME_OVERHEAD: usize = 5 + 2;

pub type Topic = heapless::String<128>;

#[derive(Serialize)]
struct TelemetryPayload {
    timestamp: u64,
    temperature: f32,
    humidity: f32,
    soil_moisture: f32,
    light_level: f32,
}

#[derive(Serialize)]
struct HeartbeatPayload {
    timestamp: u64,
    uptime: u64,
    rssi: i8,
}

pub struct MessagingSession<B: BrokerPort> {
    broker: B,
    state: SessionState,
    initialized: bool,
    client_id: heapless::String<80>,
    username: IdentityField,
    password: IdentityField,
    telemetry_topic: Topic,
    heartbeat_topic: Topic,
    buffer_bytes: usize,
    backoff_ms: u64,
    last_attempt_ms: Option<u64>,
    last_error_code: Option<i32>,
    connect_attempts: u32,
}

impl<B: BrokerPort> MessagingSession<B> {
    pub fn new(broker: B, backoff_ms: u32) -> Self {
        Self {
            broker,
            state: SessionState::Disconnected,
            initialized: false,
            client_id: heapless::String::new(),
            username: IdentityField::new(),
            password: IdentityField::new(),
            telemetry_topic: Topic::new(),
            heartbeat_topic: Topic::new(),
            buffer_bytes: 0,
            backoff_ms: u64::from(backoff_ms),
            last_attempt_ms: None,
            last_error_code: None,
            connect_attempts: 0,
        }
    }

    /// Bind broker endpoint, topics and credentials.  No network traffic.
    pub fn initialize(
        &mut self,
        settings: &BrokerSettings<'_>,
        topic_prefix: &str,
        client_id_prefix: &str,
        identity: &DeviceIdentity,
    ) -> bool {
        use core::fmt::Write;

        if !identity.is_provisioned() {
            warn!("MQTT: refusing to initialise without an identity");
            return false;
        }
        if let Err(e) = self.broker.configure(settings) {
            warn!("MQTT: transport configuration failed: {}", e);
            return false;
        }

        let id = identity.device_id();
        self.telemetry_topic.clear();
        self.heartbeat_topic.clear();
        self.client_id.clear();
        let topics_ok = write!(self.telemetry_topic, "{}/{}/telemetry", topic_prefix, id).is_ok()
            && write!(self.heartbeat_topic, "{}/{}/heartbeat", topic_prefix, id).is_ok()
            && write!(self.client_id, "{}{}", client_id_prefix, id).is_ok();
        if !topics_ok {
            warn!("MQTT: device id too long for topic buffers");
            return false;
        }

        self.username.clear();
        self.password.clear();
        // Identity fields share the same capacity, so these cannot overflow.
        let _ = self.username.push_str(identity.mqtt_username());
        let _ = self.password.push_str(identity.mqtt_password());

        self.buffer_bytes = settings.buffer_bytes;
        self.initialized = true;
        info!(
            "MQTT: broker {}:{} client_id={} topics={},{}",
            settings.host, settings.port, self.client_id, self.telemetry_topic, self.heartbeat_topic
        );
        true
    }

    /// One authenticated handshake, unless already connected.
    pub fn connect(&mut self, now_ms: u64, sink: &mut impl EventSink) -> bool {
        if self.broker.is_connected() {
            self.set_state(SessionState::Connected, sink);
            return true;
        }
        if !self.initialized {
            return false;
        }

        self.set_state(SessionState::Connecting, sink);
        self.last_attempt_ms = Some(now_ms);
        self.connect_attempts += 1;
        info!("MQTT: connecting as {}", self.client_id);

        match self
            .broker
            .connect(&self.client_id, &self.username, &self.password)
        {
            Ok(()) => {
                self.last_error_code = None;
                self.set_state(SessionState::Connected, sink);
                info!("MQTT: connected");
                true
            }
            Err(e) => {
                let rc = match e {
                    BrokerError::ConnectFailed(rc) => rc,
                    _ => -1,
                };
                warn!("MQTT: connect failed, rc={}", rc);
                self.last_error_code = Some(rc);
                sink.emit(&AppEvent::SessionConnectFailed(rc));
                self.set_state(SessionState::Disconnected, sink);
                false
            }
        }
    }

    /// Health probe with debounced reconnect.
    pub fn check_connection(&mut self, now_ms: u64, sink: &mut impl EventSink) -> bool {
        if self.broker.is_connected() {
            self.set_state(SessionState::Connected, sink);
            return true;
        }
        if self.state == SessionState::Connected {
            warn!("MQTT: session lost");
        }
        self.set_state(SessionState::Disconnected, sink);

        if let Some(last) = self.last_attempt_ms {
            if now_ms.saturating_sub(last) < self.backoff_ms {
                return false;
            }
        }
        self.connect(now_ms, sink)
    }

    /// Publish `{timestamp, temperature, humidity, soil_moisture, light_level}`.
    pub fn publish_telemetry(
        &mut self,
        reading: &SensorReading,
        now_ms: u64,
    ) -> Result<(), PublishError> {
        let payload = TelemetryPayload {
            timestamp: now_ms,
            temperature: reading.temperature_c,
            humidity: reading.humidity_pct,
            soil_moisture: reading.soil_moisture_pct,
            light_level: reading.light_lux,
        };
        let topic = self.telemetry_topic.clone();
        self.publish(&topic, &payload)
    }

    /// Publish `{timestamp, uptime, rssi}`.  `rssi` is 0 when unknown.
    pub fn publish_heartbeat(&mut self, now_ms: u64, rssi: Option<i8>) -> Result<(), PublishError> {
        let payload = HeartbeatPayload {
            timestamp: now_ms,
            uptime: now_ms / 1000,
            rssi: rssi.unwrap_or(0),
        };
        let topic = self.heartbeat_topic.clone();
        self.publish(&topic, &payload)
    }

    /// Protocol housekeeping.  Call every tick, connected or not.
    pub fn tick(&mut self) {
        self.broker.service();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn telemetry_topic(&self) -> &str {
        &self.telemetry_topic
    }

    pub fn heartbeat_topic(&self) -> &str {
        &self.heartbeat_topic
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Transport code of the most recent failed handshake.
    pub fn last_error_code(&self) -> Option<i32> {
        self.last_error_code
    }

    /// Handshakes attempted since boot.
    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    // ── Internal ──────────────────────────────────────────────

    fn publish(&mut self, topic: &str, payload: &impl Serialize) -> Result<(), PublishError> {
        if self.state != SessionState::Connected {
            return Err(PublishError::NotConnected);
        }
        let bytes = serde_json::to_vec(payload).map_err(|_| PublishError::Serialization)?;
        let needed = FRAME_OVERHEAD + topic.len() + bytes.len();
        if needed > self.buffer_bytes {
            return Err(PublishError::BufferTooSmall {
                needed,
                capacity: self.buffer_bytes,
            });
        }
        self.broker.publish(topic, &bytes)?;
        debug!("MQTT: {} <- {} bytes", topic, bytes.len());
        Ok(())
    }

    fn set_state(&mut self, to: SessionState, sink: &mut impl EventSink) {
        if self.state != to {
            sink.emit(&AppEvent::SessionChanged { from: self.state, to });
            self.state = to;
        }
    }
}
