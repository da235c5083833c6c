//! MQTT-over-TLS broker adapter.
//!
//! Implements [`BrokerPort`].  The broker is verified against the pinned
//! CA from [`BrokerSettings`]; the node authenticates with the username
//! and password it was issued at registration.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient` (ESP-IDF `esp-mqtt`) with
//!   connection state mirrored into atomics by the event callback.
//! - **all other targets**: an in-memory broker that records publishes.
//!
//! ## Handshake codes
//!
//! A failed [`BrokerPort::connect`] carries a code in the style of the
//! classic Arduino MQTT client: negative for transport failures, positive
//! for a CONNACK refusal.

use log::{info, warn};

use crate::app::ports::{BrokerError, BrokerPort, BrokerSettings};

use super::cert_store::validate_ca_pem;

/// No CONNACK within the handshake timeout.
pub const RC_CONNECTION_TIMEOUT: i32 = -4;
/// The transport dropped before CONNACK.
pub const RC_CONNECT_FAILED: i32 = -2;
/// CONNACK: bad username or password.
pub const RC_BAD_CREDENTIALS: i32 = 4;

#[cfg(target_os = "espidf")]
use std::sync::Arc;
#[cfg(target_os = "espidf")]
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};

/// Connection state shared with the `esp-mqtt` task.
#[cfg(target_os = "espidf")]
#[derive(Default)]
struct LinkFlags {
    connected: AtomicBool,
    /// Set on the first Connected, Disconnected or Error event.
    settled: AtomicBool,
    error_code: AtomicI32,
}

#[cfg(target_os = "espidf")]
const HANDSHAKE_POLL_MS: u32 = 50;

/// Endpoint bound by [`BrokerPort::configure`].
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
struct Endpoint {
    url: String,
    ca_pem: &'static str,
    buffer_bytes: usize,
    handshake_timeout_ms: u32,
}

pub struct MqttAdapter {
    endpoint: Option<Endpoint>,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    flags: Arc<LinkFlags>,
    /// Simulation: whether the broker accepts the next handshake.
    #[cfg(not(target_os = "espidf"))]
    sim_reply: Result<(), i32>,
    #[cfg(not(target_os = "espidf"))]
    sim_connected: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_handshakes: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_published: Vec<(String, Vec<u8>)>,
}

impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttAdapter {
    pub fn new() -> Self {
        Self {
            endpoint: None,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            flags: Arc::new(LinkFlags::default()),
            #[cfg(not(target_os = "espidf"))]
            sim_reply: Ok(()),
            #[cfg(not(target_os = "espidf"))]
            sim_connected: false,
            #[cfg(not(target_os = "espidf"))]
            sim_handshakes: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_published: Vec::new(),
        }
    }

    /// Broker URL once configured.
    pub fn url(&self) -> Option<&str> {
        self.endpoint.as_ref().map(|e| e.url.as_str())
    }

    /// Simulation: how the broker answers the next handshakes.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_reply(&mut self, reply: Result<(), i32>) {
        self.sim_reply = reply;
    }

    /// Simulation: the broker drops the session.
    #[cfg(not(target_os = "espidf"))]
    pub fn drop_session(&mut self) {
        self.sim_connected = false;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn handshakes(&self) -> u32 {
        self.sim_handshakes
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[(String, Vec<u8>)] {
        &self.sim_published
    }

    #[cfg(target_os = "espidf")]
    fn handshake(
        &mut self,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<(), BrokerError> {
        use core::time::Duration;
        use esp_idf_svc::hal::delay::FreeRtos;
        use esp_idf_svc::tls::X509;

        let endpoint = self.endpoint.as_ref().ok_or(BrokerError::Config)?;

        // One live client at a time; dropping it stops esp-mqtt's own retries.
        self.client = None;
        let flags = Arc::new(LinkFlags::default());
        self.flags = flags.clone();

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: Some(username),
            password: Some(password),
            server_certificate: Some(X509::pem_until_nul(endpoint.ca_pem.as_bytes())),
            buffer_size: endpoint.buffer_bytes,
            out_buffer_size: endpoint.buffer_bytes,
            network_timeout: Duration::from_millis(u64::from(endpoint.handshake_timeout_ms)),
            ..Default::default()
        };

        let cb_flags = flags.clone();
        let client = EspMqttClient::new_cb(&endpoint.url, &conf, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    cb_flags.connected.store(true, Ordering::Release);
                    cb_flags.settled.store(true, Ordering::Release);
                }
                EventPayload::Disconnected => {
                    cb_flags.connected.store(false, Ordering::Release);
                    cb_flags.settled.store(true, Ordering::Release);
                }
                EventPayload::Error(e) => {
                    cb_flags.error_code.store(e.code(), Ordering::Release);
                    cb_flags.settled.store(true, Ordering::Release);
                }
                _ => {}
            }
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {}", e);
            BrokerError::Config
        })?;
        self.client = Some(client);

        let mut waited = 0;
        while !flags.settled.load(Ordering::Acquire) {
            if waited >= endpoint.handshake_timeout_ms {
                self.client = None;
                return Err(BrokerError::ConnectFailed(RC_CONNECTION_TIMEOUT));
            }
            FreeRtos::delay_ms(HANDSHAKE_POLL_MS);
            waited += HANDSHAKE_POLL_MS;
        }

        if flags.connected.load(Ordering::Acquire) {
            info!("MQTT: CONNACK from {}", endpoint.url);
            return Ok(());
        }
        self.client = None;
        match flags.error_code.load(Ordering::Acquire) {
            0 => Err(BrokerError::ConnectFailed(RC_CONNECT_FAILED)),
            rc => Err(BrokerError::ConnectFailed(rc)),
        }
    }
}

impl BrokerPort for MqttAdapter {
    fn configure(&mut self, settings: &BrokerSettings<'_>) -> Result<(), BrokerError> {
        if settings.host.is_empty() || settings.port == 0 || settings.buffer_bytes == 0 {
            return Err(BrokerError::Config);
        }
        validate_ca_pem(settings.ca_pem).map_err(|e| {
            warn!("MQTT: {}", e);
            BrokerError::Config
        })?;
        self.endpoint = Some(Endpoint {
            url: format!("mqtts://{}:{}", settings.host, settings.port),
            ca_pem: settings.ca_pem,
            buffer_bytes: settings.buffer_bytes,
            handshake_timeout_ms: settings.handshake_timeout_ms,
        });
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn connect(&mut self, client_id: &str, username: &str, password: &str) -> Result<(), BrokerError> {
        self.handshake(client_id, username, password)
    }

    #[cfg(not(target_os = "espidf"))]
    fn connect(&mut self, client_id: &str, _username: &str, _password: &str) -> Result<(), BrokerError> {
        if self.endpoint.is_none() {
            return Err(BrokerError::Config);
        }
        self.sim_handshakes += 1;
        match self.sim_reply {
            Ok(()) => {
                info!("MQTT(sim): {} connected", client_id);
                self.sim_connected = true;
                Ok(())
            }
            Err(rc) => {
                self.sim_connected = false;
                Err(BrokerError::ConnectFailed(rc))
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn is_connected(&self) -> bool {
        self.client.is_some() && self.flags.connected.load(Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_connected(&self) -> bool {
        self.sim_connected
    }

    #[cfg(target_os = "espidf")]
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.is_connected() {
            return Err(BrokerError::NotConnected);
        }
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("MQTT: publish to {} rejected: {}", topic, e);
                BrokerError::PublishRejected
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        if !self.sim_connected {
            return Err(BrokerError::NotConnected);
        }
        self.sim_published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn service(&mut self) {
        // esp-mqtt runs keepalive on its own task; a dead client is torn
        // down here so reconnects stay under the session's backoff.
        if self.client.is_some() && !self.flags.connected.load(Ordering::Acquire) {
            warn!("MQTT: transport dropped");
            self.client = None;
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn service(&mut self) {}
}
