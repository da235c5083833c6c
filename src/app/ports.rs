//! Port traits: the hexagonal boundary between lifecycle logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Lifecycle components (domain)
//! ```
//!
//! Driven adapters (WiFi, NVS, HTTP, MQTT, sensors, GPIO, system timer)
//! implement these traits.  The components in [`crate::app`] consume them
//! via generics, so the lifecycle core never touches hardware directly.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **StoragePort** implementations SHOULD encrypt the identity namespace.
//! - **BrokerPort** implementations MUST verify the broker against the
//!   pinned CA passed in [`BrokerSettings`]; no client certificates.
//! - All port errors are typed; callers must handle every variant explicitly.

use core::fmt;

use crate::config::SystemConfig;

use super::events::AppEvent;
use super::model::{RestartReason, SensorReading};

/// Full 6-byte station MAC address.
pub type MacAddress = [u8; 6];

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: domain ↔ WiFi driver)
// ───────────────────────────────────────────────────────────────

/// Low-level wireless link operations.
///
/// Every call here is blocking and bounded by the adapter; the
/// [`ConnectivityManager`](super::connectivity::ConnectivityManager)
/// owns the state machine built on top.
pub trait LinkPort {
    /// Whether station credentials are stored on the device.
    fn has_stored_credentials(&self) -> bool;

    /// Connect as a station with the stored credentials.
    fn connect_stored(&mut self) -> Result<(), LinkError>;

    /// Run the interactive credential portal until a link is up or
    /// `timeout_secs` expires.
    fn run_portal(&mut self, ap_name: &str, timeout_secs: u32) -> Result<(), LinkError>;

    /// Non-blocking probe of the current link.
    fn is_link_up(&self) -> bool;

    /// Ask the driver to re-associate.  Returns immediately.
    fn request_reconnect(&mut self);

    /// Received signal strength (dBm), `None` if not associated.
    fn rssi(&self) -> Option<i8>;

    /// Factory station MAC.
    fn mac_address(&self) -> MacAddress;

    /// Forget stored station credentials.
    fn erase_credentials(&mut self) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// HTTP port (driven adapter: domain → backend)
// ───────────────────────────────────────────────────────────────

/// Status line and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// One-shot JSON request transport used for registration.
pub trait HttpPort {
    /// POST `body` as `application/json` to `url` and return the response.
    /// Exactly one request; implementations must not retry.
    fn post_json(&mut self, url: &str, body: &str) -> Result<HttpResponse, HttpError>;
}

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: domain → MQTT over TLS)
// ───────────────────────────────────────────────────────────────

/// Parameters bound once at session initialisation.
#[derive(Debug, Clone, Copy)]
pub struct BrokerSettings<'a> {
    pub host: &'a str,
    pub port: u16,
    /// PEM trust anchor for the broker certificate (NUL terminated).
    /// The TLS stack keeps a pointer to it for the life of the client.
    pub ca_pem: &'static str,
    /// Max size of one outgoing MQTT frame.
    pub buffer_bytes: usize,
    /// Bound on one handshake.
    pub handshake_timeout_ms: u32,
}

/// Authenticated publish-only pub/sub transport.
pub trait BrokerPort {
    /// Bind endpoint and TLS parameters.  No network traffic.
    fn configure(&mut self, settings: &BrokerSettings<'_>) -> Result<(), BrokerError>;

    /// One authenticated handshake attempt.
    fn connect(&mut self, client_id: &str, username: &str, password: &str)
        -> Result<(), BrokerError>;

    /// Whether the transport currently holds a live session.
    fn is_connected(&self) -> bool;

    /// Fire-and-forget (QoS 0) publish.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Protocol housekeeping: keepalive, inbound acks, disconnect detection.
    fn service(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Sensor / input ports (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain one sensor reading.
pub trait SensorPort {
    /// Bring up the sensor subsystem.  Returns `false` if nothing usable
    /// was found; reads will then report invalid.
    fn init(&mut self) -> bool;

    /// Sample every probe and combine into one reading.
    fn read(&mut self) -> SensorReading;
}

/// The manual factory-reset input.
pub trait ResetInputPort {
    /// Current level: `true` while the input is held.
    fn is_pressed(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// System port (driven adapter: domain ↔ timer, scheduler, reset)
// ───────────────────────────────────────────────────────────────

/// Time and process control.
pub trait SystemPort {
    /// Milliseconds since boot (monotonic).
    fn uptime_ms(&self) -> u64;

    /// Block the calling task.
    fn delay_ms(&mut self, ms: u32);

    /// Restart the process.  Never returns on hardware.
    fn restart(&mut self, reason: RestartReason);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The lifecycle controller emits structured [`AppEvent`]s through this
/// port.  Adapters decide where they go (serial log, test recorder, ...).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// # Security
///
/// Implementations MUST call [`SystemConfig::validate`] before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for identity and configuration.
///
/// # Security
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Each write is atomic on its own (ESP-IDF `nvs_commit`); multi-key
///   consistency is the caller's job.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;

    /// Remove every key in `namespace`.
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`LinkPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NoCredentials,
    ConnectFailed,
    PortalTimeout,
    Driver(i32),
}

/// Errors from [`HttpPort`] operations (below the HTTP status level).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// Could not reach the host or the connection dropped.
    Connect,
    /// No response within the client timeout.
    Timeout,
    /// Response body could not be read.
    Read,
}

/// Errors from [`BrokerPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// Transport configuration rejected (bad host, bad CA).
    Config,
    /// Handshake failed; carries the transport's return code.
    ConnectFailed(i32),
    /// Operation requires a live session.
    NotConnected,
    /// The transport refused the publish.
    PublishRejected,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials stored"),
            Self::ConnectFailed => write!(f, "WiFi connection failed"),
            Self::PortalTimeout => write!(f, "provisioning portal timed out"),
            Self::Driver(rc) => write!(f, "WiFi driver error (rc={})", rc),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connection failed"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Read => write!(f, "response read failed"),
        }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "broker configuration rejected"),
            Self::ConnectFailed(rc) => write!(f, "broker handshake failed, rc={}", rc),
            Self::NotConnected => write!(f, "not connected"),
            Self::PublishRejected => write!(f, "publish rejected by transport"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
impl std::error::Error for LinkError {}
impl std::error::Error for HttpError {}
impl std::error::Error for BrokerError {}
