//! Shared data model for the lifecycle components.
//!
//! These are the only records that cross component boundaries:
//! the provisioned [`DeviceIdentity`], the two connection state enums,
//! and the per-cycle [`SensorReading`].

use core::fmt;

/// Bounded string type used for identity fields (NVS string limit is far above this).
pub type IdentityField = heapless::String<64>;

/// `AA:BB:CC:DD:EE:FF`
pub type HardwareAddress = heapless::String<17>;

/// Render a MAC as the registration key: uppercase hex, colon separated.
pub fn format_hardware_address(mac: &[u8; 6]) -> HardwareAddress {
    use core::fmt::Write;
    let mut out = HardwareAddress::new();
    let _ = write!(
        out,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    out
}

/// Durable identity and broker credentials.
///
/// Either all three provisioned fields are non-empty or all are empty.
/// Constructors enforce that; there is no way to build a half-filled
/// identity from outside this module.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    hardware_address: HardwareAddress,
    device_id: IdentityField,
    mqtt_username: IdentityField,
    mqtt_password: IdentityField,
}

impl DeviceIdentity {
    /// An unprovisioned identity bound to the given stable hardware address.
    pub fn unprovisioned(hardware_address: &str) -> Self {
        let mut addr = HardwareAddress::new();
        for c in hardware_address.chars() {
            if addr.push(c).is_err() {
                break;
            }
        }
        Self {
            hardware_address: addr,
            device_id: IdentityField::new(),
            mqtt_username: IdentityField::new(),
            mqtt_password: IdentityField::new(),
        }
    }

    /// A fully provisioned identity.  Returns `None` if any field is empty
    /// or does not fit.
    pub fn provisioned(
        hardware_address: &str,
        device_id: &str,
        mqtt_username: &str,
        mqtt_password: &str,
    ) -> Option<Self> {
        if device_id.is_empty() || mqtt_username.is_empty() || mqtt_password.is_empty() {
            return None;
        }
        let mut identity = Self::unprovisioned(hardware_address);
        identity.device_id.push_str(device_id).ok()?;
        identity.mqtt_username.push_str(mqtt_username).ok()?;
        identity.mqtt_password.push_str(mqtt_password).ok()?;
        Some(identity)
    }

    pub fn is_provisioned(&self) -> bool {
        !self.device_id.is_empty()
    }

    pub fn hardware_address(&self) -> &str {
        &self.hardware_address
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn mqtt_username(&self) -> &str {
        &self.mqtt_username
    }

    pub fn mqtt_password(&self) -> &str {
        &self.mqtt_password
    }
}

// Password stays out of logs and test failure output.
impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("hardware_address", &self.hardware_address)
            .field("device_id", &self.device_id)
            .field("mqtt_username", &self.mqtt_username)
            .field("mqtt_password", &"<redacted>")
            .finish()
    }
}

/// Network link state, owned by the connectivity manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connecting,
    Connected,
    ProvisioningPortalActive,
}

/// Broker session state, owned by the messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// One sampling cycle's worth of sensor data.
///
/// Never persisted: built per telemetry cycle and consumed immediately.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    /// Air temperature (°C).
    pub temperature_c: f32,
    /// Relative humidity (%).
    pub humidity_pct: f32,
    /// Soil moisture, 0 (dry) – 100 (saturated).
    pub soil_moisture_pct: f32,
    /// Ambient light (lux).
    pub light_lux: f32,
    /// False if any mandatory probe failed this cycle.
    pub valid: bool,
}

impl SensorReading {
    /// A reading marked invalid; field values are meaningless.
    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Why the process is about to restart.
///
/// Restart is the terminal recovery action; it is deliberately not an
/// error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// No link could be established during boot.
    NoConnectivity,
    /// First-boot registration with the backend failed.
    RegistrationFailed,
    /// Registration succeeded but the identity could not be stored.
    PersistFailed,
    /// The reset input was held past the threshold.
    FactoryReset,
}

impl fmt::Display for RestartReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConnectivity => write!(f, "no connectivity at boot"),
            Self::RegistrationFailed => write!(f, "registration failed"),
            Self::PersistFailed => write!(f, "identity could not be persisted"),
            Self::FactoryReset => write!(f, "factory reset"),
        }
    }
}
