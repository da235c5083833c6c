//! Identity and credential provisioner.
//!
//! First boot: one HTTP exchange with the backend trades the hardware
//! address and firmware version for a device id and broker credentials.
//! Later boots: the same three fields are restored from NVS.
//!
//! ## Durable layout
//!
//! | Namespace  | Key         | Value             |
//! |------------|-------------|-------------------|
//! | `plantops` | `device_id` | assigned id       |
//! | `plantops` | `mqtt_user` | broker username   |
//! | `plantops` | `mqtt_pass` | broker password   |
//!
//! `device_id` is written last and is the only provisioned-ness signal, so
//! a power cut mid-persist leaves the device unprovisioned rather than
//! half-provisioned.
//!
//! There is no retry loop here.  A failed exchange is reported to the
//! lifecycle controller, which escalates to a restart.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

use super::model::{DeviceIdentity, IdentityField};
use super::ports::{HttpPort, StorageError, StoragePort};

pub const IDENTITY_NAMESPACE: &str = "plantops";
pub const KEY_DEVICE_ID: &str = "device_id";
pub const KEY_MQTT_USER: &str = "mqtt_user";
pub const KEY_MQTT_PASS: &str = "mqtt_pass";

const REGISTER_PATH: &str = "/api/devices/register";
const MAX_FIELD_LEN: usize = 64;

// ───────────────────────────────────────────────────────────────
// Wire format
// ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RegistrationRequest<'a> {
    mac_address: &'a str,
    firmware_version: &'a str,
}

/// Successful registration body.  Unknown fields are ignored.
#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct RegistrationResponse {
    pub device_id: String,
    pub mqtt_username: String,
    pub mqtt_password: String,
}

/// Parse a registration response body.
///
/// Rejects bodies that are not a JSON object with all three string fields,
/// and fields that are empty or longer than an [`IdentityField`].
pub fn parse_registration_response(body: &[u8]) -> Result<RegistrationResponse, ProvisionError> {
    let parsed: RegistrationResponse =
        serde_json::from_slice(body).map_err(|_| ProvisionError::MalformedBody)?;
    let fields = [&parsed.device_id, &parsed.mqtt_username, &parsed.mqtt_password];
    if fields.iter().any(|f| f.is_empty() || f.len() > MAX_FIELD_LEN) {
        return Err(ProvisionError::IncompleteResponse);
    }
    Ok(parsed)
}

// ───────────────────────────────────────────────────────────────
// Provisioner
// ───────────────────────────────────────────────────────────────

pub struct Provisioner<S: StoragePort, H: HttpPort> {
    storage: S,
    http: H,
}

impl<S: StoragePort, H: HttpPort> Provisioner<S, H> {
    pub fn new(storage: S, http: H) -> Self {
        Self { storage, http }
    }

    /// True iff a device id is persisted.
    pub fn is_provisioned(&self) -> bool {
        self.storage.exists(IDENTITY_NAMESPACE, KEY_DEVICE_ID)
    }

    /// Restore the persisted identity.
    ///
    /// Returns an unprovisioned identity when no device id is stored, and
    /// [`ProvisionError::IncompleteRecord`] when a device id exists without
    /// both credentials.
    pub fn load_persisted(&self, hardware_address: &str) -> Result<DeviceIdentity, ProvisionError> {
        if !self.is_provisioned() {
            return Ok(DeviceIdentity::unprovisioned(hardware_address));
        }

        let device_id = self.read_field(KEY_DEVICE_ID)?;
        let user = self.read_field(KEY_MQTT_USER)?;
        let pass = self.read_field(KEY_MQTT_PASS)?;

        DeviceIdentity::provisioned(hardware_address, &device_id, &user, &pass)
            .ok_or(ProvisionError::IncompleteRecord)
    }

    /// One registration exchange with the backend.  Never persists.
    pub fn register(
        &mut self,
        backend_host: &str,
        backend_port: u16,
        hardware_address: &str,
        firmware_version: &str,
    ) -> Result<DeviceIdentity, ProvisionError> {
        let url = format!("http://{}:{}{}", backend_host, backend_port, REGISTER_PATH);
        let body = serde_json::to_string(&RegistrationRequest {
            mac_address: hardware_address,
            firmware_version,
        })
        .map_err(|_| ProvisionError::MalformedBody)?;

        info!("Reg: POST {} (mac={})", url, hardware_address);
        let response = self.http.post_json(&url, &body).map_err(|e| {
            error!("Reg: request failed: {}", e);
            ProvisionError::from(e)
        })?;

        if response.status != 200 && response.status != 201 {
            error!("Reg: backend returned HTTP {}", response.status);
            return Err(ProvisionError::Status(response.status));
        }

        let parsed = parse_registration_response(response.body.as_bytes())
            .inspect_err(|e| error!("Reg: {}", e))?;

        info!("Reg: assigned device_id={}", parsed.device_id);
        DeviceIdentity::provisioned(
            hardware_address,
            &parsed.device_id,
            &parsed.mqtt_username,
            &parsed.mqtt_password,
        )
        .ok_or(ProvisionError::IncompleteResponse)
    }

    /// Write all three fields, credentials first and `device_id` last.
    /// Any failure rolls back what was written.
    pub fn persist(&mut self, identity: &DeviceIdentity) -> Result<(), ProvisionError> {
        if !identity.is_provisioned() {
            return Err(ProvisionError::IncompleteRecord);
        }

        let writes = [
            (KEY_MQTT_USER, identity.mqtt_username()),
            (KEY_MQTT_PASS, identity.mqtt_password()),
            (KEY_DEVICE_ID, identity.device_id()),
        ];

        for (i, (key, value)) in writes.iter().enumerate() {
            if let Err(e) = self.storage.write(IDENTITY_NAMESPACE, key, value.as_bytes()) {
                error!("Reg: persisting '{}' failed: {}", key, e);
                for (done, _) in &writes[..i] {
                    let _ = self.storage.delete(IDENTITY_NAMESPACE, done);
                }
                return Err(e.into());
            }
        }

        info!("Reg: identity persisted");
        Ok(())
    }

    /// Erase every persisted identity field.
    pub fn clear(&mut self) -> Result<(), ProvisionError> {
        warn!("Reg: clearing persisted identity");
        self.storage.erase_namespace(IDENTITY_NAMESPACE)?;
        Ok(())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    fn read_field(&self, key: &str) -> Result<IdentityField, ProvisionError> {
        let mut buf = [0u8; MAX_FIELD_LEN];
        let n = match self.storage.read(IDENTITY_NAMESPACE, key, &mut buf) {
            Ok(n) => n,
            Err(StorageError::NotFound) => {
                return Err(ProvisionError::IncompleteRecord);
            }
            Err(e) => return Err(e.into()),
        };
        let s = core::str::from_utf8(&buf[..n]).map_err(|_| ProvisionError::IncompleteRecord)?;
        let mut field = IdentityField::new();
        field
            .push_str(s)
            .map_err(|_| ProvisionError::IncompleteRecord)?;
        Ok(field)
    }
}
