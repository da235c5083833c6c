//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`], the hexagonal boundary for the wireless link.
//! Station credentials live in the WiFi driver's own NVS storage, so the
//! adapter never handles them outside the connect and portal paths.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Portal
//!
//! When no usable credentials are stored the adapter raises an open soft-AP
//! next to the station interface and serves a single form on
//! `http://192.168.71.1/`.  A submitted SSID/password pair is validated and
//! tried immediately; a failed join keeps the portal up until the timeout.

use core::fmt;
use log::{info, warn};

use crate::app::ports::{LinkError, LinkPort, MacAddress};

use super::device_id;

#[cfg(target_os = "espidf")]
use std::sync::{Arc, Mutex};

#[cfg(target_os = "espidf")]
use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration};
#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    http::server::EspHttpServer,
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Credential validation
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    InvalidSsid,
    InvalidPassword,
    MalformedForm,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::MalformedForm => write!(f, "portal form could not be decoded"),
        }
    }
}

/// Station credentials as submitted through the portal.
#[derive(Clone, PartialEq, Eq)]
pub struct StationCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl fmt::Debug for StationCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StationCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl StationCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, CredentialError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut creds = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        creds.ssid.push_str(ssid).map_err(|_| CredentialError::InvalidSsid)?;
        creds.password.push_str(password).map_err(|_| CredentialError::InvalidPassword)?;
        Ok(creds)
    }
}

fn validate_ssid(ssid: &str) -> Result<(), CredentialError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(CredentialError::InvalidSsid);
    }
    // Printable ASCII only; the portal page cannot echo anything else.
    if !ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
        return Err(CredentialError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), CredentialError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(CredentialError::InvalidPassword);
    }
    Ok(())
}

/// Decode an `application/x-www-form-urlencoded` value.
fn form_decode(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = raw.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).ok()
}

/// Parse the portal form body `ssid=...&password=...`.
pub fn parse_portal_form(body: &str) -> Result<StationCredentials, CredentialError> {
    let mut ssid = None;
    let mut password = None;
    for pair in body.trim().split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = form_decode(value).ok_or(CredentialError::MalformedForm)?;
        match key {
            "ssid" => ssid = Some(value),
            "password" => password = Some(value),
            _ => {}
        }
    }
    let ssid = ssid.ok_or(CredentialError::InvalidSsid)?;
    StationCredentials::new(&ssid, password.as_deref().unwrap_or(""))
}

#[cfg(target_os = "espidf")]
const PORTAL_FORM_HTML: &str = r#"<!doctype html>
<html><head><meta name="viewport" content="width=device-width, initial-scale=1">
<title>PlantOps Sensor</title></head>
<body><h1>PlantOps Sensor</h1>
<form method="post" action="/wifi">
<label>SSID <input name="ssid" maxlength="32"></label><br>
<label>Password <input name="password" type="password" maxlength="64"></label><br>
<button type="submit">Connect</button>
</form></body></html>"#;

#[cfg(target_os = "espidf")]
const PORTAL_POLL_MS: u32 = 500;

#[cfg(target_os = "espidf")]
const MAX_FORM_BODY: usize = 256;

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: credentials the driver would hold in flash.
    #[cfg(not(target_os = "espidf"))]
    sim_stored: Option<StationCredentials>,
    /// Simulation: form body the next portal run receives.
    #[cfg(not(target_os = "espidf"))]
    sim_portal_form: Option<String>,
    #[cfg(not(target_os = "espidf"))]
    sim_up: bool,
    /// Simulation: whether the access point accepts associations.
    #[cfg(not(target_os = "espidf"))]
    sim_ap_reachable: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_connect_counter: u32,
}

#[cfg(target_os = "espidf")]
impl WifiAdapter {
    pub fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self, LinkError> {
        let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))
            .map_err(|e| LinkError::Driver(e.code()))?;
        let wifi = BlockingWifi::wrap(esp_wifi, sys_loop).map_err(|e| LinkError::Driver(e.code()))?;
        Ok(Self { wifi })
    }

    fn stored_client(&self) -> Option<ClientConfiguration> {
        match self.wifi.get_configuration() {
            Ok(Configuration::Client(c)) | Ok(Configuration::Mixed(c, _)) if !c.ssid.is_empty() => {
                Some(c)
            }
            _ => None,
        }
    }

    fn client_config(creds: &StationCredentials) -> ClientConfiguration {
        ClientConfiguration {
            ssid: creds.ssid.clone(),
            password: creds.password.clone(),
            auth_method: if creds.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPAWPA2Personal
            },
            ..Default::default()
        }
    }

    fn join(&mut self, config: Configuration) -> Result<(), LinkError> {
        self.wifi
            .set_configuration(&config)
            .map_err(|e| LinkError::Driver(e.code()))?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| LinkError::Driver(e.code()))?;
        }
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect failed: {}", e);
            LinkError::ConnectFailed
        })?;
        self.wifi.wait_netif_up().map_err(|e| {
            warn!("WiFi: netif up failed: {}", e);
            LinkError::ConnectFailed
        })?;
        Ok(())
    }

    fn start_portal_server(
        submitted: Arc<Mutex<Option<StationCredentials>>>,
    ) -> Result<EspHttpServer<'static>, LinkError> {
        use embedded_svc::http::Method;
        use embedded_svc::io::{Read, Write};
        use esp_idf_svc::http::server::Configuration as HttpConfiguration;
        use esp_idf_svc::io::EspIOError;

        let conf = HttpConfiguration {
            stack_size: 8 * 1024,
            ..Default::default()
        };
        let mut server = EspHttpServer::new(&conf).map_err(|e| LinkError::Driver(e.code()))?;

        server
            .fn_handler::<EspIOError, _>("/", Method::Get, |req| {
                req.into_response(200, Some("OK"), &[("Content-Type", "text/html; charset=utf-8")])?
                    .write_all(PORTAL_FORM_HTML.as_bytes())?;
                Ok(())
            })
            .map_err(|e| LinkError::Driver(e.code()))?;

        server
            .fn_handler::<EspIOError, _>("/wifi", Method::Post, move |mut req| {
                let mut buf = [0u8; MAX_FORM_BODY];
                let mut len = 0;
                while len < buf.len() {
                    let n = req.read(&mut buf[len..])?;
                    if n == 0 {
                        break;
                    }
                    len += n;
                }
                let parsed = core::str::from_utf8(&buf[..len])
                    .map_err(|_| CredentialError::MalformedForm)
                    .and_then(parse_portal_form);
                match parsed {
                    Ok(creds) => {
                        info!("WiFi: portal received credentials for '{}'", creds.ssid);
                        if let Ok(mut slot) = submitted.lock() {
                            *slot = Some(creds);
                        }
                        req.into_ok_response()?.write_all(b"Connecting...")?;
                    }
                    Err(e) => {
                        warn!("WiFi: portal form rejected: {}", e);
                        req.into_status_response(400)?.write_all(e.to_string().as_bytes())?;
                    }
                }
                Ok(())
            })
            .map_err(|e| LinkError::Driver(e.code()))?;

        Ok(server)
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            sim_stored: None,
            sim_portal_form: None,
            sim_up: false,
            sim_ap_reachable: true,
            sim_connect_counter: 0,
        }
    }

    /// Simulation: pre-store station credentials.
    pub fn with_stored(mut self, ssid: &str, password: &str) -> Result<Self, CredentialError> {
        self.sim_stored = Some(StationCredentials::new(ssid, password)?);
        Ok(self)
    }

    /// Simulation: the form body a user will submit during the next portal.
    pub fn stage_portal_submission(&mut self, form_body: &str) {
        self.sim_portal_form = Some(form_body.to_string());
    }

    /// Simulation: take the access point away (or bring it back).
    pub fn set_ap_reachable(&mut self, reachable: bool) {
        self.sim_ap_reachable = reachable;
        if !reachable {
            self.sim_up = false;
        }
    }

    fn sim_join(&mut self) -> Result<(), LinkError> {
        self.sim_connect_counter = self.sim_connect_counter.wrapping_add(1);
        if !self.sim_ap_reachable {
            warn!("WiFi(sim): AP unreachable (attempt {})", self.sim_connect_counter);
            return Err(LinkError::ConnectFailed);
        }
        self.sim_up = true;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiAdapter {
    #[cfg(target_os = "espidf")]
    fn has_stored_credentials(&self) -> bool {
        self.stored_client().is_some()
    }

    #[cfg(not(target_os = "espidf"))]
    fn has_stored_credentials(&self) -> bool {
        self.sim_stored.is_some()
    }

    #[cfg(target_os = "espidf")]
    fn connect_stored(&mut self) -> Result<(), LinkError> {
        let client = self.stored_client().ok_or(LinkError::NoCredentials)?;
        info!("WiFi: connecting to '{}'", client.ssid);
        self.join(Configuration::Client(client))
    }

    #[cfg(not(target_os = "espidf"))]
    fn connect_stored(&mut self) -> Result<(), LinkError> {
        let ssid = match &self.sim_stored {
            Some(c) => c.ssid.clone(),
            None => return Err(LinkError::NoCredentials),
        };
        info!("WiFi(sim): connecting to '{}'", ssid);
        self.sim_join()
    }

    #[cfg(target_os = "espidf")]
    fn run_portal(&mut self, ap_name: &str, timeout_secs: u32) -> Result<(), LinkError> {
        use esp_idf_svc::hal::delay::FreeRtos;
        use std::time::{Duration, Instant};

        let ap = AccessPointConfiguration {
            ssid: ap_name.try_into().map_err(|_| LinkError::Driver(-1))?,
            auth_method: AuthMethod::None,
            channel: 1,
            ..Default::default()
        };
        self.wifi
            .set_configuration(&Configuration::Mixed(ClientConfiguration::default(), ap.clone()))
            .map_err(|e| LinkError::Driver(e.code()))?;
        self.wifi.start().map_err(|e| LinkError::Driver(e.code()))?;

        let submitted = Arc::new(Mutex::new(None));
        let server = Self::start_portal_server(submitted.clone())?;
        info!("WiFi: portal '{}' up", ap_name);

        let deadline = Instant::now() + Duration::from_secs(u64::from(timeout_secs));
        while Instant::now() < deadline {
            let creds = submitted.lock().ok().and_then(|mut slot| slot.take());
            if let Some(creds) = creds {
                let client = Self::client_config(&creds);
                match self.join(Configuration::Mixed(client.clone(), ap.clone())) {
                    Ok(()) => {
                        drop(server);
                        // Leaving mixed mode persists the station config.
                        return self.join(Configuration::Client(client));
                    }
                    Err(e) => warn!("WiFi: portal join of '{}' failed: {}", creds.ssid, e),
                }
            }
            FreeRtos::delay_ms(PORTAL_POLL_MS);
        }

        drop(server);
        let _ = self.wifi.stop();
        Err(LinkError::PortalTimeout)
    }

    #[cfg(not(target_os = "espidf"))]
    fn run_portal(&mut self, ap_name: &str, timeout_secs: u32) -> Result<(), LinkError> {
        info!("WiFi(sim): portal '{}' up for {}s", ap_name, timeout_secs);
        let Some(form) = self.sim_portal_form.take() else {
            return Err(LinkError::PortalTimeout);
        };
        let creds = parse_portal_form(&form).map_err(|e| {
            warn!("WiFi(sim): portal form rejected: {}", e);
            LinkError::PortalTimeout
        })?;
        self.sim_join().map_err(|_| LinkError::PortalTimeout)?;
        self.sim_stored = Some(creds);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn is_link_up(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_link_up(&self) -> bool {
        self.sim_up
    }

    #[cfg(target_os = "espidf")]
    fn request_reconnect(&mut self) {
        let _ = self.wifi.wifi_mut().disconnect();
        if let Err(e) = self.wifi.wifi_mut().connect() {
            warn!("WiFi: reconnect request failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn request_reconnect(&mut self) {
        if self.sim_stored.is_some() {
            let _ = self.sim_join();
        }
    }

    #[cfg(target_os = "espidf")]
    fn rssi(&self) -> Option<i8> {
        let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
        let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
        (rc == esp_idf_svc::sys::ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn rssi(&self) -> Option<i8> {
        if !self.sim_up {
            return None;
        }
        // Oscillate between -66 and -55 dBm.
        let oscillation = ((self.sim_connect_counter % 12) as i8) - 6;
        Some((-60_i8).saturating_add(oscillation))
    }

    fn mac_address(&self) -> MacAddress {
        device_id::read_mac()
    }

    #[cfg(target_os = "espidf")]
    fn erase_credentials(&mut self) -> Result<(), LinkError> {
        let _ = self.wifi.disconnect();
        let rc = unsafe { esp_idf_svc::sys::esp_wifi_restore() };
        if rc != esp_idf_svc::sys::ESP_OK {
            return Err(LinkError::Driver(rc));
        }
        info!("WiFi: stored credentials erased");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn erase_credentials(&mut self) -> Result<(), LinkError> {
        self.sim_stored = None;
        self.sim_up = false;
        info!("WiFi(sim): stored credentials erased");
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
