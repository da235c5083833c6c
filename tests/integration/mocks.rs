//! Mock adapters for integration tests.
//!
//! Ports the controller owns (link, storage, http, broker) are shared
//! handles so a test can keep a clone and flip behaviour mid-run.  Ports
//! injected at call sites (sensors, reset input, system, sink) are plain
//! structs.  [`VirtualClock`] advances only through `delay_ms` and
//! explicit `advance`, so every timing assertion is deterministic.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use plantops::app::controller::{Flow, LifecycleController};
use plantops::app::events::AppEvent;
use plantops::app::model::{RestartReason, SensorReading};
use plantops::app::ports::{
    BrokerError, BrokerPort, BrokerSettings, EventSink, HttpError, HttpPort, HttpResponse,
    LinkError, LinkPort, ResetInputPort, SensorPort, StorageError, StoragePort, SystemPort,
};
use plantops::config::SystemConfig;

pub const TEST_CA: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n\0";
pub const TEST_VERSION: &str = "1.0.0-test";
pub const MAC: [u8; 6] = [0x24, 0x0A, 0xC4, 0x00, 0x1B, 0xFF];
pub const MAC_STR: &str = "24:0A:C4:00:1B:FF";

// ── Link ──────────────────────────────────────────────────────

pub struct LinkState {
    pub stored: bool,
    pub stored_connects: bool,
    pub portal_connects: bool,
    pub up: bool,
    /// Whether `request_reconnect` brings the link back.
    pub reconnect_succeeds: bool,
    pub rssi: i8,
    pub portal_runs: Vec<(String, u32)>,
    pub reconnect_requests: u32,
    pub erased: bool,
}

#[derive(Clone)]
pub struct MockLink(pub Rc<RefCell<LinkState>>);

impl MockLink {
    /// Stored credentials that work.
    pub fn provisioned() -> Self {
        Self(Rc::new(RefCell::new(LinkState {
            stored: true,
            stored_connects: true,
            portal_connects: false,
            up: false,
            reconnect_succeeds: true,
            rssi: -61,
            portal_runs: Vec::new(),
            reconnect_requests: 0,
            erased: false,
        })))
    }

    /// No credentials; the portal result decides.
    pub fn fresh(portal_connects: bool) -> Self {
        let link = Self::provisioned();
        {
            let mut s = link.0.borrow_mut();
            s.stored = false;
            s.portal_connects = portal_connects;
        }
        link
    }

    pub fn set_up(&self, up: bool) {
        self.0.borrow_mut().up = up;
    }

    pub fn state(&self) -> std::cell::Ref<'_, LinkState> {
        self.0.borrow()
    }
}

impl LinkPort for MockLink {
    fn has_stored_credentials(&self) -> bool {
        self.0.borrow().stored
    }

    fn connect_stored(&mut self) -> Result<(), LinkError> {
        let mut s = self.0.borrow_mut();
        if !s.stored {
            return Err(LinkError::NoCredentials);
        }
        if s.stored_connects {
            s.up = true;
            Ok(())
        } else {
            Err(LinkError::ConnectFailed)
        }
    }

    fn run_portal(&mut self, ap_name: &str, timeout_secs: u32) -> Result<(), LinkError> {
        let mut s = self.0.borrow_mut();
        s.portal_runs.push((ap_name.to_string(), timeout_secs));
        if s.portal_connects {
            s.stored = true;
            s.up = true;
            Ok(())
        } else {
            Err(LinkError::PortalTimeout)
        }
    }

    fn is_link_up(&self) -> bool {
        self.0.borrow().up
    }

    fn request_reconnect(&mut self) {
        let mut s = self.0.borrow_mut();
        s.reconnect_requests += 1;
        if s.reconnect_succeeds {
            s.up = true;
        }
    }

    fn rssi(&self) -> Option<i8> {
        let s = self.0.borrow();
        s.up.then_some(s.rssi)
    }

    fn mac_address(&self) -> [u8; 6] {
        MAC
    }

    fn erase_credentials(&mut self) -> Result<(), LinkError> {
        let mut s = self.0.borrow_mut();
        s.stored = false;
        s.erased = true;
        Ok(())
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Write(String),
    Delete(String),
    EraseNamespace(String),
}

#[derive(Default)]
pub struct StorageState {
    pub entries: HashMap<(String, String), Vec<u8>>,
    pub ops: Vec<StorageOp>,
    /// Writes to this key fail with `Full`.
    pub fail_key: Option<&'static str>,
}

#[derive(Clone, Default)]
pub struct MockStorage(pub Rc<RefCell<StorageState>>);

impl MockStorage {
    pub fn with_identity(device_id: &str, user: &str, pass: &str) -> Self {
        let s = Self::default();
        s.seed("device_id", device_id);
        s.seed("mqtt_user", user);
        s.seed("mqtt_pass", pass);
        s
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.0
            .borrow_mut()
            .entries
            .insert(("plantops".into(), key.into()), value.as_bytes().to_vec());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.0
            .borrow()
            .entries
            .get(&("plantops".to_string(), key.to_string()))
            .map(|v| String::from_utf8_lossy(v).into_owned())
    }

    pub fn fail_writes_to(&self, key: &'static str) {
        self.0.borrow_mut().fail_key = Some(key);
    }

    pub fn ops(&self) -> Vec<StorageOp> {
        self.0.borrow().ops.clone()
    }
}

impl StoragePort for MockStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let s = self.0.borrow();
        let v = s
            .entries
            .get(&(namespace.to_string(), key.to_string()))
            .ok_or(StorageError::NotFound)?;
        if v.len() > buf.len() {
            return Err(StorageError::IoError);
        }
        buf[..v.len()].copy_from_slice(v);
        Ok(v.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let mut s = self.0.borrow_mut();
        if s.fail_key == Some(key) {
            return Err(StorageError::Full);
        }
        s.ops.push(StorageOp::Write(key.to_string()));
        s.entries
            .insert((namespace.to_string(), key.to_string()), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut s = self.0.borrow_mut();
        s.ops.push(StorageOp::Delete(key.to_string()));
        s.entries
            .remove(&(namespace.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.0
            .borrow()
            .entries
            .contains_key(&(namespace.to_string(), key.to_string()))
    }

    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        let mut s = self.0.borrow_mut();
        s.ops.push(StorageOp::EraseNamespace(namespace.to_string()));
        s.entries.retain(|(ns, _), _| ns != namespace);
        Ok(())
    }
}

// ── HTTP ──────────────────────────────────────────────────────

pub struct HttpState {
    pub response: Result<HttpResponse, HttpError>,
    pub requests: Vec<(String, String)>,
}

#[derive(Clone)]
pub struct MockHttp(pub Rc<RefCell<HttpState>>);

impl MockHttp {
    pub fn responding(status: u16, body: &str) -> Self {
        Self::with(Ok(HttpResponse {
            status,
            body: body.to_string(),
        }))
    }

    pub fn with(response: Result<HttpResponse, HttpError>) -> Self {
        Self(Rc::new(RefCell::new(HttpState {
            response,
            requests: Vec::new(),
        })))
    }

    pub fn registered() -> Self {
        Self::responding(
            201,
            r#"{"device_id":"dev-42","mqtt_username":"node42","mqtt_password":"s3cret"}"#,
        )
    }

    pub fn requests(&self) -> Vec<(String, String)> {
        self.0.borrow().requests.clone()
    }
}

impl HttpPort for MockHttp {
    fn post_json(&mut self, url: &str, body: &str) -> Result<HttpResponse, HttpError> {
        let mut s = self.0.borrow_mut();
        s.requests.push((url.to_string(), body.to_string()));
        s.response.clone()
    }
}

// ── Broker ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configured {
    pub host: String,
    pub port: u16,
    pub buffer_bytes: usize,
}

pub struct BrokerState {
    pub configured: Option<Configured>,
    pub connected: bool,
    /// Handshake outcome; `Err(rc)` fails with that code.
    pub reply: Result<(), i32>,
    pub publish_ok: bool,
    pub handshakes: Vec<(String, String, String)>,
    pub published: Vec<(String, Vec<u8>)>,
    pub services: u32,
}

#[derive(Clone)]
pub struct MockBroker(pub Rc<RefCell<BrokerState>>);

impl Default for MockBroker {
    fn default() -> Self {
        Self(Rc::new(RefCell::new(BrokerState {
            configured: None,
            connected: false,
            reply: Ok(()),
            publish_ok: true,
            handshakes: Vec::new(),
            published: Vec::new(),
            services: 0,
        })))
    }
}

impl MockBroker {
    pub fn refusing(rc: i32) -> Self {
        let b = Self::default();
        b.0.borrow_mut().reply = Err(rc);
        b
    }

    pub fn set_reply(&self, reply: Result<(), i32>) {
        self.0.borrow_mut().reply = reply;
    }

    /// Transport-side disconnect.
    pub fn drop_session(&self) {
        self.0.borrow_mut().connected = false;
    }

    pub fn handshake_count(&self) -> usize {
        self.0.borrow().handshakes.len()
    }

    pub fn published_to(&self, suffix: &str) -> Vec<serde_json::Value> {
        self.0
            .borrow()
            .published
            .iter()
            .filter(|(t, _)| t.ends_with(suffix))
            .map(|(_, p)| serde_json::from_slice(p).expect("payload is JSON"))
            .collect()
    }

    pub fn topics(&self) -> Vec<String> {
        self.0.borrow().published.iter().map(|(t, _)| t.clone()).collect()
    }
}

impl BrokerPort for MockBroker {
    fn configure(&mut self, settings: &BrokerSettings<'_>) -> Result<(), BrokerError> {
        assert!(settings.ca_pem.ends_with('\0'), "CA must be NUL terminated");
        self.0.borrow_mut().configured = Some(Configured {
            host: settings.host.to_string(),
            port: settings.port,
            buffer_bytes: settings.buffer_bytes,
        });
        Ok(())
    }

    fn connect(&mut self, client_id: &str, username: &str, password: &str) -> Result<(), BrokerError> {
        let mut s = self.0.borrow_mut();
        s.handshakes
            .push((client_id.to_string(), username.to_string(), password.to_string()));
        match s.reply {
            Ok(()) => {
                s.connected = true;
                Ok(())
            }
            Err(rc) => {
                s.connected = false;
                Err(BrokerError::ConnectFailed(rc))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.0.borrow().connected
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let mut s = self.0.borrow_mut();
        if !s.connected {
            return Err(BrokerError::NotConnected);
        }
        if !s.publish_ok {
            return Err(BrokerError::PublishRejected);
        }
        s.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn service(&mut self) {
        self.0.borrow_mut().services += 1;
    }
}

// ── Call-site ports ───────────────────────────────────────────

pub struct MockSensors {
    pub init_ok: bool,
    pub reading: SensorReading,
    pub reads: u32,
}

impl MockSensors {
    pub fn healthy() -> Self {
        Self {
            init_ok: true,
            reading: SensorReading {
                temperature_c: 21.5,
                humidity_pct: 44.0,
                soil_moisture_pct: 37.5,
                light_lux: 820.0,
                valid: true,
            },
            reads: 0,
        }
    }
}

impl SensorPort for MockSensors {
    fn init(&mut self) -> bool {
        self.init_ok
    }

    fn read(&mut self) -> SensorReading {
        self.reads += 1;
        self.reading
    }
}

#[derive(Default)]
pub struct MockButton {
    pub pressed: bool,
}

impl ResetInputPort for MockButton {
    fn is_pressed(&mut self) -> bool {
        self.pressed
    }
}

#[derive(Default)]
pub struct VirtualClock {
    pub now_ms: u64,
    pub delays: Vec<u32>,
    pub restarts: Vec<RestartReason>,
}

impl VirtualClock {
    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }
}

impl SystemPort for VirtualClock {
    fn uptime_ms(&self) -> u64 {
        self.now_ms
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
        self.now_ms += u64::from(ms);
    }

    fn restart(&mut self, reason: RestartReason) {
        self.restarts.push(reason);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub type TestController = LifecycleController<MockLink, MockStorage, MockHttp, MockBroker>;

/// Everything a lifecycle test needs, with handles on the owned mocks.
pub struct Rig {
    pub controller: TestController,
    pub link: MockLink,
    pub storage: MockStorage,
    pub http: MockHttp,
    pub broker: MockBroker,
    pub sensors: MockSensors,
    pub button: MockButton,
    pub clock: VirtualClock,
    pub sink: RecordingSink,
}

impl Rig {
    pub fn new(link: MockLink, storage: MockStorage, http: MockHttp, broker: MockBroker) -> Self {
        Self::with_config(SystemConfig::default(), link, storage, http, broker)
    }

    pub fn with_config(
        config: SystemConfig,
        link: MockLink,
        storage: MockStorage,
        http: MockHttp,
        broker: MockBroker,
    ) -> Self {
        let controller = LifecycleController::new(
            config,
            TEST_VERSION,
            TEST_CA,
            link.clone(),
            storage.clone(),
            http.clone(),
            broker.clone(),
        );
        Self {
            controller,
            link,
            storage,
            http,
            broker,
            sensors: MockSensors::healthy(),
            button: MockButton::default(),
            clock: VirtualClock::default(),
            sink: RecordingSink::default(),
        }
    }

    /// Known device on a known network with a reachable broker.
    pub fn provisioned() -> Self {
        Self::new(
            MockLink::provisioned(),
            MockStorage::with_identity("dev-42", "node42", "s3cret"),
            MockHttp::registered(),
            MockBroker::default(),
        )
    }

    pub fn boot(&mut self) -> Flow {
        self.controller
            .boot(&mut self.sensors, &mut self.clock, &mut self.sink)
    }

    pub fn tick(&mut self) -> Flow {
        self.controller.tick(
            &mut self.sensors,
            &mut self.button,
            &mut self.clock,
            &mut self.sink,
        )
    }

    /// Run the loop at the default 100 ms cadence until `until_ms`.
    /// Stops early on a restart.
    pub fn run_until(&mut self, until_ms: u64) -> Flow {
        while self.clock.now_ms < until_ms {
            self.clock.advance(100);
            if let Flow::Restart(r) = self.tick() {
                return Flow::Restart(r);
            }
        }
        Flow::Continue
    }

    pub fn booted() -> Self {
        let mut rig = Self::provisioned();
        assert_eq!(rig.boot(), Flow::Continue);
        rig
    }
}
