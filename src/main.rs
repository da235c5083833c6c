//! PlantOps Sensor Node: Main Entry Point
//!
//! Hexagonal architecture with a single cooperative polling loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter   NvsAdapter    HttpAdapter   MqttAdapter         │
//! │  (LinkPort)    (Storage)     (HttpPort)    (BrokerPort)        │
//! │  HardwareAdapter  ResetButton  Esp32SystemAdapter LogEventSink │
//! │  (SensorPort)     (ResetInput) (SystemPort)       (EventSink)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │           LifecycleController (pure logic)             │    │
//! │  │  Connectivity · Provisioner · Session · ScheduleClock  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::Ets;
use esp_idf_svc::hal::gpio::{PinDriver, Pull};
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

use plantops::adapters::cert_store::{self, PLANTOPS_CA_PEM};
use plantops::adapters::hardware::{HardwareAdapter, ResetButton};
use plantops::adapters::http::HttpAdapter;
use plantops::adapters::log_sink::LogEventSink;
use plantops::adapters::mqtt::MqttAdapter;
use plantops::adapters::nvs::NvsAdapter;
use plantops::adapters::time::Esp32SystemAdapter;
use plantops::adapters::wifi::WifiAdapter;
use plantops::app::controller::{Flow, LifecycleController};
use plantops::app::ports::{ConfigPort, SystemPort};
use plantops::config::SystemConfig;
use plantops::drivers::hw_init;
use plantops::drivers::watchdog::Watchdog;
use plantops::pins;
use plantops::sensors::SensorHub;
use plantops::sensors::climate::Dht22Probe;
use plantops::sensors::light::Bh1750;
use plantops::sensors::soil::SoilProbe;
use plantops::FIRMWARE_VERSION;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PlantOps sensor v{:<19}║", FIRMWARE_VERSION);
    info!("╚══════════════════════════════════════╝");

    let mut sys = Esp32SystemAdapter::new();
    let mut sink = LogEventSink::new();

    // ── 2. Initialise hardware peripherals ────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Sensors report invalid readings rather than halting the node;
        // telemetry is skipped until the next boot.
        error!("HAL init failed: {}, continuing without analog inputs", e);
    }

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let config_store = NvsAdapter::new()?;
    let config = match config_store.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    if let Err(e) = cert_store::validate_ca_pem(PLANTOPS_CA_PEM) {
        // Broker handshakes will fail; registration still works.
        error!("TLS: pinned CA unusable: {}", e);
    }

    // ── 4. Network link ───────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let wifi = WifiAdapter::new(peripherals.modem, sys_loop, nvs_partition)?;

    // ── 5. Sensors ────────────────────────────────────────────
    info!(
        "Pins: DHT22 gpio{}, soil gpio{}, I2C gpio{}/gpio{}, reset gpio{}",
        pins::DHT_DATA_GPIO,
        pins::SOIL_ADC_GPIO,
        pins::I2C_SDA_GPIO,
        pins::I2C_SCL_GPIO,
        pins::RESET_BUTTON_GPIO,
    );

    let mut dht_pin = PinDriver::input_output_od(peripherals.pins.gpio4)?;
    dht_pin.set_pull(Pull::Up)?;
    let climate = Dht22Probe::new(dht_pin, Ets);

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;
    let light = Bh1750::new(i2c, pins::BH1750_ADDR);

    let soil = SoilProbe::new(pins::SOIL_ADC1_CHANNEL, config.soil_wet_raw, config.soil_dry_raw);

    let mut hw = HardwareAdapter::new(SensorHub::new(climate, soil, light));
    let mut reset_button = ResetButton::new(pins::RESET_BUTTON_GPIO);

    // ── 6. Lifecycle controller ───────────────────────────────
    let tick_interval_ms = config.tick_interval_ms;
    let mut controller = LifecycleController::new(
        config,
        FIRMWARE_VERSION,
        PLANTOPS_CA_PEM,
        wifi,
        NvsAdapter::new()?,
        HttpAdapter::new(),
        MqttAdapter::new(),
    );

    if let Flow::Restart(reason) = controller.boot(&mut hw, &mut sys, &mut sink) {
        // esp_restart() does not return.
        error!("Main: boot ended in restart ({})", reason);
        return Ok(());
    }

    // ── 7. Steady-state loop ──────────────────────────────────
    let watchdog = Watchdog::arm();
    info!("System ready. Entering main loop.");

    loop {
        if let Flow::Restart(reason) =
            controller.tick(&mut hw, &mut reset_button, &mut sys, &mut sink)
        {
            error!("Main: loop ended in restart ({})", reason);
            return Ok(());
        }
        watchdog.feed();
        sys.delay_ms(tick_interval_ms);
    }
}
