//! DHT22 (AM2302) air temperature and relative humidity.
//!
//! Single-wire protocol on an open-drain pin, at most one conversion every
//! 2 s.  The telemetry interval is far longer, so no rate limiting here.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: `dht_sensor` bit-bangs the line through an `esp_idf_hal`
//! `PinDriver` and the `Ets` busy-wait delay.
//! On host/test: values come from static atomics for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::SensorError;

use super::Probe;

/// DHT22 datasheet range.
const TEMP_MIN_C: f32 = -40.0;
const TEMP_MAX_C: f32 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Reject conversions the sensor cannot physically produce (NaN from a
/// garbled frame, or values outside the datasheet range).
pub fn check_climate(temperature_c: f32, humidity_pct: f32) -> Result<ClimateSample, SensorError> {
    if !(TEMP_MIN_C..=TEMP_MAX_C).contains(&temperature_c) || !(0.0..=100.0).contains(&humidity_pct) {
        return Err(SensorError::OutOfRange);
    }
    Ok(ClimateSample { temperature_c, humidity_pct })
}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct Dht22Probe<P, D> {
    pin: P,
    delay: D,
}

#[cfg(target_os = "espidf")]
impl<P, D> Dht22Probe<P, D>
where
    P: embedded_hal::digital::InputPin + embedded_hal::digital::OutputPin,
    D: embedded_hal::delay::DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }
}

#[cfg(target_os = "espidf")]
impl<P, D> Probe for Dht22Probe<P, D>
where
    P: embedded_hal::digital::InputPin + embedded_hal::digital::OutputPin,
    D: embedded_hal::delay::DelayNs,
{
    type Sample = ClimateSample;

    fn name(&self) -> &'static str {
        "DHT22"
    }

    fn init(&mut self) -> Result<(), SensorError> {
        // Idle level is high; the first start pulse pulls it low.
        self.pin.set_high().map_err(|_| SensorError::BusTimeout)?;
        self.delay.delay_ms(1_000);
        Ok(())
    }

    fn sample(&mut self) -> Result<ClimateSample, SensorError> {
        self.pin.set_high().map_err(|_| SensorError::BusTimeout)?;
        let reading = dht_sensor::dht22::blocking::read(&mut self.delay, &mut self.pin).map_err(|e| {
            log::debug!("Sensors: DHT22 {:?}", e);
            SensorError::BusTimeout
        })?;
        check_climate(reading.temperature, reading.relative_humidity)
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_TEMP_BITS: AtomicU32 = AtomicU32::new(0x41B4_0000); // 22.5
#[cfg(not(target_os = "espidf"))]
static SIM_HUMIDITY_BITS: AtomicU32 = AtomicU32::new(0x4240_0000); // 48.0
#[cfg(not(target_os = "espidf"))]
static SIM_FAULT: AtomicBool = AtomicBool::new(false);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_climate(temperature_c: f32, humidity_pct: f32) {
    SIM_TEMP_BITS.store(temperature_c.to_bits(), Ordering::Relaxed);
    SIM_HUMIDITY_BITS.store(humidity_pct.to_bits(), Ordering::Relaxed);
}

/// Simulation: make every following read time out.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_fault(fault: bool) {
    SIM_FAULT.store(fault, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct SimClimateProbe;

#[cfg(not(target_os = "espidf"))]
impl Probe for SimClimateProbe {
    type Sample = ClimateSample;

    fn name(&self) -> &'static str {
        "DHT22(sim)"
    }

    fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn sample(&mut self) -> Result<ClimateSample, SensorError> {
        if SIM_FAULT.load(Ordering::Relaxed) {
            return Err(SensorError::BusTimeout);
        }
        check_climate(
            f32::from_bits(SIM_TEMP_BITS.load(Ordering::Relaxed)),
            f32::from_bits(SIM_HUMIDITY_BITS.load(Ordering::Relaxed)),
        )
    }
}
