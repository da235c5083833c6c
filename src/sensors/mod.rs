//! Sensor subsystem: individual probes and the aggregating [`SensorHub`].
//!
//! Each physical sensor is a [`Probe`]: it either produces a sample or
//! reports a [`SensorError`].  The hub owns one probe per quantity and
//! folds their samples into a single [`SensorReading`] per telemetry cycle.
//!
//! | Probe         | Quantity              | On failure                  |
//! |---------------|-----------------------|-----------------------------|
//! | `climate`     | temperature, humidity | whole reading invalid       |
//! | `soil`        | soil moisture %       | whole reading invalid       |
//! | `light`       | illuminance (lux)     | 0 lux, reading stays valid  |

pub mod climate;
pub mod light;
pub mod soil;

use log::{info, warn};

use crate::app::model::SensorReading;
use crate::error::SensorError;
use climate::ClimateSample;

/// A single physical sensor.
pub trait Probe {
    type Sample;

    /// Short name for log lines.
    fn name(&self) -> &'static str;

    /// Bring the device up.  Called once at boot.
    fn init(&mut self) -> Result<(), SensorError>;

    /// Take one measurement.
    fn sample(&mut self) -> Result<Self::Sample, SensorError>;
}

/// Aggregates the three probes and produces a unified reading.
pub struct SensorHub<C, S, L>
where
    C: Probe<Sample = ClimateSample>,
    S: Probe<Sample = f32>,
    L: Probe<Sample = f32>,
{
    pub climate: C,
    pub soil: S,
    pub light: L,
    light_present: bool,
}

impl<C, S, L> SensorHub<C, S, L>
where
    C: Probe<Sample = ClimateSample>,
    S: Probe<Sample = f32>,
    L: Probe<Sample = f32>,
{
    /// Construct a new hub.  Pass in pre-built probes (built in main
    /// where peripheral ownership is established).
    pub fn new(climate: C, soil: S, light: L) -> Self {
        Self {
            climate,
            soil,
            light,
            light_present: false,
        }
    }

    /// Initialise every probe.  Returns `true` if the probes a valid
    /// reading depends on came up; the light sensor is optional.
    pub fn init(&mut self) -> bool {
        let climate_ok = init_probe(&mut self.climate);
        let soil_ok = init_probe(&mut self.soil);
        self.light_present = init_probe(&mut self.light);
        if !self.light_present {
            warn!("Sensors: light sensor absent, lux will read 0");
        }
        climate_ok && soil_ok
    }

    /// Read every probe and combine into one reading.
    pub fn read(&mut self) -> SensorReading {
        let climate = match self.climate.sample() {
            Ok(c) => c,
            Err(e) => {
                warn!("Sensors: {} read failed: {}", self.climate.name(), e);
                return SensorReading::invalid();
            }
        };

        let soil_moisture_pct = match self.soil.sample() {
            Ok(pct) => pct,
            Err(e) => {
                warn!("Sensors: {} read failed: {}", self.soil.name(), e);
                return SensorReading::invalid();
            }
        };

        let light_lux = if self.light_present {
            self.light.sample().unwrap_or_else(|e| {
                warn!("Sensors: {} read failed: {}", self.light.name(), e);
                0.0
            })
        } else {
            0.0
        };

        SensorReading {
            temperature_c: climate.temperature_c,
            humidity_pct: climate.humidity_pct,
            soil_moisture_pct,
            light_lux,
            valid: true,
        }
    }

    pub fn light_present(&self) -> bool {
        self.light_present
    }
}

fn init_probe<P: Probe>(probe: &mut P) -> bool {
    match probe.init() {
        Ok(()) => {
            info!("Sensors: {} ready", probe.name());
            true
        }
        Err(e) => {
            warn!("Sensors: {} init failed: {}", probe.name(), e);
            false
        }
    }
}
