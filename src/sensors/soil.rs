//! Capacitive soil-moisture probe (v1.2, analog output).
//!
//! Output voltage falls as the soil gets wetter.  The raw 12-bit reading is
//! clamped into the calibrated band `[wet_raw, dry_raw]` and mapped
//! linearly: `dry_raw` → 0 %, `wet_raw` → 100 %.  The band is per-probe
//! hardware calibration and comes from config.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static AtomicU16 for injection.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::SensorError;

use super::Probe;

#[cfg(not(target_os = "espidf"))]
static SIM_SOIL_ADC: AtomicU16 = AtomicU16::new(2800);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_soil_adc(raw: u16) {
    SIM_SOIL_ADC.store(raw, Ordering::Relaxed);
}

/// Map a raw reading onto 0–100 % using the calibration band.
///
/// A degenerate band (`wet_raw >= dry_raw`) reports 0 %.
pub fn raw_to_percent(raw: u16, wet_raw: u16, dry_raw: u16) -> f32 {
    if wet_raw >= dry_raw {
        return 0.0;
    }
    let clamped = raw.clamp(wet_raw, dry_raw);
    let span = f32::from(dry_raw - wet_raw);
    f32::from(dry_raw - clamped) * 100.0 / span
}

pub struct SoilProbe {
    channel: u32,
    wet_raw: u16,
    dry_raw: u16,
}

impl SoilProbe {
    pub fn new(adc1_channel: u32, wet_raw: u16, dry_raw: u16) -> Self {
        Self {
            channel: adc1_channel,
            wet_raw,
            dry_raw,
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> Result<u16, SensorError> {
        hw_init::adc1_read(self.channel).ok_or(SensorError::AdcReadFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> Result<u16, SensorError> {
        let _ = self.channel;
        Ok(SIM_SOIL_ADC.load(Ordering::Relaxed))
    }
}

impl Probe for SoilProbe {
    type Sample = f32;

    fn name(&self) -> &'static str {
        "soil"
    }

    fn init(&mut self) -> Result<(), SensorError> {
        if self.wet_raw >= self.dry_raw {
            return Err(SensorError::OutOfRange);
        }
        Ok(())
    }

    fn sample(&mut self) -> Result<f32, SensorError> {
        let raw = self.read_adc()?;
        log::debug!("Sensors: soil raw={}", raw);
        Ok(raw_to_percent(raw, self.wet_raw, self.dry_raw))
    }
}
