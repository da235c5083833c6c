//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the reset button, exposing them through
//! [`SensorPort`] and [`ResetInputPort`].  On non-espidf targets the
//! button reads a simulation atomic.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, Ordering};

use crate::app::model::SensorReading;
use crate::app::ports::{ResetInputPort, SensorPort};
#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::sensors::climate::ClimateSample;
use crate::sensors::{Probe, SensorHub};

/// Concrete adapter that puts the sensor hub behind [`SensorPort`].
pub struct HardwareAdapter<C, S, L>
where
    C: Probe<Sample = ClimateSample>,
    S: Probe<Sample = f32>,
    L: Probe<Sample = f32>,
{
    sensor_hub: SensorHub<C, S, L>,
}

impl<C, S, L> HardwareAdapter<C, S, L>
where
    C: Probe<Sample = ClimateSample>,
    S: Probe<Sample = f32>,
    L: Probe<Sample = f32>,
{
    pub fn new(sensor_hub: SensorHub<C, S, L>) -> Self {
        Self { sensor_hub }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<C, S, L> SensorPort for HardwareAdapter<C, S, L>
where
    C: Probe<Sample = ClimateSample>,
    S: Probe<Sample = f32>,
    L: Probe<Sample = f32>,
{
    fn init(&mut self) -> bool {
        self.sensor_hub.init()
    }

    fn read(&mut self) -> SensorReading {
        self.sensor_hub.read()
    }
}

// ── ResetInputPort implementation ─────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_BUTTON_PRESSED: AtomicBool = AtomicBool::new(false);

/// Simulation: hold or release the reset button.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_button(pressed: bool) {
    SIM_BUTTON_PRESSED.store(pressed, Ordering::Relaxed);
}

/// Active-low push button with pull-up.
pub struct ResetButton {
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    gpio: i32,
}

impl ResetButton {
    pub fn new(gpio: i32) -> Self {
        Self { gpio }
    }
}

impl ResetInputPort for ResetButton {
    #[cfg(target_os = "espidf")]
    fn is_pressed(&mut self) -> bool {
        !hw_init::gpio_read(self.gpio)
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_pressed(&mut self) -> bool {
        SIM_BUTTON_PRESSED.load(Ordering::Relaxed)
    }
}
