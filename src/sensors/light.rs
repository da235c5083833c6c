//! BH1750 ambient light sensor over I²C.
//!
//! Runs in continuous high-resolution mode (1 lx steps, 120 ms per
//! conversion).  Each sample is one 2-byte read of the latest result.
//! The bus is anything implementing `embedded_hal::i2c::I2c`; on the
//! device that is an `esp_idf_hal` `I2cDriver`.

use embedded_hal::i2c::I2c;

use crate::error::SensorError;

use super::Probe;

const CMD_POWER_ON: u8 = 0x01;
const CMD_RESET: u8 = 0x07;
const CMD_CONTINUOUS_HIGH_RES: u8 = 0x10;

/// Counts per lux at the default measurement time.
const COUNTS_PER_LUX: f32 = 1.2;

/// Convert the raw big-endian result register to lux.
pub fn raw_to_lux(raw: [u8; 2]) -> f32 {
    let lux = f32::from(u16::from_be_bytes(raw)) / COUNTS_PER_LUX;
    lux.max(0.0)
}

pub struct Bh1750<B> {
    bus: B,
    address: u8,
    ready: bool,
}

impl<B: I2c> Bh1750<B> {
    pub fn new(bus: B, address: u8) -> Self {
        Self {
            bus,
            address,
            ready: false,
        }
    }

    fn command(&mut self, cmd: u8) -> Result<(), SensorError> {
        self.bus
            .write(self.address, &[cmd])
            .map_err(|_| SensorError::I2cFailed)
    }
}

impl<B: I2c> Probe for Bh1750<B> {
    type Sample = f32;

    fn name(&self) -> &'static str {
        "BH1750"
    }

    fn init(&mut self) -> Result<(), SensorError> {
        self.command(CMD_POWER_ON)?;
        self.command(CMD_RESET)?;
        self.command(CMD_CONTINUOUS_HIGH_RES)?;
        self.ready = true;
        Ok(())
    }

    fn sample(&mut self) -> Result<f32, SensorError> {
        if !self.ready {
            return Err(SensorError::NotInitialised);
        }
        let mut buf = [0u8; 2];
        self.bus
            .read(self.address, &mut buf)
            .map_err(|_| SensorError::I2cFailed)?;
        Ok(raw_to_lux(buf))
    }
}
