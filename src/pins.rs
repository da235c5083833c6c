//! GPIO / peripheral pin assignments for the PlantOps sensor board
//! (ESP32-DevKitC).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Climate (DHT22 / AM2302 single-wire)
// ---------------------------------------------------------------------------

/// Open-drain data line, external 10 kΩ pull-up.
pub const DHT_DATA_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Soil moisture (capacitive probe v1.2, analog)
// ---------------------------------------------------------------------------

/// Probe output.  GPIO 34 is ADC1 channel 6 on the ESP32; ADC2 is unusable
/// while WiFi is up.
pub const SOIL_ADC_GPIO: i32 = 34;
/// ADC1 channel for [`SOIL_ADC_GPIO`].
pub const SOIL_ADC1_CHANNEL: u32 = 6;

// ---------------------------------------------------------------------------
// Ambient light (BH1750 on I²C)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// Standard-mode bus clock.
pub const I2C_FREQ_HZ: u32 = 100_000;
/// BH1750 address with ADDR pulled low.
pub const BH1750_ADDR: u8 = 0x23;

// ---------------------------------------------------------------------------
// Factory-reset button (BOOT, active-low with pull-up)
// ---------------------------------------------------------------------------

pub const RESET_BUTTON_GPIO: i32 = 0;
