//! Raw sample decoding and the floating-point compensation formulas.
//!
//! Humidity and pressure depend on an intermediate of the temperature
//! formula, the fine temperature. [`compensate_temperature`] is the only
//! way to obtain a [`FineTemperature`], and the other two formulas take one
//! by value, so they cannot run before temperature in a read cycle.
//!
//! Operation order inside each formula follows the Bosch double-precision
//! reference so results match the reference dashboard exactly.

use crate::calibration::CalibrationSet;

/// First register of the burst-read data block (`press_msb`).
pub const REG_DATA: u8 = 0xF7;
/// Length of the burst-read data block.
pub const DATA_LEN: usize = 8;

/// Pressure numerator at which the scaling path switches.
pub const PRESSURE_SCALING_THRESHOLD: f64 = 2_147_483_648.0; // 0x80000000

/// One burst of raw ADC values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    /// 20-bit pressure
    pub pressure: u32,
    /// 20-bit temperature
    pub temperature: u32,
    /// 16-bit humidity
    pub humidity: u32,
}

impl RawSample {
    /// Decode the eight data registers `0xF7..=0xFE`.
    ///
    /// Pressure and temperature are big-endian `msb, lsb, xlsb` with the
    /// low nibble of `xlsb` unused; humidity is big-endian `msb, lsb`.
    pub fn from_bytes(data: &[u8; DATA_LEN]) -> Self {
        let packed20 = |msb: u8, lsb: u8, xlsb: u8| {
            (u32::from(msb) << 12) | (u32::from(lsb) << 4) | (u32::from(xlsb) >> 4)
        };
        Self {
            pressure: packed20(data[0], data[1], data[2]),
            temperature: packed20(data[3], data[4], data[5]),
            humidity: (u32::from(data[6]) << 8) | u32::from(data[7]),
        }
    }
}

/// Temperature intermediate shared by the humidity and pressure formulas.
///
/// Produced only by [`compensate_temperature`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FineTemperature(f64);

impl FineTemperature {
    /// The raw value.
    pub fn value(self) -> f64 {
        self.0
    }
}

/// Compensate a raw temperature, returning degrees Celsius and the fine
/// temperature for this cycle.
pub fn compensate_temperature(cal: &CalibrationSet, raw: u32) -> (f64, FineTemperature) {
    let [t1, t2, t3] = cal.temperature.map(f64::from);
    let adc = f64::from(raw);

    let v1 = (adc / 16384.0 - t1 / 1024.0) * t2;
    let v2 = (adc / 131072.0 - t1 / 8192.0) * (adc / 131072.0 - t1 / 8192.0) * t3;
    let fine = v1 + v2;
    (fine / 5120.0, FineTemperature(fine))
}

/// Compensate a raw humidity, returning relative humidity in percent,
/// clamped to `0.0..=100.0`.
///
/// Returns `None` when the fine temperature is exactly 76800, where the
/// reference formula has no defined value.
pub fn compensate_humidity(cal: &CalibrationSet, fine: FineTemperature, raw: u32) -> Option<f64> {
    let [h1, h2, h3, h4, h5, h6] = cal.humidity.map(f64::from);
    let adc = f64::from(raw);

    let var_h = fine.0 - 76800.0;
    if var_h == 0.0 {
        tracing::warn!("Humidity skipped: fine temperature at 76800");
        return None;
    }

    let var_h = (adc - (h4 * 64.0 + h5 / 16384.0 * var_h))
        * (h2 / 65536.0 * (1.0 + h6 / 67108864.0 * var_h * (1.0 + h3 / 67108864.0 * var_h)));
    let var_h = var_h * (1.0 - h1 * var_h / 524288.0);

    Some(var_h.clamp(0.0, 100.0))
}

/// Which arithmetic the pressure formula uses to scale its numerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureScaling {
    /// Numerator below 0x80000000: `(p * 2) / v1`
    MultiplyFirst,
    /// Numerator at or above 0x80000000: `(p / v1) * 2`
    DivideFirst,
}

impl PressureScaling {
    /// Pick the scaling path for a numerator.
    pub fn for_numerator(numerator: f64) -> Self {
        if numerator < PRESSURE_SCALING_THRESHOLD {
            Self::MultiplyFirst
        } else {
            Self::DivideFirst
        }
    }

    /// Apply this path.
    pub fn apply(self, numerator: f64, v1: f64) -> f64 {
        match self {
            Self::MultiplyFirst => (numerator * 2.0) / v1,
            Self::DivideFirst => (numerator / v1) * 2.0,
        }
    }
}

/// Shared first intermediate of the pressure formula.
fn pressure_base(fine: FineTemperature) -> f64 {
    (fine.0 / 2.0) - 64000.0
}

/// Divisor of the pressure formula; zero when P1 is zero or the fine
/// temperature cancels the P2/P3 terms.
pub(crate) fn pressure_divisor(cal: &CalibrationSet, fine: FineTemperature) -> f64 {
    let [p1, p2, p3, ..] = cal.pressure.map(f64::from);
    let v1 = pressure_base(fine);
    let v1 = (((p3 * (((v1 / 4.0) * (v1 / 4.0)) / 8192.0)) / 8.0) + ((p2 * v1) / 2.0)) / 262144.0;
    ((32768.0 + v1) * p1) / 32768.0
}

/// Numerator the [`PressureScaling`] path is chosen on.
pub(crate) fn pressure_numerator(cal: &CalibrationSet, fine: FineTemperature, raw: u32) -> f64 {
    let [_, _, _, p4, p5, p6, ..] = cal.pressure.map(f64::from);
    let adc = f64::from(raw);

    let v1 = pressure_base(fine);
    let v2 = (((v1 / 4.0) * (v1 / 4.0)) / 2048.0) * p6;
    let v2 = v2 + ((v1 * p5) * 2.0);
    let v2 = (v2 / 4.0) + (p4 * 65536.0);
    ((1048576.0 - adc) - (v2 / 4096.0)) * 3125.0
}

/// P7..P9 correction applied to the scaled pressure.
fn pressure_correction(cal: &CalibrationSet, pressure: f64) -> f64 {
    let [.., p7, p8, p9] = cal.pressure.map(f64::from);
    let v1 = (p9 * (((pressure / 8.0) * (pressure / 8.0)) / 8192.0)) / 4096.0;
    let v2 = ((pressure / 4.0) * p8) / 8192.0;
    pressure + ((v1 + v2 + p7) / 16.0)
}

/// Compensate a raw pressure, returning pascals.
///
/// Returns `None` when the divisor is exactly zero (P1 = 0 or a fine
/// temperature that cancels it).
pub fn compensate_pressure(cal: &CalibrationSet, fine: FineTemperature, raw: u32) -> Option<f64> {
    let divisor = pressure_divisor(cal, fine);
    if divisor == 0.0 {
        tracing::warn!("Pressure skipped: zero divisor");
        return None;
    }

    let numerator = pressure_numerator(cal, fine, raw);
    let pressure = PressureScaling::for_numerator(numerator).apply(numerator, divisor);
    Some(pressure_correction(cal, pressure))
}
