//! Factory calibration coefficients.
//!
//! Coefficients are burned into three register blocks at manufacture:
//!
//! | Registers | Bytes | Contents |
//! |-----------|-------|----------|
//! | `0x88..=0x9F` | 24 | T1..T3, P1..P9 (little-endian pairs) |
//! | `0xA1` | 1 | H1 |
//! | `0xE1..=0xE7` | 7 | H2..H6 (H4/H5 share a nibble-packed byte) |
//!
//! Signed coefficients arrive as raw 16-bit two's-complement patterns and are
//! corrected once after decoding. The correction pass covers exactly the
//! slots listed in [`SIGNED_TEMPERATURE`], [`SIGNED_PRESSURE`] and
//! [`SIGNED_HUMIDITY`]; every other slot is kept as read. This matches the
//! readings produced by the reference dashboard bit for bit, including
//! T3 and P9 which stay unsigned.

use crate::bus::RegisterBus;
use crate::error::Error;

/// First register of the temperature/pressure block.
pub const REG_CALIB_TP: u8 = 0x88;
/// Length of the temperature/pressure block.
pub const CALIB_TP_LEN: usize = 24;
/// H1 register.
pub const REG_CALIB_H1: u8 = 0xA1;
/// First register of the humidity block.
pub const REG_CALIB_H: u8 = 0xE1;
/// Length of the humidity block.
pub const CALIB_H_LEN: usize = 7;
/// Total calibration bytes.
pub const CALIB_LEN: usize = CALIB_TP_LEN + 1 + CALIB_H_LEN;

/// Temperature slots that get two's-complement correction (T2).
pub const SIGNED_TEMPERATURE: std::ops::Range<usize> = 1..2;
/// Pressure slots that get two's-complement correction (P2..P8).
pub const SIGNED_PRESSURE: std::ops::Range<usize> = 1..8;
/// Humidity slots that get two's-complement correction (H1..H6).
///
/// Only H2 can actually have bit 15 set; the pass over the other slots is a
/// no-op for every value the decoder can produce.
// TODO: compare H4/H5/H6 signedness against the datasheet on real hardware
pub const SIGNED_HUMIDITY: std::ops::Range<usize> = 0..6;

/// Convert a raw 16-bit two's-complement pattern to its signed value.
///
/// Takes the raw register pattern, so an already-corrected value cannot be
/// fed back in.
///
/// ```
/// use roomclock::calibration::twos_complement;
///
/// assert_eq!(twos_complement(0x8001), -32767);
/// assert_eq!(twos_complement(0x7FFF), 32767);
/// ```
pub fn twos_complement(raw: u16) -> i32 {
    i32::from(raw as i16)
}

/// Decoded and sign-corrected calibration coefficients for one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationSet {
    /// T1, T2, T3
    pub temperature: [i32; 3],
    /// P1 through P9
    pub pressure: [i32; 9],
    /// H1, H2, H3, H4, H5, H6
    pub humidity: [i32; 6],
}

impl CalibrationSet {
    /// Read all three calibration blocks from the device and decode them.
    pub fn read<B: RegisterBus + ?Sized>(bus: &mut B) -> Result<Self, Error> {
        let mut raw = [0u8; CALIB_LEN];
        bus.read_registers(REG_CALIB_TP, &mut raw[..CALIB_TP_LEN])?;
        raw[CALIB_TP_LEN] = bus.read_register(REG_CALIB_H1)?;
        bus.read_registers(REG_CALIB_H, &mut raw[CALIB_TP_LEN + 1..])?;

        let calibration = Self::from_bytes(&raw);
        tracing::debug!(
            "Calibration coefficients: T={:?} P={:?} H={:?}",
            calibration.temperature,
            calibration.pressure,
            calibration.humidity
        );
        Ok(calibration)
    }

    /// Decode the 32 calibration bytes in register order
    /// (`0x88..=0x9F`, `0xA1`, `0xE1..=0xE7`).
    pub fn from_bytes(raw: &[u8; CALIB_LEN]) -> Self {
        let pair = |lo: usize| u16::from_le_bytes([raw[lo], raw[lo + 1]]);

        let mut temperature = [0u16; 3];
        for (i, slot) in temperature.iter_mut().enumerate() {
            *slot = pair(2 * i);
        }
        let mut pressure = [0u16; 9];
        for (i, slot) in pressure.iter_mut().enumerate() {
            *slot = pair(6 + 2 * i);
        }

        let e4 = u16::from(raw[28]);
        let e5 = u16::from(raw[29]);
        let e6 = u16::from(raw[30]);
        let humidity = [
            u16::from(raw[24]),
            pair(25),
            u16::from(raw[27]),
            (e4 << 4) | (e5 & 0x0F),
            (e6 << 4) | ((e5 >> 4) & 0x0F),
            u16::from(raw[31]),
        ];

        Self {
            temperature: correct(temperature, SIGNED_TEMPERATURE),
            pressure: correct(pressure, SIGNED_PRESSURE),
            humidity: correct(humidity, SIGNED_HUMIDITY),
        }
    }
}

fn correct<const N: usize>(raw: [u16; N], signed: std::ops::Range<usize>) -> [i32; N] {
    let mut out = [0i32; N];
    for (i, (slot, value)) in out.iter_mut().zip(raw).enumerate() {
        *slot = if signed.contains(&i) {
            twos_complement(value)
        } else {
            i32::from(value)
        };
    }
    out
}
