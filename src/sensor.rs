//! BME280 temperature, humidity and pressure driver.
//!
//! Lifecycle: [`Bme280::new`] → [`Bme280::initialize`] (writes the control
//! registers, reads calibration) → [`Bme280::get_status`] as often as needed.
//! In normal mode the device keeps sampling on its own, so every read just
//! picks up the most recent sample.
//!
//! The driver takes `&mut self` for every bus access. Share it between
//! threads behind a mutex; reads must never overlap.
//!
//! # Example
//!
//! ```
//! use roomclock::{Bme280, RegisterBus, Error};
//!
//! /// A device that has not been wired up yet.
//! struct Unplugged;
//!
//! impl RegisterBus for Unplugged {
//!     fn read_register(&mut self, _: u8) -> Result<u8, Error> {
//!         Err(Error::Bus("NoAcknowledge(Address)".into()))
//!     }
//!     fn write_register(&mut self, _: u8, _: u8) -> Result<(), Error> {
//!         Err(Error::Bus("NoAcknowledge(Address)".into()))
//!     }
//! }
//!
//! let mut sensor = Bme280::new(Unplugged);
//! assert!(matches!(sensor.get_status(), Err(Error::NotInitialized)));
//! assert!(matches!(sensor.initialize(), Err(Error::Bus(_))));
//! assert!(!sensor.is_initialized());
//! ```

use serde::{Deserialize, Serialize};

use crate::bus::RegisterBus;
use crate::calibration::CalibrationSet;
use crate::compensation::{
    compensate_humidity, compensate_pressure, compensate_temperature, RawSample, DATA_LEN,
    REG_DATA,
};
use crate::config::ControlSettings;
use crate::error::Error;

/// `ctrl_hum` register.
pub const REG_CTRL_HUM: u8 = 0xF2;
/// `ctrl_meas` register.
pub const REG_CTRL_MEAS: u8 = 0xF4;
/// `config` register.
pub const REG_CONFIG: u8 = 0xF5;

/// One compensated reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Temperature in °C
    pub temperature_c: f64,
    /// Relative humidity in %, `None` when the formula is undefined
    pub humidity_percent: Option<f64>,
    /// Pressure in hPa, `None` when the formula is undefined
    pub pressure_hpa: Option<f64>,
}

impl Reading {
    /// Format for display.
    pub fn to_status(&self) -> Status {
        Status {
            temperature: format!("{:4.1}", self.temperature_c),
            humidity: self
                .humidity_percent
                .map(|h| format!("{:2.0}", h))
                .unwrap_or_default(),
            pressure: self
                .pressure_hpa
                .map(|p| format!("{:3.0}", p))
                .unwrap_or_default(),
        }
    }
}

/// A reading formatted for the display: temperature to one decimal,
/// humidity and pressure (hPa) to whole numbers.
///
/// A value the device could not produce this cycle is an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    /// e.g. `"23.4"`
    pub temperature: String,
    /// e.g. `"45"`
    pub humidity: String,
    /// e.g. `"1013"`
    pub pressure: String,
}

impl Status {
    /// `(temperature, humidity, pressure)`
    pub fn into_tuple(self) -> (String, String, String) {
        (self.temperature, self.humidity, self.pressure)
    }
}

/// BME280 driver over a [`RegisterBus`].
#[derive(Debug)]
pub struct Bme280<B> {
    bus: B,
    settings: ControlSettings,
    calibration: Option<CalibrationSet>,
}

impl<B: RegisterBus> Bme280<B> {
    /// Create a driver with the default control settings.
    ///
    /// Nothing is sent until [`initialize`](Self::initialize).
    pub fn new(bus: B) -> Self {
        Self::with_settings(bus, ControlSettings::default())
    }

    /// Create a driver with custom control settings.
    pub fn with_settings(bus: B, settings: ControlSettings) -> Self {
        Self {
            bus,
            settings,
            calibration: None,
        }
    }

    /// Write the control registers and read the calibration coefficients.
    ///
    /// `ctrl_hum` is written before `ctrl_meas`; the device only latches a
    /// humidity change on the next `ctrl_meas` write.
    pub fn initialize(&mut self) -> Result<(), Error> {
        self.bus
            .write_register(REG_CTRL_HUM, self.settings.ctrl_hum())?;
        self.bus
            .write_register(REG_CTRL_MEAS, self.settings.ctrl_meas())?;
        self.bus.write_register(REG_CONFIG, self.settings.config())?;

        self.calibration = Some(CalibrationSet::read(&mut self.bus)?);
        tracing::info!(
            "BME280 initialized (ctrl_meas=0x{:02X}, config=0x{:02X})",
            self.settings.ctrl_meas(),
            self.settings.config()
        );
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    pub fn is_initialized(&self) -> bool {
        self.calibration.is_some()
    }

    /// The calibration read during initialization.
    pub fn calibration(&self) -> Option<&CalibrationSet> {
        self.calibration.as_ref()
    }

    /// The control settings written on initialization.
    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    /// Burst-read the latest raw sample.
    pub fn read_raw(&mut self) -> Result<RawSample, Error> {
        let mut data = [0u8; DATA_LEN];
        self.bus.read_registers(REG_DATA, &mut data)?;
        let sample = RawSample::from_bytes(&data);
        tracing::debug!(
            "Raw sample: P={} T={} H={}",
            sample.pressure,
            sample.temperature,
            sample.humidity
        );
        Ok(sample)
    }

    /// Read and compensate one sample.
    pub fn read(&mut self) -> Result<Reading, Error> {
        let calibration = self.calibration.ok_or(Error::NotInitialized)?;
        let sample = self.read_raw()?;

        let (temperature_c, fine) = compensate_temperature(&calibration, sample.temperature);
        let humidity_percent = compensate_humidity(&calibration, fine, sample.humidity);
        let pressure_hpa =
            compensate_pressure(&calibration, fine, sample.pressure).map(|pa| pa / 100.0);

        Ok(Reading {
            temperature_c,
            humidity_percent,
            pressure_hpa,
        })
    }

    /// Read one sample formatted for the display.
    pub fn get_status(&mut self) -> Result<Status, Error> {
        Ok(self.read()?.to_status())
    }

    /// Give the bus back.
    pub fn release(self) -> B {
        self.bus
    }
}
