//! # roomclock
//!
//! Room-climate driver and dashboard state for a Raspberry Pi desk clock.
//!
//! The core is a driver for the Bosch BME280 temperature, humidity and
//! pressure sensor on I2C. It configures the sensor for continuous sampling,
//! reads the factory calibration once, and turns each raw burst into
//! display-ready strings:
//!
//! - temperature in °C, one decimal (`"23.4"`)
//! - relative humidity in %, no decimals, clamped to 0..=100 (`"45"`)
//! - pressure in hPa, no decimals (`"1013"`)
//!
//! Around it sit the other dashboard sources: a forecast shape decoded from
//! OpenWeatherMap, an Ookla speed test runner, and a refresh cadence.
//!
//! ## Quick Start (Linux)
//!
//! ```rust,ignore
//! use roomclock::{open_linux_bus, Bme280, SensorConfig};
//!
//! let bus = open_linux_bus(&SensorConfig::from_env()?)?;
//! let mut sensor = Bme280::new(bus);
//! sensor.initialize()?;
//!
//! let status = sensor.get_status()?;
//! println!("{}°C {}% {}hPa", status.temperature, status.humidity, status.pressure);
//! ```
//!
//! ## Feature Flags
//!
//! - `linux` - Open `/dev/i2c-N` via `linux-embedded-hal`
//! - `speedtest` - Run the speed test CLI (tokio)
//! - `schedule` - Refresh cadence with YAML rules
//! - `axum` - JSON endpoint for the dashboard
//! - `full` - All features

pub mod bus;
pub mod calibration;
pub mod compensation;
pub mod config;
pub mod dashboard;
mod error;
pub mod sensor;
pub mod speedtest;
pub mod weather;

pub use bus::{I2cRegisters, RegisterBus};
pub use calibration::CalibrationSet;
pub use compensation::{FineTemperature, PressureScaling, RawSample};
pub use config::{
    ControlSettings, Filter, ForecastConfig, Mode, Oversampling, SensorConfig, Standby,
};
pub use dashboard::{Dashboard, DashboardSnapshot, ForecastCell, NetworkCell};
pub use error::Error;
pub use sensor::{Bme280, Reading, Status};
pub use speedtest::{SpeedTestConfig, SpeedTestResult};
pub use weather::{ForecastEntry, ForecastProvider};

#[cfg(feature = "linux")]
pub use bus::open_linux_bus;

#[cfg(feature = "speedtest")]
pub use speedtest::run_speedtest;

/// Default 7-bit address (SDO tied low).
pub const DEFAULT_I2C_ADDRESS: u8 = 0x76;

/// Default Linux I2C bus (`/dev/i2c-1` on a Raspberry Pi).
pub const DEFAULT_I2C_BUS: u8 = 1;

/// Default room sensor refresh interval in seconds
pub const DEFAULT_REFRESH_SECS: u32 = 10;

/// Forecast slots shown on the dashboard
pub const FORECAST_SLOTS: usize = 7;

// Optional modules
#[cfg(feature = "schedule")]
pub mod schedule;
#[cfg(feature = "schedule")]
pub use schedule::{
    get_global_refresh_rate, global_schedule, init_global_schedule, CadenceRule, DaySelector,
    DueTasks, RefreshSchedule, SecondTicker,
};

#[cfg(feature = "axum")]
pub mod axum_ext;
