//! Sensor, control-register and forecast configuration.
//!
//! Bus index and device address vary between boards (`/dev/i2c-0` on the
//! oldest Raspberry Pi revisions, `0x77` when SDO is pulled high), so both
//! can be overridden from the environment:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `BME280_I2C_BUS` | `1` | I2C bus index (`/dev/i2c-N`) |
//! | `BME280_I2C_ADDRESS` | `0x76` | 7-bit device address |
//! | `API_KEY` | - | OpenWeatherMap API key |
//! | `ZIP` | - | Forecast location, e.g. `537-0003,JP` |
//! | `FORECAST_TIMEZONE` | `Asia/Tokyo` | Timezone the dashboard clock and forecast hours are shown in |

use chrono_tz::Tz;

use crate::error::Error;
use crate::{DEFAULT_I2C_ADDRESS, DEFAULT_I2C_BUS};

/// Default timezone for forecast display.
pub const DEFAULT_FORECAST_TIMEZONE: &str = "Asia/Tokyo";

const FORECAST_URL: &str = "https://api.openweathermap.org/data/2.5/forecast";

/// Where the sensor lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    /// I2C bus index
    pub bus: u8,
    /// 7-bit device address
    pub address: u8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            bus: DEFAULT_I2C_BUS,
            address: DEFAULT_I2C_ADDRESS,
        }
    }
}

impl SensorConfig {
    /// Load from `BME280_I2C_BUS` and `BME280_I2C_ADDRESS`.
    ///
    /// Unset variables keep their defaults; unparsable ones are an error.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(bus) = lookup("BME280_I2C_BUS") {
            config.bus = parse_u8(&bus)
                .ok_or_else(|| Error::Config(format!("Invalid BME280_I2C_BUS '{}'", bus)))?;
        }
        if let Some(address) = lookup("BME280_I2C_ADDRESS") {
            config.address = parse_u8(&address).ok_or_else(|| {
                Error::Config(format!("Invalid BME280_I2C_ADDRESS '{}'", address))
            })?;
        }
        Ok(config)
    }

    /// Set the bus index.
    #[must_use]
    pub fn with_bus(mut self, bus: u8) -> Self {
        self.bus = bus;
        self
    }

    /// Set the device address.
    #[must_use]
    pub fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Linux character device for the bus (e.g. `/dev/i2c-1`).
    pub fn device_path(&self) -> String {
        format!("/dev/i2c-{}", self.bus)
    }
}

/// Parse a decimal or `0x`-prefixed hex byte.
fn parse_u8(s: &str) -> Option<u8> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Number of ADC samples averaged per reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Oversampling {
    /// Measurement skipped (output is 0x80000)
    Skipped = 0,
    /// ×1
    #[default]
    X1 = 1,
    /// ×2
    X2 = 2,
    /// ×4
    X4 = 3,
    /// ×8
    X8 = 4,
    /// ×16
    X16 = 5,
}

/// Power mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No measurements
    Sleep = 0b00,
    /// One measurement, then back to sleep
    Forced = 0b01,
    /// Continuous measurements separated by the standby time
    #[default]
    Normal = 0b11,
}

/// Inactive time between measurements in normal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Standby {
    /// 0.5 ms
    Ms0_5 = 0,
    /// 62.5 ms
    Ms62_5 = 1,
    /// 125 ms
    Ms125 = 2,
    /// 250 ms
    Ms250 = 3,
    /// 500 ms
    Ms500 = 4,
    /// 1000 ms
    #[default]
    Ms1000 = 5,
    /// 10 ms
    Ms10 = 6,
    /// 20 ms
    Ms20 = 7,
}

/// IIR filter coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Filter off
    #[default]
    Off = 0,
    /// Coefficient 2
    X2 = 1,
    /// Coefficient 4
    X4 = 2,
    /// Coefficient 8
    X8 = 3,
    /// Coefficient 16
    X16 = 4,
}

/// Values written to `ctrl_hum`, `ctrl_meas` and `config` on initialization.
///
/// The default is what the dashboard runs with: ×1 oversampling everywhere,
/// normal mode, 1000 ms standby, filter off and 3-wire SPI disabled.
///
/// ```
/// use roomclock::ControlSettings;
///
/// let settings = ControlSettings::default();
/// assert_eq!(settings.ctrl_hum(), 0x01);
/// assert_eq!(settings.ctrl_meas(), 0x27);
/// assert_eq!(settings.config(), 0xA0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlSettings {
    /// Temperature oversampling
    pub temperature: Oversampling,
    /// Pressure oversampling
    pub pressure: Oversampling,
    /// Humidity oversampling
    pub humidity: Oversampling,
    /// Power mode
    pub mode: Mode,
    /// Standby time
    pub standby: Standby,
    /// IIR filter
    pub filter: Filter,
    /// 3-wire SPI interface
    pub spi3w_enable: bool,
}

impl ControlSettings {
    /// `ctrl_hum` register value.
    pub fn ctrl_hum(&self) -> u8 {
        self.humidity as u8
    }

    /// `ctrl_meas` register value: `osrs_t << 5 | osrs_p << 2 | mode`.
    pub fn ctrl_meas(&self) -> u8 {
        ((self.temperature as u8) << 5) | ((self.pressure as u8) << 2) | self.mode as u8
    }

    /// `config` register value: `t_sb << 5 | filter << 2 | spi3w_en`.
    pub fn config(&self) -> u8 {
        ((self.standby as u8) << 5) | ((self.filter as u8) << 2) | u8::from(self.spi3w_enable)
    }
}

/// OpenWeatherMap forecast settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastConfig {
    /// API key
    pub api_key: String,
    /// Location as `zip,country`
    pub zip: String,
    /// Timezone the dashboard clock and forecast hours are shown in
    pub timezone: String,
}

impl ForecastConfig {
    /// Create a config with the default timezone.
    pub fn new(api_key: impl Into<String>, zip: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            zip: zip.into(),
            timezone: DEFAULT_FORECAST_TIMEZONE.to_string(),
        }
    }

    /// Load from `API_KEY`, `ZIP` and `FORECAST_TIMEZONE`.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let api_key = lookup("API_KEY")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config("API_KEY is not set".to_string()))?;
        let zip = lookup("ZIP")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config("ZIP is not set".to_string()))?;
        let mut config = Self::new(api_key, zip);
        if let Some(tz) = lookup("FORECAST_TIMEZONE") {
            config.timezone = tz;
        }
        config.tz()?;
        Ok(config)
    }

    /// The display timezone, parsed.
    pub fn tz(&self) -> Result<Tz, Error> {
        self.timezone
            .parse()
            .map_err(|_| Error::Config(format!("Unknown FORECAST_TIMEZONE '{}'", self.timezone)))
    }

    /// Set the display timezone.
    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// The 3-hourly forecast request URL, metric units.
    pub fn forecast_url(&self) -> String {
        format!(
            "{}?zip={}&units=metric&APPID={}",
            FORECAST_URL, self.zip, self.api_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_sensor_config_defaults() {
        let config = SensorConfig::default();
        assert_eq!(config.bus, 1);
        assert_eq!(config.address, 0x76);
        assert_eq!(config.device_path(), "/dev/i2c-1");
    }

    #[test]
    fn test_sensor_config_from_lookup() {
        let config =
            SensorConfig::from_lookup(env(&[("BME280_I2C_BUS", "0"), ("BME280_I2C_ADDRESS", "0x77")]))
                .unwrap();
        assert_eq!(config, SensorConfig { bus: 0, address: 0x77 });

        let config = SensorConfig::from_lookup(env(&[("BME280_I2C_ADDRESS", "118")])).unwrap();
        assert_eq!(config.address, 0x76);
        assert_eq!(config.bus, 1);
    }

    #[test]
    fn test_sensor_config_rejects_garbage() {
        let err = SensorConfig::from_lookup(env(&[("BME280_I2C_BUS", "one")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = SensorConfig::from_lookup(env(&[("BME280_I2C_ADDRESS", "0x1FF")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_sensor_config_builder() {
        let config = SensorConfig::default().with_bus(0).with_address(0x77);
        assert_eq!(config.device_path(), "/dev/i2c-0");
        assert_eq!(config.address, 0x77);
    }

    #[test]
    fn test_default_control_registers() {
        let settings = ControlSettings::default();
        assert_eq!(settings.ctrl_hum(), 0b0000_0001);
        assert_eq!(settings.ctrl_meas(), 0b001_001_11);
        assert_eq!(settings.config(), 0b101_000_0_0);
    }

    #[test]
    fn test_control_register_packing() {
        let settings = ControlSettings {
            temperature: Oversampling::X2,
            pressure: Oversampling::X16,
            humidity: Oversampling::X4,
            mode: Mode::Forced,
            standby: Standby::Ms125,
            filter: Filter::X4,
            spi3w_enable: true,
        };
        assert_eq!(settings.ctrl_hum(), 3);
        assert_eq!(settings.ctrl_meas(), (2 << 5) | (5 << 2) | 1);
        assert_eq!(settings.config(), (2 << 5) | (2 << 2) | 1);
    }

    #[test]
    fn test_forecast_config_from_lookup() {
        let config =
            ForecastConfig::from_lookup(env(&[("API_KEY", "abc"), ("ZIP", "537-0003,JP")])).unwrap();
        assert_eq!(config.timezone, "Asia/Tokyo");
        assert_eq!(
            config.forecast_url(),
            "https://api.openweathermap.org/data/2.5/forecast?zip=537-0003,JP&units=metric&APPID=abc"
        );

        let err = ForecastConfig::from_lookup(env(&[("API_KEY", "abc")])).unwrap_err();
        assert!(err.to_string().contains("ZIP"));
    }

    #[test]
    fn test_forecast_timezone() {
        let config = ForecastConfig::from_lookup(env(&[
            ("API_KEY", "abc"),
            ("ZIP", "10001,US"),
            ("FORECAST_TIMEZONE", "America/New_York"),
        ]))
        .unwrap();
        assert_eq!(config.tz().unwrap(), chrono_tz::America::New_York);
        assert_eq!(
            ForecastConfig::new("abc", "10001,US").tz().unwrap(),
            chrono_tz::Asia::Tokyo
        );

        let err = ForecastConfig::from_lookup(env(&[
            ("API_KEY", "abc"),
            ("ZIP", "10001,US"),
            ("FORECAST_TIMEZONE", "Mars/Olympus"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
