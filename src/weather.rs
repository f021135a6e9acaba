//! Weather forecast data shape.
//!
//! The dashboard shows the next few 3-hourly forecast slots. Each slot is
//! reduced to `(time, condition_code, temperature, precipitation_mm)` where
//! `condition_code` is an OpenWeatherMap condition id (800 = clear,
//! 5xx = rain, ...). Fetching is left to the caller; this module decodes the
//! OpenWeatherMap `/forecast` payload into that shape.
//!
//! # Example
//!
//! ```
//! use roomclock::weather::parse_openweathermap;
//!
//! let json = r#"{"list": [
//!     {"dt": 1700000000, "main": {"temp": 12.3}, "weather": [{"id": 500}], "rain": {"3h": 0.8}}
//! ]}"#;
//! let entries = parse_openweathermap(json).unwrap();
//! assert_eq!(entries[0].condition_code, 500);
//! assert_eq!(entries[0].precipitation_mm, 0.8);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One forecast slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// Start of the slot
    pub time: DateTime<Utc>,
    /// OpenWeatherMap condition id
    pub condition_code: i32,
    /// Temperature in °C
    pub temperature: f64,
    /// Precipitation over the slot in mm
    pub precipitation_mm: f64,
}

/// Anything that can produce forecast slots (REST client, scraper, fixture).
pub trait ForecastProvider {
    /// Fetch the current forecast, earliest slot first.
    fn forecast(&mut self) -> Result<Vec<ForecastEntry>, Error>;
}

impl<F> ForecastProvider for F
where
    F: FnMut() -> Result<Vec<ForecastEntry>, Error>,
{
    fn forecast(&mut self) -> Result<Vec<ForecastEntry>, Error> {
        self()
    }
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    #[serde(default)]
    list: Option<Vec<OwmItem>>,
    #[serde(default)]
    message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OwmItem {
    dt: i64,
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
    #[serde(default)]
    rain: Option<OwmRain>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    id: i32,
}

#[derive(Debug, Deserialize)]
struct OwmRain {
    #[serde(rename = "3h", default)]
    three_hours: Option<f64>,
}

/// Decode an OpenWeatherMap `/data/2.5/forecast` response.
///
/// A response without a `list` (wrong key, unknown ZIP) is an error.
/// Slots without a condition or with an out-of-range timestamp are skipped.
pub fn parse_openweathermap(json: &str) -> Result<Vec<ForecastEntry>, Error> {
    let response: OwmResponse = serde_json::from_str(json)?;

    let Some(list) = response.list else {
        let detail = response
            .message
            .map(|m| m.to_string())
            .unwrap_or_else(|| "no forecast list".to_string());
        return Err(Error::Forecast(format!(
            "{} - check ZIP code or API_KEY",
            detail
        )));
    };

    let mut entries = Vec::with_capacity(list.len());
    for item in list {
        let Some(condition) = item.weather.first() else {
            tracing::warn!("Skipping forecast slot {} without weather", item.dt);
            continue;
        };
        let Some(time) = DateTime::from_timestamp(item.dt, 0) else {
            tracing::warn!("Skipping forecast slot with bad timestamp {}", item.dt);
            continue;
        };
        entries.push(ForecastEntry {
            time,
            condition_code: condition.id,
            temperature: item.main.temp,
            precipitation_mm: item.rain.and_then(|r| r.three_hours).unwrap_or(0.0),
        });
    }

    tracing::debug!("Decoded {} forecast slots", entries.len());
    Ok(entries)
}

/// Keep the first `slots` entries strictly after `now`.
pub fn upcoming(entries: &[ForecastEntry], now: DateTime<Utc>, slots: usize) -> Vec<ForecastEntry> {
    entries
        .iter()
        .filter(|e| e.time > now)
        .take(slots)
        .cloned()
        .collect()
}
