//! Dashboard state handed to the display layer.
//!
//! [`Dashboard`] collects the latest value from each data source and turns
//! it into a [`DashboardSnapshot`]: plain strings, already formatted, that a
//! renderer can drop into its labels. Sources that have not reported yet are
//! `None`/empty.
//!
//! # Example
//!
//! ```
//! use chrono::{FixedOffset, TimeZone};
//! use roomclock::{Dashboard, Status};
//!
//! let mut dashboard = Dashboard::new();
//! dashboard.set_room(Status {
//!     temperature: "23.4".into(),
//!     humidity: "45".into(),
//!     pressure: "1013".into(),
//! });
//!
//! let jst = FixedOffset::east_opt(9 * 3600).unwrap();
//! let now = jst.with_ymd_and_hms(2024, 1, 15, 7, 5, 9).unwrap();
//! let snapshot = dashboard.snapshot(&now);
//!
//! assert_eq!(snapshot.date, "2024 / 01 / 15  Mon.");
//! assert_eq!(snapshot.time(), "07:05:09");
//! ```

use std::fmt::Display;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::sensor::Status;
use crate::speedtest::SpeedTestResult;
use crate::weather::{upcoming, ForecastEntry};
use crate::{DEFAULT_REFRESH_SECS, FORECAST_SLOTS};

/// Short weekday names, Monday first.
pub const WEEK_NAMES: [&str; 7] = ["Mon.", "Tue.", "Wed.", "Thu.", "Fri.", "Sat.", "Sun."];

/// One forecast column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastCell {
    /// Local hour of the slot, unpadded
    pub hour: String,
    /// OpenWeatherMap condition id
    pub condition_code: i32,
    /// Whole degrees
    pub temperature: String,
    /// Whole millimetres
    pub precipitation: String,
}

/// Latest speed test, one decimal each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCell {
    /// Upload Mbit/s
    pub upload: String,
    /// Download Mbit/s
    pub download: String,
    /// Ping ms
    pub ping: String,
}

impl From<&SpeedTestResult> for NetworkCell {
    fn from(result: &SpeedTestResult) -> Self {
        Self {
            upload: format!("{:.1}", result.upload_mbps),
            download: format!("{:.1}", result.download_mbps),
            ping: format!("{:.1}", result.ping_ms),
        }
    }
}

/// Everything the display needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// `"YYYY / MM / DD  Www."`
    pub date: String,
    /// Two-digit hour
    pub hour: String,
    /// Two-digit minute
    pub minute: String,
    /// Two-digit second
    pub second: String,

    /// Room sensor, if it has reported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<Status>,

    /// Upcoming forecast slots
    pub forecast: Vec<ForecastCell>,

    /// Network speed, if a test has finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkCell>,

    /// Seconds until the display should poll again
    pub refresh_rate: u32,
}

impl DashboardSnapshot {
    /// `"HH:MM:SS"`
    pub fn time(&self) -> String {
        format!("{}:{}:{}", self.hour, self.minute, self.second)
    }
}

/// Latest values from every source.
#[derive(Debug, Clone)]
pub struct Dashboard {
    room: Option<Status>,
    forecast: Vec<ForecastEntry>,
    network: Option<SpeedTestResult>,
    forecast_slots: usize,
    refresh_rate: u32,
    timezone: Tz,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self {
            room: None,
            forecast: Vec::new(),
            network: None,
            forecast_slots: FORECAST_SLOTS,
            refresh_rate: DEFAULT_REFRESH_SECS,
            timezone: chrono_tz::Asia::Tokyo,
        }
    }
}

impl Dashboard {
    /// Empty dashboard showing 7 forecast slots in Asia/Tokyo time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how many forecast slots to show.
    #[must_use]
    pub fn with_forecast_slots(mut self, slots: usize) -> Self {
        self.forecast_slots = slots;
        self
    }

    /// Set the refresh rate advertised in snapshots.
    #[must_use]
    pub fn with_refresh_rate(mut self, seconds: u32) -> Self {
        self.refresh_rate = seconds;
        self
    }

    /// Set the timezone used by [`snapshot_at`](Self::snapshot_at).
    #[must_use]
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// Change the refresh rate advertised in snapshots.
    pub fn set_refresh_rate(&mut self, seconds: u32) {
        self.refresh_rate = seconds;
    }

    /// Timezone the clock and forecast hours are shown in.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Record a room sensor status.
    pub fn set_room(&mut self, status: Status) {
        self.room = Some(status);
    }

    /// Replace the forecast.
    pub fn set_forecast(&mut self, entries: Vec<ForecastEntry>) {
        tracing::info!("Forecast updated: {} slots", entries.len());
        self.forecast = entries;
    }

    /// Record a speed test result.
    pub fn set_speed_test(&mut self, result: SpeedTestResult) {
        tracing::info!(
            "Network updated: up {:.1} down {:.1} ping {:.1}",
            result.upload_mbps,
            result.download_mbps,
            result.ping_ms
        );
        self.network = Some(result);
    }

    /// Latest room status.
    pub fn room(&self) -> Option<&Status> {
        self.room.as_ref()
    }

    /// Build the frame for the instant `now`, shown in the dashboard's
    /// timezone.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> DashboardSnapshot {
        self.snapshot(&now.with_timezone(&self.timezone))
    }

    /// Build the frame for `now`.
    ///
    /// Forecast slots at or before `now` are dropped, and hours are shown in
    /// `now`'s timezone.
    pub fn snapshot<T>(&self, now: &DateTime<T>) -> DashboardSnapshot
    where
        T: TimeZone,
        T::Offset: Display,
    {
        let week = WEEK_NAMES[now.weekday().num_days_from_monday() as usize];
        let tz = now.timezone();

        let forecast = upcoming(&self.forecast, now.with_timezone(&Utc), self.forecast_slots)
            .iter()
            .map(|entry| ForecastCell {
                hour: entry.time.with_timezone(&tz).hour().to_string(),
                condition_code: entry.condition_code,
                temperature: format!("{:.0}", entry.temperature),
                precipitation: format!("{:.0}", entry.precipitation_mm),
            })
            .collect();

        DashboardSnapshot {
            date: format!("{}  {}", now.format("%Y / %m / %d"), week),
            hour: format!("{:02}", now.hour()),
            minute: format!("{:02}", now.minute()),
            second: format!("{:02}", now.second()),
            room: self.room.clone(),
            forecast,
            network: self.network.as_ref().map(NetworkCell::from),
            refresh_rate: self.refresh_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn entry(utc_hour: u32, code: i32, temp: f64, rain: f64) -> ForecastEntry {
        ForecastEntry {
            time: Utc.with_ymd_and_hms(2024, 1, 15, utc_hour, 0, 0).unwrap(),
            condition_code: code,
            temperature: temp,
            precipitation_mm: rain,
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let now = jst().with_ymd_and_hms(2024, 1, 21, 23, 59, 0).unwrap();
        let snapshot = Dashboard::new().snapshot(&now);

        assert_eq!(snapshot.date, "2024 / 01 / 21  Sun.");
        assert_eq!(snapshot.time(), "23:59:00");
        assert!(snapshot.room.is_none());
        assert!(snapshot.network.is_none());
        assert!(snapshot.forecast.is_empty());
        assert_eq!(snapshot.refresh_rate, 10);
    }

    #[test]
    fn test_forecast_cells_local_hours() {
        let mut dashboard = Dashboard::new().with_forecast_slots(2);
        dashboard.set_forecast(vec![
            entry(0, 800, 3.4, 0.0),
            entry(3, 500, 4.6, 2.4),
            entry(6, 803, 5.0, 0.0),
            entry(9, 600, 1.2, 0.6),
        ]);

        // 10:00 JST is 01:00 UTC, so the 00:00 UTC slot is past
        let now = jst().with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let snapshot = dashboard.snapshot(&now);

        assert_eq!(
            snapshot.forecast,
            vec![
                ForecastCell {
                    hour: "12".into(),
                    condition_code: 500,
                    temperature: "5".into(),
                    precipitation: "2".into(),
                },
                ForecastCell {
                    hour: "15".into(),
                    condition_code: 803,
                    temperature: "5".into(),
                    precipitation: "0".into(),
                },
            ]
        );
    }

    #[test]
    fn test_forecast_hour_unpadded() {
        let mut dashboard = Dashboard::new();
        dashboard.set_forecast(vec![entry(0, 800, 3.4, 0.0)]);
        let now = Utc.with_ymd_and_hms(2024, 1, 14, 23, 0, 0).unwrap();

        assert_eq!(dashboard.snapshot(&now).forecast[0].hour, "0");
    }

    #[test]
    fn test_room_and_network() {
        let mut dashboard = Dashboard::new().with_refresh_rate(60);
        dashboard.set_room(Status {
            temperature: "21.5".into(),
            humidity: "40".into(),
            pressure: "1008".into(),
        });
        dashboard.set_speed_test(SpeedTestResult {
            upload_mbps: 9.96,
            download_mbps: 94.04,
            ping_ms: 12.0,
        });

        let now = jst().with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let snapshot = dashboard.snapshot(&now);

        assert_eq!(snapshot.room.as_ref().unwrap().pressure, "1008");
        assert_eq!(
            snapshot.network,
            Some(NetworkCell {
                upload: "10.0".into(),
                download: "94.0".into(),
                ping: "12.0".into(),
            })
        );
        assert_eq!(snapshot.refresh_rate, 60);
    }

    #[test]
    fn test_snapshot_at_uses_dashboard_timezone() {
        let mut dashboard = Dashboard::new();
        dashboard.set_forecast(vec![entry(3, 500, 4.6, 2.4)]);
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 1, 2, 3).unwrap();

        let tokyo = dashboard.snapshot_at(now);
        assert_eq!(tokyo.time(), "10:02:03");
        assert_eq!(tokyo.forecast[0].hour, "12");

        let dashboard = dashboard.with_timezone(chrono_tz::America::New_York);
        assert_eq!(dashboard.timezone(), chrono_tz::America::New_York);
        let new_york = dashboard.snapshot_at(now);
        assert_eq!(new_york.date, "2024 / 01 / 14  Sun.");
        assert_eq!(new_york.time(), "20:02:03");
        assert_eq!(new_york.forecast[0].hour, "22");
    }

    #[test]
    fn test_snapshot_serialization() {
        let now = jst().with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let snapshot = Dashboard::new().snapshot(&now);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"date\":\"2024 / 01 / 15  Mon.\""));
        assert!(json.contains("\"refresh_rate\":10"));
        assert!(!json.contains("\"room\""));
        assert!(!json.contains("\"network\""));

        let back: DashboardSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
