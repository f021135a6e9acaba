//! Refresh cadence for the dashboard's data sources.
//!
//! The clock redraws every second, the room sensor is sampled every
//! `room_interval_secs`, and the forecast and speed test are refreshed at
//! second 0 of each minute listed in `network_minutes`. Rules can slow the
//! room sensor down at certain times, e.g. overnight.
//!
//! # Example Schedule (YAML)
//!
//! ```yaml
//! timezone: "Asia/Tokyo"
//! room_interval_secs: 10
//! network_minutes: [25, 55]
//!
//! rules:
//!   # Nobody is looking at night
//!   - days: all
//!     start: "23:00"
//!     end: "06:00"
//!     room_interval_secs: 60
//!
//!   - days: [sat, sun]
//!     start: "09:00"
//!     end: "12:00"
//!     room_interval_secs: 5
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use roomclock::schedule::RefreshSchedule;
//!
//! let schedule = RefreshSchedule::load("config/schedule.yaml")?;
//! let mut ticker = SecondTicker::default();
//! loop {
//!     if let Some(due) = ticker.poll(&schedule, &schedule.now()) {
//!         if due.room {
//!             dashboard.set_room(sensor.get_status()?);
//!         }
//!     }
//!     std::thread::sleep(Duration::from_millis(100));
//! }
//! ```

use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

use crate::config::DEFAULT_FORECAST_TIMEZONE;
use crate::{Error, DEFAULT_REFRESH_SECS};

fn default_timezone() -> String {
    DEFAULT_FORECAST_TIMEZONE.to_string()
}

fn default_room_interval() -> u32 {
    DEFAULT_REFRESH_SECS
}

fn default_network_minutes() -> Vec<u32> {
    vec![25, 55]
}

/// When each data source should be refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshSchedule {
    /// Timezone for rules and `now()` (default "Asia/Tokyo")
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Room sensor interval when no rule matches (seconds)
    #[serde(default = "default_room_interval")]
    pub room_interval_secs: u32,
    /// Minutes past the hour at which the forecast and speed test refresh
    #[serde(default = "default_network_minutes")]
    pub network_minutes: Vec<u32>,
    /// Interval overrides (evaluated in order, first match wins)
    #[serde(default)]
    pub rules: Vec<CadenceRule>,
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            room_interval_secs: default_room_interval(),
            network_minutes: default_network_minutes(),
            rules: Vec::new(),
        }
    }
}

/// Room interval override for a day/time window.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CadenceRule {
    /// Days this rule applies to
    pub days: DaySelector,
    /// Start time (HH:MM, 24-hour format)
    pub start: String,
    /// End time (HH:MM, 24-hour format, exclusive)
    pub end: String,
    /// Room sensor interval in seconds
    pub room_interval_secs: u32,
}

/// Day selector for cadence rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DaySelector {
    /// A specific list of days (e.g., ["mon", "tue", "wed"])
    List(Vec<String>),
    /// "all", "weekdays", "weekends", or a single day name
    Named(String),
}

/// Which sources to refresh on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DueTasks {
    /// Redraw date and time
    pub clock: bool,
    /// Sample the room sensor
    pub room: bool,
    /// Fetch the weather forecast
    pub forecast: bool,
    /// Run the speed test
    pub network: bool,
}

impl RefreshSchedule {
    /// Load a schedule from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read schedule file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse a schedule from a YAML string.
    ///
    /// Times and minutes are checked here so a typo fails at startup instead
    /// of silently never matching.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let schedule: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Invalid schedule YAML: {}", e)))?;
        schedule.validate()?;
        Ok(schedule)
    }

    fn validate(&self) -> Result<(), Error> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| Error::Config(format!("Unknown timezone '{}'", self.timezone)))?;

        if self.room_interval_secs == 0 {
            return Err(Error::Config("room_interval_secs must be positive".to_string()));
        }
        if let Some(m) = self.network_minutes.iter().find(|m| **m > 59) {
            return Err(Error::Config(format!("network minute {} is out of range", m)));
        }

        for rule in &self.rules {
            if parse_time(&rule.start).is_none() || parse_time(&rule.end).is_none() {
                return Err(Error::Config(format!(
                    "Invalid rule window {}-{}",
                    rule.start, rule.end
                )));
            }
            if rule.room_interval_secs == 0 {
                return Err(Error::Config(format!(
                    "Rule {}-{} has a zero interval",
                    rule.start, rule.end
                )));
            }
        }
        Ok(())
    }

    /// The schedule's timezone.
    ///
    /// Falls back to the default timezone when the name does not parse.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!(
                "Unknown timezone '{}', using {}",
                self.timezone,
                DEFAULT_FORECAST_TIMEZONE
            );
            chrono_tz::Asia::Tokyo
        })
    }

    /// Current time in the schedule's timezone.
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz())
    }

    /// Room sensor interval in effect at `dt`.
    pub fn room_interval_at<T: chrono::TimeZone>(&self, dt: &DateTime<T>) -> u32 {
        let weekday = dt.weekday();
        let time = NaiveTime::from_hms_opt(dt.hour(), dt.minute(), 0).unwrap_or_default();

        match self.rules.iter().find(|rule| rule.matches(weekday, time)) {
            Some(rule) => {
                tracing::trace!(
                    "Cadence rule matched: {:?} {} -> {} room_interval_secs={}",
                    rule.days,
                    rule.start,
                    rule.end,
                    rule.room_interval_secs
                );
                rule.room_interval_secs
            }
            None => self.room_interval_secs,
        }
    }

    /// What to refresh on the tick at `dt`.
    ///
    /// The room interval counts from midnight, so an interval of 10 fires at
    /// seconds 0, 10, 20, ... of every minute.
    pub fn due_at<T: chrono::TimeZone>(&self, dt: &DateTime<T>) -> DueTasks {
        let interval = self.room_interval_at(dt).max(1);
        let slow = dt.second() == 0 && self.network_minutes.contains(&dt.minute());
        DueTasks {
            clock: true,
            room: dt.num_seconds_from_midnight() % interval == 0,
            forecast: slow,
            network: slow,
        }
    }
}

/// Turns a fast poll into one [`DueTasks`] per wall-clock second.
///
/// Poll well under a second apart; a poll that lands in the same second as
/// the previous one yields nothing, so slow work never shifts later ticks.
#[derive(Debug, Clone, Default)]
pub struct SecondTicker {
    last: Option<i64>,
}

impl SecondTicker {
    /// Tasks due at `now`, or `None` if this second was already handled.
    pub fn poll<T: chrono::TimeZone>(
        &mut self,
        schedule: &RefreshSchedule,
        now: &DateTime<T>,
    ) -> Option<DueTasks> {
        let second = now.timestamp();
        if self.last == Some(second) {
            return None;
        }
        self.last = Some(second);
        Some(schedule.due_at(now))
    }
}

impl CadenceRule {
    fn matches(&self, weekday: Weekday, time: NaiveTime) -> bool {
        if !self.day_matches(weekday) {
            return false;
        }

        match (parse_time(&self.start), parse_time(&self.end)) {
            (Some(s), Some(e)) if s <= e => time >= s && time < e,
            // Overnight window, e.g. 23:00 - 06:00
            (Some(s), Some(e)) => time >= s || time < e,
            _ => false,
        }
    }

    fn day_matches(&self, weekday: Weekday) -> bool {
        match &self.days {
            DaySelector::Named(name) => match name.to_lowercase().as_str() {
                "all" => true,
                "weekdays" => weekday.num_days_from_monday() < 5,
                "weekends" => weekday.num_days_from_monday() >= 5,
                _ => weekday_from_str(name) == Some(weekday),
            },
            DaySelector::List(days) => days.iter().any(|d| weekday_from_str(d) == Some(weekday)),
        }
    }
}

/// Parse "HH:MM".
fn parse_time(s: &str) -> Option<NaiveTime> {
    let (hour, minute) = s.split_once(':')?;
    NaiveTime::from_hms_opt(hour.parse().ok()?, minute.parse().ok()?, 0)
}

fn weekday_from_str(s: &str) -> Option<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tuesday" => Some(Weekday::Tue),
        "wed" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        "sun" | "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

// =============================================================================
// Global schedule
// =============================================================================

use std::sync::OnceLock;

static SCHEDULE: OnceLock<RefreshSchedule> = OnceLock::new();

/// Load the global schedule once at startup.
///
/// A missing or invalid file logs a warning and installs the defaults.
pub fn init_global_schedule(path: &str) {
    let schedule = match RefreshSchedule::load(path) {
        Ok(s) => {
            tracing::info!(
                "Loaded refresh schedule with {} rules, room every {}s, network at {:?}",
                s.rules.len(),
                s.room_interval_secs,
                s.network_minutes
            );
            s
        }
        Err(e) => {
            tracing::warn!("Failed to load refresh schedule, using defaults: {}", e);
            RefreshSchedule::default()
        }
    };
    if SCHEDULE.set(schedule).is_err() {
        tracing::debug!("Refresh schedule already initialised");
    }
}

/// The global schedule, or the defaults if none was loaded.
pub fn global_schedule() -> &'static RefreshSchedule {
    SCHEDULE.get_or_init(RefreshSchedule::default)
}

/// Room sensor interval in effect right now.
pub fn get_global_refresh_rate() -> u32 {
    let schedule = global_schedule();
    schedule.room_interval_at(&schedule.now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tokyo(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Tz> {
        chrono_tz::Asia::Tokyo
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .unwrap()
    }

    fn rule(days: DaySelector, start: &str, end: &str, secs: u32) -> CadenceRule {
        CadenceRule {
            days,
            start: start.to_string(),
            end: end.to_string(),
            room_interval_secs: secs,
        }
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("09:00"), NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(parse_time("23:30"), NaiveTime::from_hms_opt(23, 30, 0));
        assert_eq!(parse_time("24:00"), None);
        assert_eq!(parse_time("invalid"), None);
        assert_eq!(parse_time("12"), None);
    }

    #[test]
    fn test_weekday_from_str() {
        assert_eq!(weekday_from_str("Monday"), Some(Weekday::Mon));
        assert_eq!(weekday_from_str("SUN"), Some(Weekday::Sun));
        assert_eq!(weekday_from_str("someday"), None);
    }

    #[test]
    fn test_day_selectors() {
        let weekends = rule(DaySelector::Named("weekends".into()), "00:00", "23:59", 5);
        assert!(weekends.day_matches(Weekday::Sat));
        assert!(!weekends.day_matches(Weekday::Fri));

        let listed = rule(
            DaySelector::List(vec!["tue".into(), "thu".into()]),
            "00:00",
            "23:59",
            5,
        );
        assert!(listed.day_matches(Weekday::Thu));
        assert!(!listed.day_matches(Weekday::Wed));

        let single = rule(DaySelector::Named("wed".into()), "00:00", "23:59", 5);
        assert!(single.day_matches(Weekday::Wed));
        assert!(!single.day_matches(Weekday::Mon));
    }

    #[test]
    fn test_window_end_exclusive_and_overnight() {
        let day = rule(DaySelector::Named("all".into()), "09:00", "17:00", 5);
        let at = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert!(day.matches(Weekday::Mon, at(9, 0)));
        assert!(!day.matches(Weekday::Mon, at(17, 0)));

        let night = rule(DaySelector::Named("all".into()), "23:00", "06:00", 60);
        assert!(night.matches(Weekday::Mon, at(23, 30)));
        assert!(night.matches(Weekday::Mon, at(3, 0)));
        assert!(!night.matches(Weekday::Mon, at(6, 0)));
        assert!(!night.matches(Weekday::Mon, at(12, 0)));
    }

    #[test]
    fn test_default_cadence() {
        let schedule = RefreshSchedule::default();
        assert_eq!(schedule.timezone, "Asia/Tokyo");

        let due = schedule.due_at(&tokyo(2024, 1, 15, 10, 24, 30));
        assert_eq!(
            due,
            DueTasks {
                clock: true,
                room: true,
                forecast: false,
                network: false
            }
        );

        let due = schedule.due_at(&tokyo(2024, 1, 15, 10, 24, 31));
        assert!(due.clock);
        assert!(!due.room);
    }

    #[test]
    fn test_network_at_listed_minutes() {
        let schedule = RefreshSchedule::default();
        let due = schedule.due_at(&tokyo(2024, 1, 15, 10, 25, 0));
        assert!(due.network);
        assert!(due.forecast);
        assert!(!schedule.due_at(&tokyo(2024, 1, 15, 10, 26, 0)).forecast);
        assert!(schedule.due_at(&tokyo(2024, 1, 15, 10, 55, 0)).network);
        assert!(!schedule.due_at(&tokyo(2024, 1, 15, 10, 25, 1)).network);
        assert!(!schedule.due_at(&tokyo(2024, 1, 15, 10, 26, 0)).network);
    }

    #[test]
    fn test_ticker_once_per_second() {
        let schedule = RefreshSchedule::default();
        let mut ticker = SecondTicker::default();
        let at = |ms: u32| {
            tokyo(2024, 1, 15, 10, 25, 0) + chrono::Duration::milliseconds(i64::from(ms))
        };

        let due = ticker.poll(&schedule, &at(0)).unwrap();
        assert!(due.room && due.network);
        assert_eq!(ticker.poll(&schedule, &at(100)), None);
        assert_eq!(ticker.poll(&schedule, &at(999)), None);

        let due = ticker.poll(&schedule, &at(1000)).unwrap();
        assert!(due.clock);
        assert!(!due.room);
        assert!(!due.network);
    }

    #[test]
    fn test_ticker_catches_second_after_slow_work() {
        // Polls 100 ms apart straddling 10:25:00 still see that second
        let schedule = RefreshSchedule::default();
        let mut ticker = SecondTicker::default();
        let start = tokyo(2024, 1, 15, 10, 24, 59) + chrono::Duration::milliseconds(950);

        assert!(ticker.poll(&schedule, &start).is_some());
        let next = start + chrono::Duration::milliseconds(100);
        let due = ticker.poll(&schedule, &next).unwrap();
        assert!(due.network);
    }

    #[test]
    fn test_from_yaml_with_rules() {
        let yaml = r#"
timezone: "Asia/Tokyo"
room_interval_secs: 10
network_minutes: [0, 30]
rules:
  - days: all
    start: "23:00"
    end: "06:00"
    room_interval_secs: 60
"#;
        let schedule = RefreshSchedule::from_yaml(yaml).unwrap();
        assert_eq!(schedule.network_minutes, vec![0, 30]);
        assert_eq!(schedule.rules.len(), 1);

        // 02:00:30 falls in the night window: 30 is not a multiple of 60
        assert_eq!(schedule.room_interval_at(&tokyo(2024, 1, 15, 2, 0, 30)), 60);
        assert!(!schedule.due_at(&tokyo(2024, 1, 15, 2, 0, 30)).room);
        assert!(schedule.due_at(&tokyo(2024, 1, 15, 2, 1, 0)).room);

        // Daytime uses the base interval
        assert!(schedule.due_at(&tokyo(2024, 1, 15, 14, 0, 30)).room);
        assert!(schedule.due_at(&tokyo(2024, 1, 15, 14, 30, 0)).network);
    }

    #[test]
    fn test_from_yaml_defaults() {
        let schedule = RefreshSchedule::from_yaml("timezone: UTC").unwrap();
        assert_eq!(schedule.room_interval_secs, 10);
        assert_eq!(schedule.network_minutes, vec![25, 55]);
        assert!(schedule.rules.is_empty());
        assert_eq!(schedule.tz(), chrono_tz::UTC);
    }

    #[test]
    fn test_from_yaml_rejects_bad_values() {
        for yaml in [
            "timezone: Mars/Olympus",
            "room_interval_secs: 0",
            "network_minutes: [60]",
            "rules:\n  - days: all\n    start: \"9am\"\n    end: \"17:00\"\n    room_interval_secs: 5",
            "rules: nope",
        ] {
            let err = RefreshSchedule::from_yaml(yaml).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{}", yaml);
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = RefreshSchedule::load("/nonexistent/schedule.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read schedule file"));
    }

    #[test]
    fn test_global_schedule_defaults() {
        // Nothing else in the test suite initialises the global schedule
        assert_eq!(get_global_refresh_rate(), 10);
    }
}
