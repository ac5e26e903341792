use crate::error::Error;
use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Layout of the day-less part of `logTime` ("2026, 3:04:05 pm")
const LOG_TIME_TAIL: &str = "%Y, %-I:%M:%S %P";
const LOG_TIME_PARSE: &str = "%B %d %Y, %I:%M:%S %p";

/// Persisted violation log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    #[serde(rename = "logID")]
    pub log_id: u64,
    #[serde(rename = "logTime")]
    pub log_time: String,
    #[serde(rename = "logLocation")]
    pub log_location: String,
    #[serde(rename = "logImagePath")]
    pub log_image_path: String,
}

impl ViolationRecord {
    /// Capture time as local wall-clock time, if `logTime` parses
    pub fn captured_at(&self) -> Option<NaiveDateTime> {
        parse_log_time(&self.log_time)
    }
}

/// Everything a log append needs besides the ID and timestamp it assigns
#[derive(Debug, Clone)]
pub struct NewViolation {
    pub location: GeoLocation,
    pub image_path: String,
}

/// Latitude/longitude pair reported by the camera client
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, Error> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::Validation(format!("Invalid latitude: {}", latitude)));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::Validation(format!(
                "Invalid longitude: {}",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

// Debug formatting keeps the trailing ".0" so "121.0" survives a round trip.
impl Display for GeoLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}, {:?}", self.latitude, self.longitude)
    }
}

impl FromStr for GeoLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| Error::Validation(format!("Location must be \"lat, lon\": {}", s)))?;

        let latitude = lat
            .trim()
            .parse::<f64>()
            .map_err(|e| Error::Validation(format!("Invalid latitude '{}': {}", lat.trim(), e)))?;
        let longitude = lon
            .trim()
            .parse::<f64>()
            .map_err(|e| Error::Validation(format!("Invalid longitude '{}': {}", lon.trim(), e)))?;

        GeoLocation::new(latitude, longitude)
    }
}

/// Calendar window used to filter and count log entries, relative to "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    #[serde(alias = "today", alias = "day")]
    Daily,
    #[serde(alias = "week")]
    Weekly,
    #[serde(alias = "month")]
    Monthly,
    #[serde(alias = "year")]
    Yearly,
}

impl TimeWindow {
    /// Whether `at` falls in the same calendar window as `now`
    pub fn contains(&self, at: &NaiveDateTime, now: &NaiveDateTime) -> bool {
        match self {
            Self::Daily => at.date() == now.date(),
            Self::Weekly => at.iso_week() == now.iso_week(),
            Self::Monthly => at.year() == now.year() && at.month() == now.month(),
            Self::Yearly => at.year() == now.year(),
        }
    }
}

impl Display for TimeWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" | "today" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            "yearly" | "year" => Ok(Self::Yearly),
            other => Err(Error::Validation(format!("Unknown time window: {}", other))),
        }
    }
}

fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// Format a timestamp as `logTime`, e.g. "October 18th 2026, 3:04:05 pm"
pub fn format_log_time<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let day = at.day();
    format!(
        "{} {}{} {}",
        at.format("%B"),
        day,
        ordinal_suffix(day),
        at.format(LOG_TIME_TAIL)
    )
}

/// Parse a `logTime` back into local wall-clock time
pub fn parse_log_time(value: &str) -> Option<NaiveDateTime> {
    let mut parts = value.trim().splitn(3, ' ');
    let month = parts.next()?;
    let day = parts.next()?;
    let rest = parts.next()?;

    let digits = day.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let day_num: u32 = digits.parse().ok()?;
    if &day[digits.len()..] != ordinal_suffix(day_num) {
        return None;
    }

    let normalized = format!("{} {} {}", month, digits, rest);
    NaiveDateTime::parse_from_str(&normalized, LOG_TIME_PARSE).ok()
}
