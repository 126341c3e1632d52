use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::astro::time_string;
use crate::schedule::ScheduleInterval;
use crate::solar::{GeoCoordinate, SunTimes};

/// `YYYY-MM-DD HH:MM:SS UTC`, or `undefined` for NaN and out-of-range values.
pub fn format_utc(ts: f64) -> String {
    if !ts.is_finite() {
        return "undefined".to_string();
    }
    DateTime::from_timestamp(ts.floor() as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "undefined".to_string())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SunReport {
    pub latitude: f64,
    pub longitude: f64,
    pub date: NaiveDate,
    pub sunrise: f64,
    pub sunset: f64,
    pub sunrise_utc: String,
    pub sunset_utc: String,
}

impl SunReport {
    pub fn new(coord: &GeoCoordinate, date: NaiveDate, times: SunTimes) -> Self {
        Self {
            latitude: coord.latitude,
            longitude: coord.longitude,
            date,
            sunrise: times.sunrise,
            sunset: times.sunset,
            sunrise_utc: format_utc(times.sunrise),
            sunset_utc: format_utc(times.sunset),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NoonReport {
    pub longitude: f64,
    pub date: NaiveDate,
    pub minutes_utc: f64,
    pub solar_noon_utc: String,
}

impl NoonReport {
    pub fn new(longitude: f64, date: NaiveDate, minutes_utc: f64) -> Self {
        Self {
            longitude,
            date,
            minutes_utc,
            solar_noon_utc: time_string(minutes_utc),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IntervalReport {
    pub start: f64,
    pub end: f64,
    pub start_utc: String,
    pub end_utc: String,
    pub active: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScheduleReport {
    pub now: f64,
    pub should_be_on: bool,
    pub intervals: Vec<IntervalReport>,
}

impl ScheduleReport {
    pub fn new(intervals: &[ScheduleInterval], now: f64) -> Self {
        let intervals: Vec<IntervalReport> = intervals
            .iter()
            .map(|interval| IntervalReport {
                start: interval.start,
                end: interval.end,
                start_utc: format_utc(interval.start),
                end_utc: format_utc(interval.end),
                active: interval.contains(now),
            })
            .collect();

        Self {
            now,
            should_be_on: intervals.iter().any(|interval| interval.active),
            intervals,
        }
    }
}
