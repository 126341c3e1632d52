//! Line-oriented on/off schedules.
//!
//! Each line is `<date> <start> <end>` where `<date>` is `YYYY-MM-DD` or
//! `default`, and times are `HH:MM`, `H:MMam`/`pm`, or `sunrise`/`sunset`
//! with an optional `+MIN`/`-MIN` offset. A `default` line applies to every
//! day. When the end resolves before the start it is taken from the next day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::context::ScheduleContext;
use crate::solar::SolarError;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("Solar Error: {0}")]
    Solar(#[from] SolarError),
    #[error("No such local time: {0}")]
    InvalidLocalTime(String),
    #[error("Timestamp out of range: {0}")]
    InvalidTimestamp(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSpec {
    Clock { hour: u32, minute: u32 },
    Sunrise { offset_minutes: i64 },
    Sunset { offset_minutes: i64 },
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSpec::Clock { hour, minute } => write!(f, "{:02}:{:02}", hour, minute),
            TimeSpec::Sunrise { offset_minutes: 0 } => write!(f, "sunrise"),
            TimeSpec::Sunrise { offset_minutes } => write!(f, "sunrise{:+}", offset_minutes),
            TimeSpec::Sunset { offset_minutes: 0 } => write!(f, "sunset"),
            TimeSpec::Sunset { offset_minutes } => write!(f, "sunset{:+}", offset_minutes),
        }
    }
}

fn parse_offset(rest: &str, token: &str) -> Result<i64, String> {
    if rest.is_empty() {
        return Ok(0);
    }
    rest.parse::<i64>()
        .map_err(|_| format!("bad minute offset in '{}'", token))
}

fn parse_clock(s: &str) -> Result<TimeSpec, String> {
    let bad = || format!("unrecognized time '{}'", s);

    let (hour_str, rest) = s.split_once(':').ok_or_else(bad)?;
    if hour_str.is_empty() || hour_str.len() > 2 || rest.len() < 2 || !rest.is_char_boundary(2) {
        return Err(bad());
    }
    let (minute_str, suffix) = rest.split_at(2);

    let hour: u32 = hour_str.parse().map_err(|_| bad())?;
    let minute: u32 = minute_str.parse().map_err(|_| bad())?;
    if minute > 59 {
        return Err(bad());
    }

    let hour = match suffix {
        "" if hour <= 23 => hour,
        "am" if (1..=12).contains(&hour) => hour % 12,
        "pm" if (1..=12).contains(&hour) => hour % 12 + 12,
        _ => return Err(bad()),
    };

    Ok(TimeSpec::Clock { hour, minute })
}

impl FromStr for TimeSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("sunrise") {
            Ok(TimeSpec::Sunrise {
                offset_minutes: parse_offset(rest, s)?,
            })
        } else if let Some(rest) = lower.strip_prefix("sunset") {
            Ok(TimeSpec::Sunset {
                offset_minutes: parse_offset(rest, s)?,
            })
        } else {
            parse_clock(&lower)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryDate {
    Default,
    On(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub date: EntryDate,
    pub start: TimeSpec,
    pub end: TimeSpec,
}

/// Half-open `[start, end)` window in UTC epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleInterval {
    pub start: f64,
    pub end: f64,
}

impl ScheduleInterval {
    pub fn contains(&self, now: f64) -> bool {
        self.start <= now && now < self.end
    }
}

/// Whether any interval covers `now`.
pub fn disposition(intervals: &[ScheduleInterval], now: f64) -> bool {
    intervals.iter().any(|interval| interval.contains(now))
}

/// Resolves `start`..`end` on `date`, rolling `end` to the next day when needed.
pub fn resolve_entry(
    ctx: &ScheduleContext,
    start: &TimeSpec,
    end: &TimeSpec,
    date: NaiveDate,
) -> Result<ScheduleInterval, ScheduleError> {
    let start_utc = ctx.resolve(start, date)?;
    let mut end_utc = ctx.resolve(end, date)?;

    if end_utc < start_utc {
        let next = date
            .succ_opt()
            .ok_or_else(|| ScheduleError::InvalidLocalTime(format!("{} after {}", end, date)))?;
        end_utc = ctx.resolve(end, next)?;
    }

    Ok(ScheduleInterval {
        start: start_utc,
        end: end_utc,
    })
}

fn looks_like_date(field: &str) -> bool {
    let bytes = field.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn new(entries: Vec<ScheduleEntry>) -> Self {
        Self { entries }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScheduleError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Lines without exactly three fields, `#` comments, and lines whose
    /// first field is neither `default` nor a date are skipped.
    pub fn parse(text: &str) -> Result<Self, ScheduleError> {
        let mut entries = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.first().map_or(true, |f| f.starts_with('#')) {
                continue;
            }
            if fields.len() != 3 {
                debug!("Skipping schedule line {}: expected 3 fields", line_no);
                continue;
            }

            let parse_err = |reason: String| ScheduleError::Parse {
                line: line_no,
                reason,
            };

            let date = if fields[0].eq_ignore_ascii_case("default") {
                EntryDate::Default
            } else if looks_like_date(fields[0]) {
                let day = NaiveDate::parse_from_str(fields[0], "%Y-%m-%d")
                    .map_err(|e| parse_err(format!("bad date '{}': {}", fields[0], e)))?;
                EntryDate::On(day)
            } else {
                debug!("Skipping schedule line {}: unknown date '{}'", line_no, fields[0]);
                continue;
            };

            let start = fields[1].parse::<TimeSpec>().map_err(parse_err)?;
            let end = fields[2].parse::<TimeSpec>().map_err(parse_err)?;

            entries.push(ScheduleEntry { date, start, end });
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// The `default` entry in effect; a later one replaces an earlier one.
    pub fn default_entry(&self) -> Option<&ScheduleEntry> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.date == EntryDate::Default)
    }

    /// Every dated entry on its own date, plus the default entry on `today`
    /// and on the day before so an overnight default still covers the small hours.
    pub fn intervals(
        &self,
        ctx: &ScheduleContext,
        today: NaiveDate,
    ) -> Result<Vec<ScheduleInterval>, ScheduleError> {
        let mut intervals = Vec::with_capacity(self.entries.len() + 1);

        for entry in &self.entries {
            if let EntryDate::On(day) = entry.date {
                intervals.push(resolve_entry(ctx, &entry.start, &entry.end, day)?);
            }
        }

        if let Some(entry) = self.default_entry() {
            if let Some(yesterday) = today.pred_opt() {
                intervals.push(resolve_entry(ctx, &entry.start, &entry.end, yesterday)?);
            }
            intervals.push(resolve_entry(ctx, &entry.start, &entry.end, today)?);
        }

        Ok(intervals)
    }
}
