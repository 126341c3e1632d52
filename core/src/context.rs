use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use tracing::{debug, info};

use crate::config::{Config, ConfigError};
use crate::schedule::{ScheduleError, TimeSpec};
use crate::solar::{calc_sun, GeoCoordinate};

/// Everything needed to turn a [`TimeSpec`] into a UTC instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleContext {
    location: GeoCoordinate,
    offset: FixedOffset,
}

impl ScheduleContext {
    pub fn new(location: GeoCoordinate, offset: FixedOffset) -> Self {
        info!(
            "Context initialized at Lat: {}, Lon: {} (west positive), UTC offset: {}",
            location.latitude, location.longitude, offset
        );
        Self { location, offset }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(config.location(), config.utc_offset()?))
    }

    pub fn location(&self) -> GeoCoordinate {
        self.location
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date of `now` (epoch seconds) at the configured offset.
    pub fn local_date(&self, now: f64) -> Result<NaiveDate, ScheduleError> {
        let instant = DateTime::from_timestamp(now.floor() as i64, 0)
            .ok_or(ScheduleError::InvalidTimestamp(now))?;
        Ok(instant.with_timezone(&self.offset).date_naive())
    }

    /// Epoch seconds at which `spec` falls on `date`.
    pub fn resolve(&self, spec: &TimeSpec, date: NaiveDate) -> Result<f64, ScheduleError> {
        let resolved = match *spec {
            TimeSpec::Clock { hour, minute } => {
                let local = date.and_hms_opt(hour, minute, 0).ok_or_else(|| {
                    ScheduleError::InvalidLocalTime(format!("{} on {}", spec, date))
                })?;
                let instant = self
                    .offset
                    .from_local_datetime(&local)
                    .single()
                    .ok_or_else(|| {
                        ScheduleError::InvalidLocalTime(format!("{} on {}", spec, date))
                    })?;
                instant.timestamp() as f64
            }
            TimeSpec::Sunrise { offset_minutes } => {
                calc_sun(&self.location, date)?.sunrise + offset_minutes as f64 * 60.0
            }
            TimeSpec::Sunset { offset_minutes } => {
                calc_sun(&self.location, date)?.sunset + offset_minutes as f64 * 60.0
            }
        };

        debug!("Resolved {} on {} to {}", spec, date, resolved);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc_context(lat: f64, lon: f64) -> ScheduleContext {
        ScheduleContext::new(GeoCoordinate::new(lat, lon), FixedOffset::east_opt(0).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_clock_time_uses_offset() {
        let day = date(2024, 5, 1);
        let utc = utc_context(0.0, 0.0);
        let pdt = ScheduleContext::new(
            GeoCoordinate::new(0.0, 0.0),
            FixedOffset::west_opt(7 * 3600).unwrap(),
        );
        let spec = TimeSpec::Clock { hour: 19, minute: 30 };

        let at_utc = utc.resolve(&spec, day).unwrap();
        let at_pdt = pdt.resolve(&spec, day).unwrap();

        assert_eq!(at_utc, 1714591800.0);
        assert_eq!(at_pdt - at_utc, 7.0 * 3600.0);
    }

    #[test]
    fn test_sun_relative_offsets() {
        let ctx = utc_context(37.451688, 122.18305);
        let day = date(2024, 5, 1);
        let sun = calc_sun(&ctx.location(), day).unwrap();

        assert_eq!(
            ctx.resolve(&TimeSpec::Sunset { offset_minutes: 0 }, day).unwrap(),
            sun.sunset
        );
        assert_eq!(
            ctx.resolve(&TimeSpec::Sunset { offset_minutes: -30 }, day).unwrap(),
            sun.sunset - 1800.0
        );
        assert_eq!(
            ctx.resolve(&TimeSpec::Sunrise { offset_minutes: 45 }, day).unwrap(),
            sun.sunrise + 2700.0
        );
    }

    #[test]
    fn test_local_date_crosses_midnight_with_offset() {
        // 2024-05-02 03:00 UTC is still May 1st seven hours west.
        let now = 1714618800.0;
        let pdt = ScheduleContext::new(
            GeoCoordinate::new(0.0, 0.0),
            FixedOffset::west_opt(7 * 3600).unwrap(),
        );

        assert_eq!(utc_context(0.0, 0.0).local_date(now).unwrap(), date(2024, 5, 2));
        assert_eq!(pdt.local_date(now).unwrap(), date(2024, 5, 1));
    }

    #[test]
    fn test_from_config() {
        let config = Config::parse("latitude = 10\nlongitude = 20\n[general]\nutc_offset_minutes = 60\n")
            .unwrap();
        let ctx = ScheduleContext::from_config(&config).unwrap();
        assert_eq!(ctx.location(), GeoCoordinate::new(10.0, 20.0));
        assert_eq!(ctx.offset().local_minus_utc(), 3600);
    }
}
