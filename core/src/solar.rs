use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::astro::{
    calc_jd, equation_of_time, hour_angle_sunrise, hour_angle_sunset, jd_from_julian_century,
    julian_century, rad_to_deg, sun_declination,
};

/// Latitudes beyond this are pulled in to avoid the singularity at the poles.
pub const MAX_LATITUDE: f64 = 89.0;
/// Above this absolute latitude a missing event is resolved by searching nearby days.
pub const POLAR_LATITUDE: f64 = 66.4;
/// Upper bound on the day-by-day search for a defined event.
pub const MAX_SEARCH_DAYS: u32 = 400;

const MINUTES_PER_DAY: f64 = 1440.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolarError {
    #[error("No defined {event} within {days} days {direction} of JD {start_jd}")]
    SearchExhausted {
        event: SunEvent,
        direction: SearchDirection,
        start_jd: f64,
        days: u32,
    },
    #[error("No sunrise/sunset pair after the requested instant")]
    NoUpcomingEvent,
    #[error("Upcoming {0} is undefined at this latitude")]
    UndefinedEvent(SunEvent),
    #[error("Date out of range: {0}")]
    DateOutOfRange(NaiveDate),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SunEvent {
    Sunrise,
    Sunset,
}

impl std::fmt::Display for SunEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SunEvent::Sunrise => write!(f, "sunrise"),
            SunEvent::Sunset => write!(f, "sunset"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchDirection {
    Backward,
    Forward,
}

impl SearchDirection {
    fn step(self) -> f64 {
        match self {
            SearchDirection::Backward => -1.0,
            SearchDirection::Forward => 1.0,
        }
    }
}

impl std::fmt::Display for SearchDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchDirection::Backward => write!(f, "before"),
            SearchDirection::Forward => write!(f, "after"),
        }
    }
}

/// Observer position. Longitude is positive WEST of Greenwich.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Latitude pulled into [-89, 89]. Out-of-range input is not an error.
    pub fn clamped_latitude(&self) -> f64 {
        if self.latitude > MAX_LATITUDE && self.latitude <= 90.0 {
            MAX_LATITUDE
        } else if self.latitude < -MAX_LATITUDE && self.latitude >= -90.0 {
            -MAX_LATITUDE
        } else {
            self.latitude
        }
    }
}

/// Sunrise and sunset as UTC epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: f64,
    pub sunset: f64,
}

impl SunEvent {
    fn hour_angle(self, lat: f64, solar_dec: f64) -> f64 {
        match self {
            SunEvent::Sunrise => hour_angle_sunrise(lat, solar_dec),
            SunEvent::Sunset => hour_angle_sunset(lat, solar_dec),
        }
    }

    /// UTC minutes past the start of `jd` at which the event happens, NaN if it doesn't.
    pub fn minutes_utc(self, jd: f64, latitude: f64, longitude: f64) -> f64 {
        let t = julian_century(jd);

        // Declination at local solar noon is a better first guess than at 0h.
        let noon_min = solar_noon_utc(t, longitude);
        let tnoon = julian_century(jd + noon_min / MINUTES_PER_DAY);
        let first = self.refine(tnoon, latitude, longitude);

        let newt = julian_century(jd_from_julian_century(t) + first / MINUTES_PER_DAY);
        self.refine(newt, latitude, longitude)
    }

    fn refine(self, t: f64, latitude: f64, longitude: f64) -> f64 {
        let eq_time = equation_of_time(t);
        let solar_dec = sun_declination(t);
        let hour_angle = self.hour_angle(latitude, solar_dec);

        let delta = longitude - rad_to_deg(hour_angle);
        720.0 + 4.0 * delta - eq_time
    }
}

/// Solar noon at `longitude`, in UTC minutes past midnight of the day `t` falls on.
pub fn solar_noon_utc(t: f64, longitude: f64) -> f64 {
    let tnoon = julian_century(jd_from_julian_century(t) + longitude / 360.0);
    let eq_time = equation_of_time(tnoon);
    let approx = 720.0 + longitude * 4.0 - eq_time;

    let newt = julian_century(jd_from_julian_century(t) - 0.5 + approx / MINUTES_PER_DAY);
    720.0 + longitude * 4.0 - equation_of_time(newt)
}

pub fn sunrise_utc(jd: f64, latitude: f64, longitude: f64) -> f64 {
    SunEvent::Sunrise.minutes_utc(jd, latitude, longitude)
}

pub fn sunset_utc(jd: f64, latitude: f64, longitude: f64) -> f64 {
    SunEvent::Sunset.minutes_utc(jd, latitude, longitude)
}

fn is_defined(minutes: f64) -> bool {
    minutes.is_finite()
}

/// Steps one day at a time from `jd` until `event` is defined, returning that day's JD.
///
/// Near the poles this can take months; the walk gives up after [`MAX_SEARCH_DAYS`].
pub fn find_defined_event(
    event: SunEvent,
    jd: f64,
    latitude: f64,
    longitude: f64,
    direction: SearchDirection,
) -> Result<f64, SolarError> {
    let mut day = jd;
    for _ in 0..=MAX_SEARCH_DAYS {
        if is_defined(event.minutes_utc(day, latitude, longitude)) {
            return Ok(day);
        }
        day += direction.step();
    }

    Err(SolarError::SearchExhausted {
        event,
        direction,
        start_jd: jd,
        days: MAX_SEARCH_DAYS,
    })
}

pub fn find_defined_sunrise(
    jd: f64,
    latitude: f64,
    longitude: f64,
    direction: SearchDirection,
) -> Result<f64, SolarError> {
    find_defined_event(SunEvent::Sunrise, jd, latitude, longitude, direction)
}

pub fn find_defined_sunset(
    jd: f64,
    latitude: f64,
    longitude: f64,
    direction: SearchDirection,
) -> Result<f64, SolarError> {
    find_defined_event(SunEvent::Sunset, jd, latitude, longitude, direction)
}

/// Which way to look for a substitute event, or `None` outside the polar bands.
///
/// Under the midnight sun the last sunrise is in the past and the next sunset
/// in the future; during polar night it is the other way round. The two
/// season windows overlap by a few days; the midnight-sun one wins.
fn polar_search_direction(event: SunEvent, latitude: f64, doy: u32) -> Option<SearchDirection> {
    let north_summer = doy > 79 && doy < 267;
    let north_winter = doy < 83 || doy > 263;

    let midnight_sun = (latitude > POLAR_LATITUDE && north_summer)
        || (latitude < -POLAR_LATITUDE && north_winter);
    let polar_night = (latitude > POLAR_LATITUDE && north_winter)
        || (latitude < -POLAR_LATITUDE && north_summer);

    match (event, midnight_sun, polar_night) {
        (SunEvent::Sunrise, true, _) => Some(SearchDirection::Backward),
        (SunEvent::Sunset, true, _) => Some(SearchDirection::Forward),
        (SunEvent::Sunrise, false, true) => Some(SearchDirection::Forward),
        (SunEvent::Sunset, false, true) => Some(SearchDirection::Backward),
        _ => None,
    }
}

/// UTC epoch seconds of 00:00 on `date`.
pub fn day_start_utc(date: NaiveDate) -> f64 {
    date.and_time(NaiveTime::default()).and_utc().timestamp() as f64
}

fn resolve_event(
    event: SunEvent,
    jd: f64,
    latitude: f64,
    longitude: f64,
    doy: u32,
    base: f64,
) -> Result<f64, SolarError> {
    let minutes = event.minutes_utc(jd, latitude, longitude);
    if is_defined(minutes) {
        return Ok(base + minutes * 60.0);
    }

    match polar_search_direction(event, latitude, doy) {
        Some(direction) => {
            let found = find_defined_event(event, jd, latitude, longitude, direction)?;
            debug!(
                "No {} on JD {}, using {} day(s) {}",
                event,
                jd,
                (found - jd).abs(),
                direction
            );
            // Minutes from the substitute day still count from the requested day's midnight.
            Ok(base + event.minutes_utc(found, latitude, longitude) * 60.0)
        }
        None => {
            warn!(
                "No {} at latitude {:.3} on day {} and outside the polar bands, reporting midnight",
                event, latitude, doy
            );
            Ok(base)
        }
    }
}

/// Sunrise and sunset for `date` at `coord`, as UTC epoch seconds.
///
/// During polar day or night the nearest defined event is substituted, with
/// its time of day added to this date's midnight.
pub fn calc_sun(coord: &GeoCoordinate, date: NaiveDate) -> Result<SunTimes, SolarError> {
    let latitude = coord.clamped_latitude();
    let longitude = coord.longitude;

    let base = day_start_utc(date);
    let jd = calc_jd(date.year(), date.month(), date.day());
    let doy = date.ordinal();

    let sunrise = resolve_event(SunEvent::Sunrise, jd, latitude, longitude, doy, base)?;
    let sunset = resolve_event(SunEvent::Sunset, jd, latitude, longitude, doy, base)?;

    Ok(SunTimes { sunrise, sunset })
}

/// The first sunrise/sunset pair after the current wall-clock time.
pub fn calc_next_sun(coord: &GeoCoordinate, date: NaiveDate) -> Result<SunTimes, SolarError> {
    let now = chrono::Utc::now().timestamp() as f64;
    calc_next_sun_at(coord, date, now)
}

/// The first sunrise/sunset pair after `now`, drawn from the day before,
/// the day of, and the day after `date`.
///
/// Events are not substituted here; an undefined one is simply never "after".
/// When only the final sunset (or nothing) lies ahead there is no pair to
/// report and [`SolarError::NoUpcomingEvent`] is returned.
pub fn calc_next_sun_at(
    coord: &GeoCoordinate,
    date: NaiveDate,
    now: f64,
) -> Result<SunTimes, SolarError> {
    let latitude = coord.clamped_latitude();
    let longitude = coord.longitude;

    let yesterday = date.pred_opt().ok_or(SolarError::DateOutOfRange(date))?;
    let tomorrow = date.succ_opt().ok_or(SolarError::DateOutOfRange(date))?;

    let mut candidates = [f64::NAN; 6];
    for (i, day) in [yesterday, date, tomorrow].into_iter().enumerate() {
        let base = day_start_utc(day);
        let jd = calc_jd(day.year(), day.month(), day.day());
        candidates[2 * i] = base + sunrise_utc(jd, latitude, longitude) * 60.0;
        candidates[2 * i + 1] = base + sunset_utc(jd, latitude, longitude) * 60.0;
    }

    let next = match candidates.iter().position(|&ts| ts > now) {
        Some(i) if i < candidates.len() - 1 => i,
        _ => return Err(SolarError::NoUpcomingEvent),
    };

    let (sunrise, sunset) = if next % 2 == 1 {
        (candidates[next + 1], candidates[next])
    } else {
        (candidates[next], candidates[next + 1])
    };

    if !is_defined(sunrise) {
        return Err(SolarError::UndefinedEvent(SunEvent::Sunrise));
    }
    if !is_defined(sunset) {
        return Err(SolarError::UndefinedEvent(SunEvent::Sunset));
    }

    Ok(SunTimes { sunrise, sunset })
}
