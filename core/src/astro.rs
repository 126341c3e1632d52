//! NOAA solar position formulas.
//!
//! Everything here is a closed-form approximation parameterized on the
//! Julian century `t` (centuries since J2000.0). Angles are degrees unless
//! the function name says otherwise.

/// Zenith of the sun's upper limb at rise/set, including refraction.
pub const SUNRISE_ZENITH_DEG: f64 = 90.833;

const J2000_JD: f64 = 2451545.0;
const DAYS_PER_CENTURY: f64 = 36525.0;

pub fn rad_to_deg(angle_rad: f64) -> f64 {
    180.0 * angle_rad / std::f64::consts::PI
}

pub fn deg_to_rad(angle_deg: f64) -> f64 {
    std::f64::consts::PI * angle_deg / 180.0
}

/// Julian Day at 0h UTC of the given Gregorian calendar date.
///
/// The date is not validated; day 32 simply rolls into the next month.
pub fn calc_jd(year: i32, month: u32, day: u32) -> f64 {
    let (mut y, mut m) = (year as f64, month as f64);
    if month <= 2 {
        y -= 1.0;
        m += 12.0;
    }

    let a = (y / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();

    (365.25 * (y + 4716.0)).floor() + (30.6001 * (m + 1.0)).floor() + day as f64 + b - 1524.5
}

pub fn julian_century(jd: f64) -> f64 {
    (jd - J2000_JD) / DAYS_PER_CENTURY
}

pub fn jd_from_julian_century(t: f64) -> f64 {
    t * DAYS_PER_CENTURY + J2000_JD
}

/// Geometric mean longitude of the sun, normalized to [0, 360].
pub fn geom_mean_long_sun(t: f64) -> f64 {
    let mut l0 = 280.46646 + t * (36000.76983 + 0.0003032 * t);
    while l0 > 360.0 {
        l0 -= 360.0;
    }
    while l0 < 0.0 {
        l0 += 360.0;
    }
    l0
}

pub fn geom_mean_anomaly_sun(t: f64) -> f64 {
    357.52911 + t * (35999.05029 - 0.0001537 * t)
}

/// Unitless.
pub fn eccentricity_earth_orbit(t: f64) -> f64 {
    0.016708634 - t * (0.000042037 + 0.0000001267 * t)
}

pub fn sun_eq_of_center(t: f64) -> f64 {
    let mrad = deg_to_rad(geom_mean_anomaly_sun(t));
    let sinm = mrad.sin();
    let sin2m = (2.0 * mrad).sin();
    let sin3m = (3.0 * mrad).sin();

    sinm * (1.914602 - t * (0.004817 + 0.000014 * t))
        + sin2m * (0.019993 - 0.000101 * t)
        + sin3m * 0.000289
}

pub fn sun_true_long(t: f64) -> f64 {
    geom_mean_long_sun(t) + sun_eq_of_center(t)
}

pub fn sun_true_anomaly(t: f64) -> f64 {
    geom_mean_anomaly_sun(t) + sun_eq_of_center(t)
}

/// Earth-sun distance in AU.
pub fn sun_radius_vector(t: f64) -> f64 {
    let v = sun_true_anomaly(t);
    let e = eccentricity_earth_orbit(t);
    (1.000001018 * (1.0 - e * e)) / (1.0 + e * deg_to_rad(v).cos())
}

fn nutation_omega(t: f64) -> f64 {
    125.04 - 1934.136 * t
}

/// True longitude corrected for nutation and aberration.
pub fn sun_apparent_long(t: f64) -> f64 {
    sun_true_long(t) - 0.00569 - 0.00478 * deg_to_rad(nutation_omega(t)).sin()
}

pub fn mean_obliquity_of_ecliptic(t: f64) -> f64 {
    let seconds = 21.448 - t * (46.8150 + t * (0.00059 - t * 0.001813));
    23.0 + (26.0 + seconds / 60.0) / 60.0
}

pub fn obliquity_correction(t: f64) -> f64 {
    mean_obliquity_of_ecliptic(t) + 0.00256 * deg_to_rad(nutation_omega(t)).cos()
}

pub fn sun_right_ascension(t: f64) -> f64 {
    let e = deg_to_rad(obliquity_correction(t));
    let lambda = deg_to_rad(sun_apparent_long(t));
    rad_to_deg((e.cos() * lambda.sin()).atan2(lambda.cos()))
}

pub fn sun_declination(t: f64) -> f64 {
    let e = deg_to_rad(obliquity_correction(t));
    let lambda = deg_to_rad(sun_apparent_long(t));
    rad_to_deg((e.sin() * lambda.sin()).asin())
}

/// Equation of time in minutes: true solar time minus mean solar time.
pub fn equation_of_time(t: f64) -> f64 {
    let epsilon = obliquity_correction(t);
    let l0 = deg_to_rad(geom_mean_long_sun(t));
    let e = eccentricity_earth_orbit(t);
    let m = deg_to_rad(geom_mean_anomaly_sun(t));

    let mut y = (deg_to_rad(epsilon) / 2.0).tan();
    y *= y;

    let sin2l0 = (2.0 * l0).sin();
    let sinm = m.sin();
    let cos2l0 = (2.0 * l0).cos();
    let sin4l0 = (4.0 * l0).sin();
    let sin2m = (2.0 * m).sin();

    let etime = y * sin2l0 - 2.0 * e * sinm + 4.0 * e * y * sinm * cos2l0
        - 0.5 * y * y * sin4l0
        - 1.25 * e * e * sin2m;

    rad_to_deg(etime) * 4.0
}

fn hour_angle(lat: f64, solar_dec: f64) -> f64 {
    let lat_rad = deg_to_rad(lat);
    let sd_rad = deg_to_rad(solar_dec);

    // Outside [-1, 1] during polar day or night; acos then yields NaN.
    let arg = deg_to_rad(SUNRISE_ZENITH_DEG).cos() / (lat_rad.cos() * sd_rad.cos())
        - lat_rad.tan() * sd_rad.tan();
    arg.acos()
}

/// Hour angle of sunrise in radians, NaN when the sun does not rise or set.
pub fn hour_angle_sunrise(lat: f64, solar_dec: f64) -> f64 {
    hour_angle(lat, solar_dec)
}

/// Hour angle of sunset in radians (negative), NaN when undefined.
pub fn hour_angle_sunset(lat: f64, solar_dec: f64) -> f64 {
    -hour_angle(lat, solar_dec)
}

/// Formats minutes past midnight as `H:MM:SS`.
pub fn time_string(minutes: f64) -> String {
    let float_hour = minutes / 60.0;
    let mut hour = float_hour.floor() as i64;
    let float_minute = 60.0 * (float_hour - float_hour.floor());
    let mut minute = float_minute.floor() as i64;
    let float_sec = 60.0 * (float_minute - float_minute.floor());
    let mut second = (float_sec + 0.5).floor() as i64;

    if second > 59 {
        second = 0;
        minute += 1;
    }
    if minute > 59 {
        minute = 0;
        hour += 1;
    }

    format!("{}:{:02}:{:02}", hour, minute, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_jd_known_epochs() {
        // J2000.0 is 2000-01-01 12:00 TT, so midnight is half a day earlier.
        assert_eq!(calc_jd(2000, 1, 1), 2451544.5);
        assert_eq!(calc_jd(1970, 1, 1), 2440587.5);
        assert_eq!(calc_jd(2024, 3, 1) - calc_jd(2024, 2, 28), 2.0);
    }

    #[test]
    fn test_century_conversion_is_linear() {
        let jd = calc_jd(2050, 7, 4);
        let t = julian_century(jd);
        assert!((jd_from_julian_century(t) - jd).abs() < 1e-6);
        assert_eq!(julian_century(2451545.0), 0.0);
    }

    #[test]
    fn test_mean_longitude_normalized() {
        for t in [-2.0, -0.5, 0.0, 0.37, 1.0, 3.0] {
            let l0 = geom_mean_long_sun(t);
            assert!((0.0..=360.0).contains(&l0), "l0 = {}", l0);
        }
    }

    #[test]
    fn test_declination_near_solstices() {
        let june = julian_century(calc_jd(2024, 6, 20) + 0.5);
        let december = julian_century(calc_jd(2024, 12, 21) + 0.5);
        assert!((sun_declination(june) - 23.44).abs() < 0.1);
        assert!((sun_declination(december) + 23.44).abs() < 0.1);
    }

    #[test]
    fn test_equation_of_time_extremes() {
        // Early November peak around +16.4 min, mid February trough around -14.2 min.
        let nov = equation_of_time(julian_century(calc_jd(2024, 11, 3)));
        let feb = equation_of_time(julian_century(calc_jd(2024, 2, 11)));
        assert!((nov - 16.4).abs() < 0.5, "nov = {}", nov);
        assert!((feb + 14.2).abs() < 0.5, "feb = {}", feb);
    }

    #[test]
    fn test_radius_vector_perihelion_aphelion() {
        let jan = sun_radius_vector(julian_century(calc_jd(2024, 1, 3)));
        let jul = sun_radius_vector(julian_century(calc_jd(2024, 7, 5)));
        assert!((jan - 0.9833).abs() < 0.001);
        assert!((jul - 1.0167).abs() < 0.001);
    }

    #[test]
    fn test_hour_angle_undefined_in_polar_night() {
        assert!(hour_angle_sunrise(80.0, -23.4).is_nan());
        assert!(hour_angle_sunset(80.0, 23.4).is_nan());

        let ha = hour_angle_sunrise(0.0, 0.0);
        assert!((rad_to_deg(ha) - 90.833).abs() < 1e-9);
        assert_eq!(hour_angle_sunset(45.0, 10.0), -hour_angle_sunrise(45.0, 10.0));
    }

    #[test]
    fn test_time_string_rounding() {
        assert_eq!(time_string(0.0), "0:00:00");
        assert_eq!(time_string(754.5), "12:34:30");
        assert_eq!(time_string(59.9999), "1:00:00");
    }
}
