use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::solar::GeoCoordinate;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse Error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation Error: {0}")]
    Validation(String),
}

/// Site configuration.
///
/// The bare `latitude=..` / `longitude=..` file used by older installs is
/// already valid TOML, so both keys live at the top level. Longitude is
/// positive WEST of Greenwich.
///
/// Unknown keys are ignored, but every line must still be valid TOML: a
/// legacy line such as `timezone=PST` has to be quoted or removed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(alias = "Latitude", alias = "LATITUDE")]
    pub latitude: f64,
    #[serde(alias = "Longitude", alias = "LONGITUDE")]
    pub longitude: f64,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub commands: CommandConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Fixed offset applied to literal HH:MM schedule times.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CommandConfig {
    pub start: Option<String>,
    pub stop: Option<String>,
    pub status: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            start: None,
            stop: None,
            status: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            latitude: 37.451688,
            longitude: 122.18305,
            general: GeneralConfig::default(),
            commands: CommandConfig::default(),
        }
    }
}

const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::Validation(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::Validation(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        if self.general.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::Validation(format!(
                "utc_offset_minutes {} exceeds 18 hours",
                self.general.utc_offset_minutes
            )));
        }
        if self.commands.timeout_secs == 0 {
            return Err(ConfigError::Validation("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn location(&self) -> GeoCoordinate {
        GeoCoordinate::new(self.latitude, self.longitude)
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.general.utc_offset_minutes * 60).ok_or_else(|| {
            ConfigError::Validation(format!(
                "utc_offset_minutes {} is not a valid offset",
                self.general.utc_offset_minutes
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_legacy_two_line_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "latitude=37.451688").unwrap();
        writeln!(file, "longitude=122.18305").unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.latitude, 37.451688);
        assert_eq!(config.longitude, 122.18305);
        assert_eq!(config.general, GeneralConfig::default());
        assert_eq!(config.commands.timeout_secs, 60);
    }

    #[test]
    fn test_capitalized_keys_and_integers() {
        let config = Config::parse("Latitude = 52\nLONGITUDE = -13\n").unwrap();
        assert_eq!(config.location(), GeoCoordinate::new(52.0, -13.0));
    }

    #[test]
    fn test_unknown_keys_need_valid_values() {
        let config = Config::parse("latitude=10\nlongitude=20\ntimezone=\"PST\"\n").unwrap();
        assert_eq!(config.location(), GeoCoordinate::new(10.0, 20.0));

        assert!(matches!(
            Config::parse("latitude=10\nlongitude=20\ntimezone=PST\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
latitude = 64.8
longitude = 147.7

[general]
log_level = "debug"
utc_offset_minutes = -540

[commands]
start = "systemctl start lights"
stop = "systemctl stop lights"
status = "lights-status"
timeout_secs = 5
"#,
        )
        .unwrap();

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), -540 * 60);
        assert_eq!(config.commands.start.as_deref(), Some("systemctl start lights"));
        assert_eq!(config.commands.status.as_deref(), Some("lights-status"));
        assert_eq!(config.commands.timeout_secs, 5);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            Config::parse("latitude = 91.0\nlongitude = 0.0\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            Config::parse("latitude = 10.0\nlongitude = 200.0\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            Config::parse("latitude = 10.0\nlongitude = 0.0\n[general]\nutc_offset_minutes = 1200\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(Config::parse("latitude = 10.0\n"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::load_from_file("/nonexistent/sunswitch.conf"),
            Err(ConfigError::Io(_))
        ));
    }
}
