use crate::sources::{CalendarMode, Coordinate, DEFAULT_SEARCH_RADIUS_M};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 3000;

// Default query point: the campus core the original deployment watched.
pub const DEFAULT_LATITUDE: f64 = 42.729869;
pub const DEFAULT_LONGITUDE: f64 = -73.676871;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub search: Option<SearchSection>,
    #[serde(default)]
    pub calendar: Option<CalendarSection>,
    #[serde(default)]
    pub policy: Option<PolicySettings>,
    #[serde(default)]
    pub sources: Option<SourcesSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
    /// Refresh interval in seconds for the prediction pipeline (default: 30)
    pub refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchSection {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Candidate-lot and venue search radius in meters (default: 1000)
    pub radius_m: Option<u32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalendarSection {
    pub mode: Option<CalendarMode>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PolicySettings {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Built-in fixtures, no upstreams required.
    #[default]
    Mock,
    Http,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesSection {
    pub mode: Option<SourceMode>,
    /// Per-call timeout for upstream fetches in milliseconds (default: 3000)
    pub upstream_timeout_ms: Option<u64>,
    pub lots_endpoint: Option<String>,
    pub weather_endpoint: Option<String>,
    pub venues_endpoint: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Returns the refresh interval as Duration (default: 30 seconds)
    pub fn refresh_interval(&self) -> Duration {
        let secs = self
            .server
            .as_ref()
            .and_then(|s| s.refresh_interval_secs)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
        Duration::from_secs(secs)
    }

    /// Returns the fixed query coordinate for the non-live view.
    pub fn search_center(&self) -> Coordinate {
        let section = self.search.as_ref();
        Coordinate::new(
            section
                .and_then(|s| s.latitude)
                .unwrap_or(DEFAULT_LATITUDE),
            section
                .and_then(|s| s.longitude)
                .unwrap_or(DEFAULT_LONGITUDE),
        )
    }

    pub fn search_radius_m(&self) -> u32 {
        self.search
            .as_ref()
            .and_then(|s| s.radius_m)
            .unwrap_or(DEFAULT_SEARCH_RADIUS_M)
    }

    pub fn calendar_mode(&self) -> CalendarMode {
        self.calendar
            .as_ref()
            .and_then(|s| s.mode)
            .unwrap_or_default()
    }

    pub fn policy_path(&self) -> Option<&Path> {
        let path = self.policy.as_ref()?.path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn source_mode(&self) -> SourceMode {
        self.sources
            .as_ref()
            .and_then(|s| s.mode)
            .unwrap_or_default()
    }

    pub fn upstream_timeout(&self) -> Duration {
        let millis = self
            .sources
            .as_ref()
            .and_then(|s| s.upstream_timeout_ms)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_MS);
        Duration::from_millis(millis)
    }

    pub fn lots_endpoint(&self) -> Option<&str> {
        self.sources.as_ref()?.lots_endpoint.as_deref()
    }

    pub fn weather_endpoint(&self) -> Option<&str> {
        self.sources.as_ref()?.weather_endpoint.as_deref()
    }

    pub fn venues_endpoint(&self) -> Option<&str> {
        self.sources.as_ref()?.venues_endpoint.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn default_config_includes_policy_path() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_default()?;
        assert!(config.policy_path().is_some());
        Ok(())
    }

    #[test]
    fn minimal_config_falls_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = std::env::temp_dir();
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = temp_dir.join(format!("lotwatch-config-minimal-{unique}.toml"));
        let contents = r#"
[app]
name = "lotwatch"

[logging]
level = "info"
"#;
        fs::write(&path, contents)?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(
            config.refresh_interval(),
            Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS)
        );
        assert_eq!(config.search_center().latitude, DEFAULT_LATITUDE);
        assert_eq!(config.search_radius_m(), DEFAULT_SEARCH_RADIUS_M);
        assert_eq!(config.calendar_mode(), CalendarMode::InSession);
        assert_eq!(config.source_mode(), SourceMode::Mock);
        assert_eq!(
            config.upstream_timeout(),
            Duration::from_millis(DEFAULT_UPSTREAM_TIMEOUT_MS)
        );
        assert!(config.policy_path().is_none());
        assert!(config.lots_endpoint().is_none());
        Ok(())
    }

    #[test]
    fn empty_policy_path_is_treated_as_missing() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = std::env::temp_dir();
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = temp_dir.join(format!("lotwatch-config-{unique}.toml"));
        let contents = r#"
[app]
name = "lotwatch"

[logging]
level = "info"

[policy]
path = ""
"#;
        fs::write(&path, contents)?;

        let result = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert!(result.policy_path().is_none());
        Ok(())
    }

    #[test]
    fn http_sources_section_parses() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = std::env::temp_dir();
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = temp_dir.join(format!("lotwatch-config-http-{unique}.toml"));
        let contents = r#"
[app]
name = "lotwatch"

[logging]
level = "debug"

[calendar]
mode = "exam_period"

[sources]
mode = "http"
upstream_timeout_ms = 500
lots_endpoint = "http://lots.internal/api/search"
weather_endpoint = "http://weather.internal/api/now"
"#;
        fs::write(&path, contents)?;

        let config = load_from_path(&path)?;
        let _ = fs::remove_file(&path);

        assert_eq!(config.source_mode(), SourceMode::Http);
        assert_eq!(config.upstream_timeout(), Duration::from_millis(500));
        assert_eq!(config.calendar_mode(), CalendarMode::ExamPeriod);
        assert_eq!(
            config.lots_endpoint(),
            Some("http://lots.internal/api/search")
        );
        assert!(config.venues_endpoint().is_none());
        Ok(())
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let temp_dir = std::env::temp_dir();
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = temp_dir.join(format!("lotwatch-config-missing-{unique}.toml"));

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = std::env::temp_dir();
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = temp_dir.join(format!("lotwatch-config-invalid-{unique}.toml"));
        fs::write(&path, "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
