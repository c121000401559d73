use crate::report::aggregate::DEFAULT_DISPLAY_OFFSET_HOURS;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const CONFIG_PATH_ENV: &str = "OCCUPANCY_REPORT_CONFIG";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_UPSTREAM_PATH: &str = "/api/occupancy";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ZONE: &str = "Main-Entrance";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub upstream: Option<UpstreamSection>,
    #[serde(default)]
    pub report: Option<ReportSection>,
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
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSection {
    /// Base URL of the occupancy data API, e.g. `https://footfall.example.com`
    pub base_url: Option<String>,
    /// Request path appended to `base_url` (default: /api/occupancy)
    pub path: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Bearer token sent with every upstream request
    pub api_token: Option<String>,
    /// JSON file served instead of the upstream API when no `base_url` is set
    pub fixture_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSection {
    pub default_zone: Option<String>,
    /// Hours between the upstream (UTC) and display time base (default: 8)
    pub display_offset_hours: Option<i32>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Path from `OCCUPANCY_REPORT_CONFIG`, falling back to the bundled default.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

impl Config {
    pub fn log_level(&self) -> &str {
        non_empty(Some(self.logging.level.as_str())).unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Returns the upstream base URL, or `None` when unset or empty.
    pub fn upstream_base_url(&self) -> Option<&str> {
        non_empty(self.upstream.as_ref()?.base_url.as_deref())
    }

    pub fn upstream_path(&self) -> &str {
        self.upstream
            .as_ref()
            .and_then(|u| non_empty(u.path.as_deref()))
            .unwrap_or(DEFAULT_UPSTREAM_PATH)
    }

    pub fn upstream_timeout(&self) -> Duration {
        let secs = self
            .upstream
            .as_ref()
            .and_then(|u| u.timeout_secs)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn upstream_api_token(&self) -> Option<String> {
        non_empty(self.upstream.as_ref()?.api_token.as_deref()).map(str::to_string)
    }

    pub fn fixture_path(&self) -> Option<&Path> {
        let path = self.upstream.as_ref()?.fixture_path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn default_zone(&self) -> &str {
        self.report
            .as_ref()
            .and_then(|r| non_empty(r.default_zone.as_deref()))
            .unwrap_or(DEFAULT_ZONE)
    }

    pub fn display_offset_hours(&self) -> i32 {
        self.report
            .as_ref()
            .and_then(|r| r.display_offset_hours)
            .unwrap_or(DEFAULT_DISPLAY_OFFSET_HOURS)
    }
}
