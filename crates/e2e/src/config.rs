//! Configuration for the application under test and the mock layer

use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Clock value pinned on the page unless a test asks for another one
pub const DEFAULT_FIXED_TIME: &str = "2024-02-02T10:00:00";

/// Route pattern (relative to the app) that covers every backend call
pub const API_ROUTE_PATTERN: &str = "/**/api/**";

/// Where the application under test is served
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host name without scheme
    pub host: String,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
        }
    }
}

impl AppConfig {
    /// Read `DEMO_HOST` and `DEMO_PORT` from the environment
    pub fn from_env() -> E2eResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> E2eResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let host = lookup("DEMO_HOST").unwrap_or(defaults.host);
        let port = match lookup("DEMO_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                mockwright_common::Error::InvalidConfig(format!("DEMO_PORT '{}': {}", raw, e))
            })?,
            None => defaults.port,
        };
        Ok(Self { host, port })
    }

    /// Scheme, host and port of the app
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Absolute URL (or route pattern) for an app-relative path
    pub fn app_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Pattern matching every API call of the app
    pub fn api_pattern(&self) -> String {
        self.app_url(API_ROUTE_PATTERN)
    }

    /// App-relative part of `url` when it is an API call of this app
    pub fn api_path<'a>(&self, url: &'a str) -> Option<&'a str> {
        let base = self.base_url();
        if url.contains("/api/") {
            url.strip_prefix(base.as_str())
        } else {
            None
        }
    }
}

/// Whether the page clock is pinned, and to which instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixedTime {
    Enabled(bool),
    At(String),
}

impl Default for FixedTime {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

impl FixedTime {
    /// Timestamp to pin, if any
    pub fn timestamp(&self) -> Option<&str> {
        match self {
            Self::Enabled(true) => Some(DEFAULT_FIXED_TIME),
            Self::Enabled(false) => None,
            Self::At(at) => Some(at.as_str()),
        }
    }

    pub fn validate(&self) -> E2eResult<()> {
        if let Some(at) = self.timestamp() {
            NaiveDateTime::parse_from_str(at, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(at, "%Y-%m-%dT%H:%M:%S%.f"))
                .map_err(|e| E2eError::SpecParse(format!("fixed_time '{}': {}", at, e)))?;
        }
        Ok(())
    }
}

/// Switches of the mock server helper
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockOptions {
    /// Pin the page clock
    pub fixed_time: FixedTime,

    /// Record failed and unauthorised requests
    pub monitor_network_error: bool,

    /// Abort every API call that no mock handles
    pub strict_api_call: bool,

    /// Register the authentication mocks
    pub use_auth: bool,

    /// Recording is a zip archive
    pub zip_har: bool,

    /// File stem of the recording
    pub har_name: Option<String>,

    /// Console message types that are collected
    pub console_types: Vec<ConsoleType>,

    /// Directory that fixture paths not starting with `.` are relative to
    pub fixtures_root: Option<PathBuf>,

    pub auth: AuthMocks,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            fixed_time: FixedTime::default(),
            monitor_network_error: true,
            strict_api_call: true,
            use_auth: false,
            zip_har: false,
            har_name: None,
            console_types: vec![ConsoleType::Error],
            fixtures_root: None,
            auth: AuthMocks::default(),
        }
    }
}

impl From<bool> for MockOptions {
    fn from(enabled: bool) -> Self {
        Self {
            fixed_time: FixedTime::Enabled(enabled),
            monitor_network_error: enabled,
            strict_api_call: enabled,
            use_auth: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleType {
    Error,
    Warning,
    Debug,
}

impl ConsoleType {
    /// Parse the type reported by the browser console
    pub fn from_browser(kind: &str) -> Option<Self> {
        match kind {
            "error" => Some(Self::Error),
            "warning" => Some(Self::Warning),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

/// Fixtures answering the app's authentication probes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthMocks {
    pub check_route: String,
    pub check_fixture: String,
    pub settings_route: String,
    pub settings_fixture: String,
}

impl Default for AuthMocks {
    fn default() -> Self {
        Self {
            check_route: "GET:/ekp-user-service/api/auth/check".to_string(),
            check_fixture: "utils/mocks/auth.mock.json".to_string(),
            settings_route:
                "GET:/ekp-management/api/Settings?Category=ekp_management_service_auth".to_string(),
            settings_fixture: "utils/mocks/auth.settings.mock.json".to_string(),
        }
    }
}
