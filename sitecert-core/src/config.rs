//! Settings file and environment overrides
//!
//! The settings file is JSON with PascalCase keys:
//!
//! ```json
//! { "Websites": ["https://example.com"], "ExpiryHorizonDays": 7, "TimeoutSeconds": 10 }
//! ```
//!
//! `SITECERT_WEBSITES` (comma separated), `SITECERT_EXPIRY_HORIZON_DAYS` and
//! `SITECERT_TIMEOUT_SECONDS` override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checker::{CertificateChecker, DEFAULT_EXPIRY_HORIZON_DAYS, DEFAULT_TIMEOUT};
use crate::error::{Result, SiteCertError};
use crate::target::CheckTarget;

pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

/// Upper bound for `ExpiryHorizonDays` (100 years)
pub const MAX_EXPIRY_HORIZON_DAYS: i64 = 36_500;

pub const ENV_WEBSITES: &str = "SITECERT_WEBSITES";
pub const ENV_EXPIRY_HORIZON_DAYS: &str = "SITECERT_EXPIRY_HORIZON_DAYS";
pub const ENV_TIMEOUT_SECONDS: &str = "SITECERT_TIMEOUT_SECONDS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    pub websites: Vec<String>,
    pub expiry_horizon_days: i64,
    pub timeout_seconds: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            websites: Vec::new(),
            expiry_horizon_days: DEFAULT_EXPIRY_HORIZON_DAYS,
            timeout_seconds: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `appsettings.json` when no path is
    /// given, then apply environment overrides.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Path::new(DEFAULT_SETTINGS_FILE), |key| {
            std::env::var(key).ok()
        })
    }

    fn load_with<F>(path: Option<&Path>, default_path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None if default_path.exists() => Self::from_file(default_path)?,
            None => {
                debug!(path = %default_path.display(), "No settings file found, using defaults");
                Self::default()
            }
        };

        settings.with_env_overrides(lookup)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SiteCertError::ConfigRead {
            path: PathBuf::from(path),
            source,
        })?;
        let settings = Self::from_json(&content)?;
        debug!(path = %path.display(), websites = settings.websites.len(), "Loaded settings");
        Ok(settings)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(websites) = lookup(ENV_WEBSITES) {
            self.websites = websites
                .split(',')
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(days) = lookup(ENV_EXPIRY_HORIZON_DAYS) {
            self.expiry_horizon_days = days.trim().parse().map_err(|_| {
                SiteCertError::Config(format!(
                    "{} must be a number, got '{}'",
                    ENV_EXPIRY_HORIZON_DAYS, days
                ))
            })?;
        }

        if let Some(secs) = lookup(ENV_TIMEOUT_SECONDS) {
            self.timeout_seconds = secs.trim().parse().map_err(|_| {
                SiteCertError::Config(format!(
                    "{} must be a number, got '{}'",
                    ENV_TIMEOUT_SECONDS, secs
                ))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_EXPIRY_HORIZON_DAYS).contains(&self.expiry_horizon_days) {
            return Err(SiteCertError::Config(format!(
                "ExpiryHorizonDays must be between 0 and {}, got {}",
                MAX_EXPIRY_HORIZON_DAYS, self.expiry_horizon_days
            )));
        }
        if self.timeout_seconds == 0 {
            return Err(SiteCertError::Config(
                "TimeoutSeconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn targets(&self) -> Vec<CheckTarget> {
        self.websites.iter().map(CheckTarget::new).collect()
    }

    pub fn checker(&self) -> CertificateChecker {
        let horizon = chrono::TimeDelta::try_days(self.expiry_horizon_days)
            .unwrap_or(chrono::TimeDelta::MAX);

        CertificateChecker::new()
            .with_timeout(Duration::from_secs(self.timeout_seconds))
            .with_expiry_horizon(horizon)
    }
}
