//! Check targets and their normalization into request URLs

use std::fmt;
use std::net::IpAddr;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SiteCertError};

/// A website to check, exactly as it was configured.
///
/// Accepts a bare hostname (`example.com`), a `host:port` pair or a full
/// `https://` URL. Normalization happens lazily in [`CheckTarget::to_url`] so a
/// malformed entry is reported for that target instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckTarget(String);

impl CheckTarget {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalize the target into the HTTPS URL that will be requested.
    ///
    /// - Adds `https://` when no scheme is given
    /// - Rejects any scheme other than https
    /// - Rejects empty input, missing hosts and malformed hostname labels
    /// - Keeps an explicit port and path
    pub fn to_url(&self) -> Result<Url> {
        let raw = self.0.trim();
        if raw.is_empty() {
            return Err(SiteCertError::InvalidTarget("empty target".to_string()));
        }

        let scheme = raw
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()));

        let candidate = match scheme {
            Some(scheme) if scheme.eq_ignore_ascii_case("https") => raw.to_string(),
            Some(scheme) => return Err(SiteCertError::UnsupportedScheme(scheme.to_lowercase())),
            None => format!("https://{}", raw),
        };

        let url = Url::parse(&candidate)
            .map_err(|e| SiteCertError::InvalidTarget(format!("{}: {}", raw, e)))?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| SiteCertError::InvalidTarget(format!("{}: missing host", raw)))?;

        // IPv6 literals come back bracketed
        if host.trim_matches(['[', ']']).parse::<IpAddr>().is_err() {
            validate_hostname(host)?;
        }

        Ok(url)
    }

    /// Hostname the certificate is expected to cover, if the target parses.
    pub fn host_hint(&self) -> Option<String> {
        self.to_url()
            .ok()
            .and_then(|url| url.host_str().map(|h| h.trim_matches(['[', ']']).to_string()))
    }
}

impl fmt::Display for CheckTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CheckTarget {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CheckTarget {
    fn from(value: String) -> Self {
        Self(value)
    }
}

fn validate_hostname(host: &str) -> Result<()> {
    let invalid = || SiteCertError::InvalidTarget(host.to_string());

    if host.is_empty() || host.starts_with('.') || host.ends_with('.') {
        return Err(invalid());
    }

    let valid_chars = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !valid_chars {
        return Err(invalid());
    }

    for label in host.split('.') {
        if label.is_empty() || label.starts_with('-') || label.ends_with('-') {
            return Err(invalid());
        }
    }

    Ok(())
}

/// Parse a plain target list: one target per line, `#` for comments, or CSV
/// (first column is used).
pub fn parse_targets_from_list(content: &str) -> Vec<CheckTarget> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split(',').next().unwrap_or(line).trim())
        .filter(|target| !target.is_empty())
        .map(CheckTarget::new)
        .collect()
}
