use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::types::{CertificateInfo, CheckResult};

/// A reason the platform refused the certificate chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PolicyError {
    /// Chain rejected for a reason not visible on the leaf (untrusted root,
    /// self-signed, revoked, incomplete chain); carries the platform message
    UntrustedChain(String),
    Expired,
    NotYetValid,
    NameMismatch,
    MissingCertificate,
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::UntrustedChain(reason) => write!(f, "untrusted chain: {}", reason),
            PolicyError::Expired => f.write_str("certificate has expired"),
            PolicyError::NotYetValid => f.write_str("certificate is not yet valid"),
            PolicyError::NameMismatch => f.write_str("certificate does not cover the host name"),
            PolicyError::MissingCertificate => f.write_str("no readable peer certificate"),
        }
    }
}

/// Chain-validation verdict for one handshake. Empty means trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainVerdict {
    errors: Vec<PolicyError>,
}

impl ChainVerdict {
    pub fn trusted() -> Self {
        Self::default()
    }

    pub fn with_errors(errors: Vec<PolicyError>) -> Self {
        Self { errors }
    }

    /// Build the verdict for a chain the platform refused.
    ///
    /// The platform only gives us an error string, so the leaf is inspected
    /// for the problems that can be named precisely. When none is found the
    /// platform message itself becomes the error.
    pub fn rejected(
        platform_message: &str,
        certificate: Option<&CertificateInfo>,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut errors = Vec::new();

        if let Some(cert) = certificate {
            if now > cert.valid_until {
                errors.push(PolicyError::Expired);
            }
            if now < cert.valid_from {
                errors.push(PolicyError::NotYetValid);
            }
            if let Some(host) = host {
                if !certificate_covers_host(cert, host) {
                    errors.push(PolicyError::NameMismatch);
                }
            }
        }

        if errors.is_empty() {
            errors.push(PolicyError::UntrustedChain(platform_message.to_string()));
        }

        Self { errors }
    }

    pub fn is_trusted(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[PolicyError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<PolicyError> {
        self.errors
    }
}

/// Classify a handshake outcome. First match wins:
/// any policy error, then the expiry horizon (inclusive), then OK.
///
/// A horizon reaching past the representable date range covers every
/// certificate.
pub fn classify(
    verdict: &ChainVerdict,
    certificate: &CertificateInfo,
    now: DateTime<Utc>,
    horizon: Duration,
) -> CheckResult {
    if !verdict.is_trusted() {
        return CheckResult::Invalid;
    }

    match now.checked_add_signed(horizon) {
        Some(deadline) if certificate.valid_until > deadline => CheckResult::Ok,
        _ => CheckResult::ExpiringSoon,
    }
}

fn certificate_covers_host(cert: &CertificateInfo, host: &str) -> bool {
    if cert.dns_names.is_empty() {
        return hostname_matches(&cert.subject, host);
    }
    cert.dns_names
        .iter()
        .any(|pattern| hostname_matches(pattern, host))
}

/// RFC 6125 style matching: case-insensitive, a wildcard only as the whole
/// left-most label and only covering exactly one label.
pub fn hostname_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim_end_matches('.').to_ascii_lowercase();
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(suffix) => match host.split_once('.') {
            Some((label, rest)) => !label.is_empty() && rest == suffix && suffix.contains('.'),
            None => false,
        },
        None => pattern == host,
    }
}
