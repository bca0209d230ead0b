use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::policy::PolicyError;
use crate::target::CheckTarget;

/// Leaf certificate details captured during the handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInfo {
    /// Subject common name (or the full DN when there is no CN)
    pub subject: String,
    /// Issuer common name (or the full DN when there is no CN)
    pub issuer: String,
    /// Not-before date
    pub valid_from: DateTime<Utc>,
    /// Not-after date
    pub valid_until: DateTime<Utc>,
    /// Whole days left at the time of the check (negative once expired)
    pub days_until_expiry: i64,
    /// DNS names from the subject alternative name extension
    pub dns_names: Vec<String>,
}

/// Final classification of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckResult {
    Ok,
    ExpiringSoon,
    Invalid,
    ConnectionError,
}

impl CheckResult {
    /// Everything but `Ok` counts towards the failure tally.
    pub fn is_failure(self) -> bool {
        self != CheckResult::Ok
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckResult::Ok => "OK",
            CheckResult::ExpiringSoon => "EXPIRING_SOON",
            CheckResult::Invalid => "INVALID",
            CheckResult::ConnectionError => "CONNECTION_ERROR",
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything observed while checking a single target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub target: CheckTarget,
    /// Normalized request URL, absent when the target did not parse
    pub url: Option<String>,
    pub result: CheckResult,
    pub certificate: Option<CertificateInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policy_errors: Vec<PolicyError>,
    /// Status code of the completed HTTPS request
    pub http_status: Option<u16>,
    /// Transport failure description for `ConnectionError`
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl CheckReport {
    pub(crate) fn connection_error(
        target: CheckTarget,
        url: Option<String>,
        error: String,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            target,
            url,
            result: CheckResult::ConnectionError,
            certificate: None,
            policy_errors: Vec::new(),
            http_status: None,
            error: Some(error),
            checked_at,
            duration_ms: 0,
        }
    }
}

/// Aggregate of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub reports: Vec<CheckReport>,
    failures: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            reports: Vec::new(),
            failures: 0,
            started_at,
            finished_at: started_at,
        }
    }

    /// Append a report, counting it when it is not `Ok`.
    pub fn record(&mut self, report: CheckReport) {
        if report.result.is_failure() {
            self.failures += 1;
        }
        self.finished_at = report.checked_at.max(self.finished_at);
        self.reports.push(report);
    }

    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = finished_at;
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn count(&self, result: CheckResult) -> usize {
        self.reports.iter().filter(|r| r.result == result).count()
    }

    pub fn has_failures(&self) -> bool {
        self.failures > 0
    }
}

/// Progress notifications emitted by [`super::CertificateChecker::run_with`]
#[derive(Debug, Clone, Copy)]
pub enum RunEvent<'a> {
    Checking {
        index: usize,
        total: usize,
        target: &'a CheckTarget,
    },
    Checked {
        index: usize,
        total: usize,
        report: &'a CheckReport,
    },
}
