use chrono::{DateTime, Utc};
use serde::Serialize;

use super::OutputFormatter;
use crate::checker::{CheckReport, CheckResult, RunSummary};
use crate::target::CheckTarget;

/// One compact JSON object per report, then a summary object.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

#[derive(Serialize)]
struct SummaryView {
    total: usize,
    failures: usize,
    ok: usize,
    expiring_soon: usize,
    invalid: usize,
    connection_error: usize,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }

    fn to_json<T: serde::Serialize + ?Sized>(&self, value: &T) -> String {
        serde_json::to_string(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_banner(&self) -> Option<String> {
        None
    }

    fn format_checking(&self, _target: &CheckTarget) -> Option<String> {
        None
    }

    fn format_report(&self, report: &CheckReport) -> String {
        self.to_json(report)
    }

    fn format_summary(&self, summary: &RunSummary) -> String {
        let view = SummaryView {
            total: summary.total(),
            failures: summary.failures(),
            ok: summary.count(CheckResult::Ok),
            expiring_soon: summary.count(CheckResult::ExpiringSoon),
            invalid: summary.count(CheckResult::Invalid),
            connection_error: summary.count(CheckResult::ConnectionError),
            started_at: summary.started_at,
            finished_at: summary.finished_at,
        };
        self.to_json(&view)
    }
}
