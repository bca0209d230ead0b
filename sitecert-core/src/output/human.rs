use colored::Colorize;

use super::{OutputFormatter, LINE_WIDTH};
use crate::checker::{CheckReport, CheckResult, RunSummary};
use crate::colors::CatppuccinExt;
use crate::target::CheckTarget;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

pub struct HumanFormatter {
    use_colors: bool,
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    fn rule(&self, ch: char) -> String {
        let line = ch.to_string().repeat(LINE_WIDTH);
        if self.use_colors {
            line.teal().to_string()
        } else {
            line
        }
    }

    fn progress(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_yellow().to_string()
        } else {
            text.to_string()
        }
    }

    fn detail(&self, text: &str) -> String {
        if self.use_colors {
            text.overlay1().to_string()
        } else {
            text.to_string()
        }
    }

    fn success(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_green().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn warning(&self, text: &str) -> String {
        if self.use_colors {
            text.peach().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn error(&self, text: &str) -> String {
        if self.use_colors {
            text.ctp_red().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn transport(&self, text: &str) -> String {
        if self.use_colors {
            text.maroon().to_string()
        } else {
            text.to_string()
        }
    }

    fn summary_line(&self, text: &str) -> String {
        if self.use_colors {
            text.teal().bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn verdict(&self, result: CheckResult) -> String {
        match result {
            CheckResult::Ok => self.success("Certificate OK"),
            CheckResult::ExpiringSoon => self.warning("Certificate EXPIRING SOON"),
            CheckResult::Invalid => self.error("Certificate NOT OK"),
            CheckResult::ConnectionError => self.error("Connection FAILED"),
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_banner(&self) -> Option<String> {
        let title = " Website Certificate Checker ";
        let title = if self.use_colors {
            title.teal().bold().to_string()
        } else {
            title.to_string()
        };
        Some(format!("{}\n{}", title, self.rule('=')))
    }

    fn format_checking(&self, target: &CheckTarget) -> Option<String> {
        Some(self.progress(&format!("Checking website: {}", target)))
    }

    fn format_report(&self, report: &CheckReport) -> String {
        let mut output = Vec::new();

        match report.certificate {
            Some(ref cert) => {
                output.push(self.detail(&format!(
                    "Certificate valid from {} until {} ({} days)",
                    cert.valid_from.format(DATE_FORMAT),
                    cert.valid_until.format(DATE_FORMAT),
                    cert.days_until_expiry
                )));
                output.push(self.detail(&format!(
                    "  Issued to {} by {}",
                    cert.subject, cert.issuer
                )));
            }
            None if report.result != CheckResult::ConnectionError => {
                output.push(self.detail("No certificate captured"));
            }
            None => {}
        }

        for policy_error in &report.policy_errors {
            output.push(format!("  {} {}", self.error("✗"), policy_error));
        }

        if let Some(ref error) = report.error {
            output.push(format!("  {} {}", self.error("✗"), self.transport(error)));
        }

        output.push(self.verdict(report.result));
        output.push(self.rule('-'));

        output.join("\n")
    }

    fn format_summary(&self, summary: &RunSummary) -> String {
        let mut output = vec![self.summary_line(&format!(
            "Found {} websites with errors",
            summary.failures()
        ))];

        if summary.total() > 0 {
            output.push(self.detail(&format!(
                "  {} checked: {} ok, {} expiring soon, {} invalid, {} connection errors",
                summary.total(),
                summary.count(CheckResult::Ok),
                summary.count(CheckResult::ExpiringSoon),
                summary.count(CheckResult::Invalid),
                summary.count(CheckResult::ConnectionError),
            )));
        }

        output.join("\n")
    }
}
