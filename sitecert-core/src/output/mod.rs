mod human;
mod json;

pub use human::HumanFormatter;
pub use json::JsonFormatter;

use serde::{Deserialize, Serialize};

use crate::checker::{CheckReport, RunSummary};
use crate::target::CheckTarget;

/// Width of the banner and separator rules
pub const LINE_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" | "pretty" => Ok(OutputFormat::Human),
            "json" | "ndjson" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Renders run progress. `None` means the format has nothing to print for
/// that step.
pub trait OutputFormatter {
    fn format_banner(&self) -> Option<String>;
    fn format_checking(&self, target: &CheckTarget) -> Option<String>;
    fn format_report(&self, report: &CheckReport) -> String;
    fn format_summary(&self, summary: &RunSummary) -> String;
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter::new()),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
    }
}
