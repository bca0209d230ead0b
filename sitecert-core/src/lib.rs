pub mod checker;
pub mod colors;
pub mod config;
pub mod error;
pub mod output;
pub mod target;

pub use error::{Result, SiteCertError};

pub use checker::{
    CertificateChecker, CertificateInfo, ChainVerdict, CheckReport, CheckResult, PolicyError,
    RunEvent, RunSummary,
};
pub use config::Settings;
pub use output::{OutputFormat, OutputFormatter};
pub use target::{parse_targets_from_list, CheckTarget};
