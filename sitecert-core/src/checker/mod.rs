//! Website certificate checking
//!
//! Provides the certificate check for a single target and the sequential
//! driver that runs it over a list:
//! - Peer certificate capture through a real HTTPS request
//! - Chain-validation verdict from the platform TLS stack
//! - Classification into OK, expiring soon, invalid or connection error

mod client;
mod policy;
mod types;
mod x509;

pub use client::{CertificateChecker, DEFAULT_EXPIRY_HORIZON_DAYS, DEFAULT_TIMEOUT};
pub use policy::{classify, hostname_matches, ChainVerdict, PolicyError};
pub use types::{CertificateInfo, CheckReport, CheckResult, RunEvent, RunSummary};
pub use x509::parse_certificate_der;
