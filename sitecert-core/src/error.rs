use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteCertError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Unsupported scheme '{0}' (only https is checked)")]
    UnsupportedScheme(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Certificate parsing failed: {0}")]
    CertificateParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not read settings file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SiteCertError>;

/// Render an error together with every error in its `source()` chain.
///
/// reqwest hides the useful part ("certificate verify failed", "dns error")
/// behind a generic top-level message.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
