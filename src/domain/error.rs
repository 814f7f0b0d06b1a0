// Error taxonomy shared across the exporter
use thiserror::Error;

/// Errors raised while exporting a dashboard.
///
/// All variants are recoverable at the per-dashboard boundary: the batch
/// driver logs them against the owning dashboard and keeps going unless
/// abort-on-error is configured.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// A Grafana API request failed (transport error or non-2xx status).
    #[error("request for {url} failed: {reason}")]
    Api { url: String, reason: String },

    /// A named datasource is missing or of a kind with no query support.
    #[error("datasource error: {0}")]
    DataSource(String),

    /// A dashboard declares a variable of a type we cannot resolve.
    #[error("variable `{name}`: type `{kind}` is currently not supported")]
    VariableResolution { name: String, kind: String },

    /// A configured variable or ignore pattern is not a valid regex.
    #[error("invalid pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },

    /// Creating an output directory or writing a plot failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExporterError {
    pub fn api(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Api {
            url: url.into(),
            reason: reason.into(),
        }
    }
}
