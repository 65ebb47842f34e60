//! Error types for artifact-fetcher
//!
//! One error enum covers the whole crate. Per-entry extraction failures and
//! non-zero hook exits are deliberately *not* variants here: both are logged
//! and swallowed by the pipeline (see the `extract` and `commands` modules),
//! matching the documented failure policy.

use thiserror::Error;

/// Result type alias for artifact-fetcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for artifact-fetcher
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "artifacts.path")
        key: Option<String>,
    },

    /// Repository identifier does not split into "owner/name"
    #[error("malformed repository identifier: {0:?}")]
    MalformedRepository(String),

    /// Network error (artifact listing or archive download)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Malformed JSON from the hosting API
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Downloaded archive is not a readable zip file
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// HTTP listener error
    #[error("server error: {0}")]
    Server(String),
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let err = Error::Config {
            message: "artifact target requires a github_token".to_string(),
            key: Some("artifacts.github_token".to_string()),
        };
        assert!(err.to_string().contains("github_token"));

        let err = Error::MalformedRepository("owner/name/extra".to_string());
        assert!(err.to_string().contains("owner/name/extra"));
    }
}
