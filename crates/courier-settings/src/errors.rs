use std::path::PathBuf;

use thiserror::Error;

/// Why a settings load stopped before the server could start.
///
/// Bad environment overrides never show up here; they are logged and skipped.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not JSON, or a section has the wrong shape
    /// (e.g. `"port": "eighty"`).
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    /// The merged settings parse but cannot be served, such as a route
    /// without a leading slash or an unknown log level.
    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl SettingsError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SettingsError>;
