use crate::split::Split;
use std::path::PathBuf;

/// Errors raised while reading a manifest or any file it references.
///
/// All of them are fatal for dataset construction.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown split '{0}' (expected train, val or test)")]
    UnknownSplit(String),
    #[error("split '{0}' is not listed in the manifest")]
    MissingSplit(Split),
    #[error("invalid manifest content in {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

impl ManifestError {
    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ManifestError::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
