//! Error taxonomy for artifact persistence.

use std::path::PathBuf;

/// Artifact store errors.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact path not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("malformed document {}: {reason}", path.display())]
    MalformedDocument { path: PathBuf, reason: String },

    #[error("write failed for {}: {source}", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("debug trace export failed: {0}")]
    DebugExport(String),

    #[error("invalid pass name: {0:?}")]
    InvalidPassName(String),

    #[error("trace for pass {pass:?} has an auxiliary field named `traceEvents`")]
    ReservedTraceField { pass: String },

    #[error("network analysis failed: {0}")]
    Analysis(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArtifactError {
    /// Build a `MalformedDocument` error from a parse failure.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::MalformedDocument {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `WriteFailure` error for `path`.
    pub fn write_failure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }
}

/// Result type for artifact store operations.
pub type Result<T> = std::result::Result<T, ArtifactError>;
