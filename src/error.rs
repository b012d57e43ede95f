use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt audio file: {0}")]
    CorruptFile(String),

    #[error("Audio buffer contains no samples")]
    EmptyBuffer,

    #[error("Insufficient duration: {frames} samples available, {required} required")]
    InsufficientDuration { frames: usize, required: usize },

    #[error("Analysis cancelled during {stage}: {reason}")]
    Cancelled { stage: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Whether the error aborts the whole run rather than a single module.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AnalysisError::InsufficientDuration { .. } | AnalysisError::Internal(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalysisError::Cancelled { .. })
    }
}

/// Run `f`, turning a panic into [`AnalysisError::Internal`] tagged with `context`.
pub(crate) fn guard<T>(context: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        Err(AnalysisError::Internal(format!("{} panicked: {}", context, message)))
    })
}
