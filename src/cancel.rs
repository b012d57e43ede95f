use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AnalysisError, Result};

/// Cooperative cancellation shared between a caller and a running pipeline.
///
/// Combines an explicit cancel flag with an optional wall-clock deadline.
/// The pipeline polls [`CancelToken::check`] between stages.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A timeout too large to represent as an `Instant` means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || self.deadline_passed()
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check(&self, stage: &str) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(AnalysisError::Cancelled {
                stage: stage.to_string(),
                reason: "cancelled by caller".into(),
            });
        }
        if self.deadline_passed() {
            return Err(AnalysisError::Cancelled {
                stage: stage.to_string(),
                reason: "deadline exceeded".into(),
            });
        }
        Ok(())
    }
}
