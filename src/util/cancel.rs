//! Cooperative cancellation for long-running builds and scans.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{HalberdError, Result};

/// Shared flag checked between units of work.
///
/// Clones observe the same flag, so one handle can be given to the worker and
/// another kept by whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `OperationCancelled` naming `what` if cancellation was requested.
    pub fn check(&self, what: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(HalberdError::cancelled(what.to_string()))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let token = CancellationToken::new();
        let worker = token.clone();
        assert!(!worker.is_cancelled());
        assert!(worker.check("scan").is_ok());

        token.cancel();
        assert!(worker.is_cancelled());
        assert!(matches!(
            worker.check("scan"),
            Err(HalberdError::OperationCancelled(_))
        ));
    }
}
