use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag shared between the fit orchestrator and its worker.
///
/// Cloning creates another handle to the same flag. Backends poll
/// [`is_cancelled`](CancellationToken::is_cancelled) between optimizer
/// iterations; nothing is interrupted pre-emptively.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn checkpoint(&self) -> crate::error::Result<()> {
        if self.is_cancelled() {
            Err(crate::error::EditorError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
