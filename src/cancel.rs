//! Cooperative cancellation, surfaced at the next remote call.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A process-wide cancellation flag.
///
/// Set by the ctrl-c handler (or by tests) and observed before every remote
/// request; in-flight requests finish, nothing is rolled back.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Trip this token on ctrl-c.
    ///
    /// Installing the process handler can only happen once; a second call
    /// (e.g. from tests) logs and continues.
    pub fn install_ctrlc_handler(&self) {
        let token = self.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            tracing::warn!("interrupt received; finishing the current request");
            token.cancel();
        }) {
            tracing::debug!("ctrl-c handler not installed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_starts_not_cancelled() {
        assert!(!CancelToken::new().is_cancelled());
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
