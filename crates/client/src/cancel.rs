//! Cooperative cancellation for in-flight operations.
//!
//! A view that starts an operation hands the manager a token and cancels it
//! when it goes away. The manager checks the token after the network round
//! trip and drops the response instead of applying it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag. Clones observe the same flag; children also
/// observe every ancestor.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    parent: Option<CancellationToken>,
}

impl CancellationToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is cancelled when either it or `self` is cancelled.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Cancel this token and all of its children.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Whether this token or any ancestor has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(Self::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_flag() {
        let token = CancellationToken::new();
        let view = token.clone();
        assert!(!view.is_cancelled());
        token.cancel();
        assert!(view.is_cancelled());
    }

    #[test]
    fn test_child_follows_parent_only_downward() {
        let root = CancellationToken::new();
        let child = root.child();
        let sibling = root.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
        assert!(!sibling.is_cancelled());

        root.cancel();
        assert!(sibling.is_cancelled());
    }
}
