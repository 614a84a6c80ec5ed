//! Hierarchical cancellation tokens.
//!
//! A [`CancellationToken`] can be cloned and shared across tasks. Tokens form
//! a tree: cancelling a token cancels every child created from it, while
//! cancelling a child leaves the parent untouched. Loops wait on
//! [`CancellationToken::cancelled`] inside `tokio::select!` so every blocking
//! point observes cancellation promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Node {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<Node>>>,
}

impl Node {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();
        self.cancel_children();
    }

    fn cancel_children(&self) {
        let children: Vec<Arc<Node>> = {
            let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
            let live = children.iter().filter_map(Weak::upgrade).collect();
            children.clear();
            live
        };
        for child in children {
            child.cancel();
        }
    }
}

/// Node in the cancellation tree. Clones share the node.
///
/// Connections hang off a scope token; closing the scope stops every
/// connection under it.
///
/// ```
/// use bleatkan_core::cancel::CancellationToken;
///
/// let scope = CancellationToken::new();
/// let connection = scope.child_token();
///
/// scope.cancel_children();
/// assert!(connection.is_cancelled());
/// assert!(!scope.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    node: Arc<Node>,
}

impl CancellationToken {
    /// New root with no parent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token and everything below it.
    pub fn cancel(&self) {
        self.node.cancel();
    }

    /// Cancel every descendant but keep this token usable.
    pub fn cancel_children(&self) {
        self.node.cancel_children();
    }

    /// Whether this token or an ancestor was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.node.cancelled.load(Ordering::SeqCst)
    }

    /// Create a child token.
    ///
    /// The child is cancelled when this token is cancelled. Cancelling the
    /// child has no effect on this token. A child of an already-cancelled
    /// token starts out cancelled.
    pub fn child_token(&self) -> Self {
        let child = CancellationToken::new();
        if self.is_cancelled() {
            child.node.cancelled.store(true, Ordering::SeqCst);
            return child;
        }

        let mut children = self.node.children.lock().unwrap_or_else(PoisonError::into_inner);
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child.node));
        drop(children);

        // Parent may have been cancelled between the check and the push.
        if self.is_cancelled() {
            child.cancel();
        }
        child
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.node.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
