//! A minimal cooperative cancellation token.
//!
//! The concurrency model requires every long-running
//! public operation to accept a token checked at each suspension point.
//! Pulling in `tokio-util` for this single primitive would add a
//! dependency this crate has no other use for, so it is reproduced here as
//! a small `Arc<AtomicBool>` plus a notify instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Suspends until either cancellation fires or `fut` resolves, whichever
    /// comes first.
    pub async fn race<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        if self.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.inner.notify.notified() => None,
            out = fut => Some(out),
        }
    }
}
