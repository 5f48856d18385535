// ── Per-site cancellation ──
//
// Wraps a `CancellationToken` so that closing a site releases its
// background work exactly once, no matter how many callers race to close.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

/// Stop signal owned by one site.
///
/// Clones share the same signal. Every synchronization source of the site
/// runs on a child token, so cancelling here stops all of them.
#[derive(Debug, Clone, Default)]
pub struct SiteCancel {
    token: CancellationToken,
    released: Arc<AtomicBool>,
}

impl SiteCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Returns `true` only for the call that performed
    /// the release; later and concurrent calls are no-ops returning `false`.
    pub fn cancel(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token for one initialization attempt: cancelled with the site, but
    /// can also be cancelled on its own when the attempt fails.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Resolves once the site is closed.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// Live-task counter for a site's synchronization sources.
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskGauge {
    live: Arc<AtomicUsize>,
}

impl TaskGauge {
    /// Count one task as live until the returned guard is dropped.
    pub(crate) fn enter(&self) -> TaskGuard {
        self.live.fetch_add(1, Ordering::AcqRel);
        TaskGuard {
            live: Arc::clone(&self.live),
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

pub(crate) struct TaskGuard {
    live: Arc<AtomicUsize>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}
