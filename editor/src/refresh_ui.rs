//! Repaint requests from an editor back end to its UI layer.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Partial refresh: the window or tab title changed.
pub const REFRESH_TITLE: i32 = 0;
/// Partial refresh: the SQL text changed.
pub const REFRESH_SQL: i32 = 1;
/// Partial refresh: the validation status changed.
pub const REFRESH_VALIDATION: i32 = 2;

pub type RefreshCallback = Arc<dyn Fn() + Send + Sync>;
pub type PartialRefreshCallback = Arc<dyn Fn(i32) + Send + Sync>;

/// Full and partial refresh callbacks installed by the UI layer.
///
/// Partial refreshes can be blocked with [`RefreshUi::block`]; full
/// refreshes are never gated. Callbacks run synchronously on the calling
/// thread.
#[derive(Clone, Default)]
pub struct RefreshUi {
    inner: Arc<RefreshUiInner>,
}

#[derive(Default)]
struct RefreshUiInner {
    refresh: Mutex<Option<RefreshCallback>>,
    partial: Mutex<Option<PartialRefreshCallback>>,
    blocked: AtomicUsize,
}

impl RefreshUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_refresh_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.inner.refresh.lock() = Some(Arc::new(callback));
    }

    pub fn set_partial_refresh_callback(&self, callback: impl Fn(i32) + Send + Sync + 'static) {
        *self.inner.partial.lock() = Some(Arc::new(callback));
    }

    /// Invokes the partial callback with `reason` unless partial refreshes
    /// are blocked.
    pub fn request_partial_refresh(&self, reason: i32) {
        if self.is_blocked() {
            log::trace!("partial refresh {reason} blocked");
            return;
        }
        let callback = self.inner.partial.lock().clone();
        if let Some(callback) = callback {
            callback(reason);
        }
    }

    /// Invokes the full refresh callback.
    pub fn request_full_refresh(&self) {
        let callback = self.inner.refresh.lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Blocks partial refreshes until the returned guard is dropped.
    ///
    /// Blockers nest: partial refreshes resume when the last one is gone.
    #[must_use = "partial refreshes are unblocked as soon as the guard is dropped"]
    pub fn block(&self) -> RefreshBlocker {
        self.inner.blocked.fetch_add(1, Ordering::AcqRel);
        RefreshBlocker {
            inner: self.inner.clone(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.inner.blocked.load(Ordering::Acquire) > 0
    }
}

impl fmt::Debug for RefreshUi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshUi")
            .field("has_refresh", &self.inner.refresh.lock().is_some())
            .field("has_partial", &self.inner.partial.lock().is_some())
            .field("blocked", &self.inner.blocked.load(Ordering::Acquire))
            .finish()
    }
}

/// Scoped partial-refresh blocker returned by [`RefreshUi::block`].
pub struct RefreshBlocker {
    inner: Arc<RefreshUiInner>,
}

impl Drop for RefreshBlocker {
    fn drop(&mut self) {
        self.inner.blocked.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for RefreshBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshBlocker").finish()
    }
}
