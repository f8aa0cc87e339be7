//! Marshalling work onto the UI thread.
//!
//! Background threads cannot touch UI state directly. They hand a closure to
//! a [`UiScheduler`], which runs it on the UI thread the next time its event
//! loop goes idle. The returned [`IdleHandle`] is the only thing keeping the
//! task alive: dropping it before the task ran cancels the task.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

/// Work scheduled for the next idle cycle.
pub type IdleTask = Box<dyn FnOnce() + Send>;

/// UI-thread affinity and idle scheduling.
pub trait UiScheduler: Send + Sync {
    /// Returns `true` when called on the UI thread.
    fn is_ui_thread(&self) -> bool;

    /// Schedules `task` to run once on the UI thread's next idle cycle.
    #[must_use = "dropping the handle cancels the task"]
    fn run_once_when_idle(&self, task: IdleTask) -> IdleHandle;
}

/// Cancellation token for a task scheduled with
/// [`UiScheduler::run_once_when_idle`].
pub struct IdleHandle {
    cancelled: Arc<AtomicBool>,
}

impl IdleHandle {
    /// Creates a handle sharing `cancelled` with the scheduler.
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self { cancelled }
    }

    /// Cancels the task. Has no effect once the task ran.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for IdleHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for IdleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A [`UiScheduler`] whose UI thread is the thread that created it.
///
/// The host event loop calls [`run_pending`](Self::run_pending) whenever it
/// goes idle.
pub struct IdleQueue {
    ui_thread: ThreadId,
    tasks: Mutex<Vec<(Arc<AtomicBool>, IdleTask)>>,
}

impl IdleQueue {
    /// Creates a queue bound to the calling thread.
    pub fn new() -> Self {
        Self {
            ui_thread: thread::current().id(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Runs every queued task that was not cancelled, in scheduling order.
    ///
    /// Tasks scheduled while running are kept for the next call. Returns the
    /// number of tasks that ran.
    pub fn run_pending(&self) -> usize {
        if !self.is_ui_thread() {
            log::warn!("IdleQueue::run_pending() called off the UI thread, ignored");
            return 0;
        }
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let mut ran = 0;
        for (cancelled, task) in tasks {
            if cancelled.swap(true, Ordering::AcqRel) {
                continue;
            }
            task();
            ran += 1;
        }
        ran
    }

    /// Number of queued tasks that are still live.
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|(cancelled, _)| !cancelled.load(Ordering::Acquire))
            .count()
    }
}

impl Default for IdleQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UiScheduler for IdleQueue {
    fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.ui_thread
    }

    fn run_once_when_idle(&self, task: IdleTask) -> IdleHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut tasks = self.tasks.lock();
        // Drop tasks whose handles are gone so a long-lived queue stays small.
        tasks.retain(|(flag, _)| !flag.load(Ordering::Acquire));
        tasks.push((cancelled.clone(), task));
        IdleHandle::new(cancelled)
    }
}

impl fmt::Debug for IdleQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleQueue")
            .field("ui_thread", &self.ui_thread)
            .field("pending", &self.pending())
            .finish()
    }
}
