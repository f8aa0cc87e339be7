//! Multi-slot signals with scoped connections.
//!
//! A [`Signal`] owns a list of type-erased slots. [`Signal::connect`] hands
//! back a [`Connection`] token; dropping the token disconnects the slot, so
//! the subscription can never outlive whoever owns the token.
//!
//! Emission runs over a snapshot of the slot list with no lock held. Slots are
//! therefore free to connect, disconnect or emit re-entrantly.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Slot<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct SlotList<A> {
    next_id: AtomicU64,
    slots: Mutex<Vec<(u64, Slot<A>)>>,
}

impl<A> SlotList<A> {
    fn remove(&self, id: u64) -> bool {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|(slot_id, _)| *slot_id != id);
        slots.len() != before
    }
}

/// Type-erased disconnect target held by a [`Connection`].
trait Disconnect: Send + Sync {
    fn disconnect(&self, id: u64) -> bool;
}

impl<A: 'static> Disconnect for SlotList<A> {
    fn disconnect(&self, id: u64) -> bool {
        self.remove(id)
    }
}

/// A notification source with any number of connected slots.
pub struct Signal<A> {
    inner: Arc<SlotList<A>>,
}

impl<A: 'static> Signal<A> {
    /// Creates a signal with no slots.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SlotList {
                next_id: AtomicU64::new(1),
                slots: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Connects a slot. The slot stays connected while the returned
    /// [`Connection`] is alive.
    #[must_use = "dropping the connection disconnects the slot immediately"]
    pub fn connect<F>(&self, slot: F) -> Connection
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.slots.lock().push((id, Arc::new(slot)));
        let target: Arc<dyn Disconnect> = self.inner.clone();
        Connection {
            target: Some(Arc::downgrade(&target)),
            id,
        }
    }

    /// Invokes every connected slot in connection order.
    pub fn emit(&self, args: &A) {
        let snapshot: Vec<Slot<A>> = self
            .inner
            .slots
            .lock()
            .iter()
            .map(|(_, slot)| slot.clone())
            .collect();
        for slot in snapshot {
            slot(args);
        }
    }

    /// Number of connected slots.
    pub fn slot_count(&self) -> usize {
        self.inner.slots.lock().len()
    }

    /// Returns `true` if no slot is connected.
    pub fn is_empty(&self) -> bool {
        self.slot_count() == 0
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("slots", &self.inner.slots.lock().len())
            .finish()
    }
}

/// Scoped subscription token returned by [`Signal::connect`].
///
/// Dropping the token disconnects the slot. A token outliving its signal is
/// harmless: disconnecting then does nothing.
pub struct Connection {
    target: Option<Weak<dyn Disconnect>>,
    id: u64,
}

impl Connection {
    /// Disconnects the slot. Calling this more than once is a no-op.
    pub fn disconnect(&mut self) {
        if let Some(target) = self.target.take().and_then(|t| t.upgrade()) {
            target.disconnect(self.id);
        }
    }

    /// Returns `true` while the slot is still attached to a live signal.
    pub fn is_connected(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|target| target.strong_count() > 0)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn emit_reaches_connected_slots() {
        let signal = Signal::<i32>::new();
        let sum = Arc::new(AtomicUsize::new(0));
        let s = sum.clone();
        let _conn = signal.connect(move |v| {
            s.fetch_add(*v as usize, Ordering::SeqCst);
        });

        signal.emit(&3);
        signal.emit(&4);
        assert_eq!(sum.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn dropping_connection_disconnects() {
        let signal = Signal::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let conn = signal.connect(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(signal.slot_count(), 1);

        drop(conn);
        signal.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(signal.is_empty());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let signal = Signal::<()>::new();
        let mut conn = signal.connect(|_| {});
        assert!(conn.is_connected());
        conn.disconnect();
        conn.disconnect();
        assert!(!conn.is_connected());
        assert!(signal.is_empty());
    }

    #[test]
    fn connection_outliving_signal_is_harmless() {
        let signal = Signal::<()>::new();
        let conn = signal.connect(|_| {});
        drop(signal);
        assert!(!conn.is_connected());
        drop(conn);
    }

    #[test]
    fn slot_may_disconnect_during_emit() {
        let signal = Arc::new(Signal::<()>::new());
        let holder: Arc<Mutex<Option<Connection>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));

        let h = holder.clone();
        let count = hits.clone();
        let conn = signal.connect(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            h.lock().take();
        });
        *holder.lock() = Some(conn);

        signal.emit(&());
        signal.emit(&());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
