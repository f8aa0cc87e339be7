//! Named application-wide notifications.
//!
//! A [`NotificationCenter`] is constructed once at startup and handed to
//! every component that posts or observes notifications. Observers register
//! under an owner key so a component can drop all of its registrations at
//! once when it is torn down.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::grt::{GrtObjectRef, Value};

/// Posted after the preferences dialog closes. `info["saved"] == 1` when the
/// user saved.
pub const PREFERENCES_DID_CLOSE: &str = "GRNPreferencesDidClose";

/// Posted once a database object editor finished construction. `info["form"]`
/// carries the editor's form id and `info["object"]` the edited object.
pub const DB_OBJECT_EDITOR_CREATED: &str = "GRNDBObjectEditorCreated";

/// Payload of a notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationInfo {
    values: HashMap<String, Value>,
}

impl NotificationInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_owned(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(Value::as_int).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_object(&self, key: &str) -> Option<&GrtObjectRef> {
        self.get(key).and_then(Value::as_object)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A posted notification as seen by observers.
#[derive(Debug)]
pub struct Notification<'a> {
    pub name: &'a str,
    pub sender: Option<&'a GrtObjectRef>,
    pub info: &'a NotificationInfo,
}

/// Handle of a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type Callback = Arc<dyn Fn(&Notification<'_>) + Send + Sync>;

struct Observer {
    id: ObserverId,
    owner: String,
    name: String,
    callback: Callback,
}

/// Registry of notification observers.
pub struct NotificationCenter {
    next_id: AtomicU64,
    observers: Mutex<Vec<Observer>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Registers `callback` for notifications called `name` under `owner`.
    pub fn add_observer(
        &self,
        owner: &str,
        name: &str,
        callback: impl Fn(&Notification<'_>) + Send + Sync + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.lock().push(Observer {
            id,
            owner: owner.to_owned(),
            name: name.to_owned(),
            callback: Arc::new(callback),
        });
        id
    }

    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| o.id != id);
        observers.len() != before
    }

    /// Removes every observer registered under `owner`. Returns how many
    /// were removed.
    pub fn remove_observers_for(&self, owner: &str) -> usize {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| o.owner != owner);
        before - observers.len()
    }

    /// Delivers a notification to every observer registered for `name`.
    ///
    /// Observers run on the calling thread with no lock held.
    pub fn send(&self, name: &str, sender: Option<GrtObjectRef>, info: NotificationInfo) {
        let targets: Vec<Callback> = self
            .observers
            .lock()
            .iter()
            .filter(|o| o.name == name)
            .map(|o| o.callback.clone())
            .collect();
        log::trace!("notification {name} -> {} observer(s)", targets.len());

        let notification = Notification {
            name,
            sender: sender.as_ref(),
            info: &info,
        };
        for callback in targets {
            callback(&notification);
        }
    }

    pub fn observer_count(&self, name: &str) -> usize {
        self.observers
            .lock()
            .iter()
            .filter(|o| o.name == name)
            .count()
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotificationCenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationCenter")
            .field("observers", &self.observers.lock().len())
            .finish()
    }
}
